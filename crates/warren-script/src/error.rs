use std::process::ExitStatus;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ScriptError {
    #[error(transparent)]
    #[diagnostic(code(warren_script::io_error))]
    IoError(#[from] std::io::Error),

    #[error("Failed to spawn child process.")]
    #[diagnostic(code(warren_script::spawn_error))]
    SpawnError(#[source] std::io::Error),

    #[error("Failed to find event `{0}` in package.")]
    #[diagnostic(code(warren_script::missing_event))]
    MissingEvent(String),

    #[error(transparent)]
    #[diagnostic(code(warren_script::join_path_error))]
    JoinPathError(#[from] std::env::JoinPathsError),

    #[error("Error performing process operation on script.")]
    #[diagnostic(code(warren_script::script_process_error))]
    ScriptProcessError(#[source] std::io::Error),

    #[error("Script `{event}` exited with code {}.", .status.code().unwrap_or(-1))]
    #[diagnostic(code(warren_script::script_error))]
    ScriptFailure { event: String, status: ExitStatus },
}

pub(crate) type Result<T> = std::result::Result<T, ScriptError>;
