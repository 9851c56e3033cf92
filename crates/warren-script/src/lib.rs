//! Run package lifecycle scripts (`preinstall`, `install`, `postinstall`,
//! `build`, `test`, `prepublish`) through the platform shell, with every
//! ancestor `node_modules/.bin` directory prepended to `$PATH`.

use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

pub use error::ScriptError;
use error::Result;
use warren_common::Manifest;

mod error;

/// A lifecycle script, described declaratively. Nothing touches the OS until
/// one of the launch methods assembles the shell invocation and spawns it.
#[derive(Debug)]
pub struct LifecycleScript {
    package_path: PathBuf,
    event: String,
    manifest: Option<Manifest>,
    workspace_path: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    stdin: Option<Stdio>,
}

impl LifecycleScript {
    pub fn new(package_path: impl AsRef<Path>, event: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            package_path: dunce::canonicalize(package_path.as_ref())?,
            event: event.as_ref().into(),
            manifest: None,
            workspace_path: None,
            env: Vec::new(),
            stdin: None,
        })
    }

    /// Use an already-loaded manifest instead of re-reading `package.json`
    /// from the package directory at launch time.
    pub fn manifest(mut self, manifest: &Manifest) -> Self {
        self.manifest = Some(manifest.clone());
        self
    }

    /// If specified, `node_modules/.bin` directories above this path will not
    /// be added to the $PATH variable when running the script.
    pub fn workspace_path(mut self, path: impl AsRef<Path>) -> Self {
        self.workspace_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for the script.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Set the [`Stdio`] the script will read as its standard input.
    ///
    /// Defaults to [`Stdio::null`], which is what lifecycle scripts should
    /// get; interactive run-scripts may want [`Stdio::inherit`].
    pub fn stdin(mut self, stdin: impl Into<Stdio>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Spawn the script. This is the one launch pipeline; the other run
    /// methods are conveniences over the returned [`ScriptChild`].
    pub fn spawn(self) -> Result<ScriptChild> {
        let event = self.event.clone();
        let mut command = self.into_command()?;
        command
            .spawn()
            .map(|child| ScriptChild { event, child })
            .map_err(ScriptError::SpawnError)
    }

    /// Execute the script, collecting all of its output.
    pub fn output(self) -> Result<Output> {
        self.spawn()?.wait_with_output()
    }

    /// Spawn the script, feed each line of its output through `tracing`, and
    /// wait for it to exit.
    pub fn run_logged(self) -> Result<()> {
        let name = self
            .package_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.package_path.display().to_string());
        let event = self.event.clone();
        self.spawn()?.stream_output(|line, is_stderr| {
            let stream = if is_stderr { "stderr" } else { "stdout" };
            tracing::debug!("{event}::{name}::{stream}: {line}");
        })
    }

    /// Assemble the actual shell invocation: script line, working directory,
    /// lifecycle environment, and the bin-augmented `$PATH`.
    fn into_command(mut self) -> Result<Command> {
        let script = self.script_line()?;
        tracing::trace!(
            "Executing script for event '{}' for package at {}: {script}",
            self.event,
            self.package_path.display()
        );
        let mut command = shell_command(&script);
        command.current_dir(&self.package_path);
        command.env("PATH", self.scripted_path()?);
        command.env("npm_lifecycle_event", &self.event);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command.stdin(self.stdin.take().unwrap_or_else(Stdio::null));
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        Ok(command)
    }

    fn script_line(&self) -> Result<String> {
        let event = &self.event;
        let lookup = |manifest: &Manifest| {
            manifest
                .scripts
                .get(event)
                .cloned()
                .ok_or_else(|| ScriptError::MissingEvent(event.clone()))
        };
        match &self.manifest {
            Some(manifest) => lookup(manifest),
            None => lookup(&Manifest::from_path(
                self.package_path.join("package.json"),
            )?),
        }
    }

    /// Every `node_modules/.bin` between the package and the workspace root
    /// (or the filesystem root), ahead of the inherited `$PATH`.
    fn scripted_path(&self) -> Result<OsString> {
        let mut dirs = Vec::new();
        for ancestor in self.package_path.ancestors() {
            dirs.push(ancestor.join("node_modules").join(".bin"));
            if Some(ancestor) == self.workspace_path.as_deref() {
                break;
            }
        }
        if let Some(inherited) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&inherited));
        }
        Ok(std::env::join_paths(dirs)?)
    }
}

#[cfg(windows)]
fn shell_command(script: &str) -> Command {
    use std::os::windows::process::CommandExt;

    let shell = std::env::var_os("ComSpec").unwrap_or_else(|| OsString::from("cmd"));
    // cmd.exe needs its own quoting rules; anything else gets sh-style -c.
    let wants_cmd_quoting = Path::new(&shell)
        .file_stem()
        .map(|stem| stem.eq_ignore_ascii_case("cmd"))
        .unwrap_or(true);
    let mut command = Command::new(&shell);
    if wants_cmd_quoting {
        command.args(["/d", "/s", "/c"]);
    } else {
        command.arg("-c");
    }
    command.raw_arg(script);
    command
}

#[cfg(not(windows))]
fn shell_command(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c");
    command.arg(script);
    command
}

/// A lifecycle script in flight.
#[derive(Debug)]
pub struct ScriptChild {
    event: String,
    child: Child,
}

impl ScriptChild {
    /// Returns the OS-assigned process identifier associated with this child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Forces the script process to exit.
    pub fn kill(mut self) -> Result<()> {
        self.child.kill().map_err(ScriptError::ScriptProcessError)
    }

    /// Waits for the script to exit completely. A non-zero exit status is a
    /// [`ScriptError::ScriptFailure`].
    pub fn wait(mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .map_err(ScriptError::ScriptProcessError)?;
        if status.success() {
            Ok(())
        } else {
            Err(ScriptError::ScriptFailure {
                event: self.event,
                status,
            })
        }
    }

    /// Waits for the script to exit, collecting everything it wrote.
    pub fn wait_with_output(self) -> Result<Output> {
        let output = self
            .child
            .wait_with_output()
            .map_err(ScriptError::ScriptProcessError)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(ScriptError::ScriptFailure {
                event: self.event,
                status: output.status,
            })
        }
    }

    /// Drains stdout and stderr line by line into `on_line`, then waits for
    /// the script to exit. The second argument to `on_line` is true for
    /// stderr lines.
    pub fn stream_output(mut self, mut on_line: impl FnMut(&str, bool)) -> Result<()> {
        if let Some(stdout) = self.child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                on_line(&line?, false);
            }
        }
        if let Some(stderr) = self.child.stderr.take() {
            for line in BufReader::new(stderr).lines() {
                on_line(&line?, true);
            }
        }
        self.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir: &Path, scripts: &str) {
        std::fs::write(
            dir.join("package.json"),
            format!(r#"{{ "name": "fixture", "version": "1.0.0", "scripts": {scripts} }}"#),
        )
        .unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn runs_script_and_collects_output() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), r#"{ "postinstall": "echo ran-postinstall" }"#);
        let out = LifecycleScript::new(dir.path(), "postinstall")
            .unwrap()
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&out.stdout).contains("ran-postinstall"));
    }

    #[test]
    #[cfg(unix)]
    fn nonzero_exit_names_the_event() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), r#"{ "preinstall": "exit 3" }"#);
        let err = LifecycleScript::new(dir.path(), "preinstall")
            .unwrap()
            .output()
            .unwrap_err();
        match err {
            ScriptError::ScriptFailure { event, status } => {
                assert_eq!(event, "preinstall");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("expected a script failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_event_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), r#"{}"#);
        let err = LifecycleScript::new(dir.path(), "install")
            .unwrap()
            .output()
            .unwrap_err();
        assert!(matches!(err, ScriptError::MissingEvent(_)));
    }

    #[test]
    #[cfg(unix)]
    fn provided_manifest_wins_over_disk() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), r#"{}"#);
        let mut manifest = Manifest::default();
        manifest
            .scripts
            .insert("build".into(), "echo built".into());
        let out = LifecycleScript::new(dir.path(), "build")
            .unwrap()
            .manifest(&manifest)
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&out.stdout).contains("built"));
    }

    #[test]
    #[cfg(unix)]
    fn env_and_lifecycle_event_are_visible_to_the_script() {
        let dir = tempfile::tempdir().unwrap();
        fixture(
            dir.path(),
            r#"{ "test": "echo $npm_lifecycle_event:$EXTRA" }"#,
        );
        let out = LifecycleScript::new(dir.path(), "test")
            .unwrap()
            .env("EXTRA", "val")
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&out.stdout).contains("test:val"));
    }

    #[test]
    #[cfg(unix)]
    fn streams_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), r#"{ "build": "echo one && echo two" }"#);
        let child = LifecycleScript::new(dir.path(), "build")
            .unwrap()
            .spawn()
            .unwrap();
        let mut lines = Vec::new();
        child
            .stream_output(|line, _| lines.push(line.to_string()))
            .unwrap();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }
}
