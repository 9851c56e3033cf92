use miette::{Diagnostic, SourceSpan};
use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("Error parsing package spec `{input}`. {kind}")]
#[diagnostic(code(warren_spec::no_parse))]
pub struct PackageSpecError {
    #[source_code]
    pub input: String,
    #[label("parse failed here")]
    pub span: SourceSpan,
    pub kind: SpecErrorKind,
}

#[derive(Debug, Error)]
pub enum SpecErrorKind {
    #[error("Found invalid characters: `{0}`")]
    InvalidCharacters(String),
    #[error("Invalid git host `{0}`. Only github:, gitlab:, and bitbucket: are supported in shorthands.")]
    InvalidGitHost(String),
    #[error(transparent)]
    SemverParseError(node_semver::SemverError),
    #[error(transparent)]
    UrlParseError(url::ParseError),
    #[error("Failed to parse {0} component of package spec.")]
    Context(&'static str),
    #[error("Incomplete input to package spec parser.")]
    IncompleteInput,
    #[error("An unspecified error occurred.")]
    Other,
}

#[derive(Debug)]
pub(crate) struct SpecParseError<I> {
    pub(crate) input: I,
    pub(crate) context: Option<&'static str>,
    pub(crate) kind: Option<SpecErrorKind>,
}

impl<I> ParseError<I> for SpecParseError<I> {
    fn from_error_kind(input: I, _kind: ErrorKind) -> Self {
        Self {
            input,
            context: None,
            kind: None,
        }
    }

    fn append(_input: I, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I> ContextError<I> for SpecParseError<I> {
    fn add_context(_input: I, ctx: &'static str, mut other: Self) -> Self {
        other.context = Some(ctx);
        other
    }
}

// A few parsers return semver/url errors through map_res, so these bridges
// are load-bearing even though they look redundant.
impl<'a> FromExternalError<&'a str, SpecParseError<&'a str>> for SpecParseError<&'a str> {
    fn from_external_error(_input: &'a str, _kind: ErrorKind, e: SpecParseError<&'a str>) -> Self {
        e
    }
}

impl<'a> FromExternalError<&'a str, node_semver::SemverError> for SpecParseError<&'a str> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: node_semver::SemverError) -> Self {
        SpecParseError {
            input,
            context: None,
            kind: Some(SpecErrorKind::SemverParseError(e)),
        }
    }
}

impl<'a> FromExternalError<&'a str, url::ParseError> for SpecParseError<&'a str> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: url::ParseError) -> Self {
        SpecParseError {
            input,
            context: None,
            kind: Some(SpecErrorKind::UrlParseError(e)),
        }
    }
}
