//! Package specifier parser. This is the stuff that takes something like
//! `foo@^1.2.3` or `github:foo/bar` and turns it into something meaningful.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use node_semver::{Range, Version};
use nom::combinator::all_consuming;
use nom::Err;
use url::Url;

pub use crate::error::{PackageSpecError, SpecErrorKind};
pub use crate::gitinfo::{GitHost, GitInfo};
use crate::parsers::package_spec;

mod error;
mod gitinfo;
mod parsers;

/// The version portion of an npm-style specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    Tag(String),
    Version(Version),
    Range(Range),
}

/// A parsed package specifier, before any resolution has happened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageSpec {
    /// A registry dependency: `foo`, `foo@^1.2.3`, `@scope/foo@latest`.
    Npm {
        scope: Option<String>,
        name: String,
        requested: Option<VersionSpec>,
    },
    /// A local folder: `./foo`, `file:packages/foo`.
    Dir { path: PathBuf },
    /// A local tarball file: `./foo-1.2.3.tgz`.
    Tarball { path: PathBuf },
    /// A tarball living at an http(s) URL.
    Remote { url: Url },
    /// A full git URL: `git+https://...`, `git://...`.
    Git(GitInfo),
    /// An `owner/repo` shorthand, optionally prefixed with a known host.
    Hosted {
        host: GitHost,
        owner: String,
        repo: String,
        committish: Option<String>,
    },
}

/// The coarse kind of a [`PackageSpec`], used for diagnostics and for
/// selecting which package source can handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecKind {
    Version,
    Range,
    Tag,
    Local,
    Remote,
    Git,
    Hosted,
}

impl PackageSpec {
    pub fn kind(&self) -> SpecKind {
        use PackageSpec::*;
        match self {
            Npm {
                requested: Some(VersionSpec::Version(_)),
                ..
            } => SpecKind::Version,
            Npm {
                requested: Some(VersionSpec::Tag(_)),
                ..
            } => SpecKind::Tag,
            Npm { .. } => SpecKind::Range,
            Dir { .. } | Tarball { .. } => SpecKind::Local,
            Remote { .. } => SpecKind::Remote,
            Git(..) => SpecKind::Git,
            Hosted { .. } => SpecKind::Hosted,
        }
    }

    pub fn is_npm(&self) -> bool {
        matches!(self, PackageSpec::Npm { .. })
    }

    /// The declared package name, for specifier kinds that carry one.
    pub fn name(&self) -> Option<&str> {
        match self {
            PackageSpec::Npm { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The requested descriptor, as a plain string. Specs without an
    /// explicit version component request `*`.
    pub fn requested(&self) -> String {
        use PackageSpec::*;
        match self {
            Dir { path } | Tarball { path } => format!("{}", path.display()),
            Remote { url } => url.to_string(),
            Git(info) => format!("{info}"),
            Hosted {
                host,
                owner,
                repo,
                committish,
            } => match committish {
                Some(c) => format!("{host}:{owner}/{repo}#{c}"),
                None => format!("{host}:{owner}/{repo}"),
            },
            Npm { requested, .. } => requested
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "*".to_string()),
        }
    }
}

impl FromStr for PackageSpec {
    type Err = PackageSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_package_spec(s)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PackageSpec::*;
        match self {
            Dir { path } | Tarball { path } => write!(f, "{}", path.display()),
            Remote { url } => write!(f, "{url}"),
            Git(info) => write!(f, "{info}"),
            Hosted {
                host,
                owner,
                repo,
                committish,
            } => {
                write!(f, "{host}:{owner}/{repo}")?;
                if let Some(committish) = committish {
                    write!(f, "#{committish}")?;
                }
                Ok(())
            }
            Npm {
                name, requested, ..
            } => {
                write!(f, "{name}")?;
                if let Some(requested) = requested {
                    write!(f, "@{requested}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VersionSpec::*;
        match self {
            Tag(tag) => write!(f, "{tag}"),
            Version(v) => write!(f, "{v}"),
            Range(range) => write!(f, "{range}"),
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SpecKind::*;
        write!(
            f,
            "{}",
            match self {
                Version => "version",
                Range => "range",
                Tag => "tag",
                Local => "local",
                Remote => "remote",
                Git => "git",
                Hosted => "hosted",
            }
        )
    }
}

fn parse_package_spec<I>(input: I) -> Result<PackageSpec, PackageSpecError>
where
    I: AsRef<str>,
{
    let input = input.as_ref();
    match all_consuming(package_spec)(input) {
        Ok((_, spec)) => Ok(spec),
        Err(err) => Err(match err {
            Err::Error(e) | Err::Failure(e) => PackageSpecError {
                input: input.into(),
                span: (input.len() - e.input.len(), 0).into(),
                kind: if let Some(kind) = e.kind {
                    kind
                } else if let Some(ctx) = e.context {
                    SpecErrorKind::Context(ctx)
                } else {
                    SpecErrorKind::Other
                },
            },
            Err::Incomplete(_) => PackageSpecError {
                input: input.into(),
                span: (input.len().saturating_sub(1), 0).into(),
                kind: SpecErrorKind::IncompleteInput,
            },
        }),
    }
}
