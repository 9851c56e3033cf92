use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{PackageSpecError, SpecErrorKind};

/// Hosts supported by the `owner/repo` shorthand syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitHost {
    GitHub,
    GitLab,
    Bitbucket,
}

impl GitHost {
    pub fn base_url(&self) -> &'static str {
        match self {
            GitHost::GitHub => "https://github.com",
            GitHost::GitLab => "https://gitlab.com",
            GitHost::Bitbucket => "https://bitbucket.org",
        }
    }
}

impl fmt::Display for GitHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                GitHost::GitHub => "github",
                GitHost::GitLab => "gitlab",
                GitHost::Bitbucket => "bitbucket",
            }
        )
    }
}

impl FromStr for GitHost {
    type Err = PackageSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(GitHost::GitHub),
            "gitlab" => Ok(GitHost::GitLab),
            "bitbucket" => Ok(GitHost::Bitbucket),
            _ => Err(PackageSpecError {
                input: s.into(),
                span: (0, 0).into(),
                kind: SpecErrorKind::InvalidGitHost(s.into()),
            }),
        }
    }
}

/// A full git URL plus the committish to check out, if one was given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitInfo {
    pub url: Url,
    pub committish: Option<String>,
}

impl fmt::Display for GitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)?;
        if let Some(committish) = &self.committish {
            write!(f, "#{committish}")?;
        }
        Ok(())
    }
}
