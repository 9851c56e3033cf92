use nom::IResult;
use url::Url;

use crate::error::{SpecErrorKind, SpecParseError};
use crate::{GitHost, GitInfo, PackageSpec};

const GIT_PREFIXES: [&str; 5] = [
    "git://",
    "git+ssh://",
    "git+https://",
    "git+http://",
    "git+file://",
];

/// git := git-url [ "#" committish ]
pub(crate) fn git_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    if !GIT_PREFIXES.iter().any(|prefix| input.starts_with(prefix)) {
        return Err(nom::Err::Error(SpecParseError {
            input,
            context: Some("git"),
            kind: None,
        }));
    }
    let (url_part, committish) = split_committish(input);
    match Url::parse(url_part) {
        Ok(url) => Ok(("", PackageSpec::Git(GitInfo { url, committish }))),
        Err(e) => Err(nom::Err::Failure(SpecParseError {
            input,
            context: Some("git"),
            kind: Some(SpecErrorKind::UrlParseError(e)),
        })),
    }
}

/// hosted := [ host ":" ] owner "/" repo [ "#" committish ]
pub(crate) fn hosted_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    let (host, remainder) = match input.split_once(':') {
        Some((scheme, remainder))
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            match scheme.parse::<GitHost>() {
                Ok(host) => (host, remainder),
                Err(_) if remainder.contains('/') => {
                    return Err(nom::Err::Failure(SpecParseError {
                        input,
                        context: Some("hosted"),
                        kind: Some(SpecErrorKind::InvalidGitHost(scheme.into())),
                    }))
                }
                Err(_) => {
                    return Err(nom::Err::Error(SpecParseError {
                        input,
                        context: Some("hosted"),
                        kind: None,
                    }))
                }
            }
        }
        _ => (GitHost::GitHub, input),
    };
    let (repo_part, committish) = split_committish(remainder);
    let reject = |input| {
        Err(nom::Err::Error(SpecParseError {
            input,
            context: Some("hosted"),
            kind: None,
        }))
    };
    let Some((owner, repo)) = repo_part.split_once('/') else {
        return reject(input);
    };
    if !valid_segment(owner) || !valid_segment(repo) {
        return reject(input);
    }
    Ok((
        "",
        PackageSpec::Hosted {
            host,
            owner: owner.into(),
            repo: repo.into(),
            committish,
        },
    ))
}

fn split_committish(input: &str) -> (&str, Option<String>) {
    match input.split_once('#') {
        Some((head, committish)) => (head, Some(committish.to_string())),
        None => (input, None),
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}
