use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::{opt, rest};
use nom::error::context;
use nom::sequence::{preceded, terminated};
use nom::IResult;
use node_semver::{Range, Version};

use crate::error::{SpecErrorKind, SpecParseError};
use crate::{PackageSpec, VersionSpec};

/// npm := [ "@" scope "/" ] name [ "@" version-spec ]
pub(crate) fn npm_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    context("npm package", npm_spec_inner)(input)
}

fn npm_spec_inner(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    let (input, scope) = opt(preceded(char('@'), terminated(name_segment, char('/'))))(input)?;
    let (input, name) = name_segment(input)?;
    // `name@file:...`, `name@git+...`, and `name@https://...` alias a
    // non-registry spec under a declared name; the spec itself wins.
    if let Some(remainder) = input.strip_prefix('@') {
        if let Some(path) = remainder
            .strip_prefix("file:")
            .or_else(|| looks_like_path(remainder).then_some(remainder))
        {
            return crate::parsers::path::any_path_spec(path);
        }
        if remainder.starts_with("git:") || remainder.starts_with("git+") {
            return crate::parsers::git::git_spec(remainder);
        }
        if remainder.starts_with("http://") || remainder.starts_with("https://") {
            return crate::parsers::path::url_spec(remainder);
        }
    }
    let (input, requested) = opt(preceded(char('@'), version_spec))(input)?;
    if !input.is_empty() {
        return Err(nom::Err::Failure(SpecParseError {
            input,
            context: None,
            kind: Some(SpecErrorKind::InvalidCharacters(input.into())),
        }));
    }
    let (scope, name) = match scope {
        Some(scope) => (Some(scope.to_string()), format!("@{scope}/{name}")),
        None => (None, name.to_string()),
    };
    Ok((
        input,
        PackageSpec::Npm {
            scope,
            name,
            requested,
        },
    ))
}

fn name_segment(input: &str) -> IResult<&str, &str, SpecParseError<&str>> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')(input)
}

fn looks_like_path(input: &str) -> bool {
    input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('/')
        || input.starts_with("~/")
}

/// version-spec := version | range | tag
fn version_spec(input: &str) -> IResult<&str, VersionSpec, SpecParseError<&str>> {
    let (remainder, raw) = rest(input)?;
    if raw.is_empty() {
        return Err(nom::Err::Error(SpecParseError {
            input,
            context: Some("version"),
            kind: None,
        }));
    }
    if let Ok(version) = Version::parse(raw) {
        return Ok((remainder, VersionSpec::Version(version)));
    }
    if let Ok(range) = Range::parse(raw) {
        return Ok((remainder, VersionSpec::Range(range)));
    }
    // Anything left is a dist-tag, as long as it's separator-free.
    if raw.chars().any(|c| c == '/' || c.is_whitespace()) {
        return Err(nom::Err::Failure(SpecParseError {
            input,
            context: Some("version"),
            kind: Some(SpecErrorKind::InvalidCharacters(raw.into())),
        }));
    }
    Ok((remainder, VersionSpec::Tag(raw.into())))
}
