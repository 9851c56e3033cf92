use std::path::PathBuf;

use nom::combinator::{map, rest, verify};
use nom::error::context;
use nom::IResult;
use url::Url;

use crate::error::{SpecErrorKind, SpecParseError};
use crate::PackageSpec;

/// path := any non-empty remainder; tarball-looking paths classify as such
pub(crate) fn any_path_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    context(
        "path",
        map(verify(rest, |s: &str| !s.is_empty()), classify_path),
    )(input)
}

/// Bare paths have to actually look like paths, so plain package names
/// don't get swallowed: `./`, `../`, `/`, or `~/` prefixes only.
pub(crate) fn bare_path_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    if looks_like_path(input) {
        any_path_spec(input)
    } else {
        Err(nom::Err::Error(SpecParseError {
            input,
            context: Some("path"),
            kind: None,
        }))
    }
}

fn looks_like_path(input: &str) -> bool {
    input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('/')
        || input.starts_with("~/")
}

fn classify_path(path: &str) -> PackageSpec {
    let is_tarball =
        path.ends_with(".tgz") || path.ends_with(".tar.gz") || path.ends_with(".tar");
    let path = PathBuf::from(path);
    if is_tarball {
        PackageSpec::Tarball { path }
    } else {
        PackageSpec::Dir { path }
    }
}

/// url := "http(s)://" ...; a remote tarball
pub(crate) fn url_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return Err(nom::Err::Error(SpecParseError {
            input,
            context: Some("url"),
            kind: None,
        }));
    }
    match Url::parse(input) {
        Ok(url) => Ok(("", PackageSpec::Remote { url })),
        Err(e) => Err(nom::Err::Failure(SpecParseError {
            input,
            context: Some("url"),
            kind: Some(SpecErrorKind::UrlParseError(e)),
        })),
    }
}
