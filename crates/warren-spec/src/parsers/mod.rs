use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::error::context;
use nom::sequence::preceded;
use nom::IResult;

use crate::error::SpecParseError;
use crate::PackageSpec;

pub(crate) mod git;
pub(crate) mod npm;
pub(crate) mod path;

/// package-spec := git-spec | url-spec | ( [ "file:" ] path ) | hosted-spec | npm-spec
pub(crate) fn package_spec(input: &str) -> IResult<&str, PackageSpec, SpecParseError<&str>> {
    context(
        "package spec",
        alt((
            git::git_spec,
            path::url_spec,
            preceded(tag_no_case("file:"), path::any_path_spec),
            path::bare_path_spec,
            git::hosted_spec,
            npm::npm_spec,
        )),
    )(input)
}
