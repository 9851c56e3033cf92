use std::path::PathBuf;

use pretty_assertions::assert_eq;
use warren_spec::{GitHost, PackageSpec, SpecKind, VersionSpec};

fn parse(input: &str) -> PackageSpec {
    input
        .parse()
        .unwrap_or_else(|e| panic!("`{input}` should parse: {e}"))
}

#[test]
fn bare_name() {
    assert_eq!(
        parse("foo"),
        PackageSpec::Npm {
            scope: None,
            name: "foo".into(),
            requested: None,
        }
    );
    assert_eq!(parse("foo").kind(), SpecKind::Range);
}

#[test]
fn name_with_exact_version() {
    let spec = parse("foo@1.2.3");
    assert_eq!(
        spec,
        PackageSpec::Npm {
            scope: None,
            name: "foo".into(),
            requested: Some(VersionSpec::Version("1.2.3".parse().unwrap())),
        }
    );
    assert_eq!(spec.kind(), SpecKind::Version);
}

#[test]
fn name_with_range() {
    let spec = parse("foo@^1.2.3");
    match &spec {
        PackageSpec::Npm {
            requested: Some(VersionSpec::Range(range)),
            ..
        } => assert!(range.satisfies(&"1.9.0".parse().unwrap())),
        other => panic!("expected range spec, got {other:?}"),
    }
    assert_eq!(spec.kind(), SpecKind::Range);
}

#[test]
fn name_with_tag() {
    let spec = parse("foo@beta");
    assert_eq!(
        spec,
        PackageSpec::Npm {
            scope: None,
            name: "foo".into(),
            requested: Some(VersionSpec::Tag("beta".into())),
        }
    );
    assert_eq!(spec.kind(), SpecKind::Tag);
}

#[test]
fn scoped_name_with_range() {
    assert_eq!(
        parse("@scope/foo@~2.0.0"),
        PackageSpec::Npm {
            scope: Some("scope".into()),
            name: "@scope/foo".into(),
            requested: Some(VersionSpec::Range("~2.0.0".parse().unwrap())),
        }
    );
}

#[test]
fn relative_directory() {
    let spec = parse("./packages/foo");
    assert_eq!(
        spec,
        PackageSpec::Dir {
            path: PathBuf::from("./packages/foo"),
        }
    );
    assert_eq!(spec.kind(), SpecKind::Local);
}

#[test]
fn file_prefixed_directory() {
    assert_eq!(
        parse("file:packages/foo"),
        PackageSpec::Dir {
            path: PathBuf::from("packages/foo"),
        }
    );
}

#[test]
fn local_tarball() {
    let spec = parse("./vendor/foo-1.2.3.tgz");
    assert_eq!(
        spec,
        PackageSpec::Tarball {
            path: PathBuf::from("./vendor/foo-1.2.3.tgz"),
        }
    );
    assert_eq!(spec.kind(), SpecKind::Local);
}

#[test]
fn aliased_path_spec_resolves_to_the_path() {
    // Manifest entries like `"foo": "file:../foo"` arrive as `foo@file:../foo`.
    assert_eq!(
        parse("foo@file:../foo"),
        PackageSpec::Dir {
            path: PathBuf::from("../foo"),
        }
    );
    assert_eq!(
        parse("foo@../foo-1.0.0.tgz"),
        PackageSpec::Tarball {
            path: PathBuf::from("../foo-1.0.0.tgz"),
        }
    );
}

#[test]
fn remote_tarball() {
    let spec = parse("https://example.com/-/foo-1.2.3.tgz");
    assert_eq!(spec.kind(), SpecKind::Remote);
    match spec {
        PackageSpec::Remote { url } => {
            assert_eq!(url.as_str(), "https://example.com/-/foo-1.2.3.tgz")
        }
        other => panic!("expected remote spec, got {other:?}"),
    }
}

#[test]
fn git_url_with_committish() {
    let spec = parse("git+https://github.com/foo/bar.git#semver:1.2");
    assert_eq!(spec.kind(), SpecKind::Git);
    match spec {
        PackageSpec::Git(info) => {
            assert_eq!(info.url.scheme(), "git+https");
            assert_eq!(info.committish.as_deref(), Some("semver:1.2"));
        }
        other => panic!("expected git spec, got {other:?}"),
    }
}

#[test]
fn bare_owner_repo_shorthand() {
    assert_eq!(
        parse("foo/bar"),
        PackageSpec::Hosted {
            host: GitHost::GitHub,
            owner: "foo".into(),
            repo: "bar".into(),
            committish: None,
        }
    );
    assert_eq!(parse("foo/bar").kind(), SpecKind::Hosted);
}

#[test]
fn prefixed_shorthand_with_committish() {
    assert_eq!(
        parse("gitlab:foo/bar#v2"),
        PackageSpec::Hosted {
            host: GitHost::GitLab,
            owner: "foo".into(),
            repo: "bar".into(),
            committish: Some("v2".into()),
        }
    );
}

#[test]
fn unknown_git_host_is_rejected() {
    assert!("sourcehut:foo/bar".parse::<PackageSpec>().is_err());
}

#[test]
fn display_round_trips_npm_specs() {
    for input in ["foo", "foo@1.2.3", "@scope/foo@beta"] {
        assert_eq!(parse(input).to_string(), input);
    }
}

#[test]
fn garbage_is_rejected() {
    assert!("foo bar".parse::<PackageSpec>().is_err());
    assert!("".parse::<PackageSpec>().is_err());
}
