use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use node_semver::{Range as SemVerRange, Version as SemVerVersion};
use warren_common::Packument;
use warren_spec::{GitInfo, PackageSpec, VersionSpec};

use crate::error::{FetchError, Result};
use crate::package::Package;
use crate::sources::PackageSource;

/// Represents a fully-resolved, specific version of a package as it would be
/// fetched.
#[derive(Clone, PartialEq, Eq)]
pub enum PackageResolution {
    Npm {
        name: String,
        version: SemVerVersion,
        tarball: Option<url::Url>,
    },
    Dir {
        name: String,
        version: Option<SemVerVersion>,
        path: PathBuf,
    },
    Tarball {
        name: String,
        version: Option<SemVerVersion>,
        path: PathBuf,
    },
    Git {
        name: String,
        info: GitInfo,
    },
}

impl Display for PackageResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use PackageResolution::*;
        match self {
            Npm { name, version, .. } => write!(f, "{name}@{version}"),
            Dir { path, .. } | Tarball { path, .. } => {
                write!(f, "file:{}", path.to_string_lossy())
            }
            Git { info, .. } => write!(f, "{info}"),
        }
    }
}

impl std::fmt::Debug for PackageResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use PackageResolution::*;
        match self {
            Npm {
                name,
                version,
                tarball,
            } => match tarball {
                Some(tarball) => write!(f, "{name}@{version} ({tarball})"),
                None => write!(f, "{name}@{version}"),
            },
            Dir { name, path, .. } | Tarball { name, path, .. } => {
                write!(f, "{name}@{}", path.to_string_lossy())
            }
            Git { name, info } => write!(f, "{name}@{info}"),
        }
    }
}

impl PackageResolution {
    pub fn name(&self) -> &str {
        use PackageResolution::*;
        match self {
            Npm { name, .. } | Dir { name, .. } | Tarball { name, .. } | Git { name, .. } => name,
        }
    }

    pub fn npm_version(&self) -> Option<&SemVerVersion> {
        match self {
            Self::Npm { version, .. } => Some(version),
            _ => None,
        }
    }

    /// The concrete version of the resolved package, when one is known.
    pub fn version(&self) -> Option<&SemVerVersion> {
        use PackageResolution::*;
        match self {
            Npm { version, .. } => Some(version),
            Dir { version, .. } | Tarball { version, .. } => version.as_ref(),
            Git { .. } => None,
        }
    }

    /// Stable identity string used to compare an on-disk placement against an
    /// ideal one. Two placements with equal idents need no reinstall.
    pub fn ident(&self) -> String {
        use PackageResolution::*;
        match self {
            Npm { version, .. } => version.to_string(),
            Dir {
                version: Some(version),
                ..
            }
            | Tarball {
                version: Some(version),
                ..
            } => version.to_string(),
            Dir { path, .. } | Tarball { path, .. } => format!("file:{}", path.to_string_lossy()),
            Git { info, .. } => format!("{info}"),
        }
    }

    /// Whether this resolution satisfies the given request.
    pub fn satisfies(&self, spec: &PackageSpec) -> Result<bool> {
        use PackageResolution as PR;
        use PackageSpec as PS;
        Ok(match (self, spec) {
            (PR::Npm { version, .. }, PS::Npm { requested, .. }) => match requested {
                Some(VersionSpec::Version(v)) => version == v,
                Some(VersionSpec::Range(range)) => range.satisfies(version),
                // Tags are resolved down to versions before we ever compare.
                Some(VersionSpec::Tag(_)) => false,
                None => false,
            },
            (PR::Dir { path: pr_path, .. }, PS::Dir { path: ps_path }) => {
                pr_path == &ps_path.canonicalize()?
            }
            (PR::Tarball { path: pr_path, .. }, PS::Tarball { path: ps_path }) => {
                pr_path == &ps_path.canonicalize()?
            }
            (PR::Git { .. }, PS::Git(..)) => false,
            _ => false,
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PackageResolver {
    pub(crate) default_tag: String,
    pub(crate) base_dir: PathBuf,
}

impl PackageResolver {
    pub(crate) async fn resolve(
        &self,
        name: String,
        wanted: PackageSpec,
        source: Arc<dyn PackageSource>,
    ) -> Result<Package> {
        let packument = source.packument(&wanted, &self.base_dir).await?;
        let resolved = self.get_resolution(&name, &wanted, &packument)?;
        Ok(Package {
            name,
            from: wanted,
            resolved,
            source,
            base_dir: self.base_dir.clone(),
        })
    }

    fn get_resolution(
        &self,
        name: &str,
        wanted: &PackageSpec,
        packument: &Arc<Packument>,
    ) -> Result<PackageResolution> {
        use PackageSpec::*;

        if let Dir { ref path } = wanted {
            return Ok(PackageResolution::Dir {
                name: name.into(),
                version: packument_version(packument),
                path: dunce::canonicalize(self.base_dir.join(path))?,
            });
        }

        if let Tarball { ref path } = wanted {
            return Ok(PackageResolution::Tarball {
                name: name.into(),
                version: packument_version(packument),
                path: dunce::canonicalize(self.base_dir.join(path))?,
            });
        }

        if let Git(info) = wanted {
            return Ok(PackageResolution::Git {
                name: name.into(),
                info: info.clone(),
            });
        }

        if packument.versions.is_empty() {
            return Err(FetchError::NoVersion {
                name: name.into(),
                spec: wanted.clone(),
                versions: Vec::new(),
            });
        }

        let mut target: Option<&SemVerVersion> = match wanted {
            Npm {
                requested: Some(VersionSpec::Version(ref version)),
                ..
            } => Some(version),
            Npm {
                requested: Some(VersionSpec::Tag(tag)),
                ..
            } => packument.tags.get(tag.as_str()),
            Npm {
                requested: Some(VersionSpec::Range(_)),
                ..
            }
            | Npm {
                requested: None, ..
            } => None,
            _ => return Err(FetchError::InvalidPackageSpec(wanted.clone())),
        };

        // An unconstrained or satisfied request prefers whatever the default
        // dist-tag points at.
        let tag_version = packument.tags.get(&self.default_tag);
        if target.is_none()
            && tag_version
                .map(|v| packument.versions.contains_key(v))
                .unwrap_or(false)
            && match wanted {
                Npm {
                    requested: None, ..
                } => true,
                Npm {
                    requested: Some(VersionSpec::Range(range)),
                    ..
                } => range.satisfies(tag_version.expect("checked above")),
                _ => false,
            }
        {
            target = tag_version;
        }

        if target.is_none() {
            if let Npm {
                requested: Some(VersionSpec::Range(ref range)),
                ..
            } = wanted
            {
                target = max_satisfying(packument.versions.keys(), range);
            }
        }

        let Some(metadata) = target.and_then(|v| packument.versions.get(v)) else {
            return Err(FetchError::NoVersion {
                name: name.into(),
                spec: wanted.clone(),
                versions: packument.versions.keys().map(|k| k.to_string()).collect(),
            });
        };
        let version = metadata
            .manifest
            .version
            .clone()
            .or_else(|| target.cloned())
            .expect("target version is always set at this point");
        Ok(PackageResolution::Npm {
            name: name.into(),
            version,
            tarball: metadata.dist.tarball.clone(),
        })
    }
}

fn packument_version(packument: &Packument) -> Option<SemVerVersion> {
    packument
        .tags
        .get("latest")
        .cloned()
        .or_else(|| packument.versions.keys().next_back().cloned())
}

fn max_satisfying<'a>(
    versions: impl Iterator<Item = &'a SemVerVersion>,
    range: &SemVerRange,
) -> Option<&'a SemVerVersion> {
    versions.filter(|v| range.satisfies(v)).max()
}
