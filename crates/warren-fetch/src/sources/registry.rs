use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;
use warren_common::{Manifest, Packument};
use warren_spec::PackageSpec;

use crate::error::{FetchError, IoContext, Result};
use crate::package::Package;
use crate::resolver::PackageResolution;
use crate::sources::PackageSource;

/// An npm-registry-protocol source: packuments come from
/// `GET {registry}/{name}`, tarballs from the URL the packument advertises.
/// Packuments are memoized for the lifetime of the source, which also makes
/// repeated resolutions of equivalent specs within one run idempotent.
#[derive(Debug)]
pub struct RegistrySource {
    client: reqwest::Client,
    registry: Url,
    packuments: DashMap<String, Arc<Packument>>,
}

impl RegistrySource {
    pub fn new(registry: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            packuments: DashMap::new(),
        }
    }

    fn packument_url(&self, name: &str) -> Result<Url> {
        // Scoped names keep their `@` but escape the separating slash.
        Ok(self.registry.join(&name.replace('/', "%2F"))?)
    }

    async fn fetch_packument(&self, name: &str) -> Result<Arc<Packument>> {
        if let Some(packument) = self.packuments.get(name) {
            return Ok(packument.value().clone());
        }
        let url = self.packument_url(name)?;
        tracing::trace!("Fetching packument for {name} from {url}.");
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::PackageNotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(FetchError::RegistryStatus(
                name.to_string(),
                response.status().as_u16(),
            ));
        }
        let packument = Arc::new(response.json::<Packument>().await?);
        self.packuments
            .insert(name.to_string(), packument.clone());
        Ok(packument)
    }
}

#[async_trait]
impl PackageSource for RegistrySource {
    async fn name(&self, spec: &PackageSpec, _base_dir: &Path) -> Result<String> {
        match spec {
            PackageSpec::Npm { name, .. } => Ok(name.clone()),
            _ => Err(FetchError::InvalidPackageSpec(spec.clone())),
        }
    }

    async fn packument(&self, spec: &PackageSpec, base_dir: &Path) -> Result<Arc<Packument>> {
        let name = self.name(spec, base_dir).await?;
        self.fetch_packument(&name).await
    }

    async fn manifest(&self, pkg: &Package) -> Result<Manifest> {
        let PackageResolution::Npm { name, version, .. } = pkg.resolved() else {
            return Err(FetchError::InvalidPackageSpec(pkg.from().clone()));
        };
        let packument = self.fetch_packument(name).await?;
        packument
            .versions
            .get(version)
            .map(|metadata| metadata.manifest.clone())
            .ok_or_else(|| FetchError::MissingVersion(name.clone(), version.clone()))
    }

    async fn tarball(&self, pkg: &Package, dest: &Path) -> Result<()> {
        let PackageResolution::Npm { name, tarball, .. } = pkg.resolved() else {
            return Err(FetchError::InvalidPackageSpec(pkg.from().clone()));
        };
        let Some(tarball) = tarball else {
            return Err(FetchError::NoTarball(name.clone()));
        };
        tracing::trace!("Downloading tarball for {name} from {tarball}.");
        let response = self.client.get(tarball.clone()).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::RegistryStatus(
                tarball.to_string(),
                response.status().as_u16(),
            ));
        }
        let bytes = response.bytes().await?;
        async_std::fs::write(dest, &bytes)
            .await
            .io_context(|| format!("Failed to write tarball to {}.", dest.display()))?;
        Ok(())
    }
}
