use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder, Header};
use warren_common::Manifest;

use crate::error::{FetchError, IoContext, Result};

/// Pack a package directory into a gzipped tarball at `dest`, under the
/// conventional `package/` top-level component.
pub(crate) fn pack_dir(dir: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::create(dest)
        .io_context(|| format!("Failed to create tarball at {}.", dest.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    builder
        .append_dir_all("package", dir)
        .io_context(|| format!("Failed to pack directory {} into a tarball.", dir.display()))?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .io_context(|| format!("Failed to finish tarball at {}.", dest.display()))?;
    Ok(())
}

/// Pack a list of in-memory `(path, contents)` entries into a gzipped
/// tarball at `dest`.
pub(crate) fn pack_entries(entries: &[(String, Vec<u8>)], dest: &Path) -> Result<()> {
    let file = std::fs::File::create(dest)
        .io_context(|| format!("Failed to create tarball at {}.", dest.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    for (path, data) in entries {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("package/{path}"), &data[..])
            .io_context(|| format!("Failed to append `{path}` to tarball."))?;
    }
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .io_context(|| format!("Failed to finish tarball at {}.", dest.display()))?;
    Ok(())
}

/// Read the manifest out of a package tarball without unpacking the rest.
pub(crate) fn manifest_from_tgz(tarball: &Path) -> Result<Manifest> {
    let file = std::fs::File::open(tarball)
        .io_context(|| format!("Failed to open tarball at {}.", tarball.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    for entry in archive
        .entries()
        .map_err(|e| FetchError::ExtractIoError(e, "listing entries".into(), None))?
    {
        let mut entry =
            entry.map_err(|e| FetchError::ExtractIoError(e, "reading entry".into(), None))?;
        let path = entry
            .path()
            .map_err(|e| FetchError::ExtractIoError(e, "reading entry path".into(), None))?
            .into_owned();
        if strip_package_prefix(&path).as_deref() == Some(Path::new("package.json")) {
            let mut raw = String::new();
            entry.read_to_string(&mut raw).map_err(|e| {
                FetchError::ExtractIoError(e, "reading package.json".into(), Some(path))
            })?;
            return Ok(serde_json::from_str(&raw)?);
        }
    }
    Err(FetchError::NoManifestInTarball(tarball.to_path_buf()))
}

/// Unpack a gzipped package tarball into `dest`, stripping the leading
/// `package/` component from every entry.
pub(crate) fn extract_tgz(tarball: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .io_context(|| format!("Failed to create directory at {}.", dest.display()))?;
    let file = std::fs::File::open(tarball)
        .io_context(|| format!("Failed to open tarball at {}.", tarball.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    for entry in archive
        .entries()
        .map_err(|e| FetchError::ExtractIoError(e, "listing entries".into(), None))?
    {
        let mut entry =
            entry.map_err(|e| FetchError::ExtractIoError(e, "reading entry".into(), None))?;
        let path = entry
            .path()
            .map_err(|e| FetchError::ExtractIoError(e, "reading entry path".into(), None))?
            .into_owned();
        let Some(subpath) = strip_package_prefix(&path) else {
            continue;
        };
        let target = dest.join(&subpath);
        // Entries that escape the destination directory are discarded.
        if !target.starts_with(dest) {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("Failed to create directory at {}.", parent.display()))?;
        }
        entry.unpack(&target).map_err(|e| {
            FetchError::ExtractIoError(e, "unpacking entry".into(), Some(subpath))
        })?;
    }
    Ok(())
}

fn strip_package_prefix(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;
    let stripped: PathBuf = components
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_extract_round_trip() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("package.json"), r#"{"name":"a"}"#).unwrap();
        std::fs::create_dir(src.path().join("lib")).unwrap();
        std::fs::write(src.path().join("lib/index.js"), "module.exports = 1;").unwrap();

        let work = tempfile::tempdir().unwrap();
        let tarball = work.path().join("a.tgz");
        pack_dir(src.path(), &tarball).unwrap();

        let manifest = manifest_from_tgz(&tarball).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("a"));

        let out = work.path().join("unpacked");
        extract_tgz(&tarball, &out).unwrap();
        assert!(out.join("package.json").exists());
        assert_eq!(
            std::fs::read_to_string(out.join("lib/index.js")).unwrap(),
            "module.exports = 1;"
        );
    }

    #[test]
    fn packed_entries_land_under_package_prefix() {
        let work = tempfile::tempdir().unwrap();
        let tarball = work.path().join("b.tgz");
        pack_entries(
            &[
                ("package.json".into(), br#"{"name":"b"}"#.to_vec()),
                ("index.js".into(), b"exports.b = true;".to_vec()),
            ],
            &tarball,
        )
        .unwrap();
        let out = work.path().join("unpacked");
        extract_tgz(&tarball, &out).unwrap();
        assert!(out.join("index.js").exists());
        assert_eq!(
            manifest_from_tgz(&tarball).unwrap().name.as_deref(),
            Some("b")
        );
    }
}
