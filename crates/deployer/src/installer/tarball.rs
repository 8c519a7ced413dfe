//! Installer for gzipped CPI release tarballs.
//!
//! Releases are unpacked once into `<releases_dir>/<blake3 of archive>` and
//! reused on later runs.

use super::{CpiDeployment, Installer, ReleaseDescriptor};
use crate::error::{Error, Result};
use cpi::{Cloud, CpiContext, DeadlineCloud, ExternalCpi};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use walkdir::WalkDir;

const RELEASE_MANIFEST: &str = "release.MF";
const CPI_EXECUTABLE: &str = "cpi";

#[derive(Deserialize)]
struct ReleaseManifest {
    name: String,
    #[serde(deserialize_with = "scalar_string")]
    version: String,
    #[serde(default)]
    jobs: Vec<ReleaseJob>,
}

#[derive(Deserialize)]
struct ReleaseJob {
    name: String,
}

/// Versions are written both as `1` and `'1'`
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a version string, got {other:?}"
        ))),
    }
}

pub struct TarballInstaller {
    releases_dir: PathBuf,
}

impl TarballInstaller {
    pub fn new(releases_dir: impl Into<PathBuf>) -> Self {
        Self {
            releases_dir: releases_dir.into(),
        }
    }

    fn archive_digest(archive: &Path) -> Result<String> {
        let mut file = File::open(archive)
            .map_err(|e| Error::Install(format!("cannot open {}: {e}", archive.display())))?;
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut file, &mut hasher)
            .map_err(|e| Error::Install(format!("cannot read {}: {e}", archive.display())))?;
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn unpack(archive: &Path, target: &Path) -> Result<()> {
        let staging = target.with_extension("partial");
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| {
                Error::Install(format!("cannot clean {}: {e}", staging.display()))
            })?;
        }
        fs::create_dir_all(&staging)
            .map_err(|e| Error::Install(format!("cannot create {}: {e}", staging.display())))?;

        let file = File::open(archive)
            .map_err(|e| Error::Install(format!("cannot open {}: {e}", archive.display())))?;
        Archive::new(GzDecoder::new(file))
            .unpack(&staging)
            .map_err(|e| Error::Install(format!("cannot extract {}: {e}", archive.display())))?;

        fs::rename(&staging, target)
            .map_err(|e| Error::Install(format!("cannot move release into place: {e}")))
    }

    fn read_release_manifest(dir: &Path) -> Result<ReleaseDescriptor> {
        let path = dir.join(RELEASE_MANIFEST);
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Install(format!("release has no {RELEASE_MANIFEST}: {e}")))?;
        let manifest: ReleaseManifest = serde_yaml::from_str(&content)
            .map_err(|e| Error::Install(format!("invalid {RELEASE_MANIFEST}: {e}")))?;

        Ok(ReleaseDescriptor {
            name: manifest.name,
            version: manifest.version,
            jobs: manifest.jobs.into_iter().map(|job| job.name).collect(),
            extracted_dir: dir.to_path_buf(),
        })
    }

    /// `bin/cpi` if present, else the first file named `cpi`
    fn find_cpi_executable(dir: &Path) -> Option<PathBuf> {
        let conventional = dir.join("bin").join(CPI_EXECUTABLE);
        if conventional.is_file() {
            return Some(conventional);
        }
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .find(|entry| entry.file_type().is_file() && entry.file_name() == CPI_EXECUTABLE)
            .map(walkdir::DirEntry::into_path)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl Installer for TarballInstaller {
    fn extract(&self, archive: &Path) -> Result<ReleaseDescriptor> {
        if !archive.is_file() {
            return Err(Error::config(format!(
                "CPI release '{}' does not exist",
                archive.display()
            )));
        }

        let digest = Self::archive_digest(archive)?;
        let target = self.releases_dir.join(&digest);

        if target.join(RELEASE_MANIFEST).is_file() {
            log::debug!("Release already extracted at {}", target.display());
        } else {
            log::info!("Extracting {} to {}", archive.display(), target.display());
            Self::unpack(archive, &target)?;
        }

        let release = Self::read_release_manifest(&target)?;
        log::debug!(
            "Release {}/{} with jobs {:?}",
            release.name,
            release.version,
            release.jobs
        );
        Ok(release)
    }

    fn install(
        &self,
        release: &ReleaseDescriptor,
        deployment: &CpiDeployment,
    ) -> Result<Arc<dyn Cloud>> {
        let executable = Self::find_cpi_executable(&release.extracted_dir).ok_or_else(|| {
            Error::Install(format!(
                "release {}/{} contains no '{CPI_EXECUTABLE}' executable",
                release.name, release.version
            ))
        })?;
        make_executable(&executable).map_err(|e| {
            Error::Install(format!("cannot make {} executable: {e}", executable.display()))
        })?;

        log::info!(
            "Installed CPI {}/{} for deployment '{}'",
            release.name,
            release.version,
            deployment.name
        );

        let context = CpiContext {
            director_uuid: deployment.director_uuid.clone(),
            properties: deployment.cloud_provider.properties.clone(),
        };
        let external = ExternalCpi::new(executable, context);
        Ok(Arc::new(DeadlineCloud::new(
            Arc::new(external),
            deployment.cloud_provider.cpi_timeout(),
        )))
    }
}
