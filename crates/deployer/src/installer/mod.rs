//! CPI release installation.
//!
//! The engine cannot run until a [`Cloud`] exists, and the cloud comes from
//! a CPI release archive: [`Installer::extract`] unpacks it,
//! [`Installer::install`] turns it into a ready client.

mod tarball;

pub use tarball::TarballInstaller;

use crate::error::Result;
use crate::manifest::CloudProvider;
use cpi::Cloud;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An unpacked CPI release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub name: String,
    pub version: String,
    pub jobs: Vec<String>,
    pub extracted_dir: PathBuf,
}

/// What the installed CPI is for
#[derive(Debug, Clone, PartialEq)]
pub struct CpiDeployment {
    pub name: String,
    /// Deployment uuid, sent to the CPI as `director_uuid`
    pub director_uuid: String,
    pub cloud_provider: CloudProvider,
}

pub trait Installer: Send + Sync {
    fn extract(&self, archive: &Path) -> Result<ReleaseDescriptor>;

    fn install(
        &self,
        release: &ReleaseDescriptor,
        deployment: &CpiDeployment,
    ) -> Result<Arc<dyn Cloud>>;
}
