//! # deployer
//!
//! Brings a single-node deployment up or tears it down.
//!
//! - [`Deployer`]: the reconciliation engine behind apply and delete.
//! - [`DeployCommand`] / [`DeleteCommand`]: full runs from user config to
//!   engine, with every collaborator injected through [`Dependencies`].
//! - [`TarballInstaller`]: turns a CPI release archive into a
//!   [`cpi::Cloud`].
//! - [`Manifest`] and [`UserConfig`]: what to deploy and where its state
//!   lives.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod stage;

pub use command::{DeleteCommand, DeployCommand, Dependencies};
pub use config::{STATE_FILE_NAME, UserConfig};
pub use engine::Deployer;
pub use error::{Error, ResourceKind, Result};
pub use installer::{CpiDeployment, Installer, ReleaseDescriptor, TarballInstaller};
pub use manifest::{CloudProvider, Manifest};
pub use stage::{NoReporter, RecordingReporter, StageEvent, StageReporter};
