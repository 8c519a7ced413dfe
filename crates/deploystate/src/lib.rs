//! # deploystate
//!
//! Durable record of the resources a single-node deployment currently owns:
//! one VM, at most one current persistent disk, at most one current
//! stemcell.
//!
//! ## Layers
//!
//! - [`StateRepository`]: loads and saves the whole [`DeploymentState`]
//!   document. [`FileStateRepository`] replaces the file atomically.
//! - [`VmRepo`], [`DiskRepo`], [`StemcellRepo`]: one typed view per
//!   resource kind, sharing the [`CurrentRecordRepo`] capability.
//!   Disks and stemcells that exist in the cloud but are not current stay
//!   on an unused list until they are deleted.
//!
//! ```no_run
//! use deploystate::{CurrentRecordRepo, FileStateRepository, RandomUuidGenerator, Repos};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileStateRepository::new(
//!     "deployment-state.json",
//!     Arc::new(RandomUuidGenerator),
//! ));
//! let repos = Repos::new(store, Arc::new(RandomUuidGenerator));
//!
//! if let Some(vm_cid) = repos.vms.find_current().unwrap() {
//!     println!("current VM: {vm_cid}");
//! }
//! ```

pub mod error;
pub mod ids;
pub mod repos;
pub mod repository;
pub mod types;

pub use error::{Error, Result};
pub use ids::{RandomUuidGenerator, UuidGenerator};
pub use repos::{CurrentRecordRepo, DiskRepo, Repos, StemcellRepo, VmLinks, VmRepo};
pub use repository::{FileStateRepository, MemoryStateRepository, StateRepository};
pub use types::{DeploymentState, DiskRecord, StemcellRecord};
