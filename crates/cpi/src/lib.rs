//! # cpi
//!
//! Remote collaborators of a single-node deployment.
//!
//! - [`Cloud`]: the Cloud Provider Interface (stemcells, VMs, disks).
//!   [`ExternalCpi`] drives an installed CPI executable, [`DeadlineCloud`]
//!   puts a deadline on every call.
//! - [`AgentClient`] / [`AgentClientFactory`]: the agent on the deployed VM,
//!   reached over HTTP by [`HttpAgentClient`].
//! - `fakes`: recording in-memory implementations for tests, behind the
//!   `fakes` feature.

pub mod agent;
pub mod cloud;
pub mod error;
#[cfg(any(test, feature = "fakes"))]
pub mod fakes;
pub mod retry;
pub mod types;

pub use agent::{
    AgentClient, AgentClientFactory, HttpAgentClient, HttpAgentClientFactory, wait_until_ready,
};
pub use cloud::{Cloud, CpiContext, DeadlineCloud, ExternalCpi};
pub use error::{Error, ErrorCategory, Result};
pub use retry::{RetryConfig, with_retry};
pub use types::{ApplySpec, DiskSpec, StemcellSpec, VmSpec};
