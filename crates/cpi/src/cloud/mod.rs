//! Cloud Provider Interface.
//!
//! [`Cloud`] is the seam between the deployment engine and the IaaS. The
//! engine only ever sees `Arc<dyn Cloud>`; production wraps an
//! [`ExternalCpi`] in a [`DeadlineCloud`], tests use `fakes::FakeCloud`.

mod deadline;
mod external;

pub use deadline::DeadlineCloud;
pub use external::{CpiContext, ExternalCpi};

use crate::error::Result;
use crate::types::{DiskSpec, StemcellSpec, VmSpec};

/// Operations a cloud backend provides for one deployment.
///
/// Each call is a blocking remote request. Cloud ids (`cid`) are opaque
/// strings handed back by the backend.
pub trait Cloud: Send + Sync {
    /// Upload an OS image and return its cloud id
    fn create_stemcell(&self, spec: &StemcellSpec) -> Result<String>;

    fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()>;

    /// Boot a VM from a stemcell and return its cloud id
    fn create_vm(&self, spec: &VmSpec) -> Result<String>;

    fn delete_vm(&self, vm_cid: &str) -> Result<()>;

    /// Create a persistent disk near `vm_cid` and return its cloud id
    fn create_disk(&self, spec: &DiskSpec, vm_cid: &str) -> Result<String>;

    fn delete_disk(&self, disk_cid: &str) -> Result<()>;

    fn attach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()>;

    fn detach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()>;
}
