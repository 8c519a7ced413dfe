//! Per-call deadline for any [`Cloud`].

use super::Cloud;
use crate::error::{Error, Result};
use crate::types::{DiskSpec, StemcellSpec, VmSpec};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs every call of the wrapped cloud on a worker thread and gives up
/// after `timeout`.
///
/// A timed-out worker is abandoned, not killed. Its result is dropped when
/// it eventually arrives.
#[derive(Clone)]
pub struct DeadlineCloud {
    inner: Arc<dyn Cloud>,
    timeout: Duration,
}

impl DeadlineCloud {
    pub fn new(inner: Arc<dyn Cloud>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn run<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Cloud) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name(format!("cpi-{operation}"))
            .spawn(move || {
                // receiver may be gone after a timeout
                let _ = tx.send(call(inner.as_ref()));
            })
            .map_err(|e| Error::Other(format!("failed to start {operation}: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("{operation} exceeded {}s deadline", self.timeout.as_secs());
                Err(Error::timeout(operation, self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::Other(format!("{operation} worker exited without a result")))
            }
        }
    }
}

impl Cloud for DeadlineCloud {
    fn create_stemcell(&self, spec: &StemcellSpec) -> Result<String> {
        let spec = spec.clone();
        self.run("create_stemcell", move |c| c.create_stemcell(&spec))
    }

    fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()> {
        let cid = stemcell_cid.to_string();
        self.run("delete_stemcell", move |c| c.delete_stemcell(&cid))
    }

    fn create_vm(&self, spec: &VmSpec) -> Result<String> {
        let spec = spec.clone();
        self.run("create_vm", move |c| c.create_vm(&spec))
    }

    fn delete_vm(&self, vm_cid: &str) -> Result<()> {
        let cid = vm_cid.to_string();
        self.run("delete_vm", move |c| c.delete_vm(&cid))
    }

    fn create_disk(&self, spec: &DiskSpec, vm_cid: &str) -> Result<String> {
        let spec = spec.clone();
        let vm = vm_cid.to_string();
        self.run("create_disk", move |c| c.create_disk(&spec, &vm))
    }

    fn delete_disk(&self, disk_cid: &str) -> Result<()> {
        let cid = disk_cid.to_string();
        self.run("delete_disk", move |c| c.delete_disk(&cid))
    }

    fn attach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()> {
        let (vm, disk) = (vm_cid.to_string(), disk_cid.to_string());
        self.run("attach_disk", move |c| c.attach_disk(&vm, &disk))
    }

    fn detach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()> {
        let (vm, disk) = (vm_cid.to_string(), disk_cid.to_string());
        self.run("detach_disk", move |c| c.detach_disk(&vm, &disk))
    }
}
