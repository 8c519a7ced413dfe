//! Recording fakes for the cloud and the agent.
//!
//! All fakes created from the same [`CallLog`] append to one shared
//! sequence, so tests can assert ordering across the cloud and the agent.
//!
//! ```
//! use cpi::fakes::{Call, CallLog, FakeCloud};
//! use cpi::Cloud;
//!
//! let log = CallLog::new();
//! let cloud = FakeCloud::new(log.clone());
//! cloud.delete_vm("vm-1").unwrap();
//! cloud.delete_disk("disk-1").unwrap();
//!
//! assert!(log.happened_in_order(&[
//!     Call::DeleteVm("vm-1".into()),
//!     Call::DeleteDisk("disk-1".into()),
//! ]));
//! ```

use crate::agent::{AgentClient, AgentClientFactory};
use crate::cloud::Cloud;
use crate::error::{Error, Result};
use crate::types::{ApplySpec, DiskSpec, StemcellSpec, VmSpec};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateAgentClient(String),
    Ping,
    Stop,
    Apply(String),
    CreateStemcell(String),
    DeleteStemcell(String),
    CreateVm(String),
    DeleteVm(String),
    CreateDisk(u64),
    DeleteDisk(String),
    AttachDisk { vm_cid: String, disk_cid: String },
    DetachDisk { vm_cid: String, disk_cid: String },
}

impl Call {
    /// Whether this call creates or destroys a cloud resource
    #[must_use]
    pub fn is_cloud_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateStemcell(_)
                | Call::DeleteStemcell(_)
                | Call::CreateVm(_)
                | Call::DeleteVm(_)
                | Call::CreateDisk(_)
                | Call::DeleteDisk(_)
        )
    }
}

/// Shared, ordered record of calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn record(&self, call: Call) {
        self.lock().push(call);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn contains(&self, call: &Call) -> bool {
        self.lock().contains(call)
    }

    /// Number of create/delete calls against the cloud
    #[must_use]
    pub fn cloud_mutations(&self) -> usize {
        self.lock().iter().filter(|c| c.is_cloud_mutation()).count()
    }

    /// Whether `expected` occurs as a subsequence of the log, in order.
    /// Other calls may be interleaved.
    #[must_use]
    pub fn happened_in_order(&self, expected: &[Call]) -> bool {
        let calls = self.lock();
        let mut remaining = calls.iter();
        expected
            .iter()
            .all(|want| remaining.any(|got| got == want))
    }
}

type Failures = Arc<Mutex<HashMap<String, String>>>;

fn injected_failure(failures: &Failures, method: &str) -> Option<String> {
    failures
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(method)
        .cloned()
}

fn set_failure(failures: &Failures, method: &str, message: &str) {
    failures
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .insert(method.to_string(), message.to_string());
}

// ============================================================================
// Cloud
// ============================================================================

/// In-memory [`Cloud`] handing out sequential cids (`vm-cid-1`, ...)
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    log: CallLog,
    counter: Arc<AtomicU32>,
    failures: Failures,
}

impl FakeCloud {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Make every call to `method` fail with `message` (the call is still recorded)
    pub fn fail_on(&self, method: &str, message: &str) {
        set_failure(&self.failures, method, message);
    }

    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn check(&self, method: &str) -> Result<()> {
        match injected_failure(&self.failures, method) {
            Some(message) => Err(Error::Cloud {
                method: method.to_string(),
                kind: "Bosh::Clouds::CloudError".to_string(),
                message,
                ok_to_retry: false,
            }),
            None => Ok(()),
        }
    }

    fn next_cid(&self, kind: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{kind}-cid-{n}")
    }
}

impl Cloud for FakeCloud {
    fn create_stemcell(&self, spec: &StemcellSpec) -> Result<String> {
        self.log
            .record(Call::CreateStemcell(spec.image_path.display().to_string()));
        self.check("create_stemcell")?;
        Ok(self.next_cid("stemcell"))
    }

    fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()> {
        self.log.record(Call::DeleteStemcell(stemcell_cid.to_string()));
        self.check("delete_stemcell")
    }

    fn create_vm(&self, spec: &VmSpec) -> Result<String> {
        self.log.record(Call::CreateVm(spec.stemcell_cid.clone()));
        self.check("create_vm")?;
        Ok(self.next_cid("vm"))
    }

    fn delete_vm(&self, vm_cid: &str) -> Result<()> {
        self.log.record(Call::DeleteVm(vm_cid.to_string()));
        self.check("delete_vm")
    }

    fn create_disk(&self, spec: &DiskSpec, _vm_cid: &str) -> Result<String> {
        self.log.record(Call::CreateDisk(spec.size_mib));
        self.check("create_disk")?;
        Ok(self.next_cid("disk"))
    }

    fn delete_disk(&self, disk_cid: &str) -> Result<()> {
        self.log.record(Call::DeleteDisk(disk_cid.to_string()));
        self.check("delete_disk")
    }

    fn attach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()> {
        self.log.record(Call::AttachDisk {
            vm_cid: vm_cid.to_string(),
            disk_cid: disk_cid.to_string(),
        });
        self.check("attach_disk")
    }

    fn detach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()> {
        self.log.record(Call::DetachDisk {
            vm_cid: vm_cid.to_string(),
            disk_cid: disk_cid.to_string(),
        });
        self.check("detach_disk")
    }
}

// ============================================================================
// Agent
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakeAgentClient {
    log: CallLog,
    failures: Failures,
}

impl FakeAgentClient {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
        }
    }

    /// Make every call to `method` (`ping`, `stop`, `apply`) fail
    pub fn fail_on(&self, method: &str, message: &str) {
        set_failure(&self.failures, method, message);
    }

    fn check(&self, method: &str) -> Result<()> {
        match injected_failure(&self.failures, method) {
            Some(message) => Err(Error::Agent {
                method: method.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}

impl AgentClient for FakeAgentClient {
    fn ping(&self) -> Result<String> {
        self.log.record(Call::Ping);
        self.check("ping")?;
        Ok("pong".to_string())
    }

    fn stop(&self) -> Result<()> {
        self.log.record(Call::Stop);
        self.check("stop")
    }

    fn apply(&self, spec: &ApplySpec) -> Result<()> {
        self.log.record(Call::Apply(spec.deployment.clone()));
        self.check("apply")
    }
}

/// Hands out clones of one [`FakeAgentClient`], recording each endpoint
#[derive(Debug, Clone, Default)]
pub struct FakeAgentClientFactory {
    client: FakeAgentClient,
}

impl FakeAgentClientFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            client: FakeAgentClient::new(log),
        }
    }

    /// The client every `create` call returns, for failure injection
    pub fn client(&self) -> &FakeAgentClient {
        &self.client
    }
}

impl AgentClientFactory for FakeAgentClientFactory {
    fn create(&self, endpoint: &str) -> Box<dyn AgentClient> {
        self.client
            .log
            .record(Call::CreateAgentClient(endpoint.to_string()));
        Box::new(self.client.clone())
    }
}
