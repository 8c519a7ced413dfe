//! Typed views over the deployment state, one per resource kind.
//!
//! Repos hold no cached copy. Every call loads the document, changes one
//! thing and saves it again, so external edits are seen on the next call
//! and each engine step is durable the moment the call returns.
//!
//! Saving a disk or stemcell record and marking it current are separate
//! steps. The engine relies on that to create a replacement before it lets
//! go of the old resource.

use crate::error::{Error, Result};
use crate::ids::UuidGenerator;
use crate::repository::StateRepository;
use crate::types::{DeploymentState, DiskRecord, StemcellRecord};
use std::sync::Arc;

/// Shared capability of the three singleton resource repos
pub trait CurrentRecordRepo {
    type Record;

    /// The record currently in use, if any
    fn find_current(&self) -> Result<Option<Self::Record>>;

    /// Mark the record with the given id (or the VM cid) as current
    fn update_current(&self, id: &str) -> Result<()>;

    /// Forget which record is current. Records themselves are kept.
    fn clear_current(&self) -> Result<()>;
}

fn update_state<T>(
    store: &dyn StateRepository,
    change: impl FnOnce(&mut DeploymentState) -> Result<T>,
) -> Result<T> {
    let mut state = store.load()?;
    let out = change(&mut state)?;
    store.save(&state)?;
    Ok(out)
}

/// Make `id` current in a record slot. The previous current record, if
/// any, joins the unused list; `id` leaves it.
fn promote(current: &mut Option<String>, unused: &mut Vec<String>, id: &str) {
    unused.retain(|u| u != id);
    if let Some(previous) = current.replace(id.to_string())
        && previous != id
        && !unused.contains(&previous)
    {
        unused.push(previous);
    }
}

// ============================================================================
// VM
// ============================================================================

/// What the current VM was built from and has attached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmLinks {
    pub stemcell_id: Option<String>,
    pub disk_ids: Vec<String>,
}

impl VmLinks {
    pub fn has_disk(&self, id: &str) -> bool {
        self.disk_ids.iter().any(|d| d == id)
    }
}

/// The deployment's single VM, tracked by its cloud id
#[derive(Clone)]
pub struct VmRepo {
    store: Arc<dyn StateRepository>,
}

impl VmRepo {
    pub fn new(store: Arc<dyn StateRepository>) -> Self {
        Self { store }
    }

    /// Record a VM just created from `stemcell_id`, with nothing attached
    pub fn record_created(&self, cid: &str, stemcell_id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.current_vm_cid = Some(cid.to_string());
            state.current_vm_stemcell_id = Some(stemcell_id.to_string());
            state.current_vm_disk_ids.clear();
            Ok(())
        })
    }

    pub fn links(&self) -> Result<VmLinks> {
        let state = self.store.load()?;
        Ok(VmLinks {
            stemcell_id: state.current_vm_stemcell_id,
            disk_ids: state.current_vm_disk_ids,
        })
    }

    /// Fill in links for a VM recorded without them, assuming it runs on
    /// the current stemcell with the current disk attached
    pub fn adopt(&self) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            if state.current_vm_cid.is_some() && state.current_vm_stemcell_id.is_none() {
                state.current_vm_stemcell_id = state.current_stemcell_id.clone();
                state.current_vm_disk_ids = state.current_disk_id.iter().cloned().collect();
            }
            Ok(())
        })
    }

    pub fn disk_attached(&self, disk_id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            if !state.current_vm_disk_ids.iter().any(|d| d == disk_id) {
                state.current_vm_disk_ids.push(disk_id.to_string());
            }
            Ok(())
        })
    }

    pub fn disk_detached(&self, disk_id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.current_vm_disk_ids.retain(|d| d != disk_id);
            Ok(())
        })
    }
}

impl CurrentRecordRepo for VmRepo {
    type Record = String;

    fn find_current(&self) -> Result<Option<String>> {
        Ok(self.store.load()?.current_vm_cid)
    }

    /// Record a VM whose stemcell and disk are unknown
    fn update_current(&self, cid: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.current_vm_cid = Some(cid.to_string());
            state.current_vm_stemcell_id = None;
            state.current_vm_disk_ids.clear();
            Ok(())
        })
    }

    fn clear_current(&self) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.current_vm_cid = None;
            state.current_vm_stemcell_id = None;
            state.current_vm_disk_ids.clear();
            Ok(())
        })
    }
}

// ============================================================================
// Disk
// ============================================================================

#[derive(Clone)]
pub struct DiskRepo {
    store: Arc<dyn StateRepository>,
    uuids: Arc<dyn UuidGenerator>,
}

impl DiskRepo {
    pub fn new(store: Arc<dyn StateRepository>, uuids: Arc<dyn UuidGenerator>) -> Self {
        Self { store, uuids }
    }

    /// Record a newly created disk as unused. It stays unused until it is
    /// made current, so an interrupted swap can still be cleaned up.
    pub fn save(&self, cid: &str, size: u64) -> Result<DiskRecord> {
        let record = DiskRecord {
            id: self.uuids.generate(),
            cid: cid.to_string(),
            size,
        };
        update_state(self.store.as_ref(), |state| {
            state.disks.push(record.clone());
            state.unused_disk_ids.push(record.id.clone());
            Ok(())
        })?;
        Ok(record)
    }

    pub fn all(&self) -> Result<Vec<DiskRecord>> {
        Ok(self.store.load()?.disks)
    }

    /// Disks that exist in the cloud but are not in use
    pub fn unused(&self) -> Result<Vec<DiskRecord>> {
        let state = self.store.load()?;
        Ok(state
            .unused_disk_ids
            .iter()
            .filter_map(|id| state.find_disk(id).cloned())
            .collect())
    }

    /// Drop a deleted disk from the unused list. The record is kept.
    pub fn forget_unused(&self, id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.unused_disk_ids.retain(|u| u != id);
            Ok(())
        })
    }
}

impl CurrentRecordRepo for DiskRepo {
    type Record = DiskRecord;

    fn find_current(&self) -> Result<Option<DiskRecord>> {
        let state = self.store.load()?;
        let Some(id) = state.current_disk_id.as_deref() else {
            return Ok(None);
        };
        let record = state.find_disk(id).cloned();
        if record.is_none() {
            log::warn!("Current disk record '{id}' is missing from deployment state");
        }
        Ok(record)
    }

    /// Make `id` current; the disk it replaces becomes unused
    fn update_current(&self, id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            if state.find_disk(id).is_none() {
                return Err(Error::RecordNotFound {
                    kind: "disk",
                    id: id.to_string(),
                });
            }
            promote(&mut state.current_disk_id, &mut state.unused_disk_ids, id);
            Ok(())
        })
    }

    fn clear_current(&self) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.current_disk_id = None;
            Ok(())
        })
    }
}

// ============================================================================
// Stemcell
// ============================================================================

#[derive(Clone)]
pub struct StemcellRepo {
    store: Arc<dyn StateRepository>,
    uuids: Arc<dyn UuidGenerator>,
}

impl StemcellRepo {
    pub fn new(store: Arc<dyn StateRepository>, uuids: Arc<dyn UuidGenerator>) -> Self {
        Self { store, uuids }
    }

    /// Record a newly uploaded stemcell as unused
    pub fn save(&self, name: &str, version: &str, cid: &str) -> Result<StemcellRecord> {
        let record = StemcellRecord {
            id: self.uuids.generate(),
            name: name.to_string(),
            version: version.to_string(),
            cid: cid.to_string(),
        };
        update_state(self.store.as_ref(), |state| {
            state.stemcells.push(record.clone());
            state.unused_stemcell_ids.push(record.id.clone());
            Ok(())
        })?;
        Ok(record)
    }

    pub fn all(&self) -> Result<Vec<StemcellRecord>> {
        Ok(self.store.load()?.stemcells)
    }

    /// Stemcells that exist in the cloud but are not in use
    pub fn unused(&self) -> Result<Vec<StemcellRecord>> {
        let state = self.store.load()?;
        Ok(state
            .unused_stemcell_ids
            .iter()
            .filter_map(|id| state.find_stemcell(id).cloned())
            .collect())
    }

    pub fn forget_unused(&self, id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.unused_stemcell_ids.retain(|u| u != id);
            Ok(())
        })
    }
}

impl CurrentRecordRepo for StemcellRepo {
    type Record = StemcellRecord;

    fn find_current(&self) -> Result<Option<StemcellRecord>> {
        let state = self.store.load()?;
        let Some(id) = state.current_stemcell_id.as_deref() else {
            return Ok(None);
        };
        let record = state.find_stemcell(id).cloned();
        if record.is_none() {
            log::warn!("Current stemcell record '{id}' is missing from deployment state");
        }
        Ok(record)
    }

    /// Make `id` current; the stemcell it replaces becomes unused
    fn update_current(&self, id: &str) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            if state.find_stemcell(id).is_none() {
                return Err(Error::RecordNotFound {
                    kind: "stemcell",
                    id: id.to_string(),
                });
            }
            promote(
                &mut state.current_stemcell_id,
                &mut state.unused_stemcell_ids,
                id,
            );
            Ok(())
        })
    }

    fn clear_current(&self) -> Result<()> {
        update_state(self.store.as_ref(), |state| {
            state.current_stemcell_id = None;
            Ok(())
        })
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// All three repos over one state document
#[derive(Clone)]
pub struct Repos {
    pub vms: VmRepo,
    pub disks: DiskRepo,
    pub stemcells: StemcellRepo,
    store: Arc<dyn StateRepository>,
}

impl Repos {
    pub fn new(store: Arc<dyn StateRepository>, uuids: Arc<dyn UuidGenerator>) -> Self {
        Self {
            vms: VmRepo::new(Arc::clone(&store)),
            disks: DiskRepo::new(Arc::clone(&store), Arc::clone(&uuids)),
            stemcells: StemcellRepo::new(Arc::clone(&store), uuids),
            store,
        }
    }

    /// Whether a VM, disk or stemcell is recorded as current
    pub fn has_current_resources(&self) -> Result<bool> {
        Ok(self.store.load()?.has_current_resources())
    }

    /// Load the whole document, for display
    pub fn state(&self) -> Result<DeploymentState> {
        self.store.load()
    }

    /// Persist the document as-is. Used once per run so a freshly
    /// generated deployment uuid is fixed before any remote call.
    pub fn ensure_persisted(&self) -> Result<DeploymentState> {
        update_state(self.store.as_ref(), |state| Ok(state.clone()))
    }
}
