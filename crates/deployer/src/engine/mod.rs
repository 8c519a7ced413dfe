//! Deployment reconciliation engine.
//!
//! [`Deployer`] compares the recorded state with the desired manifest and
//! drives the cloud and agent one step at a time. Each successful remote
//! call is persisted through the repos before the next call is made, so an
//! interrupted run can simply be repeated.
//!
//! The engine never retries. Retrying transient failures is left to the
//! client implementations.

mod apply;
mod delete;

use crate::error::{Error, RemoteContext, ResourceKind, Result};
use crate::stage::StageReporter;
use cpi::{AgentClientFactory, Cloud};
use deploystate::{CurrentRecordRepo, DiskRecord, Repos};
use std::sync::Arc;

pub struct Deployer {
    cloud: Arc<dyn Cloud>,
    agents: Arc<dyn AgentClientFactory>,
    repos: Repos,
    reporter: Arc<dyn StageReporter>,
}

impl Deployer {
    pub fn new(
        cloud: Arc<dyn Cloud>,
        agents: Arc<dyn AgentClientFactory>,
        repos: Repos,
        reporter: Arc<dyn StageReporter>,
    ) -> Self {
        Self {
            cloud,
            agents,
            repos,
            reporter,
        }
    }

    /// Run `step` as a named stage
    fn stage<T>(&self, name: &str, step: impl FnOnce() -> Result<T>) -> Result<T> {
        log::info!("{name}");
        self.reporter.stage_started(name);
        match step() {
            Ok(value) => {
                self.reporter.stage_finished(name);
                Ok(value)
            }
            Err(e) => {
                log::error!("{name} failed: {e}");
                self.reporter.stage_failed(name, &e.to_string());
                Err(e)
            }
        }
    }

    /// Report a failure that does not stop the run
    fn tolerate(&self, context: &str, err: &Error) {
        let message = format!("{context}: {err}");
        log::warn!("{message}");
        self.reporter.warn(&message);
    }

    /// Stop the agent on the current VM before it goes away
    fn stop_agent(&self, mbus: &str) {
        let client = self.agents.create(mbus);
        if let Err(e) = client.stop() {
            let err = Error::RemoteCall {
                resource: ResourceKind::Agent,
                operation: "stop",
                source: e,
            };
            self.tolerate("Continuing without stopping the agent", &err);
        }
    }

    fn detach_disk(&self, vm_cid: &str, disk: &DiskRecord) -> Result<()> {
        self.cloud
            .detach_disk(vm_cid, &disk.cid)
            .during(ResourceKind::Disk, "detach")?;
        self.repos.vms.disk_detached(&disk.id)?;
        Ok(())
    }

    /// Delete disks left behind by a resize or an interrupted run. One still
    /// attached to the current VM is detached first.
    fn delete_unused_disks(&self) -> Result<()> {
        let vm_cid = self.repos.vms.find_current()?;
        let links = self.repos.vms.links()?;
        for disk in self.repos.disks.unused()? {
            self.stage(&format!("Deleting unused disk '{}'", disk.cid), || {
                if let Some(vm_cid) = vm_cid.as_deref()
                    && links.has_disk(&disk.id)
                {
                    self.detach_disk(vm_cid, &disk)?;
                }
                self.cloud
                    .delete_disk(&disk.cid)
                    .during(ResourceKind::Disk, "delete")?;
                self.repos.disks.forget_unused(&disk.id)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Delete stemcells no VM runs on anymore
    fn delete_unused_stemcells(&self) -> Result<()> {
        let in_use = self.repos.vms.links()?.stemcell_id;
        for stemcell in self.repos.stemcells.unused()? {
            if in_use.as_deref() == Some(stemcell.id.as_str()) {
                log::debug!("Keeping stemcell '{}' until its VM is replaced", stemcell.cid);
                continue;
            }
            self.stage(&format!("Deleting unused stemcell '{}'", stemcell.cid), || {
                self.cloud
                    .delete_stemcell(&stemcell.cid)
                    .during(ResourceKind::Stemcell, "delete")?;
                self.repos.stemcells.forget_unused(&stemcell.id)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}
