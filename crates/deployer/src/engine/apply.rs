use super::Deployer;
use crate::error::{RemoteContext, ResourceKind, Result};
use crate::manifest::{Manifest, StemcellRef};
use cpi::{ApplySpec, DiskSpec, StemcellSpec, VmSpec, wait_until_ready};
use deploystate::{CurrentRecordRepo, DiskRecord, StemcellRecord, VmLinks};

impl Deployer {
    /// Bring the cloud and the agent in line with `manifest`.
    ///
    /// Steps run in order: stemcell, VM, disk, cleanup of unused disks and
    /// stemcells, agent state. A step whose recorded state already matches
    /// the manifest does nothing, so applying the same manifest twice makes
    /// no cloud changes the second time.
    ///
    /// Every decision is taken from the persisted state, never from what an
    /// earlier step of the same run did. A run that fails part way is
    /// finished by the next one.
    pub fn apply(&self, manifest: &Manifest) -> Result<()> {
        let desired_stemcell = manifest.validate_for_deploy()?;
        let state = self.repos.ensure_persisted()?;
        self.repos.vms.adopt()?;

        let stemcell = self.ensure_stemcell(desired_stemcell)?;
        let vm_cid = self.ensure_vm(manifest, &state.uuid, &stemcell)?;
        self.ensure_disk(manifest, &vm_cid)?;
        self.delete_unused_disks()?;
        self.delete_unused_stemcells()?;
        self.apply_agent_state(manifest)
    }

    /// Returns the stemcell the VM should run on. A replaced stemcell is
    /// left on the unused list.
    fn ensure_stemcell(&self, desired: &StemcellRef) -> Result<StemcellRecord> {
        let label = format!("Uploading stemcell '{}/{}'", desired.name, desired.version);

        if let Some(current) = self.repos.stemcells.find_current()?
            && current.matches(&desired.name, &desired.version)
        {
            self.reporter.stage_skipped(&label, "already uploaded");
            return Ok(current);
        }

        self.stage(&label, || {
            let spec = StemcellSpec {
                image_path: desired.image.clone(),
                cloud_properties: desired.cloud_properties.clone(),
            };
            let cid = self
                .cloud
                .create_stemcell(&spec)
                .during(ResourceKind::Stemcell, "create")?;
            let record = self
                .repos
                .stemcells
                .save(&desired.name, &desired.version, &cid)?;
            self.repos.stemcells.update_current(&record.id)?;
            Ok(record)
        })
    }

    /// Returns the cid of a VM running on `stemcell`
    fn ensure_vm(
        &self,
        manifest: &Manifest,
        agent_id: &str,
        stemcell: &StemcellRecord,
    ) -> Result<String> {
        let mbus = &manifest.cloud_provider.mbus;

        if let Some(cid) = self.repos.vms.find_current()? {
            let links = self.repos.vms.links()?;
            if links.stemcell_id.as_deref() == Some(stemcell.id.as_str()) {
                self.reporter.stage_skipped("Creating VM", "VM is up to date");
                return Ok(cid);
            }
            self.stage(&format!("Deleting VM '{cid}'"), || {
                self.stop_agent(mbus);
                self.cloud.delete_vm(&cid).during(ResourceKind::Vm, "delete")?;
                self.repos.vms.clear_current()?;
                Ok(())
            })?;
        }

        let cid = self.stage(&format!("Creating VM from stemcell '{}'", stemcell.cid), || {
            let spec = VmSpec {
                agent_id: agent_id.to_string(),
                stemcell_cid: stemcell.cid.clone(),
                cloud_properties: manifest.resource_pool.cloud_properties.clone(),
                networks: manifest.networks_value(),
                env: manifest.resource_pool.env.clone(),
            };
            let cid = self.cloud.create_vm(&spec).during(ResourceKind::Vm, "create")?;
            self.repos.vms.record_created(&cid, &stemcell.id)?;
            Ok(cid)
        })?;

        self.stage("Waiting for the agent", || {
            let provider = &manifest.cloud_provider;
            let client = self.agents.create(mbus);
            wait_until_ready(
                client.as_ref(),
                provider.agent_ping_attempts,
                provider.ping_interval(),
            )
            .during(ResourceKind::Agent, "reach")
        })?;

        Ok(cid)
    }

    fn ensure_disk(&self, manifest: &Manifest, vm_cid: &str) -> Result<()> {
        let current = self.repos.disks.find_current()?;
        let links = self.repos.vms.links()?;

        let Some(size) = manifest.desired_disk_size() else {
            if let Some(disk) = current {
                let message = format!(
                    "Manifest requests no persistent disk; keeping disk '{}' ({} MiB)",
                    disk.cid, disk.size
                );
                log::warn!("{message}");
                self.reporter.warn(&message);
                if !links.has_disk(&disk.id) {
                    self.attach_existing_disk(vm_cid, &disk)?;
                }
            }
            return Ok(());
        };

        let spec = DiskSpec {
            size_mib: size,
            cloud_properties: manifest.disk_cloud_properties.clone(),
        };

        let label = match &current {
            Some(disk) if disk.size == size => {
                if links.has_disk(&disk.id) {
                    self.reporter
                        .stage_skipped(&format!("Creating disk ({size} MiB)"), "disk is up to date");
                    return Ok(());
                }
                return self.attach_existing_disk(vm_cid, disk);
            }
            Some(old) => format!(
                "Resizing disk '{}' from {} MiB to {} MiB",
                old.cid, old.size, size
            ),
            None => format!("Creating disk ({size} MiB)"),
        };

        // The new disk is attached before the old one is let go; moving data
        // between them is the agent's job. The old disk ends up unused.
        self.stage(&label, || {
            let new = match self.attached_unused_disk(size, &links)? {
                Some(disk) => {
                    log::info!("Reusing attached disk '{}'", disk.cid);
                    disk
                }
                None => self.create_and_attach_disk(&spec, vm_cid)?,
            };
            if let Some(old) = current.as_ref().filter(|d| links.has_disk(&d.id)) {
                self.detach_disk(vm_cid, old)?;
            }
            self.repos.disks.update_current(&new.id)?;
            Ok(())
        })
    }

    /// An unused disk of `size` MiB still attached to the VM, left behind
    /// by a resize that failed after attaching it
    fn attached_unused_disk(&self, size: u64, links: &VmLinks) -> Result<Option<DiskRecord>> {
        Ok(self
            .repos
            .disks
            .unused()?
            .into_iter()
            .find(|d| d.size == size && links.has_disk(&d.id)))
    }

    /// Create a disk, record it as unused and attach it
    fn create_and_attach_disk(&self, spec: &DiskSpec, vm_cid: &str) -> Result<DiskRecord> {
        let cid = self
            .cloud
            .create_disk(spec, vm_cid)
            .during(ResourceKind::Disk, "create")?;
        let record = self.repos.disks.save(&cid, spec.size_mib)?;
        self.cloud
            .attach_disk(vm_cid, &cid)
            .during(ResourceKind::Disk, "attach")?;
        self.repos.vms.disk_attached(&record.id)?;
        Ok(record)
    }

    fn attach_existing_disk(&self, vm_cid: &str, disk: &DiskRecord) -> Result<()> {
        self.stage(&format!("Attaching disk '{}'", disk.cid), || {
            self.cloud
                .attach_disk(vm_cid, &disk.cid)
                .during(ResourceKind::Disk, "attach")?;
            self.repos.vms.disk_attached(&disk.id)?;
            Ok(())
        })
    }

    fn apply_agent_state(&self, manifest: &Manifest) -> Result<()> {
        self.stage("Applying deployment to the agent", || {
            let persistent_disk = self.repos.disks.find_current()?.map_or(0, |d| d.size);
            let spec = ApplySpec {
                deployment: manifest.name.clone(),
                networks: manifest.networks_value(),
                persistent_disk,
                properties: manifest.properties.clone(),
            };
            self.agents
                .create(&manifest.cloud_provider.mbus)
                .apply(&spec)
                .during(ResourceKind::Agent, "apply")
        })
    }
}
