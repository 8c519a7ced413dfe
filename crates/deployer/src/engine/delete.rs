use super::Deployer;
use crate::error::{Error, RemoteContext, ResourceKind, Result};
use deploystate::CurrentRecordRepo;

impl Deployer {
    /// Tear down every current resource: VM, then disk, then stemcell.
    /// Unused disks and stemcells left by an earlier apply go with their
    /// kind.
    ///
    /// The agent behind `mbus` is asked to stop first; if it cannot be
    /// reached the VM is deleted anyway. A failing cloud call stops the run.
    /// Steps completed before it stay recorded as done, so calling `delete`
    /// again only attempts what is left.
    pub fn delete(&self, mbus: &str) -> Result<()> {
        let state = self.repos.state()?;
        if !state.owns_resources() {
            return Err(Error::NothingToDelete);
        }

        if let Some(vm_cid) = self.repos.vms.find_current()? {
            self.stage(&format!("Deleting VM '{vm_cid}'"), || {
                self.stop_agent(mbus);
                self.cloud.delete_vm(&vm_cid).during(ResourceKind::Vm, "delete")?;
                self.repos.vms.clear_current()?;
                Ok(())
            })?;
        }

        match self.repos.disks.find_current()? {
            Some(disk) => self.stage(&format!("Deleting disk '{}'", disk.cid), || {
                self.cloud
                    .delete_disk(&disk.cid)
                    .during(ResourceKind::Disk, "delete")?;
                self.repos.disks.clear_current()?;
                Ok(())
            })?,
            None if state.current_disk_id.is_some() => {
                log::warn!("Clearing dangling current disk marker");
                self.repos.disks.clear_current()?;
            }
            None => {}
        }
        self.delete_unused_disks()?;

        match self.repos.stemcells.find_current()? {
            Some(stemcell) => self.stage(&format!("Deleting stemcell '{}'", stemcell.cid), || {
                self.cloud
                    .delete_stemcell(&stemcell.cid)
                    .during(ResourceKind::Stemcell, "delete")?;
                self.repos.stemcells.clear_current()?;
                Ok(())
            })?,
            None if state.current_stemcell_id.is_some() => {
                log::warn!("Clearing dangling current stemcell marker");
                self.repos.stemcells.clear_current()?;
            }
            None => {}
        }
        self.delete_unused_stemcells()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::Deployer;
    use crate::error::{Error, ResourceKind};
    use crate::stage::{RecordingReporter, StageEvent};
    use cpi::fakes::{Call, CallLog, FakeAgentClientFactory, FakeCloud};
    use deploystate::{
        CurrentRecordRepo, DeploymentState, DiskRecord, MemoryStateRepository, Repos,
        StemcellRecord, UuidGenerator,
    };
    use std::sync::Arc;

    const MBUS: &str = "http://fake-mbus-url";

    struct FixedUuid;

    impl UuidGenerator for FixedUuid {
        fn generate(&self) -> String {
            "fixed-uuid".to_string()
        }
    }

    struct Harness {
        log: CallLog,
        cloud: FakeCloud,
        agents: FakeAgentClientFactory,
        store: MemoryStateRepository,
        reporter: RecordingReporter,
        deployer: Deployer,
    }

    fn harness(state: DeploymentState) -> Harness {
        let log = CallLog::new();
        let cloud = FakeCloud::new(log.clone());
        let agents = FakeAgentClientFactory::new(log.clone());
        let store = MemoryStateRepository::with_state(state);
        let reporter = RecordingReporter::new();
        let deployer = Deployer::new(
            Arc::new(cloud.clone()),
            Arc::new(agents.clone()),
            Repos::new(Arc::new(store.clone()), Arc::new(FixedUuid)),
            Arc::new(reporter.clone()),
        );
        Harness {
            log,
            cloud,
            agents,
            store,
            reporter,
            deployer,
        }
    }

    fn deployed() -> DeploymentState {
        DeploymentState {
            uuid: "deployment-uuid".to_string(),
            current_vm_cid: Some("fake-vm-cid".to_string()),
            current_stemcell_id: Some("fake-stemcell-guid".to_string()),
            current_disk_id: Some("fake-disk-guid".to_string()),
            disks: vec![DiskRecord {
                id: "fake-disk-guid".to_string(),
                cid: "fake-disk-cid".to_string(),
                size: 100,
            }],
            stemcells: vec![StemcellRecord {
                id: "fake-stemcell-guid".to_string(),
                name: String::new(),
                version: String::new(),
                cid: "fake-stemcell-cid".to_string(),
            }],
            ..Default::default()
        }
    }

    fn with_unused(mut state: DeploymentState) -> DeploymentState {
        state.disks.push(DiskRecord {
            id: "old-disk-guid".to_string(),
            cid: "old-disk-cid".to_string(),
            size: 50,
        });
        state.stemcells.push(StemcellRecord {
            id: "old-stemcell-guid".to_string(),
            name: "ubuntu".to_string(),
            version: "1".to_string(),
            cid: "old-stemcell-cid".to_string(),
        });
        state.unused_disk_ids.push("old-disk-guid".to_string());
        state.unused_stemcell_ids.push("old-stemcell-guid".to_string());
        state
    }

    #[test]
    fn test_deletes_everything_in_order() {
        let h = harness(deployed());

        h.deployer.delete(MBUS).unwrap();

        assert_eq!(
            h.log.calls(),
            vec![
                Call::CreateAgentClient(MBUS.to_string()),
                Call::Stop,
                Call::DeleteVm("fake-vm-cid".to_string()),
                Call::DeleteDisk("fake-disk-cid".to_string()),
                Call::DeleteStemcell("fake-stemcell-cid".to_string()),
            ]
        );

        let state = h.store.snapshot().unwrap();
        assert!(!state.has_current_resources());
        assert_eq!(state.disks.len(), 1);
        assert_eq!(state.stemcells.len(), 1);
    }

    #[test]
    fn test_empty_state_is_rejected_without_calls() {
        let h = harness(DeploymentState::default());

        let err = h.deployer.delete(MBUS).unwrap_err();
        assert!(matches!(err, Error::NothingToDelete));
        assert!(h.log.is_empty());
    }

    #[test]
    fn test_disk_only() {
        let mut state = deployed();
        state.current_vm_cid = None;
        state.current_stemcell_id = None;
        let h = harness(state);

        h.deployer.delete(MBUS).unwrap();

        assert_eq!(
            h.log.calls(),
            vec![Call::DeleteDisk("fake-disk-cid".to_string())]
        );
    }

    #[test]
    fn test_stop_failure_is_tolerated() {
        let h = harness(deployed());
        h.agents.client().fail_on("stop", "connection refused");

        h.deployer.delete(MBUS).unwrap();

        assert!(h.log.happened_in_order(&[
            Call::Stop,
            Call::DeleteVm("fake-vm-cid".to_string()),
            Call::DeleteDisk("fake-disk-cid".to_string()),
        ]));
        let warnings = h.reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("connection refused"));
    }

    #[test]
    fn test_cloud_failure_aborts_and_resume_skips_done_work() {
        let h = harness(deployed());
        h.cloud.fail_on("delete_disk", "disk busy");

        let err = h.deployer.delete(MBUS).unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteCall {
                resource: ResourceKind::Disk,
                operation: "delete",
                ..
            }
        ));
        assert!(!h.log.contains(&Call::DeleteStemcell("fake-stemcell-cid".to_string())));

        let state = h.store.snapshot().unwrap();
        assert_eq!(state.current_vm_cid, None);
        assert_eq!(state.current_disk_id.as_deref(), Some("fake-disk-guid"));
        assert!(
            h.reporter
                .events()
                .contains(&StageEvent::Failed("Deleting disk 'fake-disk-cid'".to_string()))
        );

        h.cloud.clear_failures();
        h.log.clear();
        h.deployer.delete(MBUS).unwrap();

        assert_eq!(
            h.log.calls(),
            vec![
                Call::DeleteDisk("fake-disk-cid".to_string()),
                Call::DeleteStemcell("fake-stemcell-cid".to_string()),
            ]
        );
    }

    #[test]
    fn test_vm_failure_keeps_everything_current() {
        let h = harness(deployed());
        h.cloud.fail_on("delete_vm", "api down");

        assert!(h.deployer.delete(MBUS).is_err());
        assert_eq!(h.store.snapshot().unwrap(), deployed());
    }

    #[test]
    fn test_storage_failure_is_fatal() {
        let h = harness(deployed());
        h.store.fail_save_after(1);

        let err = h.deployer.delete(MBUS).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!h.log.contains(&Call::DeleteDisk("fake-disk-cid".to_string())));
    }

    #[test]
    fn test_dangling_marker_is_cleared() {
        let state = DeploymentState {
            uuid: "u".to_string(),
            current_disk_id: Some("missing".to_string()),
            ..Default::default()
        };
        let h = harness(state);

        h.deployer.delete(MBUS).unwrap();

        assert!(h.log.is_empty());
        assert_eq!(h.deployer.repos.disks.find_current().unwrap(), None);
        assert!(!h.store.snapshot().unwrap().has_current_resources());
    }

    #[test]
    fn test_unused_resources_are_deleted_with_their_kind() {
        let h = harness(with_unused(deployed()));

        h.deployer.delete(MBUS).unwrap();

        assert_eq!(
            h.log.calls(),
            vec![
                Call::CreateAgentClient(MBUS.to_string()),
                Call::Stop,
                Call::DeleteVm("fake-vm-cid".to_string()),
                Call::DeleteDisk("fake-disk-cid".to_string()),
                Call::DeleteDisk("old-disk-cid".to_string()),
                Call::DeleteStemcell("fake-stemcell-cid".to_string()),
                Call::DeleteStemcell("old-stemcell-cid".to_string()),
            ]
        );
        let state = h.store.snapshot().unwrap();
        assert!(!state.owns_resources());
        assert_eq!(state.disks.len(), 2);
        assert_eq!(state.stemcells.len(), 2);
    }

    #[test]
    fn test_only_unused_resources_still_get_deleted() {
        let h = harness(with_unused(DeploymentState {
            uuid: "u".to_string(),
            ..Default::default()
        }));

        h.deployer.delete(MBUS).unwrap();

        assert_eq!(
            h.log.calls(),
            vec![
                Call::DeleteDisk("old-disk-cid".to_string()),
                Call::DeleteStemcell("old-stemcell-cid".to_string()),
            ]
        );
    }

    #[test]
    fn test_failed_unused_delete_is_retried() {
        let h = harness(with_unused(deployed()));
        h.cloud.fail_on("delete_stemcell", "in use");

        let err = h.deployer.delete(MBUS).unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteCall {
                resource: ResourceKind::Stemcell,
                operation: "delete",
                ..
            }
        ));

        h.cloud.clear_failures();
        h.log.clear();
        h.deployer.delete(MBUS).unwrap();

        assert_eq!(
            h.log.calls(),
            vec![
                Call::DeleteStemcell("fake-stemcell-cid".to_string()),
                Call::DeleteStemcell("old-stemcell-cid".to_string()),
            ]
        );
    }
}
