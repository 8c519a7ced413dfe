mod common;

use common::{Fixture, MBUS, MINIMAL_MANIFEST};
use cpi::fakes::Call;
use deployer::{DeleteCommand, Error, StageEvent, UserConfig};
use deploystate::{DeploymentState, DiskRecord, StemcellRecord};

fn disk_record() -> DiskRecord {
    DiskRecord {
        id: "fake-disk-guid".to_string(),
        cid: "fake-disk-cid".to_string(),
        size: 100,
    }
}

fn stemcell_record() -> StemcellRecord {
    StemcellRecord {
        id: "fake-stemcell-guid".to_string(),
        name: String::new(),
        version: String::new(),
        cid: "fake-stemcell-cid".to_string(),
    }
}

fn deployed() -> DeploymentState {
    DeploymentState {
        uuid: String::new(),
        current_vm_cid: Some("fake-vm-cid".to_string()),
        current_stemcell_id: Some("fake-stemcell-guid".to_string()),
        current_disk_id: Some("fake-disk-guid".to_string()),
        disks: vec![disk_record()],
        stemcells: vec![stemcell_record()],
        ..Default::default()
    }
}

fn delete_cmd(fixture: &Fixture) -> DeleteCommand {
    DeleteCommand::new(fixture.user_config(), fixture.deps())
}

#[test]
fn test_no_deployment_set() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&deployed());

    let cmd = DeleteCommand::new(UserConfig::default(), fixture.deps());
    let err = cmd.run(&fixture.release_path()).unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("No deployment set"));
    assert_eq!(fixture.installer.extract_count(), 0);
    assert!(fixture.log.is_empty());
}

#[test]
fn test_deployed_stops_agent_then_deletes_vm_disk_and_stemcell() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&deployed());

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![
            Call::CreateAgentClient(MBUS.to_string()),
            Call::Stop,
            Call::DeleteVm("fake-vm-cid".to_string()),
            Call::DeleteDisk("fake-disk-cid".to_string()),
            Call::DeleteStemcell("fake-stemcell-cid".to_string()),
        ]
    );

    let install = &fixture.installer.install_inputs.lock().unwrap()[0];
    assert_eq!(install.name, "test-release");
    assert_eq!(install.cloud_provider.mbus, MBUS);

    let state = fixture.read_state();
    assert!(!state.has_current_resources());
    assert_eq!(state.disks, vec![disk_record()]);
    assert_eq!(state.stemcells, vec![stemcell_record()]);
}

#[test]
fn test_deployed_reports_stages() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&deployed());

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    let finished: Vec<_> = fixture
        .reporter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            StageEvent::Finished(name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(
        finished,
        vec![
            format!("Extracting CPI release '{}'", fixture.release_path().display()),
            "Installing CPI fake-cpi-release-name/fake-cpi-release-version".to_string(),
            "Deleting VM 'fake-vm-cid'".to_string(),
            "Deleting disk 'fake-disk-cid'".to_string(),
            "Deleting stemcell 'fake-stemcell-cid'".to_string(),
        ]
    );
}

#[test]
fn test_not_deployed_returns_error_without_installing() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&DeploymentState::default());

    let err = delete_cmd(&fixture)
        .run(&fixture.release_path())
        .unwrap_err();

    assert!(err.to_string().contains("No existing microbosh instance to delete"));
    assert_eq!(
        fixture.reporter.errors(),
        vec!["No existing microbosh instance to delete".to_string()]
    );
    assert_eq!(fixture.installer.install_count(), 0);
    assert_eq!(fixture.installer.extract_count(), 0);
    assert!(fixture.log.is_empty());
}

#[test]
fn test_missing_state_file_counts_as_not_deployed() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);

    let err = delete_cmd(&fixture)
        .run(&fixture.release_path())
        .unwrap_err();

    assert!(matches!(err, Error::NothingToDelete));
    assert!(!fixture.state_path().exists());
}

#[test]
fn test_vm_only() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&DeploymentState {
        current_vm_cid: Some("fake-vm-cid".to_string()),
        ..Default::default()
    });

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![
            Call::CreateAgentClient(MBUS.to_string()),
            Call::Stop,
            Call::DeleteVm("fake-vm-cid".to_string()),
        ]
    );
}

#[test]
fn test_disk_only() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&DeploymentState {
        current_disk_id: Some("fake-disk-guid".to_string()),
        disks: vec![disk_record()],
        ..Default::default()
    });

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![Call::DeleteDisk("fake-disk-cid".to_string())]
    );
}

#[test]
fn test_stemcell_only() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&DeploymentState {
        current_stemcell_id: Some("fake-stemcell-guid".to_string()),
        stemcells: vec![stemcell_record()],
        ..Default::default()
    });

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![Call::DeleteStemcell("fake-stemcell-cid".to_string())]
    );
}

#[test]
fn test_unused_stemcell_only() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&DeploymentState {
        stemcells: vec![stemcell_record()],
        unused_stemcell_ids: vec!["fake-stemcell-guid".to_string()],
        ..Default::default()
    });

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![Call::DeleteStemcell("fake-stemcell-cid".to_string())]
    );
    assert!(fixture.read_state().unused_stemcell_ids.is_empty());
}

#[test]
fn test_interrupted_delete_resumes_with_remaining_resources() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&deployed());
    fixture.cloud.fail_on("delete_disk", "disk is busy");

    let err = delete_cmd(&fixture)
        .run(&fixture.release_path())
        .unwrap_err();
    assert!(err.to_string().contains("disk is busy"));

    let state = fixture.read_state();
    assert_eq!(state.current_vm_cid, None);
    assert_eq!(state.current_disk_id.as_deref(), Some("fake-disk-guid"));
    assert_eq!(state.current_stemcell_id.as_deref(), Some("fake-stemcell-guid"));

    fixture.cloud.clear_failures();
    fixture.log.clear();
    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![
            Call::DeleteDisk("fake-disk-cid".to_string()),
            Call::DeleteStemcell("fake-stemcell-cid".to_string()),
        ]
    );
}

#[test]
fn test_unreachable_agent_does_not_block_delete() {
    let fixture = Fixture::new(MINIMAL_MANIFEST);
    fixture.write_state(&deployed());
    fixture.agents.client().fail_on("stop", "connection refused");

    delete_cmd(&fixture).run(&fixture.release_path()).unwrap();

    assert!(fixture.log.happened_in_order(&[
        Call::Stop,
        Call::DeleteVm("fake-vm-cid".to_string()),
        Call::DeleteDisk("fake-disk-cid".to_string()),
        Call::DeleteStemcell("fake-stemcell-cid".to_string()),
    ]));
    assert_eq!(fixture.reporter.warnings().len(), 1);
}

#[test]
fn test_manifest_without_mbus_is_rejected() {
    let fixture = Fixture::new("name: test-release\n");
    fixture.write_state(&deployed());

    let err = delete_cmd(&fixture)
        .run(&fixture.release_path())
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert!(fixture.log.is_empty());
}
