//! Shared fixtures for command tests.

#![allow(dead_code)]

use cpi::Cloud;
use cpi::fakes::{CallLog, FakeAgentClientFactory, FakeCloud};
use deployer::{
    CpiDeployment, Dependencies, Installer, RecordingReporter, ReleaseDescriptor, Result,
    STATE_FILE_NAME, UserConfig,
};
use deploystate::{DeploymentState, FileStateRepository, StateRepository, UuidGenerator};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const MBUS: &str = "http://fake-mbus-url";

pub const MINIMAL_MANIFEST: &str = "---
name: test-release

cloud_provider:
  mbus: http://fake-mbus-url
";

pub struct FixedUuid(pub &'static str);

impl UuidGenerator for FixedUuid {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}

/// Hands out "generated-uuid-1", "generated-uuid-2", ...
#[derive(Default)]
pub struct CountingUuid(AtomicU32);

impl UuidGenerator for CountingUuid {
    fn generate(&self) -> String {
        format!("generated-uuid-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Installer that hands out a prepared cloud and records its inputs
pub struct FakeInstaller {
    cloud: Arc<dyn Cloud>,
    pub extract_inputs: Mutex<Vec<PathBuf>>,
    pub install_inputs: Mutex<Vec<CpiDeployment>>,
}

impl FakeInstaller {
    pub fn new(cloud: Arc<dyn Cloud>) -> Self {
        Self {
            cloud,
            extract_inputs: Mutex::new(Vec::new()),
            install_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn install_count(&self) -> usize {
        self.install_inputs.lock().unwrap().len()
    }

    pub fn extract_count(&self) -> usize {
        self.extract_inputs.lock().unwrap().len()
    }
}

impl Installer for FakeInstaller {
    fn extract(&self, archive: &Path) -> Result<ReleaseDescriptor> {
        self.extract_inputs.lock().unwrap().push(archive.to_path_buf());
        Ok(ReleaseDescriptor {
            name: "fake-cpi-release-name".to_string(),
            version: "fake-cpi-release-version".to_string(),
            jobs: Vec::new(),
            extracted_dir: PathBuf::from("fake-extracted-dir"),
        })
    }

    fn install(
        &self,
        _release: &ReleaseDescriptor,
        deployment: &CpiDeployment,
    ) -> Result<Arc<dyn Cloud>> {
        self.install_inputs.lock().unwrap().push(deployment.clone());
        Ok(Arc::clone(&self.cloud))
    }
}

/// A deployment directory with manifest, release archive and fakes wired up
pub struct Fixture {
    pub dir: TempDir,
    pub log: CallLog,
    pub cloud: FakeCloud,
    pub agents: FakeAgentClientFactory,
    pub installer: Arc<FakeInstaller>,
    pub reporter: RecordingReporter,
    /// Shared by every command built from this fixture
    pub uuids: Arc<CountingUuid>,
}

impl Fixture {
    pub fn new(manifest: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let deployment_dir = dir.path().join("deployment-dir");
        fs::create_dir_all(&deployment_dir).unwrap();
        fs::write(deployment_dir.join("fake-deployment-manifest.yml"), manifest).unwrap();
        fs::write(dir.path().join("fake-cpi-release.tgz"), "fake-tgz-content").unwrap();

        let log = CallLog::new();
        let cloud = FakeCloud::new(log.clone());
        let agents = FakeAgentClientFactory::new(log.clone());
        let installer = Arc::new(FakeInstaller::new(Arc::new(cloud.clone())));

        Self {
            dir,
            log,
            cloud,
            agents,
            installer,
            reporter: RecordingReporter::new(),
            uuids: Arc::new(CountingUuid::default()),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir
            .path()
            .join("deployment-dir/fake-deployment-manifest.yml")
    }

    pub fn release_path(&self) -> PathBuf {
        self.dir.path().join("fake-cpi-release.tgz")
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("deployment-dir").join(STATE_FILE_NAME)
    }

    pub fn user_config(&self) -> UserConfig {
        UserConfig {
            deployment_file: Some(self.manifest_path()),
            state_file: None,
        }
    }

    pub fn state_repo(&self) -> FileStateRepository {
        FileStateRepository::new(self.state_path(), Arc::new(FixedUuid("unsaved-uuid")))
    }

    pub fn write_state(&self, state: &DeploymentState) {
        self.state_repo().save(state).unwrap();
    }

    pub fn read_state(&self) -> DeploymentState {
        self.state_repo().load().unwrap()
    }

    pub fn write_manifest(&self, manifest: &str) {
        fs::write(self.manifest_path(), manifest).unwrap();
    }

    pub fn deps(&self) -> Dependencies {
        Dependencies {
            installer: self.installer.clone(),
            agents: Arc::new(self.agents.clone()),
            uuids: self.uuids.clone(),
            reporter: Arc::new(self.reporter.clone()),
        }
    }
}
