//! The two user-level operations: deploy and delete.
//!
//! Both take every collaborator through [`Dependencies`] and follow the same
//! order: check configuration, read the manifest, open the state, install
//! the CPI, run the engine. Nothing remote is touched until configuration
//! and state have been checked.

use crate::config::UserConfig;
use crate::engine::Deployer;
use crate::error::{Error, Result};
use crate::installer::{CpiDeployment, Installer};
use crate::manifest::Manifest;
use crate::stage::StageReporter;
use cpi::{AgentClientFactory, Cloud};
use deploystate::{FileStateRepository, Repos, UuidGenerator};
use std::path::Path;
use std::sync::Arc;

/// Collaborators shared by both commands
#[derive(Clone)]
pub struct Dependencies {
    pub installer: Arc<dyn Installer>,
    pub agents: Arc<dyn AgentClientFactory>,
    pub uuids: Arc<dyn UuidGenerator>,
    pub reporter: Arc<dyn StageReporter>,
}

impl Dependencies {
    fn open_repos(&self, config: &UserConfig) -> Result<Repos> {
        let path = config.state_file_path()?;
        log::debug!("Using deployment state {}", path.display());
        let store = FileStateRepository::new(path, Arc::clone(&self.uuids));
        Ok(Repos::new(Arc::new(store), Arc::clone(&self.uuids)))
    }

    fn install_cpi(
        &self,
        archive: &Path,
        manifest: &Manifest,
        director_uuid: &str,
    ) -> Result<Arc<dyn Cloud>> {
        let reporter = &self.reporter;

        let stage = format!("Extracting CPI release '{}'", archive.display());
        reporter.stage_started(&stage);
        let release = self.installer.extract(archive).inspect_err(|e| {
            reporter.stage_failed(&stage, &e.to_string());
        })?;
        reporter.stage_finished(&stage);

        let stage = format!("Installing CPI {}/{}", release.name, release.version);
        reporter.stage_started(&stage);
        let deployment = CpiDeployment {
            name: manifest.name.clone(),
            director_uuid: director_uuid.to_string(),
            cloud_provider: manifest.cloud_provider.clone(),
        };
        let cloud = self.installer.install(&release, &deployment).inspect_err(|e| {
            reporter.stage_failed(&stage, &e.to_string());
        })?;
        reporter.stage_finished(&stage);

        Ok(cloud)
    }

    fn deployer(&self, cloud: Arc<dyn Cloud>, repos: Repos) -> Deployer {
        Deployer::new(
            cloud,
            Arc::clone(&self.agents),
            repos,
            Arc::clone(&self.reporter),
        )
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.reporter.error(&e.to_string());
        }
        result
    }
}

/// `deploy <release>`: create or update the deployment
pub struct DeployCommand {
    config: UserConfig,
    deps: Dependencies,
}

impl DeployCommand {
    pub fn new(config: UserConfig, deps: Dependencies) -> Self {
        Self { config, deps }
    }

    pub fn run(&self, release_archive: &Path) -> Result<()> {
        self.deps.report(self.execute(release_archive))
    }

    fn execute(&self, release_archive: &Path) -> Result<()> {
        let manifest = Manifest::load(self.config.deployment_file()?)?;
        manifest.validate_for_deploy()?;

        let repos = self.deps.open_repos(&self.config)?;
        let state = repos.ensure_persisted()?;

        let cloud = self.deps.install_cpi(release_archive, &manifest, &state.uuid)?;
        self.deps.deployer(cloud, repos).apply(&manifest)?;

        log::info!("Deployment '{}' is up to date", manifest.name);
        Ok(())
    }
}

/// `delete <release>`: tear down everything the state records
pub struct DeleteCommand {
    config: UserConfig,
    deps: Dependencies,
}

impl DeleteCommand {
    pub fn new(config: UserConfig, deps: Dependencies) -> Self {
        Self { config, deps }
    }

    pub fn run(&self, release_archive: &Path) -> Result<()> {
        self.deps.report(self.execute(release_archive))
    }

    fn execute(&self, release_archive: &Path) -> Result<()> {
        let manifest = Manifest::load(self.config.deployment_file()?)?;
        manifest.validate_for_delete()?;

        let repos = self.deps.open_repos(&self.config)?;
        let state = repos.state()?;
        if !state.owns_resources() {
            return Err(Error::NothingToDelete);
        }

        let cloud = self.deps.install_cpi(release_archive, &manifest, &state.uuid)?;
        self.deps
            .deployer(cloud, repos)
            .delete(&manifest.cloud_provider.mbus)?;

        log::info!("Deployment '{}' deleted", manifest.name);
        Ok(())
    }
}
