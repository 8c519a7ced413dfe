pub mod delete;
pub mod deploy;
pub mod deployment;
pub mod status;

use anyhow::{Context as _, Result};
use cpi::HttpAgentClientFactory;
use deployer::{Dependencies, Manifest, TarballInstaller, UserConfig};
use deploystate::RandomUuidGenerator;
use std::sync::Arc;
use std::time::Duration;

use crate::Context;
use crate::paths;
use crate::progress::TerminalReporter;

/// Agents answer to this name in `reply_to`
const REPLY_TO: &str = "microdeploy";

/// Used when the manifest cannot be read yet; the command reports why later
const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn load_user_config() -> Result<UserConfig> {
    let path = paths::user_config_file()?;
    log::debug!("Loading user config from {}", path.display());
    UserConfig::load(&path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Real collaborators for deploy and delete
pub fn dependencies(ctx: &Context, config: &UserConfig) -> Result<Dependencies> {
    let agent_timeout = config
        .deployment_file()
        .ok()
        .and_then(|path| Manifest::load(path).ok())
        .map_or(DEFAULT_AGENT_TIMEOUT, |m| m.cloud_provider.agent_timeout());

    Ok(Dependencies {
        installer: Arc::new(TarballInstaller::new(paths::releases_dir()?)),
        agents: Arc::new(HttpAgentClientFactory::new(REPLY_TO, agent_timeout)),
        uuids: Arc::new(RandomUuidGenerator),
        reporter: Arc::new(TerminalReporter::new(ctx.quiet)),
    })
}
