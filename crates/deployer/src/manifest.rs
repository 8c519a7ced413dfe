//! Deployment manifest (YAML).
//!
//! Only `name` is required to parse. Delete needs `cloud_provider.mbus`,
//! deploy additionally needs a `stemcell`; [`Manifest::validate_for_deploy`]
//! and [`Manifest::validate_for_delete`] check that before any client is
//! built.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CPI_TIMEOUT_SECS: u64 = 600;
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AGENT_PING_ATTEMPTS: u32 = 60;
const DEFAULT_AGENT_PING_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    #[serde(default)]
    pub cloud_provider: CloudProvider,

    #[serde(default)]
    pub resource_pool: ResourcePool,

    #[serde(default)]
    pub networks: Vec<Network>,

    /// Persistent disk size in MiB. No disk when absent or zero.
    #[serde(default)]
    pub disk_size: Option<u64>,

    #[serde(default)]
    pub disk_cloud_properties: Value,

    #[serde(default)]
    pub stemcell: Option<StemcellRef>,

    /// Job properties handed to the agent
    #[serde(default)]
    pub properties: Value,
}

/// Where the CPI and the agent live, and how long to wait for them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudProvider {
    /// Agent endpoint on the deployed VM
    #[serde(default)]
    pub mbus: String,

    /// Passed to the CPI as request context
    #[serde(default)]
    pub properties: Value,

    #[serde(default = "default_cpi_timeout")]
    pub cpi_timeout_secs: u64,

    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,

    #[serde(default = "default_ping_attempts")]
    pub agent_ping_attempts: u32,

    #[serde(default = "default_ping_interval")]
    pub agent_ping_interval_ms: u64,
}

fn default_cpi_timeout() -> u64 {
    DEFAULT_CPI_TIMEOUT_SECS
}

fn default_agent_timeout() -> u64 {
    DEFAULT_AGENT_TIMEOUT_SECS
}

fn default_ping_attempts() -> u32 {
    DEFAULT_AGENT_PING_ATTEMPTS
}

fn default_ping_interval() -> u64 {
    DEFAULT_AGENT_PING_INTERVAL_MS
}

impl Default for CloudProvider {
    fn default() -> Self {
        Self {
            mbus: String::new(),
            properties: Value::Null,
            cpi_timeout_secs: DEFAULT_CPI_TIMEOUT_SECS,
            agent_timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
            agent_ping_attempts: DEFAULT_AGENT_PING_ATTEMPTS,
            agent_ping_interval_ms: DEFAULT_AGENT_PING_INTERVAL_MS,
        }
    }
}

impl CloudProvider {
    #[must_use]
    pub fn cpi_timeout(&self) -> Duration {
        Duration::from_secs(self.cpi_timeout_secs)
    }

    #[must_use]
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.agent_ping_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    #[serde(default)]
    pub cloud_properties: Value,
    #[serde(default)]
    pub env: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(rename = "type", default = "default_network_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default)]
    pub cloud_properties: Value,
}

fn default_network_type() -> String {
    "dynamic".to_string()
}

/// Desired OS image. A change of name or version replaces the VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemcellRef {
    pub name: String,
    pub version: String,
    /// Image file, relative paths resolve against the manifest's directory
    pub image: PathBuf,
    #[serde(default)]
    pub cloud_properties: Value,
}

impl Manifest {
    /// Read and parse a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::manifest(path, format!("cannot read file: {e}")))?;
        let mut manifest = Self::parse_at(&content, path)?;

        if let (Some(stemcell), Some(dir)) = (manifest.stemcell.as_mut(), path.parent())
            && stemcell.image.is_relative()
        {
            stemcell.image = dir.join(&stemcell.image);
        }

        log::debug!("Loaded manifest '{}' from {}", manifest.name, path.display());
        Ok(manifest)
    }

    /// Parse manifest YAML that did not come from a file
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_at(content, Path::new("<inline>"))
    }

    fn parse_at(content: &str, path: &Path) -> Result<Self> {
        let manifest: Self =
            serde_yaml::from_str(content).map_err(|e| Error::manifest(path, e.to_string()))?;
        if manifest.name.trim().is_empty() {
            return Err(Error::manifest(path, "'name' must not be empty"));
        }
        Ok(manifest)
    }

    /// Requested disk size, `None` when no disk is wanted
    #[must_use]
    pub fn desired_disk_size(&self) -> Option<u64> {
        self.disk_size.filter(|size| *size > 0)
    }

    /// Networks keyed by name, as the CPI and agent expect them
    #[must_use]
    pub fn networks_value(&self) -> Value {
        let networks: Map<String, Value> = self
            .networks
            .iter()
            .map(|net| {
                let mut settings = json!({
                    "type": net.kind,
                    "cloud_properties": net.cloud_properties,
                });
                if let Some(ip) = &net.ip {
                    settings["ip"] = json!(ip);
                }
                (net.name.clone(), settings)
            })
            .collect();
        Value::Object(networks)
    }

    pub fn validate_for_delete(&self) -> Result<()> {
        if self.cloud_provider.mbus.trim().is_empty() {
            return Err(Error::config(format!(
                "Deployment manifest '{}' has no cloud_provider.mbus",
                self.name
            )));
        }
        Ok(())
    }

    /// Check what deploy needs and hand back the desired stemcell
    pub fn validate_for_deploy(&self) -> Result<&StemcellRef> {
        self.validate_for_delete()?;
        let Some(stemcell) = &self.stemcell else {
            return Err(Error::config(format!(
                "Deployment manifest '{}' has no stemcell",
                self.name
            )));
        };
        if stemcell.name.is_empty() || stemcell.version.is_empty() {
            return Err(Error::config("Stemcell name and version are required"));
        }
        Ok(stemcell)
    }
}
