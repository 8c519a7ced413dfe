//! Request types shared by the cloud and agent clients

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Input to `create_stemcell`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemcellSpec {
    /// Path to the unpacked OS image
    pub image_path: PathBuf,
    #[serde(default)]
    pub cloud_properties: Value,
}

/// Input to `create_vm`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSpec {
    /// Identity the agent on the new VM will answer as
    pub agent_id: String,
    pub stemcell_cid: String,
    /// Resource pool properties (instance type, zone, ...)
    #[serde(default)]
    pub cloud_properties: Value,
    /// Network name to network settings
    #[serde(default)]
    pub networks: Value,
    #[serde(default)]
    pub env: Value,
}

/// Input to `create_disk`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub size_mib: u64,
    #[serde(default)]
    pub cloud_properties: Value,
}

/// Desired configuration pushed to the agent with `apply`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplySpec {
    pub deployment: String,
    #[serde(default)]
    pub networks: Value,
    /// Persistent disk size in MiB, 0 when there is none
    #[serde(default)]
    pub persistent_disk: u64,
    #[serde(default)]
    pub properties: Value,
}
