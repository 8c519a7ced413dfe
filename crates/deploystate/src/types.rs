//! Persisted deployment state

use serde::{Deserialize, Deserializer, Serialize};

/// Root record of everything a deployment currently owns.
///
/// "Nothing deployed" is represented by all `current_*` fields being
/// `None`, never by the absence of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Identifier of this deployment, generated once
    #[serde(default)]
    pub uuid: String,

    /// Cloud identifier of the current VM
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_vm_cid: Option<String>,

    /// Internal id of the current stemcell record
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_stemcell_id: Option<String>,

    /// Internal id of the current disk record
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_disk_id: Option<String>,

    /// Stemcell record the current VM was created from
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_vm_stemcell_id: Option<String>,

    /// Disk records attached to the current VM. Two during a resize.
    #[serde(default)]
    pub current_vm_disk_ids: Vec<String>,

    /// Stemcell records that still exist in the cloud but are not in use.
    /// The next apply or delete removes them.
    #[serde(default)]
    pub unused_stemcell_ids: Vec<String>,

    /// Disk records that still exist in the cloud but are not in use
    #[serde(default)]
    pub unused_disk_ids: Vec<String>,

    #[serde(default)]
    pub stemcells: Vec<StemcellRecord>,

    #[serde(default)]
    pub disks: Vec<DiskRecord>,
}

/// A stemcell uploaded to the cloud backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemcellRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub cid: String,
}

/// A persistent disk created on the cloud backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRecord {
    pub id: String,
    pub cid: String,
    /// Size in MiB
    pub size: u64,
}

impl DeploymentState {
    /// Whether any VM, disk or stemcell is recorded as current
    pub fn has_current_resources(&self) -> bool {
        self.current_vm_cid.is_some()
            || self.current_disk_id.is_some()
            || self.current_stemcell_id.is_some()
    }

    /// Whether anything is left in the cloud for delete to remove: a
    /// current resource or an unused stemcell or disk
    pub fn owns_resources(&self) -> bool {
        self.has_current_resources()
            || self.unused_stemcell_ids.iter().any(|id| self.find_stemcell(id).is_some())
            || self.unused_disk_ids.iter().any(|id| self.find_disk(id).is_some())
    }

    pub fn find_stemcell(&self, id: &str) -> Option<&StemcellRecord> {
        self.stemcells.iter().find(|s| s.id == id)
    }

    pub fn find_disk(&self, id: &str) -> Option<&DiskRecord> {
        self.disks.iter().find(|d| d.id == id)
    }
}

impl StemcellRecord {
    /// Whether this record is the stemcell identified by `name`/`version`
    pub fn matches(&self, name: &str, version: &str) -> bool {
        self.name == name && self.version == version
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}
