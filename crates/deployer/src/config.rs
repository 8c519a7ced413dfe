//! User configuration: which manifest is the current deployment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default state file name, placed next to the manifest
pub const STATE_FILE_NAME: &str = "deployment-state.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_file: Option<PathBuf>,

    /// Overrides the state file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl UserConfig {
    /// Load from `path`; a missing file is an empty config
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Invalid config {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Cannot serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| Error::config(format!("Cannot write {}: {e}", path.display())))
    }

    /// The configured manifest path
    pub fn deployment_file(&self) -> Result<&Path> {
        match self.deployment_file.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(Error::config(
                "No deployment set. Run 'microdeploy deployment <manifest>' first",
            )),
        }
    }

    /// Where the deployment state lives
    pub fn state_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.state_file {
            return Ok(path.clone());
        }
        let manifest = self.deployment_file()?;
        let dir = manifest.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(STATE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_deployment_is_configuration_error() {
        let config = UserConfig::default();
        let err = config.deployment_file().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("No deployment set"));

        let config = UserConfig {
            deployment_file: Some(PathBuf::new()),
            state_file: None,
        };
        assert!(config.deployment_file().is_err());
    }

    #[test]
    fn test_state_file_next_to_manifest() {
        let config = UserConfig {
            deployment_file: Some(PathBuf::from("/deployment-dir/manifest.yml")),
            state_file: None,
        };
        assert_eq!(
            config.state_file_path().unwrap(),
            PathBuf::from("/deployment-dir/deployment-state.json")
        );
    }

    #[test]
    fn test_state_file_override() {
        let config = UserConfig {
            deployment_file: None,
            state_file: Some(PathBuf::from("/var/state.json")),
        };
        assert_eq!(config.state_file_path().unwrap(), PathBuf::from("/var/state.json"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.json");

        assert_eq!(UserConfig::load(&path).unwrap(), UserConfig::default());

        let config = UserConfig {
            deployment_file: Some(PathBuf::from("/x/manifest.yml")),
            state_file: None,
        };
        config.save(&path).unwrap();
        assert_eq!(UserConfig::load(&path).unwrap(), config);
    }
}
