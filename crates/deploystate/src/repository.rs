//! Storage for the deployment state document.
//!
//! The [`StateRepository`] trait is pure data access: load the whole
//! document, save the whole document. Policy (which record is current,
//! when ids are generated) lives in [`crate::repos`].

use crate::error::{Error, Result};
use crate::ids::UuidGenerator;
use crate::types::DeploymentState;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Whole-document access to the deployment state
pub trait StateRepository: Send + Sync {
    /// Load the current state.
    ///
    /// A repository with nothing stored yet returns the default state
    /// carrying a fresh uuid.
    fn load(&self) -> Result<DeploymentState>;

    /// Replace the stored state. Callers never observe a partial write.
    fn save(&self, state: &DeploymentState) -> Result<()>;
}

// ============================================================================
// File-backed repository
// ============================================================================

/// JSON state file on local disk.
///
/// Saves go to a temporary sibling which is synced and then renamed over
/// the target, so a crash mid-save leaves the previous document intact.
pub struct FileStateRepository {
    path: PathBuf,
    uuids: Arc<dyn UuidGenerator>,
}

impl FileStateRepository {
    pub fn new(path: impl Into<PathBuf>, uuids: Arc<dyn UuidGenerator>) -> Self {
        Self {
            path: path.into(),
            uuids,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, path: &Path, source: std::io::Error) -> Error {
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl StateRepository for FileStateRepository {
    fn load(&self) -> Result<DeploymentState> {
        if !self.path.exists() {
            log::debug!(
                "State file {} does not exist, using default state",
                self.path.display()
            );
            return Ok(DeploymentState {
                uuid: self.uuids.generate(),
                ..Default::default()
            });
        }

        let content = fs::read_to_string(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut state: DeploymentState =
            serde_json::from_str(&content).map_err(|source| Error::Parse {
                path: self.path.clone(),
                source,
            })?;

        if state.uuid.is_empty() {
            state.uuid = self.uuids.generate();
            log::debug!("Assigned deployment uuid {}", state.uuid);
        }

        log::debug!("Loaded state from {}", self.path.display());
        Ok(state)
    }

    fn save(&self, state: &DeploymentState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.write_error(dir, e))?;
        }

        let content = serde_json::to_string_pretty(state).map_err(Error::Serialize)?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp).map_err(|e| self.write_error(&tmp, e))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.write_error(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| self.write_error(&self.path, e))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

// ============================================================================
// In-memory repository
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    state: Option<DeploymentState>,
    attempts: usize,
    saved: usize,
    fail_on_attempt: Option<usize>,
}

/// Process-local state store, mainly for tests.
///
/// Can be told to fail a specific save to simulate a crash between two
/// workflow steps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateRepository {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    pub fn with_state(state: DeploymentState) -> Self {
        let repo = Self::new();
        repo.lock().state = Some(state);
        repo
    }

    /// Make the `n`-th save from now (1-based) fail. Later saves succeed.
    pub fn fail_save_after(&self, n: usize) {
        let mut inner = self.lock();
        inner.fail_on_attempt = Some(inner.attempts + n);
    }

    /// The stored document, if anything was ever saved or seeded
    pub fn snapshot(&self) -> Option<DeploymentState> {
        self.lock().state.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.lock().saved
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StateRepository for MemoryStateRepository {
    fn load(&self) -> Result<DeploymentState> {
        let mut inner = self.lock();
        let state = inner.state.get_or_insert_with(|| DeploymentState {
            uuid: "memory-deployment".to_string(),
            ..Default::default()
        });
        Ok(state.clone())
    }

    fn save(&self, state: &DeploymentState) -> Result<()> {
        let mut inner = self.lock();
        inner.attempts += 1;
        if inner.fail_on_attempt == Some(inner.attempts) {
            return Err(Error::Unavailable(format!(
                "injected failure on save #{}",
                inner.attempts
            )));
        }
        inner.saved += 1;
        inner.state = Some(state.clone());
        Ok(())
    }
}
