//! Error types for deployment workflows.

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Resource a remote call was acting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Vm,
    Disk,
    Stemcell,
    Agent,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vm => "VM",
            Self::Disk => "disk",
            Self::Stemcell => "stemcell",
            Self::Agent => "agent",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or incomplete configuration. Raised before any client exists.
    #[error("{0}")]
    Configuration(String),

    #[error("No existing microbosh instance to delete")]
    NothingToDelete,

    /// The deployment state could not be read or written
    #[error("deployment state: {0}")]
    Storage(#[from] deploystate::Error),

    #[error("failed to {operation} {resource}: {source}")]
    RemoteCall {
        resource: ResourceKind,
        operation: &'static str,
        #[source]
        source: cpi::Error,
    },

    #[error("invalid manifest {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("CPI release installation failed: {0}")]
    Install(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Attach resource and operation context to a remote call result
pub(crate) trait RemoteContext<T> {
    fn during(self, resource: ResourceKind, operation: &'static str) -> Result<T>;
}

impl<T> RemoteContext<T> for cpi::Result<T> {
    fn during(self, resource: ResourceKind, operation: &'static str) -> Result<T> {
        self.map_err(|source| Error::RemoteCall {
            resource,
            operation,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_call_display() {
        let err: Result<()> = Err(cpi::Error::Other("backend down".to_string()))
            .during(ResourceKind::Disk, "delete");
        assert_eq!(err.unwrap_err().to_string(), "failed to delete disk: backend down");
    }

    #[test]
    fn test_nothing_to_delete_message() {
        assert_eq!(
            Error::NothingToDelete.to_string(),
            "No existing microbosh instance to delete"
        );
    }
}
