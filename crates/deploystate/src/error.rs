//! Error types for the deploystate crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing deployment state
#[derive(Error, Debug)]
pub enum Error {
    /// State file exists but could not be read
    #[error("failed to read state file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State file (or its temporary sibling) could not be written
    #[error("failed to write state file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State file is not valid JSON for a deployment state
    #[error("malformed state file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Deployment state could not be serialized
    #[error("failed to serialize deployment state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A record id was not present in the record sequence
    #[error("{kind} record '{id}' not found in deployment state")]
    RecordNotFound { kind: &'static str, id: String },

    /// Storage backend failure without an underlying IO error
    #[error("state storage failure: {0}")]
    Unavailable(String),
}

/// Result type for deployment state operations
pub type Result<T> = std::result::Result<T, Error>;
