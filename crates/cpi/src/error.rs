//! Error types for CPI and agent calls.
//!
//! Errors are categorized so the retry helper can tell transient failures
//! from permanent ones. The deployment engine itself never retries.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for CPI and agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of remote call errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection-level failure talking to the agent.
    Network,
    /// The call did not finish before its deadline.
    Timeout,
    /// The cloud backend rejected or failed the request.
    Cloud,
    /// The agent reported an exception.
    Agent,
    /// The peer answered with something we could not understand.
    Protocol,
    /// Local failure (spawning the CPI, pipes).
    Local,
}

impl ErrorCategory {
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Timeout => "Deadline exceeded",
            Self::Cloud => "Cloud provider error",
            Self::Agent => "Agent error",
            Self::Protocol => "Unexpected response",
            Self::Local => "Local execution error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors returned by [`crate::Cloud`] and [`crate::AgentClient`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The CPI answered with an error object.
    #[error("CPI '{method}' failed ({kind}): {message}")]
    Cloud {
        method: String,
        /// Error type reported by the CPI, e.g. `Bosh::Clouds::VMNotFound`.
        kind: String,
        message: String,
        /// Whether the CPI says the call may be retried as-is.
        ok_to_retry: bool,
    },

    /// The agent answered with an exception.
    #[error("agent '{method}' failed: {message}")]
    Agent { method: String, message: String },

    /// The call exceeded its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// HTTP transport failure.
    #[error("HTTP request failed: {message}")]
    Http {
        message: String,
        status: Option<u16>,
    },

    /// Spawning or talking to a local process failed.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Cloud { .. } => ErrorCategory::Cloud,
            Error::Agent { .. } => ErrorCategory::Agent,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Http { status: Some(_), .. } => ErrorCategory::Protocol,
            Error::Http { status: None, .. } => ErrorCategory::Network,
            Error::Io { .. } => ErrorCategory::Local,
            Error::InvalidResponse(_) => ErrorCategory::Protocol,
            Error::Other(_) => ErrorCategory::Local,
        }
    }

    /// Whether repeating the identical call may succeed.
    ///
    /// Only the CPI's own `ok_to_retry` flag and connection failures count.
    /// Timeouts are not retried since the first attempt may still be running.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Cloud { ok_to_retry, .. } => *ok_to_retry,
            other => other.category() == ErrorCategory::Network,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_error_retry_follows_cpi_flag() {
        let retryable = Error::Cloud {
            method: "create_vm".to_string(),
            kind: "Bosh::Clouds::CloudError".to_string(),
            message: "rate limited".to_string(),
            ok_to_retry: true,
        };
        assert!(retryable.is_retryable());

        let permanent = Error::Cloud {
            method: "create_vm".to_string(),
            kind: "Bosh::Clouds::CloudError".to_string(),
            message: "quota exceeded".to_string(),
            ok_to_retry: false,
        };
        assert!(!permanent.is_retryable());
        assert_eq!(permanent.category(), ErrorCategory::Cloud);
    }

    #[test]
    fn test_timeout_is_not_retryable() {
        let err = Error::timeout("delete_vm", Duration::from_secs(30));
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "delete_vm timed out after 30s");
    }

    #[test]
    fn test_http_without_status_is_network() {
        let err = Error::Http {
            message: "connection refused".to_string(),
            status: None,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());

        let err = Error::Http {
            message: "HTTP 401".to_string(),
            status: Some(401),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cloud_error_display_names_method() {
        let err = Error::Cloud {
            method: "delete_disk".to_string(),
            kind: "Bosh::Clouds::DiskNotFound".to_string(),
            message: "disk-1 not found".to_string(),
            ok_to_retry: false,
        };
        let display = err.to_string();
        assert!(display.contains("delete_disk"));
        assert!(display.contains("disk-1 not found"));
    }
}
