//! Error types for audit-trail

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or rewriting an audit store.
///
/// A corrupt store is not an error: it is reset to an empty trail with a
/// warning. Only conditions that would leave a delegation unrecorded surface here.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The store exists but could not be read
    #[error("failed to read audit store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store could not be rewritten
    #[error("failed to write audit store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded for the store
    #[error("failed to encode audit record: {0}")]
    Encode(String),

    /// Another writer held the store lock for longer than the configured wait
    #[error("timed out after {waited_ms}ms waiting for audit store lock {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    /// The blocking writer task was cancelled or panicked
    #[error("audit writer task failed: {0}")]
    Task(String),
}

impl From<serde_yaml::Error> for LedgerError {
    fn from(err: serde_yaml::Error) -> Self {
        LedgerError::Encode(err.to_string())
    }
}

/// Result type for audit store operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_names_the_store() {
        let err = LedgerError::Write {
            path: PathBuf::from("AI_CONTRIB_LOG.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("AI_CONTRIB_LOG.yaml"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn lock_timeout_reports_wait() {
        let err = LedgerError::LockTimeout {
            path: PathBuf::from("trail.yaml.lock"),
            waited_ms: 250,
        };
        assert!(err.to_string().contains("250ms"));
    }
}
