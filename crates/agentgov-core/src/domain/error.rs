//! Configuration error taxonomy.
//!
//! Every variant is fatal to the command that hit it: the orchestrator never
//! guesses a provider, a model or a task it could not load.

use std::path::PathBuf;

/// Errors produced while loading tasks, agent configs and governance files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{what} not found at {path}")]
    NotFound { what: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Read and parse a JSON document, mapping failures onto [`ConfigError`].
pub(crate) fn read_json_document(
    path: &std::path::Path,
    what: &str,
) -> ConfigResult<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                what: what.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Fail with [`ConfigError::MissingField`] unless every field is present and non-null.
pub(crate) fn require_fields(
    doc: &serde_json::Value,
    path: &std::path::Path,
    fields: &[&str],
) -> ConfigResult<()> {
    for field in fields {
        match doc.get(field) {
            Some(v) if !v.is_null() => {}
            _ => {
                return Err(ConfigError::MissingField {
                    path: path.to_path_buf(),
                    field: (*field).to_string(),
                })
            }
        }
    }
    Ok(())
}
