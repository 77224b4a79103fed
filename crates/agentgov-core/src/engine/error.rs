use audit_trail::LedgerError;
use uuid::Uuid;

use super::state::DelegationState;
use crate::reporting::ArtifactError;

/// Fatal delegation failures. The run must exit non-zero.
#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    #[error("no configuration for agent '{agent}'")]
    UnconfiguredAgent { agent: String },

    #[error("audit log write failed: {0}")]
    LogWrite(#[source] LedgerError),

    #[error("failed to write delegation artifact: {0}")]
    Artifact(#[from] ArtifactError),

    /// The record is in the trail but its result file never appeared.
    #[error("delegation logged as {log_id} but its result file was not published: {source}")]
    ResultUnpublished {
        log_id: Uuid,
        #[source]
        source: ArtifactError,
    },

    #[error("delegation task panicked or was cancelled: {0}")]
    Join(String),
}

impl DelegationError {
    pub fn state(&self) -> DelegationState {
        match self {
            Self::UnconfiguredAgent { .. } => DelegationState::SelectionFailed,
            Self::ResultUnpublished { .. } => DelegationState::Logged,
            Self::LogWrite(_) | Self::Artifact(_) | Self::Join(_) => DelegationState::LogWriteFailed,
        }
    }
}

pub type DelegationResult<T> = std::result::Result<T, DelegationError>;
