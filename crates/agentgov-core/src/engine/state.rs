//! Delegation states and outcomes.

use std::fmt;

use audit_trail::AuditRecord;
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictReport;
use crate::domain::AuthorityLevel;
use crate::governance::Denial;
use crate::provider::ProviderError;
use crate::reporting::ArtifactPaths;

/// ```text
/// LOADED → AGENT_SELECTED → EXECUTED → ASSESSED → LOGGED
///    ↓           ↓                          ↓
/// SELECTION_FAILED  EXECUTION_FAILED   LOG_WRITE_FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationState {
    Loaded,
    AgentSelected,
    Executed,
    Assessed,
    Logged,
    SelectionFailed,
    ExecutionFailed,
    LogWriteFailed,
}

impl DelegationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Logged | Self::SelectionFailed | Self::ExecutionFailed | Self::LogWriteFailed
        )
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_transition_to(self, next: Self) -> bool {
        use DelegationState::*;
        matches!(
            (self, next),
            (Loaded, AgentSelected)
                | (Loaded, SelectionFailed)
                | (AgentSelected, Executed)
                | (AgentSelected, ExecutionFailed)
                | (Executed, Assessed)
                | (Assessed, Logged)
                | (Assessed, LogWriteFailed)
        )
    }
}

impl fmt::Display for DelegationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loaded => "LOADED",
            Self::AgentSelected => "AGENT_SELECTED",
            Self::Executed => "EXECUTED",
            Self::Assessed => "ASSESSED",
            Self::Logged => "LOGGED",
            Self::SelectionFailed => "SELECTION_FAILED",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::LogWriteFailed => "LOG_WRITE_FAILED",
        };
        write!(f, "{s}")
    }
}

/// Why a delegation stopped before producing a record. Never fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum AbortReason {
    #[error("no suitable agent available for {task_type} task requiring {required}")]
    NoEligibleAgent {
        task_type: String,
        required: AuthorityLevel,
    },

    #[error("agent '{agent}' is not configured for task type '{task_type}'")]
    CapabilityMismatch { agent: String, task_type: String },

    #[error(transparent)]
    Denied(#[from] Denial),

    #[error("agent '{agent}' failed: {source}")]
    Provider {
        agent: String,
        #[source]
        source: ProviderError,
    },
}

impl AbortReason {
    pub fn state(&self) -> DelegationState {
        match self {
            Self::NoEligibleAgent { .. } | Self::CapabilityMismatch { .. } | Self::Denied(_) => {
                DelegationState::SelectionFailed
            }
            Self::Provider { .. } => DelegationState::ExecutionFailed,
        }
    }
}

/// A delegation that reached `LOGGED`.
#[derive(Debug, Clone)]
pub struct LoggedDelegation {
    pub record: AuditRecord,
    pub output: String,
    /// Present when second opinions diverged.
    pub conflict: Option<ConflictReport>,
    /// Present when an output directory is configured.
    pub artifacts: Option<ArtifactPaths>,
}

#[derive(Debug)]
pub enum DelegationOutcome {
    Logged(Box<LoggedDelegation>),
    Aborted(AbortReason),
}

impl DelegationOutcome {
    pub fn state(&self) -> DelegationState {
        match self {
            Self::Logged(_) => DelegationState::Logged,
            Self::Aborted(reason) => reason.state(),
        }
    }

    pub fn logged(&self) -> Option<&LoggedDelegation> {
        match self {
            Self::Logged(done) => Some(&**done),
            Self::Aborted(_) => None,
        }
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Self::Aborted(reason) => Some(reason),
            Self::Logged(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_a_chain_of_valid_transitions() {
        use DelegationState::*;
        let path = [Loaded, AgentSelected, Executed, Assessed, Logged];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Logged.is_terminal());
        assert!(!Executed.is_terminal());
    }

    #[test]
    fn executed_cannot_fail_or_skip() {
        use DelegationState::*;
        assert!(!Executed.can_transition_to(ExecutionFailed));
        assert!(!Executed.can_transition_to(Logged));
        assert!(!Loaded.can_transition_to(Executed));
    }

    #[test]
    fn abort_reasons_map_to_failure_states() {
        let none = AbortReason::NoEligibleAgent {
            task_type: "architecture_review".into(),
            required: AuthorityLevel::Architect,
        };
        assert_eq!(none.state(), DelegationState::SelectionFailed);

        let provider = AbortReason::Provider {
            agent: "openai".into(),
            source: ProviderError::Backend("503".into()),
        };
        assert_eq!(provider.state(), DelegationState::ExecutionFailed);
        assert_eq!(provider.to_string(), "agent 'openai' failed: backend request failed: 503");
    }

    #[test]
    fn state_serialises_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&DelegationState::LogWriteFailed).unwrap(),
            "\"LOG_WRITE_FAILED\""
        );
        assert_eq!(DelegationState::AgentSelected.to_string(), "AGENT_SELECTED");
    }
}
