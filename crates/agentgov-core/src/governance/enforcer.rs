//! Authority and forbidden-action checks.
//!
//! Fail-closed: an agent without a policy is never authorised and every
//! action is treated as forbidden for it. Unknown agents are not an error.

use std::sync::Arc;

use super::policy::PolicySource;
use crate::domain::AuthorityLevel;

/// Why an agent was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("agent '{agent}' has no policy")]
    UnknownAgent { agent: String },

    #[error("agent '{agent}' holds {held} but {required} is required")]
    InsufficientAuthority {
        agent: String,
        held: AuthorityLevel,
        required: AuthorityLevel,
    },

    #[error("action '{action}' is forbidden for agent '{agent}'")]
    ForbiddenAction { agent: String, action: String },
}

/// Answers authority and action questions against a [`PolicySource`].
#[derive(Clone)]
pub struct PolicyEnforcer {
    source: Arc<dyn PolicySource>,
}

impl PolicyEnforcer {
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self { source }
    }

    /// `true` iff the agent's authority is at least `required`.
    pub fn check_authority(&self, agent: &str, required: AuthorityLevel) -> bool {
        self.source
            .policy(agent)
            .is_some_and(|p| p.authority.satisfies(required))
    }

    /// `false` iff `action` is forbidden for the agent (or the agent is unknown).
    pub fn validate_action(&self, agent: &str, action: &str) -> bool {
        self.source
            .policy(agent)
            .is_some_and(|p| !p.forbids(action))
    }

    /// Combined check used before execution, reporting the first refusal.
    pub fn authorize(
        &self,
        agent: &str,
        required: AuthorityLevel,
        action: &str,
    ) -> Result<(), Denial> {
        let policy = self.source.policy(agent).ok_or_else(|| Denial::UnknownAgent {
            agent: agent.to_string(),
        })?;
        if !policy.authority.satisfies(required) {
            return Err(Denial::InsufficientAuthority {
                agent: agent.to_string(),
                held: policy.authority,
                required,
            });
        }
        if policy.forbids(action) {
            return Err(Denial::ForbiddenAction {
                agent: agent.to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for PolicyEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEnforcer").finish_non_exhaustive()
    }
}
