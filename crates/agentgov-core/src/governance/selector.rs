//! Picks the agent for a task from the available set.
//!
//! Candidates come from the preference list of the required tier, or the
//! caller's available order when the tier has no list. The first candidate
//! that is available and holds enough authority wins. Forbidden actions and
//! capabilities are not consulted here.

use tracing::{debug, warn};

use super::enforcer::PolicyEnforcer;
use super::policy::SelectionPreferences;
use crate::domain::AuthorityLevel;

#[derive(Debug, Clone)]
pub struct AgentSelector {
    enforcer: PolicyEnforcer,
    preferences: SelectionPreferences,
}

impl AgentSelector {
    pub fn new(enforcer: PolicyEnforcer, preferences: SelectionPreferences) -> Self {
        Self {
            enforcer,
            preferences,
        }
    }

    /// Deterministic for fixed inputs. `None` when nothing is eligible.
    pub fn select<S: AsRef<str>>(
        &self,
        task_type: &str,
        required: AuthorityLevel,
        available: &[S],
    ) -> Option<String> {
        let is_available = |name: &str| available.iter().any(|a| a.as_ref() == name);
        let candidates: Vec<&str> = match self.preferences.order_for(required) {
            Some(order) => order.iter().map(String::as_str).collect(),
            None => available.iter().map(AsRef::as_ref).collect(),
        };
        let picked = candidates
            .into_iter()
            .find(|name| is_available(name) && self.enforcer.check_authority(name, required))
            .map(str::to_string);
        match &picked {
            Some(agent) => debug!(task_type, %required, agent = %agent, "agent selected"),
            None => warn!(task_type, %required, "no suitable agent available"),
        }
        picked
    }

    /// Every eligible agent, best first: the tier's preference order, then
    /// any remaining eligible agents in the caller's order. Used to find
    /// second opinions, where agents off the preference list still count.
    pub fn ranked<S: AsRef<str>>(&self, required: AuthorityLevel, available: &[S]) -> Vec<String> {
        let is_available = |name: &str| available.iter().any(|a| a.as_ref() == name);
        let eligible = |name: &str| is_available(name) && self.enforcer.check_authority(name, required);

        let mut ranked: Vec<String> = Vec::new();
        if let Some(order) = self.preferences.order_for(required) {
            for name in order {
                if eligible(name) && !ranked.contains(name) {
                    ranked.push(name.clone());
                }
            }
        }
        for name in available.iter().map(AsRef::as_ref) {
            if eligible(name) && !ranked.iter().any(|r| r == name) {
                ranked.push(name.to_string());
            }
        }
        ranked
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::governance::policy::{AgentPolicy, StaticPolicyStore};

    fn standard() -> AgentSelector {
        AgentSelector::new(
            PolicyEnforcer::new(Arc::new(StaticPolicyStore::standard())),
            SelectionPreferences::standard(),
        )
    }

    #[test]
    fn assistant_task_prefers_openai() {
        let s = standard();
        let picked = s.select("code_generation", AuthorityLevel::Assistant, &["google_ai", "openai"]);
        assert_eq!(picked.as_deref(), Some("openai"));
    }

    #[test]
    fn falls_through_preferences_to_next_available() {
        let s = standard();
        let picked = s.select("code_generation", AuthorityLevel::Assistant, &["google_ai"]);
        assert_eq!(picked.as_deref(), Some("google_ai"));
    }

    #[test]
    fn architect_task_without_architect_agent_selects_nothing() {
        let s = standard();
        let picked = s.select(
            "architecture_review",
            AuthorityLevel::Architect,
            &["openai", "google_ai", "ollama"],
        );
        assert_eq!(picked, None);
    }

    #[test]
    fn tier_without_preferences_uses_available_order() {
        let store = StaticPolicyStore::new([
            AgentPolicy::new("jules", AuthorityLevel::Architect, Vec::<String>::new()),
            AgentPolicy::new("copilot", AuthorityLevel::Contributor, Vec::<String>::new()),
        ]);
        let s = AgentSelector::new(
            PolicyEnforcer::new(Arc::new(store)),
            SelectionPreferences::new(),
        );
        assert_eq!(
            s.select("t", AuthorityLevel::Contributor, &["copilot", "jules"]).as_deref(),
            Some("copilot")
        );
        assert_eq!(
            s.select("t", AuthorityLevel::Architect, &["copilot", "jules"]).as_deref(),
            Some("jules")
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let s = standard();
        let available = ["anthropic", "openai", "ollama"];
        let first = s.select("t", AuthorityLevel::Contributor, &available);
        for _ in 0..10 {
            assert_eq!(s.select("t", AuthorityLevel::Contributor, &available), first);
        }
        assert_eq!(first.as_deref(), Some("ollama"));
    }

    #[test]
    fn ranked_lists_preferences_then_remaining_eligible() {
        let s = standard();
        let ranked = s.ranked(AuthorityLevel::Contributor, &["google_ai", "openai", "ollama"]);
        assert_eq!(ranked, ["ollama", "openai", "google_ai"]);
    }

    #[test]
    fn select_only_considers_the_tier_list() {
        let s = standard();
        // google_ai is eligible for CONTRIBUTOR work but not on that tier's list.
        assert_eq!(s.select("t", AuthorityLevel::Contributor, &["google_ai"]), None);
        assert_eq!(
            s.select("t", AuthorityLevel::Contributor, &["google_ai", "anthropic"]).as_deref(),
            Some("anthropic")
        );
    }
}
