//! Agent policies and the sources they are read from.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{read_json_document, ConfigError, ConfigResult};
use crate::domain::AuthorityLevel;

/// Authority and restrictions for one agent identity. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPolicy {
    pub agent: String,
    pub authority: AuthorityLevel,
    #[serde(default)]
    pub forbidden_actions: BTreeSet<String>,
}

impl AgentPolicy {
    pub fn new<I, S>(agent: impl Into<String>, authority: AuthorityLevel, forbidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agent: agent.into(),
            authority,
            forbidden_actions: forbidden.into_iter().map(Into::into).collect(),
        }
    }

    pub fn forbids(&self, action: &str) -> bool {
        self.forbidden_actions.contains(action)
    }
}

/// Where policies come from. Swap implementations (file, service, fixture)
/// without touching the enforcer or the engine.
pub trait PolicySource: Send + Sync {
    /// Policy for `agent`, or `None` when the agent is unknown.
    fn policy(&self, agent: &str) -> Option<AgentPolicy>;
}

/// Policy store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyStore {
    policies: HashMap<String, AgentPolicy>,
}

impl StaticPolicyStore {
    pub fn new(policies: impl IntoIterator<Item = AgentPolicy>) -> Self {
        Self {
            policies: policies
                .into_iter()
                .map(|p| (p.agent.clone(), p))
                .collect(),
        }
    }

    /// The built-in governance policies.
    ///
    /// | Agent     | Authority   | Forbidden                  |
    /// |-----------|-------------|----------------------------|
    /// | openai    | ASSISTANT   | direct_code_merge          |
    /// | google_ai | ASSISTANT   | direct_code_merge          |
    /// | anthropic | CONTRIBUTOR | security_review_override   |
    /// | ollama    | CONTRIBUTOR | sensitive_data_processing  |
    pub fn standard() -> Self {
        Self::new([
            AgentPolicy::new("openai", AuthorityLevel::Assistant, ["direct_code_merge"]),
            AgentPolicy::new("google_ai", AuthorityLevel::Assistant, ["direct_code_merge"]),
            AgentPolicy::new(
                "anthropic",
                AuthorityLevel::Contributor,
                ["security_review_override"],
            ),
            AgentPolicy::new(
                "ollama",
                AuthorityLevel::Contributor,
                ["sensitive_data_processing"],
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl PolicySource for StaticPolicyStore {
    fn policy(&self, agent: &str) -> Option<AgentPolicy> {
        self.policies.get(agent).cloned()
    }
}

/// Ordered agent preference per authority tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionPreferences {
    tiers: BTreeMap<AuthorityLevel, Vec<String>>,
}

impl SelectionPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier<I, S>(mut self, tier: AuthorityLevel, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tiers
            .insert(tier, agents.into_iter().map(Into::into).collect());
        self
    }

    /// ARCHITECT → google_ai; ASSISTANT → openai, google_ai;
    /// CONTRIBUTOR → ollama, anthropic, openai.
    pub fn standard() -> Self {
        Self::new()
            .with_tier(AuthorityLevel::Architect, ["google_ai"])
            .with_tier(AuthorityLevel::Assistant, ["openai", "google_ai"])
            .with_tier(AuthorityLevel::Contributor, ["ollama", "anthropic", "openai"])
    }

    pub fn order_for(&self, tier: AuthorityLevel) -> Option<&[String]> {
        self.tiers.get(&tier).map(Vec::as_slice)
    }
}

/// Policies plus selection preferences, as loaded from a governance file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub policies: Vec<AgentPolicy>,
    #[serde(default)]
    pub preferences: SelectionPreferences,
}

impl GovernanceConfig {
    pub fn standard() -> Self {
        Self {
            policies: StaticPolicyStore::standard().policies.into_values().collect(),
            preferences: SelectionPreferences::standard(),
        }
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let doc = read_json_document(path, "governance policy file")?;
        let config: Self = serde_json::from_value(doc).map_err(|e| ConfigError::InvalidField {
            field: "policies".to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;

        let mut seen = BTreeSet::new();
        for policy in &config.policies {
            if !seen.insert(policy.agent.as_str()) {
                return Err(ConfigError::InvalidField {
                    field: "policies".to_string(),
                    reason: format!("duplicate policy for agent '{}'", policy.agent),
                });
            }
        }
        Ok(config)
    }

    pub fn policy_store(&self) -> StaticPolicyStore {
        StaticPolicyStore::new(self.policies.iter().cloned())
    }
}
