//! Authority tiers gating which tasks an agent may be selected for.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Ordered permission tier: `CONTRIBUTOR < ASSISTANT < ARCHITECT`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorityLevel {
    #[default]
    Contributor,
    Assistant,
    Architect,
}

impl AuthorityLevel {
    /// All tiers, lowest first.
    pub const ALL: [AuthorityLevel; 3] = [Self::Contributor, Self::Assistant, Self::Architect];

    /// Whether an agent holding `self` may act at `required`.
    pub fn satisfies(self, required: AuthorityLevel) -> bool {
        self >= required
    }
}

impl std::fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Contributor => "CONTRIBUTOR",
            Self::Assistant => "ASSISTANT",
            Self::Architect => "ARCHITECT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AuthorityLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONTRIBUTOR" => Ok(Self::Contributor),
            "ASSISTANT" => Ok(Self::Assistant),
            "ARCHITECT" => Ok(Self::Architect),
            other => Err(ConfigError::InvalidField {
                field: "required_authority".to_string(),
                reason: format!("unknown authority level '{other}'"),
            }),
        }
    }
}
