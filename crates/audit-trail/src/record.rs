//! Schema for audit trail entries.
//!
//! The serialized field names are the contract shared with result files and
//! the consolidator: `log_id`, `timestamp`, `task_id`, `agent_id`,
//! `action.{type,summary}`, `confidence.{score,level,justification}`,
//! `flags.{human_oversight_required,escalation_triggered}` and
//! `artifacts[].{type,path}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score at or above which an assessment is `HIGH`.
pub const HIGH_THRESHOLD: f64 = 0.90;

/// Score at or above which an assessment is at least `MEDIUM`.
pub const MEDIUM_THRESHOLD: f64 = 0.60;

/// Categorical confidence derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    /// Reserved for entries recorded without an assessment step.
    Unknown,
}

impl ConfidenceLevel {
    /// Map a score onto `HIGH` / `MEDIUM` / `LOW`.
    ///
    /// Both thresholds are inclusive on their lower bound.
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Parse one of the three labels a worker may return.
    ///
    /// `UNKNOWN` is deliberately not accepted here.
    pub fn parse_assessed(label: &str) -> Option<Self> {
        match label {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A worker's self-reported trust in its own output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub justification: String,
}

impl ConfidenceAssessment {
    /// Score substituted when a worker's assessment cannot be used.
    pub const FALLBACK_SCORE: f64 = 0.65;

    /// Build an assessment whose level is derived from `score`.
    pub fn from_score(score: f64, justification: impl Into<String>) -> Self {
        Self {
            score,
            level: ConfidenceLevel::from_score(score),
            justification: justification.into(),
        }
    }

    /// The fixed MEDIUM assessment used when the worker's response is unusable.
    pub fn fallback(reason: impl std::fmt::Display) -> Self {
        Self {
            score: Self::FALLBACK_SCORE,
            level: ConfidenceLevel::Medium,
            justification: format!(
                "LLM failed to provide structured confidence assessment due to parsing error: \
                 {reason}. Requires human review."
            ),
        }
    }

    /// Placeholder for entries appended without an assessment step.
    pub fn unassessed() -> Self {
        Self {
            score: 0.0,
            level: ConfidenceLevel::Unknown,
            justification: "Confidence not assessed for this entry type.".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct FlagsRepr {
    human_oversight_required: bool,
    #[serde(default)]
    escalation_triggered: bool,
}

/// Oversight decision attached to every record.
///
/// Escalation always implies oversight; both constructors and deserialization
/// normalise towards that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "FlagsRepr")]
pub struct DecisionFlags {
    human_oversight_required: bool,
    escalation_triggered: bool,
}

impl From<FlagsRepr> for DecisionFlags {
    fn from(repr: FlagsRepr) -> Self {
        Self::new(repr.human_oversight_required, repr.escalation_triggered)
    }
}

impl DecisionFlags {
    pub fn new(human_oversight_required: bool, escalation_triggered: bool) -> Self {
        Self {
            human_oversight_required: human_oversight_required || escalation_triggered,
            escalation_triggered,
        }
    }

    /// MEDIUM and LOW require oversight; only LOW escalates.
    pub fn from_level(level: ConfidenceLevel) -> Self {
        match level {
            ConfidenceLevel::High | ConfidenceLevel::Unknown => Self::new(false, false),
            ConfidenceLevel::Medium => Self::new(true, false),
            ConfidenceLevel::Low => Self::new(true, true),
        }
    }

    pub fn human_oversight_required(&self) -> bool {
        self.human_oversight_required
    }

    pub fn escalation_triggered(&self) -> bool {
        self.escalation_triggered
    }
}

/// What the agent did, as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub summary: String,
}

impl ActionDescriptor {
    pub fn new(kind: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            summary: summary.into(),
        }
    }
}

/// Typed reference to something a delegation produced (file path or URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    /// SHA-256 hex of the referenced content, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArtifactRef {
    pub const GENERATED_CONTENT: &'static str = "generated_content";
    pub const LOG_FILE: &'static str = "log_file";
    pub const CONFLICT_REPORT: &'static str = "conflict_report";

    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }
}

/// One immutable entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub log_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub agent_id: String,
    pub action: ActionDescriptor,
    pub confidence: ConfidenceAssessment,
    pub flags: DecisionFlags,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
}

impl AuditRecord {
    /// Create a record whose flags are derived from the assessment level.
    pub fn new(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        action: ActionDescriptor,
        confidence: ConfidenceAssessment,
        artifacts: Vec<ArtifactRef>,
    ) -> Self {
        let flags = DecisionFlags::from_level(confidence.level);
        Self {
            log_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            action,
            confidence,
            flags,
            artifacts,
        }
    }

    /// Create an entry for work that was not self-assessed.
    pub fn unassessed(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        action: ActionDescriptor,
        artifacts: Vec<ArtifactRef>,
    ) -> Self {
        Self::new(
            task_id,
            agent_id,
            action,
            ConfidenceAssessment::unassessed(),
            artifacts,
        )
    }
}
