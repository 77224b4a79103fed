//! Roll many result files into one pass/fail report.
//!
//! Each `*-result.json` is read and validated on its own; a file that fails
//! is skipped and counted as failed. The batch fails when any file was
//! skipped or any consumed record escalated. `status` only feeds the
//! success/failure counts, and a missing `status` counts as failure.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::obs;
use crate::reporting::{self, ArtifactError, RESULT_SUFFIX, STATUS_SUCCESS};

pub const EMPTY_MESSAGE: &str = "No agent result files found.";
pub const SUCCESS_MESSAGE: &str = "All agent reports consolidated successfully.";
pub const FAILURE_MESSAGE: &str = "Consolidation completed with failures.";
pub const ESCALATION_MESSAGE: &str =
    "Escalation triggered by one or more agents; human intervention required.";

const REQUIRED_FIELDS: [&str; 7] = [
    "log_id",
    "timestamp",
    "task_id",
    "agent_id",
    "action",
    "confidence",
    "flags",
];

/// Why a result document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("missing top-level field '{0}'")]
    MissingField(&'static str),

    #[error("invalid or missing 'confidence.score'")]
    ConfidenceScore,

    #[error("invalid or missing 'flags.human_oversight_required'")]
    OversightFlag,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsolidationError {
    #[error("invalid result file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to write consolidated report: {0}")]
    Write(#[from] ArtifactError),
}

pub type ConsolidationResult<T> = std::result::Result<T, ConsolidationError>;

/// Check the fields every consumed record must carry.
pub fn validate_result_record(doc: &Value) -> Result<(), SchemaViolation> {
    let obj = doc.as_object().ok_or(SchemaViolation::NotAnObject)?;
    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(SchemaViolation::MissingField(field));
        }
    }
    obj["confidence"]
        .get("score")
        .filter(|s| s.is_number())
        .ok_or(SchemaViolation::ConfidenceScore)?;
    obj["flags"]
        .get("human_oversight_required")
        .filter(|f| f.is_boolean())
        .ok_or(SchemaViolation::OversightFlag)?;
    Ok(())
}

/// `*-result.json` files directly under `dir`, sorted. A missing directory
/// has no result files.
pub fn discover_result_files(dir: &Path) -> ConsolidationResult<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{escaped}/*{RESULT_SUFFIX}");
    let entries = glob::glob(&pattern).map_err(|source| ConsolidationError::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "unreadable entry while scanning for result files");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    pub report_generated_at: DateTime<Utc>,
    pub total_agents_processed: u64,
    pub successful_agents: u64,
    pub failed_agents: u64,
    pub overall_status: OverallStatus,
    pub overall_human_oversight_required: bool,
    pub overall_escalation_triggered: bool,
    pub message: String,
}

/// A candidate file left out of `detailed_reports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub summary: ConsolidationSummary,
    /// Validated records, verbatim, in candidate order.
    pub detailed_reports: Vec<Value>,
    #[serde(default)]
    pub skipped_files: Vec<SkippedFile>,
}

impl ConsolidatedReport {
    pub fn passed(&self) -> bool {
        self.summary.overall_status == OverallStatus::Success
    }
}

async fn load_candidate(path: &Path) -> Result<Value, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("could not read file: {e}"))?;
    let doc: Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("could not parse file: {e}"))?;
    validate_result_record(&doc).map_err(|e| format!("schema validation failed: {e}"))?;
    Ok(doc)
}

/// Validate and aggregate `candidates`. Files are read concurrently; the
/// report lists them in the order given.
pub async fn consolidate(candidates: &[PathBuf]) -> ConsolidatedReport {
    let loaded = join_all(candidates.iter().map(|p| load_candidate(p))).await;

    let mut detailed_reports = Vec::new();
    let mut skipped_files = Vec::new();
    let mut successful = 0u64;
    let mut failed = 0u64;
    let mut oversight = false;
    let mut escalation = false;

    for (path, result) in candidates.iter().zip(loaded) {
        match result {
            Ok(doc) => {
                if doc.get("status").and_then(Value::as_str) == Some(STATUS_SUCCESS) {
                    successful += 1;
                } else {
                    failed += 1;
                }
                let flags = &doc["flags"];
                let escalated = flags["escalation_triggered"].as_bool().unwrap_or(false);
                oversight |= flags["human_oversight_required"].as_bool().unwrap_or(false) || escalated;
                escalation |= escalated;
                detailed_reports.push(doc);
            }
            Err(reason) => {
                warn!(path = %path.display(), reason = %reason, "skipping result file");
                failed += 1;
                skipped_files.push(SkippedFile {
                    path: path.clone(),
                    reason,
                });
            }
        }
    }

    let passed = skipped_files.is_empty() && !escalation;
    let message = if candidates.is_empty() {
        EMPTY_MESSAGE
    } else if !skipped_files.is_empty() {
        FAILURE_MESSAGE
    } else if escalation {
        ESCALATION_MESSAGE
    } else {
        SUCCESS_MESSAGE
    };

    let summary = ConsolidationSummary {
        report_generated_at: Utc::now(),
        total_agents_processed: candidates.len() as u64,
        successful_agents: successful,
        failed_agents: failed,
        overall_status: if passed {
            OverallStatus::Success
        } else {
            OverallStatus::Failure
        },
        overall_human_oversight_required: oversight,
        overall_escalation_triggered: escalation,
        message: message.to_string(),
    };
    obs::emit_consolidation_finished(summary.total_agents_processed, successful, failed, passed);
    info!(
        oversight = oversight,
        escalation = escalation,
        "consolidation complete"
    );

    ConsolidatedReport {
        summary,
        detailed_reports,
        skipped_files,
    }
}

/// Discover and consolidate every result file in `dir`.
pub async fn consolidate_dir(dir: &Path) -> ConsolidationResult<ConsolidatedReport> {
    let files = discover_result_files(dir)?;
    info!(dir = %dir.display(), files = files.len(), "consolidating agent results");
    Ok(consolidate(&files).await)
}

pub fn write_report(path: &Path, report: &ConsolidatedReport) -> ConsolidationResult<()> {
    reporting::write_json_pretty(path, report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(status: Option<&str>, oversight: bool, escalation: bool) -> Value {
        let mut doc = json!({
            "log_id": "00000000-0000-4000-8000-000000000001",
            "timestamp": "2026-01-01T00:00:00Z",
            "task_id": "pr-1",
            "agent_id": "openai",
            "action": { "type": "code_review", "summary": "Performed code_review on PR #1." },
            "confidence": { "score": 0.95, "level": "HIGH", "justification": "ok" },
            "flags": { "human_oversight_required": oversight, "escalation_triggered": escalation },
            "artifacts": []
        });
        if let Some(status) = status {
            doc["status"] = json!(status);
        }
        doc
    }

    #[test]
    fn complete_record_validates() {
        assert_eq!(validate_result_record(&record(Some("success"), false, false)), Ok(()));
    }

    #[test]
    fn each_required_field_is_enforced() {
        for field in REQUIRED_FIELDS {
            let mut doc = record(Some("success"), false, false);
            doc.as_object_mut().unwrap().remove(field);
            assert_eq!(
                validate_result_record(&doc),
                Err(SchemaViolation::MissingField(field))
            );
        }
    }

    #[test]
    fn nested_fields_are_enforced() {
        let mut doc = record(None, false, false);
        doc["confidence"] = json!({ "level": "HIGH" });
        assert_eq!(validate_result_record(&doc), Err(SchemaViolation::ConfidenceScore));

        let mut doc = record(None, false, false);
        doc["flags"] = json!({ "escalation_triggered": false });
        assert_eq!(validate_result_record(&doc), Err(SchemaViolation::OversightFlag));

        assert_eq!(validate_result_record(&json!([1])), Err(SchemaViolation::NotAnObject));
    }

    #[tokio::test]
    async fn no_candidates_is_an_empty_success() {
        let report = consolidate(&[]).await;
        assert!(report.passed());
        assert_eq!(report.summary.total_agents_processed, 0);
        assert_eq!(report.summary.failed_agents, 0);
        assert!(!report.summary.overall_escalation_triggered);
        assert_eq!(report.summary.message, EMPTY_MESSAGE);
    }

    #[tokio::test]
    async fn missing_status_counts_as_failed_but_does_not_fail_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-result.json");
        std::fs::write(&path, record(None, true, false).to_string()).unwrap();

        let report = consolidate(&[path]).await;
        assert_eq!(report.summary.successful_agents, 0);
        assert_eq!(report.summary.failed_agents, 1);
        assert!(report.summary.overall_human_oversight_required);
        assert!(report.passed());
        assert_eq!(report.detailed_reports.len(), 1);
    }

    #[tokio::test]
    async fn discovery_only_matches_result_suffix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["x-result.json", "x-output.txt", "notes.json", "y-result.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let files = discover_result_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["x-result.json", "y-result.json"]);
    }

    #[test]
    fn missing_directory_has_no_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let files = discover_result_files(&dir.path().join("absent")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn summary_keeps_wire_field_names() {
        let summary = ConsolidationSummary {
            report_generated_at: Utc::now(),
            total_agents_processed: 1,
            successful_agents: 1,
            failed_agents: 0,
            overall_status: OverallStatus::Success,
            overall_human_oversight_required: false,
            overall_escalation_triggered: false,
            message: SUCCESS_MESSAGE.to_string(),
        };
        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value["overall_status"], "success");
        for key in [
            "report_generated_at",
            "total_agents_processed",
            "successful_agents",
            "failed_agents",
            "overall_human_oversight_required",
            "overall_escalation_triggered",
            "message",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
