//! Batch consolidation over result files as the engine writes them.

use std::path::Path;

use agentgov_core::reporting::write_json_pretty;
use agentgov_core::{
    consolidate_dir, write_report, ConsolidatedReport, OverallStatus, ResultFile,
};
use audit_trail::{ActionDescriptor, AuditRecord, ConfidenceAssessment};

fn write_result(dir: &Path, name: &str, agent: &str, score: f64) -> AuditRecord {
    let record = AuditRecord::new(
        format!("pr-{name}"),
        agent,
        ActionDescriptor::new("code_review", format!("Performed code_review on PR #{name}.")),
        ConfidenceAssessment::from_score(score, "scripted"),
        Vec::new(),
    );
    write_json_pretty(
        &dir.join(format!("{name}-{agent}-code_review-result.json")),
        &ResultFile::success(record.clone()),
    )
    .unwrap();
    record
}

#[tokio::test]
async fn empty_directory_is_a_successful_batch() {
    let dir = tempfile::tempdir().unwrap();
    let report = consolidate_dir(dir.path()).await.unwrap();

    assert!(report.passed());
    assert_eq!(report.summary.total_agents_processed, 0);
    assert_eq!(report.summary.message, "No agent result files found.");
    assert!(report.detailed_reports.is_empty());
}

#[tokio::test]
async fn missing_directory_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let report = consolidate_dir(&dir.path().join("never-created"))
        .await
        .unwrap();
    assert!(report.passed());
    assert_eq!(report.summary.total_agents_processed, 0);
}

#[tokio::test]
async fn confident_batch_passes_and_ignores_other_files() {
    let dir = tempfile::tempdir().unwrap();
    write_result(dir.path(), "1", "openai", 0.95);
    write_result(dir.path(), "2", "ollama", 0.9);
    std::fs::write(dir.path().join("1-openai-code_review-output.txt"), "diff").unwrap();
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

    let report = consolidate_dir(dir.path()).await.unwrap();

    assert!(report.passed());
    assert_eq!(report.summary.total_agents_processed, 2);
    assert_eq!(report.summary.successful_agents, 2);
    assert_eq!(report.summary.failed_agents, 0);
    assert!(!report.summary.overall_human_oversight_required);
    assert!(!report.summary.overall_escalation_triggered);
    assert_eq!(report.detailed_reports[0]["agent_id"], "openai");
    assert_eq!(report.detailed_reports[1]["agent_id"], "ollama");
}

#[tokio::test]
async fn medium_confidence_raises_oversight_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    write_result(dir.path(), "1", "openai", 0.95);
    write_result(dir.path(), "2", "anthropic", 0.7);

    let report = consolidate_dir(dir.path()).await.unwrap();

    assert!(report.passed());
    assert!(report.summary.overall_human_oversight_required);
    assert!(!report.summary.overall_escalation_triggered);
}

#[tokio::test]
async fn malformed_files_are_skipped_and_fail_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_result(dir.path(), "1", "openai", 0.95);

    let mut missing_flags = serde_json::to_value(ResultFile::success(AuditRecord::new(
        "pr-2",
        "ollama",
        ActionDescriptor::new("code_review", "Performed code_review on PR #2."),
        ConfidenceAssessment::from_score(0.95, "scripted"),
        Vec::new(),
    )))
    .unwrap();
    missing_flags.as_object_mut().unwrap().remove("flags");
    write_json_pretty(
        &dir.path().join("2-ollama-code_review-result.json"),
        &missing_flags,
    )
    .unwrap();
    std::fs::write(dir.path().join("3-anthropic-code_review-result.json"), "not json").unwrap();

    let report = consolidate_dir(dir.path()).await.unwrap();

    assert!(!report.passed());
    assert_eq!(report.summary.overall_status, OverallStatus::Failure);
    assert_eq!(report.summary.total_agents_processed, 3);
    assert_eq!(report.summary.successful_agents, 1);
    assert_eq!(report.summary.failed_agents, 2);
    assert_eq!(report.detailed_reports.len(), 1);
    assert_eq!(report.skipped_files.len(), 2);
    assert!(report.skipped_files[0].reason.contains("flags"));
    assert!(report.skipped_files[1].reason.starts_with("could not parse file"));
}

#[tokio::test]
async fn written_report_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    write_result(&logs, "1", "openai", 0.3);

    let report = consolidate_dir(&logs).await.unwrap();
    assert!(!report.passed());
    assert!(report.summary.overall_escalation_triggered);

    let out = dir.path().join("reports").join("consolidated_report.json");
    write_report(&out, &report).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.ends_with('\n'));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["summary"]["overall_status"], "failure");

    let back: ConsolidatedReport = serde_json::from_str(&text).unwrap();
    assert_eq!(back.summary.total_agents_processed, 1);
    assert_eq!(back.detailed_reports, report.detailed_reports);
}
