//! Structured lifecycle events for delegations and consolidation runs.
//!
//! Every event carries an `event` field (`delegation.started`,
//! `delegation.logged`, `conflict.escalated`, ...) so log pipelines can
//! filter on it without parsing messages.

use tracing::{info, warn, Span};

/// Span tagged with the task id, for instrumenting one delegation.
///
/// ```ignore
/// engine.run(task).instrument(delegation_span("pr-42")).await;
/// // every event inside carries task_id = "pr-42"
/// ```
pub fn delegation_span(task_id: &str) -> Span {
    tracing::info_span!("agentgov.delegation", task_id = %task_id)
}

pub fn emit_delegation_started(task_id: &str, task_type: &str, required: &str) {
    info!(
        event = "delegation.started",
        task_id = %task_id,
        task_type = %task_type,
        required_authority = %required,
    );
}

pub fn emit_agent_selected(task_id: &str, agent: &str) {
    info!(event = "delegation.agent_selected", task_id = %task_id, agent = %agent);
}

pub fn emit_executed(task_id: &str, agent: &str, chat_mode: bool, output_bytes: usize) {
    info!(
        event = "delegation.executed",
        task_id = %task_id,
        agent = %agent,
        chat_mode = chat_mode,
        output_bytes = output_bytes,
    );
}

pub fn emit_assessed(task_id: &str, agent: &str, level: &str, score: f64) {
    info!(
        event = "delegation.assessed",
        task_id = %task_id,
        agent = %agent,
        level = %level,
        score = score,
    );
}

pub fn emit_logged(task_id: &str, log_id: &str, oversight: bool, escalation: bool) {
    info!(
        event = "delegation.logged",
        task_id = %task_id,
        log_id = %log_id,
        human_oversight_required = oversight,
        escalation_triggered = escalation,
    );
}

/// Delegation ended without an audit record (warning level).
pub fn emit_aborted(task_id: &str, state: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "delegation.aborted", task_id = %task_id, state = %state, reason = %reason);
}

pub fn emit_conflict_escalated(task_id: &str, agents: &[String], distinct_outputs: usize) {
    warn!(
        event = "conflict.escalated",
        task_id = %task_id,
        agents = %agents.join(","),
        distinct_outputs = distinct_outputs,
    );
}

pub fn emit_consolidation_finished(total: u64, succeeded: u64, failed: u64, passed: bool) {
    info!(
        event = "consolidation.finished",
        total = total,
        succeeded = succeeded,
        failed = failed,
        passed = passed,
    );
}
