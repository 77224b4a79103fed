//! Divergence detection across outputs produced for the same task.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::obs;

/// `true` iff more than one output was supplied and they are not all
/// byte-for-byte identical.
pub fn detect_conflict<S: AsRef<str>>(outputs: &[S]) -> bool {
    if outputs.len() < 2 {
        return false;
    }
    let distinct: HashSet<&str> = outputs.iter().map(AsRef::as_ref).collect();
    distinct.len() > 1
}

/// What was escalated. Carried on the delegation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub task_id: String,
    /// Agents whose outputs were compared, in invocation order.
    pub agents: Vec<String>,
    pub distinct_outputs: usize,
    pub detected_at: DateTime<Utc>,
}

/// Where escalations are forwarded beyond the log.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn escalate(&self, report: &ConflictReport);
}

/// Only the `conflict.escalated` log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEscalationSink;

#[async_trait]
impl EscalationSink for TracingEscalationSink {
    async fn escalate(&self, report: &ConflictReport) {
        match serde_json::to_string(report) {
            Ok(json) => tracing::warn!(report = %json, "conflict escalated"),
            Err(_) => tracing::warn!(task_id = %report.task_id, "conflict escalated"),
        }
    }
}

/// Keeps every escalation in memory.
#[derive(Debug, Default)]
pub struct MemoryEscalationSink {
    reports: Mutex<Vec<ConflictReport>>,
}

impl MemoryEscalationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ConflictReport> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EscalationSink for MemoryEscalationSink {
    async fn escalate(&self, report: &ConflictReport) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
    }
}

/// Detects divergence and escalates it. Escalation never halts the caller.
#[derive(Clone)]
pub struct ConflictResolver {
    sink: Arc<dyn EscalationSink>,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(Arc::new(TracingEscalationSink))
    }
}

impl ConflictResolver {
    pub fn new(sink: Arc<dyn EscalationSink>) -> Self {
        Self { sink }
    }

    pub fn detect_conflict<S: AsRef<str>>(&self, outputs: &[S]) -> bool {
        detect_conflict(outputs)
    }

    pub async fn escalate(&self, report: &ConflictReport) {
        obs::emit_conflict_escalated(&report.task_id, &report.agents, report.distinct_outputs);
        self.sink.escalate(report).await;
    }

    /// Compare `(agent, output)` pairs; escalate and return the report when
    /// they diverge.
    pub async fn resolve(&self, task_id: &str, outputs: &[(String, String)]) -> Option<ConflictReport> {
        let texts: Vec<&str> = outputs.iter().map(|(_, out)| out.as_str()).collect();
        if !self.detect_conflict(&texts) {
            return None;
        }
        let distinct: HashSet<&str> = texts.iter().copied().collect();
        let report = ConflictReport {
            task_id: task_id.to_string(),
            agents: outputs.iter().map(|(agent, _)| agent.clone()).collect(),
            distinct_outputs: distinct.len(),
            detected_at: Utc::now(),
        };
        self.escalate(&report).await;
        Some(report)
    }
}

impl std::fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_or_identical_outputs_do_not_conflict() {
        assert!(!detect_conflict::<&str>(&[]));
        assert!(!detect_conflict(&["a"]));
        assert!(!detect_conflict(&["a", "a", "a"]));
    }

    #[test]
    fn any_byte_difference_conflicts() {
        assert!(detect_conflict(&["a", "a "]));
        assert!(detect_conflict(&["x", "y", "x"]));
    }

    #[tokio::test]
    async fn divergent_outputs_are_escalated() {
        let sink = Arc::new(MemoryEscalationSink::new());
        let resolver = ConflictResolver::new(sink.clone());
        let outputs = vec![
            ("openai".to_string(), "fn a()".to_string()),
            ("google_ai".to_string(), "fn b()".to_string()),
            ("anthropic".to_string(), "fn a()".to_string()),
        ];

        let report = resolver.resolve("task-1", &outputs).await.unwrap();
        assert_eq!(report.agents, ["openai", "google_ai", "anthropic"]);
        assert_eq!(report.distinct_outputs, 2);
        assert_eq!(sink.reports(), vec![report]);
    }

    #[tokio::test]
    async fn agreement_is_not_escalated() {
        let sink = Arc::new(MemoryEscalationSink::new());
        let resolver = ConflictResolver::new(sink.clone());
        let outputs = vec![
            ("openai".to_string(), "same".to_string()),
            ("google_ai".to_string(), "same".to_string()),
        ];
        assert!(resolver.resolve("task-1", &outputs).await.is_none());
        assert!(sink.reports().is_empty());
    }
}
