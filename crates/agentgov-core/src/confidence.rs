//! Worker self-assessment of produced output.
//!
//! [`assess`] never fails: any unusable response, and any provider error
//! during the assessment call, yields [`ConfidenceAssessment::fallback`].

use audit_trail::{ConfidenceAssessment, ConfidenceLevel};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::domain::ModelParams;
use crate::provider::ProviderCapability;

pub const ASSESSMENT_TEMPERATURE: f64 = 0.1;

/// Why a worker's assessment response was rejected.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentParseError {
    #[error("response is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("response missing required confidence key '{0}'")]
    MissingKey(&'static str),

    #[error("confidence score is not a number")]
    ScoreNotNumeric,

    #[error("confidence score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),

    #[error("confidence level '{0}' is not one of LOW, MEDIUM, HIGH")]
    InvalidLevel(String),

    #[error("justification is not a string")]
    JustificationNotString,
}

pub fn assessment_prompt(task_prompt: &str, agent_output: &str) -> String {
    format!(
        "You are an expert AI tasked with self-assessing the confidence of a generated output.
Assess the following `AGENT_OUTPUT` in relation to the original `TASK_PROMPT`.

TASK_PROMPT:
{task_prompt}

AGENT_OUTPUT:
{agent_output}

Provide a confidence score between 0.0 and 1.0 (float) and a concise justification for this score.
Also, classify the confidence level as 'LOW', 'MEDIUM', or 'HIGH' based on these rules:
- HIGH: Score >= 0.90 (Task requirements clear, output meets all criteria with high certainty.)
- MEDIUM: 0.60 <= Score < 0.90 (Task completed, but minor ambiguities, assumptions, or potential edge cases identified.)
- LOW: Score < 0.60 (Significant uncertainty, potential conflicts, or inability to fully address the prompt. Requires escalation.)

Respond ONLY with a JSON object containing:
{{
  \"score\": <float>,
  \"level\": \"LOW\" | \"MEDIUM\" | \"HIGH\",
  \"justification\": \"<string>\"
}}
"
    )
}

/// Generation parameters for the assessment call.
pub fn assessment_params() -> ModelParams {
    let mut params = ModelParams::new();
    params.insert("temperature".to_string(), json!(ASSESSMENT_TEMPERATURE));
    params.insert(
        "response_format".to_string(),
        json!({ "type": "json_object" }),
    );
    params
}

/// Parse and validate a worker's assessment response.
///
/// When the worker's label disagrees with its score, the level derived from
/// the score is kept.
pub fn parse_assessment(response: &str) -> Result<ConfidenceAssessment, AssessmentParseError> {
    let doc: Value = serde_json::from_str(response.trim())?;
    let obj = doc.as_object().ok_or(AssessmentParseError::NotAnObject)?;

    for key in ["score", "level", "justification"] {
        if !obj.contains_key(key) {
            return Err(AssessmentParseError::MissingKey(key));
        }
    }

    let score = obj["score"]
        .as_f64()
        .ok_or(AssessmentParseError::ScoreNotNumeric)?;
    if !(0.0..=1.0).contains(&score) {
        return Err(AssessmentParseError::ScoreOutOfRange(score));
    }

    let label = obj["level"].as_str().unwrap_or_default();
    let claimed = ConfidenceLevel::parse_assessed(label)
        .ok_or_else(|| AssessmentParseError::InvalidLevel(obj["level"].to_string()))?;

    let justification = obj["justification"]
        .as_str()
        .ok_or(AssessmentParseError::JustificationNotString)?;

    let assessment = ConfidenceAssessment::from_score(score, justification);
    if assessment.level != claimed {
        warn!(
            score,
            claimed = %claimed,
            derived = %assessment.level,
            "worker confidence label disagrees with its score; using derived level"
        );
    }
    Ok(assessment)
}

/// Ask the worker to self-score `agent_output` against `task_prompt`.
pub async fn assess(
    provider: &dyn ProviderCapability,
    model: &str,
    task_prompt: &str,
    agent_output: &str,
) -> ConfidenceAssessment {
    let prompt = assessment_prompt(task_prompt, agent_output);
    let response = match provider.generate(&prompt, model, &assessment_params()).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "confidence assessment call failed; defaulting to MEDIUM");
            return ConfidenceAssessment::fallback(e);
        }
    };

    match parse_assessment(&response) {
        Ok(assessment) => {
            info!(level = %assessment.level, score = assessment.score, "worker confidence");
            assessment
        }
        Err(e) => {
            warn!(error = %e, "unusable confidence assessment; defaulting to MEDIUM");
            ConfidenceAssessment::fallback(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;

    #[test]
    fn prompt_embeds_task_and_output() {
        let p = assessment_prompt("Write fib(n).", "def fib(n): ...");
        assert!(p.contains("TASK_PROMPT:\nWrite fib(n)."));
        assert!(p.contains("AGENT_OUTPUT:\ndef fib(n): ..."));
        assert!(p.contains("HIGH: Score >= 0.90"));
        assert!(p.contains("\"justification\": \"<string>\""));
    }

    #[test]
    fn well_formed_response_is_accepted() {
        let a = parse_assessment(r#"{"score": 0.95, "level": "HIGH", "justification": "ok"}"#)
            .unwrap();
        assert_eq!(a.level, ConfidenceLevel::High);
        assert_eq!(a.score, 0.95);
        assert_eq!(a.justification, "ok");
    }

    #[test]
    fn integer_scores_are_numeric() {
        let a = parse_assessment(r#"{"score": 1, "level": "HIGH", "justification": ""}"#).unwrap();
        assert_eq!(a.score, 1.0);
    }

    #[test]
    fn mislabelled_score_keeps_derived_level() {
        let a = parse_assessment(r#"{"score": 0.3, "level": "HIGH", "justification": "x"}"#)
            .unwrap();
        assert_eq!(a.level, ConfidenceLevel::Low);
    }

    #[test]
    fn malformed_responses_are_rejected() {
        let cases = [
            "I am very confident.",
            "[0.9, \"HIGH\"]",
            r#"{"score": 0.9, "level": "HIGH"}"#,
            r#"{"score": "high", "level": "HIGH", "justification": "x"}"#,
            r#"{"score": 1.5, "level": "HIGH", "justification": "x"}"#,
            r#"{"score": 0.9, "level": "VERY_HIGH", "justification": "x"}"#,
            r#"{"score": 0.9, "level": "UNKNOWN", "justification": "x"}"#,
            r#"{"score": 0.9, "level": "HIGH", "justification": 7}"#,
        ];
        for case in cases {
            assert!(parse_assessment(case).is_err(), "accepted: {case}");
        }
    }

    #[tokio::test]
    async fn assessment_uses_low_temperature_json_mode() {
        let provider = ScriptedProvider::new()
            .then_text(r#"{"score": 0.7, "level": "MEDIUM", "justification": "edge cases"}"#);
        let a = assess(&provider, "gpt-4o", "task", "output").await;
        assert_eq!(a.level, ConfidenceLevel::Medium);

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model(), "gpt-4o");
        assert_eq!(calls[0].params()["temperature"], json!(0.1));
        assert_eq!(calls[0].params()["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back_to_medium() {
        let provider = ScriptedProvider::new().then_text("not json at all");
        let a = assess(&provider, "m", "task", "output").await;
        assert_eq!(a.score, ConfidenceAssessment::FALLBACK_SCORE);
        assert_eq!(a.level, ConfidenceLevel::Medium);
        assert!(a.justification.contains("Requires human review."));
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_medium() {
        let provider = ScriptedProvider::new().then_fail("backend down");
        let a = assess(&provider, "m", "task", "output").await;
        assert_eq!(a.score, 0.65);
        assert_eq!(a.level, ConfidenceLevel::Medium);
        assert!(a.justification.contains("backend down"));
    }
}
