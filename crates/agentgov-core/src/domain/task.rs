//! Task definitions consumed once per delegation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::authority::AuthorityLevel;
use super::error::{read_json_document, require_fields, ConfigError, ConfigResult};

/// Provider-specific generation parameters (`temperature`, `max_tokens`, ...).
pub type ModelParams = serde_json::Map<String, serde_json::Value>;

/// One turn of a conversational task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

fn default_task_type() -> String {
    "generic".to_string()
}

/// A unit of work to delegate. Read-only for the whole delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    #[serde(rename = "type", default = "default_task_type")]
    pub task_type: String,

    /// Free-text prompt sent to the worker.
    #[serde(alias = "prompt")]
    pub description: String,

    #[serde(default)]
    pub required_authority: AuthorityLevel,

    /// Structured turns; when present the task runs in chat mode.
    #[serde(default)]
    pub messages: Vec<ChatTurn>,

    #[serde(default)]
    pub model_params: ModelParams,

    /// Collect second opinions and check them for divergence.
    #[serde(default)]
    pub expect_multiple_outputs: bool,

    /// Human summary recorded in the audit trail's action descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        description: impl Into<String>,
        required_authority: AuthorityLevel,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            description: description.into(),
            required_authority,
            messages: Vec::new(),
            model_params: ModelParams::new(),
            expect_multiple_outputs: false,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// The recorded summary, or a generated one.
    pub fn action_summary(&self) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| format!("Completed {} task {}.", self.task_type, self.id))
    }

    pub fn with_messages(mut self, messages: Vec<ChatTurn>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_model_params(mut self, params: ModelParams) -> Self {
        self.model_params = params;
        self
    }

    pub fn expecting_multiple_outputs(mut self) -> Self {
        self.expect_multiple_outputs = true;
        self
    }

    pub fn is_conversational(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Load a task definition from a JSON file.
    ///
    /// `id` and a non-empty description (`description` or `prompt`) are required.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let doc = read_json_document(path, "task definition")?;
        require_fields(&doc, path, &["id"])?;

        let has_prompt = ["description", "prompt"].iter().any(|key| {
            doc.get(*key)
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.trim().is_empty())
        });
        if !has_prompt {
            return Err(ConfigError::MissingField {
                path: path.to_path_buf(),
                field: "description".to_string(),
            });
        }

        serde_json::from_value(doc).map_err(|e| ConfigError::InvalidField {
            field: "task".to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        path
    }

    #[test]
    fn load_full_task_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "task.json",
            json!({
                "id": "sample_code_gen_001",
                "type": "code_generation",
                "description": "Generate a Fibonacci function.",
                "required_authority": "ASSISTANT",
                "model_params": { "temperature": 0.5, "max_tokens": 200 },
                "messages": [
                    { "role": "system", "content": "You are an expert Python programmer." },
                    { "role": "user", "content": "Write fibonacci_iterative(n)." }
                ]
            }),
        );

        let task = Task::load(&path).unwrap();
        assert_eq!(task.id, "sample_code_gen_001");
        assert_eq!(task.task_type, "code_generation");
        assert_eq!(task.required_authority, AuthorityLevel::Assistant);
        assert!(task.is_conversational());
        assert_eq!(task.model_params["max_tokens"], json!(200));
        assert!(!task.expect_multiple_outputs);
    }

    #[test]
    fn defaults_apply_to_minimal_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "task.json",
            json!({ "id": "t1", "prompt": "Summarise the README." }),
        );

        let task = Task::load(&path).unwrap();
        assert_eq!(task.task_type, "generic");
        assert_eq!(task.description, "Summarise the README.");
        assert_eq!(task.required_authority, AuthorityLevel::Contributor);
        assert!(!task.is_conversational());
        assert_eq!(task.action_summary(), "Completed generic task t1.");
    }

    #[test]
    fn missing_description_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "task.json", json!({ "id": "t1", "description": "  " }));
        assert!(matches!(
            Task::load(&path),
            Err(ConfigError::MissingField { field, .. }) if field == "description"
        ));
    }

    #[test]
    fn unknown_authority_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "task.json",
            json!({ "id": "t1", "description": "x", "required_authority": "ROOT" }),
        );
        assert!(matches!(Task::load(&path), Err(ConfigError::InvalidField { .. })));
    }
}
