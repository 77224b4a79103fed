//! Per-agent provider configuration.
//!
//! Each agent identity has one JSON document at `<config_dir>/<agent>.json`:
//!
//! ```json
//! { "provider_type": "openai", "model_name": "gpt-4o",
//!   "capabilities": ["code_generation"], "model_params": { "temperature": 0.2 },
//!   "api_type": "chat", "command": ["./bin/openai-bridge"] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{read_json_document, require_fields, ConfigError, ConfigResult};
use super::task::ModelParams;

/// How a plain-prompt task is sent to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    #[default]
    Text,
    /// Wrap the prompt as a single user turn and use chat mode.
    Chat,
}

/// Provider/model binding for one agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider_type: String,
    pub model_name: String,

    /// Task types this agent may be delegated. Empty means unrestricted.
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub model_params: ModelParams,

    #[serde(default)]
    pub api_type: ApiType,

    /// Executable backend argv for command-driven providers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl AgentConfig {
    pub fn new(provider_type: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            model_name: model_name.into(),
            capabilities: Vec::new(),
            model_params: ModelParams::new(),
            api_type: ApiType::Text,
            command: Vec::new(),
            timeout_secs: None,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_type(mut self, api_type: ApiType) -> Self {
        self.api_type = api_type;
        self
    }

    pub fn with_model_params(mut self, params: ModelParams) -> Self {
        self.model_params = params;
        self
    }

    /// Whether the agent is configured to take tasks of `task_type`.
    pub fn permits(&self, task_type: &str) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == task_type)
    }

    /// Agent parameters overlaid with the task's, key by key.
    pub fn merged_params(&self, task_params: &ModelParams) -> ModelParams {
        let mut merged = self.model_params.clone();
        for (k, v) in task_params {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Load `<config_dir>/<agent>.json`.
    pub fn load(config_dir: &Path, agent: &str) -> ConfigResult<Self> {
        let path = config_dir.join(format!("{agent}.json"));
        Self::load_file(&path, agent)
    }

    fn load_file(path: &Path, agent: &str) -> ConfigResult<Self> {
        let doc = read_json_document(path, &format!("config for agent '{agent}'"))?;
        require_fields(&doc, path, &["provider_type", "model_name"])?;
        serde_json::from_value(doc).map_err(|e| ConfigError::InvalidField {
            field: format!("agent '{agent}'"),
            reason: e.to_string(),
        })
    }
}

/// All configured agents, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    agents: BTreeMap<String, AgentConfig>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, name: impl Into<String>, config: AgentConfig) -> Self {
        self.insert(name, config);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, config: AgentConfig) {
        self.agents.insert(name.into(), config);
    }

    /// Load every `*.json` in `config_dir`; the file stem is the agent identity.
    ///
    /// Any invalid file fails the whole load.
    pub fn load_dir(config_dir: &Path) -> ConfigResult<Self> {
        let entries = std::fs::read_dir(config_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    what: "agent config directory".to_string(),
                    path: config_dir.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: config_dir.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut directory = Self::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let config = AgentConfig::load_file(&path, name)?;
            directory.insert(name, config);
        }
        Ok(directory)
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentConfig)> {
        self.agents.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_agent_config_with_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("codex.json"),
            json!({
                "provider_type": "openai",
                "model_name": "gpt-4o",
                "capabilities": ["code_generation", "security_review"],
                "model_params": { "temperature": 0.2 },
                "api_type": "chat"
            })
            .to_string(),
        )
        .unwrap();

        let cfg = AgentConfig::load(dir.path(), "codex").unwrap();
        assert_eq!(cfg.provider_type, "openai");
        assert_eq!(cfg.api_type, ApiType::Chat);
        assert!(cfg.permits("security_review"));
        assert!(!cfg.permits("architecture_review"));
    }

    #[test]
    fn missing_model_name_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("copilot.json"),
            json!({ "provider_type": "openai" }).to_string(),
        )
        .unwrap();

        match AgentConfig::load(dir.path(), "copilot") {
            Err(ConfigError::MissingField { field, .. }) => assert_eq!(field, "model_name"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AgentConfig::load(dir.path(), "ghost"),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn empty_capabilities_permit_everything() {
        let cfg = AgentConfig::new("ollama", "mistral:latest");
        assert!(cfg.permits("anything"));
    }

    #[test]
    fn task_params_override_agent_params() {
        let mut base = ModelParams::new();
        base.insert("temperature".into(), json!(0.2));
        base.insert("top_p".into(), json!(0.9));
        let cfg = AgentConfig::new("openai", "gpt-4o").with_model_params(base);

        let mut task = ModelParams::new();
        task.insert("temperature".into(), json!(0.7));

        let merged = cfg.merged_params(&task);
        assert_eq!(merged["temperature"], json!(0.7));
        assert_eq!(merged["top_p"], json!(0.9));
    }

    #[test]
    fn load_dir_reads_every_json_file() {
        let dir = tempfile::tempdir().unwrap();
        for (name, provider) in [("openai", "openai"), ("ollama", "ollama")] {
            std::fs::write(
                dir.path().join(format!("{name}.json")),
                json!({ "provider_type": provider, "model_name": "m" }).to_string(),
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let directory = AgentDirectory::load_dir(dir.path()).unwrap();
        let names: Vec<_> = directory.names().collect();
        assert_eq!(names, ["ollama", "openai"]);
    }
}
