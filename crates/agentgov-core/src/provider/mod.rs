//! The generation boundary to AI backends.
//!
//! The engine never speaks a network protocol itself. It calls a
//! [`ProviderCapability`] and turns chat responses into text through the
//! [`ResponseNormalizers`] table.

pub mod command;
pub mod normalize;
pub mod scripted;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{ChatTurn, ModelParams};

pub use command::CommandProvider;
pub use normalize::{Normalizer, ResponseNormalizers};
pub use scripted::{ProviderCall, ScriptedProvider};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no provider registered for agent '{agent}' (provider type '{provider_type}')")]
    NotRegistered { agent: String, provider_type: String },

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("failed to launch backend '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend '{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("backend '{program}' exited with status {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("response from provider '{provider_type}' has no text at the expected path")]
    UnrecognizedResponse { provider_type: String },
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Text and chat generation against one backend.
#[async_trait]
pub trait ProviderCapability: Send + Sync {
    /// Single-prompt generation; returns the reply text.
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        params: &ModelParams,
    ) -> ProviderResult<String>;

    /// Chat completion; returns the backend's raw response document.
    async fn chat(
        &self,
        messages: &[ChatTurn],
        model: &str,
        params: &ModelParams,
    ) -> ProviderResult<Value>;
}

/// Providers available to a run.
///
/// Lookup prefers a provider bound to the agent identity and falls back to
/// one bound to the agent's provider type.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    by_agent: HashMap<String, Arc<dyn ProviderCapability>>,
    by_type: HashMap<String, Arc<dyn ProviderCapability>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(
        mut self,
        provider_type: impl Into<String>,
        provider: Arc<dyn ProviderCapability>,
    ) -> Self {
        self.by_type.insert(provider_type.into(), provider);
        self
    }

    pub fn with_agent_provider(
        mut self,
        agent: impl Into<String>,
        provider: Arc<dyn ProviderCapability>,
    ) -> Self {
        self.register_agent(agent, provider);
        self
    }

    pub fn register_agent(&mut self, agent: impl Into<String>, provider: Arc<dyn ProviderCapability>) {
        self.by_agent.insert(agent.into(), provider);
    }

    pub fn resolve(
        &self,
        agent: &str,
        provider_type: &str,
    ) -> ProviderResult<Arc<dyn ProviderCapability>> {
        self.by_agent
            .get(agent)
            .or_else(|| self.by_type.get(provider_type))
            .cloned()
            .ok_or_else(|| ProviderError::NotRegistered {
                agent: agent.to_string(),
                provider_type: provider_type.to_string(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.by_agent.is_empty() && self.by_type.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut agents: Vec<_> = self.by_agent.keys().collect();
        agents.sort();
        let mut types: Vec<_> = self.by_type.keys().collect();
        types.sort();
        f.debug_struct("ProviderRegistry")
            .field("agents", &agents)
            .field("provider_types", &types)
            .finish()
    }
}
