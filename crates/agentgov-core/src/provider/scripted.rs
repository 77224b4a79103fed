//! Deterministic provider for tests and dry runs.
//!
//! Replies are consumed in order, one per call, and every call is recorded.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ProviderCapability, ProviderError, ProviderResult};
use crate::domain::{ChatTurn, ModelParams};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Chat(Value),
    Fail(String),
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Generate {
        prompt: String,
        model: String,
        params: ModelParams,
    },
    Chat {
        messages: Vec<ChatTurn>,
        model: String,
        params: ModelParams,
    },
}

impl ProviderCall {
    pub fn model(&self) -> &str {
        match self {
            Self::Generate { model, .. } | Self::Chat { model, .. } => model,
        }
    }

    pub fn params(&self) -> &ModelParams {
        match self {
            Self::Generate { params, .. } | Self::Chat { params, .. } => params,
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, Self::Chat { .. })
    }
}

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()))
    }

    pub fn then_chat(self, response: Value) -> Self {
        self.push(Reply::Chat(response))
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Reply::Fail(message.into()))
    }

    fn push(self, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next(&self, call: ProviderCall) -> ProviderResult<Reply> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        reply.ok_or_else(|| ProviderError::Backend("script exhausted".to_string()))
    }
}

#[async_trait]
impl ProviderCapability for ScriptedProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        params: &ModelParams,
    ) -> ProviderResult<String> {
        let reply = self.next(ProviderCall::Generate {
            prompt: prompt.to_string(),
            model: model.to_string(),
            params: params.clone(),
        })?;
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Chat(value) => Ok(value.to_string()),
            Reply::Fail(message) => Err(ProviderError::Backend(message)),
        }
    }

    async fn chat(
        &self,
        messages: &[ChatTurn],
        model: &str,
        params: &ModelParams,
    ) -> ProviderResult<Value> {
        let reply = self.next(ProviderCall::Chat {
            messages: messages.to_vec(),
            model: model.to_string(),
            params: params.clone(),
        })?;
        match reply {
            Reply::Text(text) => Ok(Value::String(text)),
            Reply::Chat(value) => Ok(value),
            Reply::Fail(message) => Err(ProviderError::Backend(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replies_are_consumed_in_order() {
        let p = ScriptedProvider::new()
            .then_text("one")
            .then_fail("down")
            .then_chat(json!({ "content": "three" }));
        let params = ModelParams::new();

        assert_eq!(p.generate("a", "m", &params).await.unwrap(), "one");
        assert!(p.generate("b", "m", &params).await.is_err());
        let chat = p.chat(&[ChatTurn::user("c")], "m", &params).await.unwrap();
        assert_eq!(chat["content"], "three");
        assert!(p.generate("d", "m", &params).await.is_err());

        let calls = p.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[2].is_chat());
        assert_eq!(p.remaining(), 0);
    }
}
