//! Extract reply text from provider-specific chat response shapes.
//!
//! | Provider type | Path                                     |
//! |---------------|------------------------------------------|
//! | `openai`      | `choices[0].message.content`             |
//! | `google_ai`   | `candidates[0].content.parts[0].text`    |
//! | `anthropic`   | `content[0].text`                        |
//! | `ollama`      | `content` (or `message.content`)         |
//! | anything else | the response itself as text              |

use std::collections::HashMap;

use serde_json::Value;

use super::{ProviderError, ProviderResult};

/// Pure extraction rule; `None` when the response has no text where expected.
pub type Normalizer = fn(&Value) -> Option<String>;

fn text_at(response: &Value, pointer: &str) -> Option<String> {
    response.pointer(pointer)?.as_str().map(str::to_string)
}

fn openai(response: &Value) -> Option<String> {
    text_at(response, "/choices/0/message/content")
}

fn google_ai(response: &Value) -> Option<String> {
    text_at(response, "/candidates/0/content/parts/0/text")
}

fn anthropic(response: &Value) -> Option<String> {
    text_at(response, "/content/0/text")
}

fn ollama(response: &Value) -> Option<String> {
    text_at(response, "/content").or_else(|| text_at(response, "/message/content"))
}

fn as_text(response: &Value) -> Option<String> {
    Some(match response {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Lookup table from provider type to [`Normalizer`].
#[derive(Clone)]
pub struct ResponseNormalizers {
    table: HashMap<String, Normalizer>,
    fallback: Normalizer,
}

impl std::fmt::Debug for ResponseNormalizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.table.keys().collect();
        providers.sort();
        f.debug_struct("ResponseNormalizers")
            .field("providers", &providers)
            .finish_non_exhaustive()
    }
}

impl Default for ResponseNormalizers {
    fn default() -> Self {
        Self::standard()
    }
}

impl ResponseNormalizers {
    pub fn standard() -> Self {
        Self::empty()
            .with("openai", openai)
            .with("google_ai", google_ai)
            .with("anthropic", anthropic)
            .with("ollama", ollama)
    }

    /// No per-provider rules; every response is rendered as text.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
            fallback: as_text,
        }
    }

    pub fn with(mut self, provider_type: impl Into<String>, normalizer: Normalizer) -> Self {
        self.table.insert(provider_type.into(), normalizer);
        self
    }

    pub fn normalize(&self, provider_type: &str, response: &Value) -> ProviderResult<String> {
        let rule = self.table.get(provider_type).copied().unwrap_or(self.fallback);
        rule(response).ok_or_else(|| ProviderError::UnrecognizedResponse {
            provider_type: provider_type.to_string(),
        })
    }
}
