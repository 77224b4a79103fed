//! Provider backed by an external executable.
//!
//! Text mode writes the prompt to the child's stdin and takes stdout as the
//! reply. Chat mode writes `{"model", "messages", "params"}` as JSON and
//! parses stdout as the response document (non-JSON stdout is kept as a
//! string). The model name and parameters are also exported as
//! `AGENTGOV_MODEL`, `AGENTGOV_MODE` and `AGENTGOV_PARAMS`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{ProviderCapability, ProviderError, ProviderResult};
use crate::domain::{AgentConfig, ChatTurn, ModelParams};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CommandProvider {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    /// `None` when `argv` is empty.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            return None;
        }
        Some(Self {
            argv,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Build from an agent's `command` and `timeout_secs`, if it has a command.
    pub fn from_config(config: &AgentConfig) -> Option<Self> {
        let provider = Self::new(config.command.clone())?;
        Some(match config.timeout_secs {
            Some(secs) => provider.with_timeout(Duration::from_secs(secs)),
            None => provider,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program(&self) -> &str {
        &self.argv[0]
    }

    async fn run(
        &self,
        mode: &str,
        model: &str,
        params: &ModelParams,
        input: Vec<u8>,
    ) -> ProviderResult<String> {
        let program = self.program().to_string();
        debug!(program = %program, mode, model, "invoking command backend");

        let mut child = Command::new(&program)
            .args(&self.argv[1..])
            .env("AGENTGOV_MODEL", model)
            .env("AGENTGOV_MODE", mode)
            .env("AGENTGOV_PARAMS", Value::Object(params.clone()).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take();
        let feed = async move {
            if let Some(stdin) = stdin.as_mut() {
                // A backend that ignores stdin may close it early; that is not a failure.
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            }
            drop(stdin);
        };

        let exchange = async {
            let (_, output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ProviderError::Timeout {
                program: program.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ProviderError::Backend(format!("{program}: {e}")))?;

        if !output.status.success() {
            return Err(ProviderError::NonZeroExit {
                program,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ProviderCapability for CommandProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        params: &ModelParams,
    ) -> ProviderResult<String> {
        self.run("generate", model, params, prompt.as_bytes().to_vec())
            .await
    }

    async fn chat(
        &self,
        messages: &[ChatTurn],
        model: &str,
        params: &ModelParams,
    ) -> ProviderResult<Value> {
        let request = json!({
            "model": model,
            "messages": messages,
            "params": params,
        });
        let stdout = self
            .run("chat", model, params, request.to_string().into_bytes())
            .await?;
        Ok(serde_json::from_str(stdout.trim()).unwrap_or(Value::String(stdout)))
    }
}
