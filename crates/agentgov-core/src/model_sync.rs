//! Keep local models in line with the roadmap week.
//!
//! The sync state is an explicit [`ModelSyncState`] owned by the caller and
//! passed by reference; nothing here is process-global.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "mistral:latest";
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("model runtime '{program}' is not installed")]
    NotInstalled { program: String },

    #[error("failed to pull model '{model}': {reason}")]
    Pull { model: String, reason: String },

    #[error("pulling model '{model}' timed out after {secs}s")]
    Timeout { model: String, secs: u64 },
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Required local models per roadmap week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchedule {
    weeks: BTreeMap<u32, Vec<String>>,
    fallback: Vec<String>,
}

impl Default for ModelSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

impl ModelSchedule {
    /// Weeks without an entry need [`DEFAULT_MODEL`] only.
    pub fn new() -> Self {
        Self {
            weeks: BTreeMap::new(),
            fallback: vec![DEFAULT_MODEL.to_string()],
        }
    }

    pub fn standard() -> Self {
        Self::new()
            .with_week(1, ["python-tutor:latest", "codellama:7b-python"])
            .with_week(2, ["codellama:7b", "mistral:latest"])
            .with_week(3, ["codellama:13b", "mistral:latest"])
            .with_week(4, ["mistral:latest", "llama3:latest"])
    }

    pub fn with_week<I, S>(mut self, week: u32, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.weeks
            .insert(week, models.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_models(&self, week: u32) -> &[String] {
        match self.weeks.get(&week) {
            Some(models) if !models.is_empty() => models,
            _ => &self.fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSyncState {
    pub active_model: Option<String>,
    pub status: SyncStatus,
}

/// Fetches models into the local runtime.
#[async_trait]
pub trait ModelPuller: Send + Sync {
    fn runtime(&self) -> &str;

    fn is_installed(&self) -> bool;

    async fn pull(&self, model: &str) -> SyncResult<()>;
}

/// Pulls through the runtime's CLI: `<argv...> pull <model>`.
#[derive(Debug, Clone)]
pub struct CommandModelPuller {
    argv: Vec<String>,
    timeout: Duration,
}

impl Default for CommandModelPuller {
    fn default() -> Self {
        Self {
            argv: vec!["ollama".to_string()],
            timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

impl CommandModelPuller {
    /// `None` when `argv` is empty.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            return None;
        }
        Some(Self {
            argv,
            timeout: DEFAULT_PULL_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ModelPuller for CommandModelPuller {
    fn runtime(&self) -> &str {
        &self.argv[0]
    }

    fn is_installed(&self) -> bool {
        which::which(self.runtime()).is_ok()
    }

    async fn pull(&self, model: &str) -> SyncResult<()> {
        let child = Command::new(self.runtime())
            .args(&self.argv[1..])
            .arg("pull")
            .arg(model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SyncError::Pull {
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SyncError::Timeout {
                model: model.to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| SyncError::Pull {
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SyncError::Pull {
                model: model.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Pull every model the week requires and activate the first.
///
/// On any failure `state.status` becomes [`SyncStatus::Error`] and the
/// active model is left unchanged.
pub async fn sync_with_roadmap(
    state: &mut ModelSyncState,
    schedule: &ModelSchedule,
    week: u32,
    puller: &dyn ModelPuller,
) -> SyncResult<()> {
    if !puller.is_installed() {
        state.status = SyncStatus::Error;
        return Err(SyncError::NotInstalled {
            program: puller.runtime().to_string(),
        });
    }

    let models = schedule.required_models(week);
    for model in models {
        info!(week, model = %model, "pulling model");
        if let Err(e) = puller.pull(model).await {
            warn!(model = %model, error = %e, "model pull failed");
            state.status = SyncStatus::Error;
            return Err(e);
        }
    }

    state.active_model = models.first().cloned();
    state.status = SyncStatus::Synced;
    info!(week, active_model = ?state.active_model, "models synced");
    Ok(())
}
