//! Task delegation engine.
//!
//! One delegation runs its steps strictly in sequence:
//!
//! 1. select an agent (or take the caller's) and authorise it
//! 2. execute through the agent's provider, chat mode when the task has
//!    turns or the agent is configured for chat
//! 3. optionally gather second opinions and check them for conflict
//! 4. have the worker self-assess its output
//! 5. write the output (and any conflict report), stage the result file,
//!    append the audit record, then publish the result file
//!
//! Selection and provider failures abort the delegation without a record.
//! Failing to write the record is fatal. A divergence between second
//! opinions is noted in the record's action summary.

mod error;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use audit_trail::{ActionDescriptor, ArtifactRef, AuditRecord, AuditStore};
use tokio::sync::Semaphore;
use tracing::{debug, warn, Instrument};

pub use error::{DelegationError, DelegationResult};
pub use state::{AbortReason, DelegationOutcome, DelegationState, LoggedDelegation};

use crate::confidence;
use crate::conflict::ConflictResolver;
use crate::domain::{AgentConfig, AgentDirectory, ApiType, ChatTurn, Task};
use crate::governance::{AgentSelector, PolicyEnforcer, PolicySource, SelectionPreferences};
use crate::obs;
use crate::provider::{ProviderCapability, ProviderRegistry, ProviderResult, ResponseNormalizers};
use crate::reporting::{self, ArtifactPaths, ResultFile};

pub struct DelegationEngine {
    agents: AgentDirectory,
    enforcer: PolicyEnforcer,
    selector: AgentSelector,
    providers: ProviderRegistry,
    normalizers: ResponseNormalizers,
    resolver: ConflictResolver,
    audit: Arc<dyn AuditStore>,
    output_dir: Option<PathBuf>,
}

impl DelegationEngine {
    pub fn new(
        agents: AgentDirectory,
        policies: Arc<dyn PolicySource>,
        preferences: SelectionPreferences,
        providers: ProviderRegistry,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        let enforcer = PolicyEnforcer::new(policies);
        Self {
            agents,
            selector: AgentSelector::new(enforcer.clone(), preferences),
            enforcer,
            providers,
            normalizers: ResponseNormalizers::standard(),
            resolver: ConflictResolver::default(),
            audit,
            output_dir: None,
        }
    }

    pub fn with_normalizers(mut self, normalizers: ResponseNormalizers) -> Self {
        self.normalizers = normalizers;
        self
    }

    pub fn with_conflict_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Write `-output.txt` / `-result.json` artifacts under `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    /// Delegate to the agent picked by the selector.
    pub async fn delegate(&self, task: &Task) -> DelegationResult<DelegationOutcome> {
        self.select_and_run(task)
            .instrument(obs::delegation_span(&task.id))
            .await
    }

    /// Delegate to a named agent, which must be configured for the task type.
    pub async fn delegate_to(&self, agent: &str, task: &Task) -> DelegationResult<DelegationOutcome> {
        self.run_named(agent, task)
            .instrument(obs::delegation_span(&task.id))
            .await
    }

    async fn select_and_run(&self, task: &Task) -> DelegationResult<DelegationOutcome> {
        obs::emit_delegation_started(&task.id, &task.task_type, &task.required_authority.to_string());

        let available: Vec<&str> = self.agents.names().collect();
        let Some(agent) = self
            .selector
            .select(&task.task_type, task.required_authority, &available)
        else {
            return Ok(abort(
                task,
                AbortReason::NoEligibleAgent {
                    task_type: task.task_type.clone(),
                    required: task.required_authority,
                },
            ));
        };

        let config = self.config_for(&agent)?;
        self.run_authorised(&agent, config, task).await
    }

    async fn run_named(&self, agent: &str, task: &Task) -> DelegationResult<DelegationOutcome> {
        obs::emit_delegation_started(&task.id, &task.task_type, &task.required_authority.to_string());

        let config = self.config_for(agent)?;
        if !config.permits(&task.task_type) {
            return Ok(abort(
                task,
                AbortReason::CapabilityMismatch {
                    agent: agent.to_string(),
                    task_type: task.task_type.clone(),
                },
            ));
        }
        self.run_authorised(agent, config, task).await
    }

    /// Run several tasks through [`delegate`](Self::delegate), at most
    /// `max_concurrent` at a time. Results are in input order.
    pub async fn delegate_all(
        self: &Arc<Self>,
        tasks: Vec<Task>,
        max_concurrent: usize,
    ) -> Vec<DelegationResult<DelegationOutcome>> {
        let sem = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let engine = Arc::clone(self);
                let sem = Arc::clone(&sem);
                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.ok();
                    engine.delegate(&task).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(DelegationError::Join(e.to_string())),
            });
        }
        results
    }

    fn config_for(&self, agent: &str) -> DelegationResult<&AgentConfig> {
        self.agents
            .get(agent)
            .ok_or_else(|| DelegationError::UnconfiguredAgent {
                agent: agent.to_string(),
            })
    }

    async fn run_authorised(
        &self,
        agent: &str,
        config: &AgentConfig,
        task: &Task,
    ) -> DelegationResult<DelegationOutcome> {
        if let Err(denial) = self
            .enforcer
            .authorize(agent, task.required_authority, &task.task_type)
        {
            return Ok(abort(task, denial.into()));
        }
        obs::emit_agent_selected(&task.id, agent);

        // AGENT_SELECTED → EXECUTED
        let provider = match self.providers.resolve(agent, &config.provider_type) {
            Ok(p) => p,
            Err(source) => return Ok(abort(task, provider_failure(agent, source))),
        };
        let output = match self.execute(provider.as_ref(), config, task).await {
            Ok(out) => out,
            Err(source) => return Ok(abort(task, provider_failure(agent, source))),
        };
        obs::emit_executed(&task.id, agent, self.uses_chat(config, task), output.len());

        let conflict = if task.expect_multiple_outputs {
            let mut outputs = vec![(agent.to_string(), output.clone())];
            outputs.extend(self.second_opinions(agent, task).await);
            self.resolver.resolve(&task.id, &outputs).await
        } else {
            None
        };

        // EXECUTED → ASSESSED
        let confidence =
            confidence::assess(provider.as_ref(), &config.model_name, &task.description, &output)
                .await;
        obs::emit_assessed(
            &task.id,
            agent,
            &confidence.level.to_string(),
            confidence.score,
        );

        // ASSESSED → LOGGED
        let mut summary = task.action_summary();
        if let Some(report) = &conflict {
            summary.push_str(&format!(
                " Outputs diverged across {} ({} distinct); escalated for review.",
                report.agents.join(", "),
                report.distinct_outputs
            ));
        }
        let mut record = AuditRecord::new(
            task.id.clone(),
            agent,
            ActionDescriptor::new(task.task_type.clone(), summary),
            confidence,
            Vec::new(),
        );

        let Some(dir) = &self.output_dir else {
            self.append_record(task, &record).await?;
            return Ok(DelegationOutcome::Logged(Box::new(LoggedDelegation {
                record,
                output,
                conflict,
                artifacts: None,
            })));
        };

        let paths = ArtifactPaths::new(dir, record.log_id, agent, &task.task_type);
        reporting::write_atomic(&paths.output_file, output.as_bytes())?;
        record.artifacts.push(
            ArtifactRef::new(
                ArtifactRef::GENERATED_CONTENT,
                paths.output_file.display().to_string(),
            )
            .with_sha256(reporting::sha256_hex(output.as_bytes())),
        );
        if let Some(report) = &conflict {
            reporting::write_json_pretty(&paths.conflict_file, report)?;
            record.artifacts.push(ArtifactRef::new(
                ArtifactRef::CONFLICT_REPORT,
                paths.conflict_file.display().to_string(),
            ));
        }
        record.artifacts.push(ArtifactRef::new(
            ArtifactRef::LOG_FILE,
            paths.result_file.display().to_string(),
        ));

        // The result file is fully written before the record exists and only
        // renamed into place once the record is durable.
        let staged =
            reporting::stage_json_pretty(&paths.result_file, &ResultFile::success(record.clone()))?;
        self.append_record(task, &record).await?;
        staged
            .publish()
            .map_err(|source| DelegationError::ResultUnpublished {
                log_id: record.log_id,
                source,
            })?;

        Ok(DelegationOutcome::Logged(Box::new(LoggedDelegation {
            record,
            output,
            conflict,
            artifacts: Some(paths),
        })))
    }

    async fn append_record(&self, task: &Task, record: &AuditRecord) -> DelegationResult<()> {
        self.audit.append(record).await.map_err(|e| {
            obs::emit_aborted(&task.id, &DelegationState::LogWriteFailed.to_string(), &e);
            DelegationError::LogWrite(e)
        })?;
        obs::emit_logged(
            &task.id,
            &record.log_id.to_string(),
            record.flags.human_oversight_required(),
            record.flags.escalation_triggered(),
        );
        Ok(())
    }

    fn uses_chat(&self, config: &AgentConfig, task: &Task) -> bool {
        task.is_conversational() || config.api_type == ApiType::Chat
    }

    async fn execute(
        &self,
        provider: &dyn ProviderCapability,
        config: &AgentConfig,
        task: &Task,
    ) -> ProviderResult<String> {
        let params = config.merged_params(&task.model_params);
        if self.uses_chat(config, task) {
            let turns = if task.is_conversational() {
                task.messages.clone()
            } else {
                vec![ChatTurn::user(task.description.clone())]
            };
            let response = provider.chat(&turns, &config.model_name, &params).await?;
            self.normalizers.normalize(&config.provider_type, &response)
        } else {
            provider
                .generate(&task.description, &config.model_name, &params)
                .await
        }
    }

    /// Outputs from every other eligible agent. Failures are logged and skipped.
    async fn second_opinions(&self, primary: &str, task: &Task) -> Vec<(String, String)> {
        let available: Vec<&str> = self.agents.names().collect();
        let mut outputs = Vec::new();
        for agent in self.selector.ranked(task.required_authority, &available) {
            if agent == primary {
                continue;
            }
            let Some(config) = self.agents.get(&agent) else {
                continue;
            };
            let provider = match self.providers.resolve(&agent, &config.provider_type) {
                Ok(p) => p,
                Err(e) => {
                    debug!(agent = %agent, error = %e, "no provider for second opinion");
                    continue;
                }
            };
            match self.execute(provider.as_ref(), config, task).await {
                Ok(out) => outputs.push((agent, out)),
                Err(e) => warn!(agent = %agent, error = %e, "second opinion failed; ignoring"),
            }
        }
        outputs
    }
}

impl std::fmt::Debug for DelegationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationEngine")
            .field("agents", &self.agents.len())
            .field("providers", &self.providers)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

fn provider_failure(agent: &str, source: crate::provider::ProviderError) -> AbortReason {
    AbortReason::Provider {
        agent: agent.to_string(),
        source,
    }
}

fn abort(task: &Task, reason: AbortReason) -> DelegationOutcome {
    obs::emit_aborted(&task.id, &reason.state().to_string(), &reason);
    DelegationOutcome::Aborted(reason)
}
