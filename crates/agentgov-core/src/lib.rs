//! AgentGov Core Library
//!
//! Confidence-gated delegation of tasks to AI agents: policy-checked agent
//! selection, execution through an abstract provider, worker
//! self-assessment, conflict detection and an append-only audit trail, plus
//! batch consolidation of result files.

pub mod confidence;
pub mod conflict;
pub mod consolidate;
pub mod domain;
pub mod engine;
pub mod governance;
pub mod model_sync;
pub mod obs;
pub mod provider;
pub mod reporting;
pub mod telemetry;

pub use domain::{
    AgentConfig, AgentDirectory, ApiType, AuthorityLevel, ChatTurn, ConfigError, ConfigResult,
    ModelParams, Task,
};

pub use governance::{
    AgentPolicy, AgentSelector, Denial, GovernanceConfig, PolicyEnforcer, PolicySource,
    SelectionPreferences, StaticPolicyStore,
};

pub use provider::{
    CommandProvider, ProviderCapability, ProviderError, ProviderRegistry, ProviderResult,
    ResponseNormalizers, ScriptedProvider,
};

pub use confidence::{assess, parse_assessment, AssessmentParseError};

pub use conflict::{
    detect_conflict, ConflictReport, ConflictResolver, EscalationSink, MemoryEscalationSink,
    TracingEscalationSink,
};

pub use engine::{
    AbortReason, DelegationEngine, DelegationError, DelegationOutcome, DelegationResult,
    DelegationState, LoggedDelegation,
};

pub use reporting::{ArtifactError, ArtifactPaths, ResultFile, StatusLine};

pub use consolidate::{
    consolidate, consolidate_dir, discover_result_files, validate_result_record, write_report,
    ConsolidatedReport, ConsolidationError, ConsolidationResult, ConsolidationSummary,
    OverallStatus, SchemaViolation, SkippedFile,
};

pub use model_sync::{
    sync_with_roadmap, CommandModelPuller, ModelPuller, ModelSchedule, ModelSyncState, SyncError,
    SyncResult, SyncStatus,
};

pub use telemetry::init_tracing;
