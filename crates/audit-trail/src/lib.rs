//! Audit-Trail: append-only record of agent delegation decisions
//!
//! Every delegation that runs to completion leaves exactly one
//! [`AuditRecord`] in the trail. The trail is a single human-readable YAML
//! sequence so it can be reviewed and diffed alongside the code it describes.
//!
//! ## Key Components
//!
//! - [`AuditRecord`] and friends: the record schema shared with result files
//! - [`AuditStore`]: the append/read capability the orchestrator writes through
//! - [`YamlAuditLedger`]: file-backed store with atomic rewrites and locking
//! - [`fakes`]: in-memory stores for tests

mod error;
pub mod fakes;
mod lock;
pub mod record;
pub mod store;
mod yaml_ledger;

pub use error::{LedgerError, LedgerResult};
pub use record::{
    ActionDescriptor, ArtifactRef, AuditRecord, ConfidenceAssessment, ConfidenceLevel,
    DecisionFlags, HIGH_THRESHOLD, MEDIUM_THRESHOLD,
};
pub use store::AuditStore;
pub use yaml_ledger::{YamlAuditLedger, DEFAULT_LOCK_WAIT};
