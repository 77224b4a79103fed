//! The audit store capability.
//!
//! Implementations must keep appends in insertion order and must never
//! truncate existing history, except when the backing document is detected
//! as corrupt. In-memory fakes live in [`crate::fakes`].

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::record::AuditRecord;

/// Append-only sequence of [`AuditRecord`]s.
///
/// `append` is the only mutation. Concurrent callers are serialised by the
/// implementation so that no append is lost.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably append one record.
    async fn append(&self, record: &AuditRecord) -> LedgerResult<()>;

    /// Read every well-formed record in insertion order.
    async fn records(&self) -> LedgerResult<Vec<AuditRecord>>;
}
