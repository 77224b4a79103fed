//! In-memory fakes for the audit store (testing only)
//!
//! `MemoryAuditStore` satisfies the [`AuditStore`] contract without touching
//! disk; `FailingAuditStore` rejects every append so callers can exercise
//! their write-failure path.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LedgerError, LedgerResult};
use crate::record::AuditRecord;
use crate::store::AuditStore;

/// Audit store backed by a `Vec` behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: &AuditRecord) -> LedgerResult<()> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(record.clone());
        Ok(())
    }

    async fn records(&self) -> LedgerResult<Vec<AuditRecord>> {
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

/// Audit store whose every append fails with a write error.
#[derive(Debug, Default)]
pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _record: &AuditRecord) -> LedgerResult<()> {
        Err(LedgerError::Write {
            path: PathBuf::from("<failing>"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only store"),
        })
    }

    async fn records(&self) -> LedgerResult<Vec<AuditRecord>> {
        Ok(Vec::new())
    }
}
