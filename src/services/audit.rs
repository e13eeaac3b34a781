//! Audit hook and operation log queries

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::AppResult,
    models::operation_log::{AuditEntry, OperationLog, OperationLogQuery},
    repository::Repository,
};

/// Receives one entry after each committed mutating operation
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> AppResult<()>;
}

/// Default sink: appends to `logs_operacoes` in its own transaction
#[derive(Clone)]
pub struct OperationLogSink {
    repository: Repository,
}

impl OperationLogSink {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AuditSink for OperationLogSink {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        tx.insert_operation_log(&entry, Utc::now()).await?;
        tx.commit().await
    }
}

/// Read access to the audit trail
#[derive(Clone)]
pub struct AuditService {
    repository: Repository,
}

impl AuditService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &OperationLogQuery) -> AppResult<Vec<OperationLog>> {
        let mut tx = self.repository.begin().await?;
        tx.list_operation_logs(query).await
    }
}

/// Forward an entry to the sink. The operation has already committed, so
/// a failing sink is logged and otherwise ignored.
pub(crate) async fn emit(sink: &dyn AuditSink, entry: AuditEntry) {
    let table = entry.table;
    let action = entry.action;
    if let Err(e) = sink.record(entry).await {
        tracing::warn!(table, action, error = %e, "Failed to record audit entry");
    }
}
