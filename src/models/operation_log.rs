//! Audit trail model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Recorded action on a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OperationLog {
    pub id: i64,
    /// Cleared when the user is deleted
    #[sqlx(rename = "usuario_id")]
    pub user_id: Option<i64>,
    #[sqlx(rename = "tabela_afetada")]
    pub table: String,
    #[sqlx(rename = "acao")]
    pub action: String,
    #[sqlx(rename = "descricao")]
    pub description: String,
    #[sqlx(rename = "data_hora")]
    pub occurred_at: DateTime<Utc>,
}

/// What a mutating operation reports to the audit hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub table: &'static str,
    pub action: &'static str,
    pub description: String,
    pub actor: Option<i64>,
}

impl AuditEntry {
    pub fn new(
        table: &'static str,
        action: &'static str,
        description: impl Into<String>,
        actor: Option<i64>,
    ) -> Self {
        Self {
            table,
            action,
            description: description.into(),
            actor,
        }
    }
}

/// Operation log filter; the time range applies to `occurred_at`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationLogQuery {
    pub table: Option<String>,
    pub user_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OperationLogQuery {
    pub fn matches(&self, log: &OperationLog) -> bool {
        self.table.as_deref().map_or(true, |t| log.table == t)
            && self.user_id.map_or(true, |id| log.user_id == Some(id))
            && self.from.map_or(true, |from| log.occurred_at >= from)
            && self.to.map_or(true, |to| log.occurred_at < to)
    }
}
