//! `logs_operacoes` table

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    error::AppResult,
    models::operation_log::{AuditEntry, OperationLog, OperationLogQuery},
};

pub(super) async fn insert(conn: &mut PgConnection, entry: &AuditEntry, at: DateTime<Utc>) -> AppResult<OperationLog> {
    let log = sqlx::query_as::<_, OperationLog>(
        r#"
        INSERT INTO logs_operacoes (usuario_id, tabela_afetada, acao, descricao, data_hora)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(entry.actor)
    .bind(entry.table)
    .bind(entry.action)
    .bind(&entry.description)
    .bind(at)
    .fetch_one(conn)
    .await?;

    Ok(log)
}

/// Newest first; a null limit means no limit
pub(super) async fn list(conn: &mut PgConnection, query: &OperationLogQuery) -> AppResult<Vec<OperationLog>> {
    let logs = sqlx::query_as::<_, OperationLog>(
        r#"
        SELECT * FROM logs_operacoes
        WHERE ($1::VARCHAR IS NULL OR tabela_afetada = $1)
          AND ($2::BIGINT IS NULL OR usuario_id = $2)
          AND ($3::TIMESTAMPTZ IS NULL OR data_hora >= $3)
          AND ($4::TIMESTAMPTZ IS NULL OR data_hora < $4)
        ORDER BY data_hora DESC, id DESC
        LIMIT $5
        "#,
    )
    .bind(&query.table)
    .bind(query.user_id)
    .bind(query.from)
    .bind(query.to)
    .bind(query.limit)
    .fetch_all(conn)
    .await?;

    Ok(logs)
}
