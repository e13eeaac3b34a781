//! `emprestimos` table

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::{Loan, LoanQuery, NewLoan},
    },
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", id))
}

pub(super) async fn insert(conn: &mut PgConnection, loan: &NewLoan) -> AppResult<Loan> {
    let loan = sqlx::query_as::<_, Loan>(
        r#"
        INSERT INTO emprestimos (
            usuario_id, exemplar_id, reserva_id, data_retirada,
            data_prevista_devolucao, status_emprestimo, num_renovacoes
        )
        VALUES ($1, $2, $3, $4, $5, $6, 0)
        RETURNING *
        "#,
    )
    .bind(loan.user_id)
    .bind(loan.copy_id)
    .bind(loan.reservation_id)
    .bind(loan.picked_up_at)
    .bind(loan.due_at)
    .bind(LoanStatus::InUse)
    .fetch_one(conn)
    .await?;

    Ok(loan)
}

pub(super) async fn get(conn: &mut PgConnection, id: i64) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM emprestimos WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn lock(conn: &mut PgConnection, id: i64) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM emprestimos WHERE id = $1 FOR UPDATE NOWAIT")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn list(conn: &mut PgConnection, query: &LoanQuery) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        r#"
        SELECT * FROM emprestimos
        WHERE ($1::BIGINT IS NULL OR usuario_id = $1)
          AND ($2::BIGINT IS NULL OR exemplar_id = $2)
          AND ($3::VARCHAR IS NULL OR status_emprestimo = $3)
        ORDER BY data_prevista_devolucao, id
        "#,
    )
    .bind(query.user_id)
    .bind(query.copy_id)
    .bind(query.status)
    .fetch_all(conn)
    .await?;

    Ok(loans)
}

pub(super) async fn update(conn: &mut PgConnection, loan: &Loan) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>(
        r#"
        UPDATE emprestimos SET
            data_prevista_devolucao = $2, data_devolucao_real = $3,
            status_emprestimo = $4, num_renovacoes = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(loan.id)
    .bind(loan.due_at)
    .bind(loan.returned_at)
    .bind(loan.status)
    .bind(loan.renewals)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| not_found(loan.id))
}

pub(super) async fn mark_overdue(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        r#"
        UPDATE emprestimos SET status_emprestimo = $1
        WHERE status_emprestimo = $2 AND data_prevista_devolucao < $3
        RETURNING *
        "#,
    )
    .bind(LoanStatus::Overdue)
    .bind(LoanStatus::InUse)
    .bind(now)
    .fetch_all(conn)
    .await?;

    Ok(loans)
}

/// Only closed loans can go; penalties keep their rows with a null loan
/// (`ON DELETE SET NULL`)
pub(super) async fn delete(conn: &mut PgConnection, id: i64) -> AppResult<()> {
    let loan = lock(&mut *conn, id).await?;
    if loan.is_open() {
        return Err(AppError::ConstraintViolation(format!(
            "Loan {} is still {} and cannot be deleted",
            id, loan.status
        )));
    }

    sqlx::query("DELETE FROM emprestimos WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
