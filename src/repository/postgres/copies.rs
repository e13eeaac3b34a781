//! `livros` table (physical copies)

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        copy::{BookCopy, CopyQuery},
        enums::CopyState,
    },
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Copy with id {} not found", id))
}

pub(super) async fn insert(conn: &mut PgConnection, entry_id: i64, code: &str) -> AppResult<BookCopy> {
    let copy = sqlx::query_as::<_, BookCopy>(
        "INSERT INTO livros (livro_id, codigo_exemplar, estado) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(entry_id)
    .bind(code)
    .bind(CopyState::Available)
    .fetch_one(conn)
    .await?;

    Ok(copy)
}

pub(super) async fn get(conn: &mut PgConnection, id: i64) -> AppResult<BookCopy> {
    sqlx::query_as::<_, BookCopy>("SELECT * FROM livros WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn lock(conn: &mut PgConnection, id: i64) -> AppResult<BookCopy> {
    sqlx::query_as::<_, BookCopy>("SELECT * FROM livros WHERE id = $1 FOR UPDATE NOWAIT")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn list(conn: &mut PgConnection, query: &CopyQuery) -> AppResult<Vec<BookCopy>> {
    let copies = sqlx::query_as::<_, BookCopy>(
        r#"
        SELECT * FROM livros
        WHERE ($1::BIGINT IS NULL OR livro_id = $1)
          AND ($2::VARCHAR IS NULL OR estado = $2)
        ORDER BY codigo_exemplar
        "#,
    )
    .bind(query.entry_id)
    .bind(query.state)
    .fetch_all(conn)
    .await?;

    Ok(copies)
}

pub(super) async fn set_state(conn: &mut PgConnection, id: i64, state: CopyState) -> AppResult<BookCopy> {
    sqlx::query_as::<_, BookCopy>("UPDATE livros SET estado = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(state)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn delete(conn: &mut PgConnection, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM livros WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(())
}
