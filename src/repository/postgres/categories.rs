//! `categorias` table

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::category::{Category, CreateCategory},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Category with id {} not found", id))
}

pub(super) async fn insert(conn: &mut PgConnection, category: &CreateCategory) -> AppResult<Category> {
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categorias (nome, descricao, parent_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&category.name)
    .bind(&category.description)
    .bind(category.parent_id)
    .fetch_one(conn)
    .await?;

    Ok(category)
}

pub(super) async fn get(conn: &mut PgConnection, id: i64) -> AppResult<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM categorias WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn list(conn: &mut PgConnection) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categorias ORDER BY nome")
        .fetch_all(conn)
        .await?;
    Ok(categories)
}

pub(super) async fn update(conn: &mut PgConnection, category: &Category) -> AppResult<Category> {
    sqlx::query_as::<_, Category>(
        "UPDATE categorias SET nome = $2, descricao = $3, parent_id = $4 WHERE id = $1 RETURNING *",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.description)
    .bind(category.parent_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| not_found(category.id))
}

/// Subcategories and catalog links block the delete (`ON DELETE RESTRICT`)
pub(super) async fn delete(conn: &mut PgConnection, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM categorias WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(())
}
