//! `livros_base` and `livro_categoria` tables

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        catalog::{CatalogCategoryLink, CatalogEntry, CreateCatalogEntry},
        category::Category,
    },
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Catalog entry with id {} not found", id))
}

pub(super) async fn insert(conn: &mut PgConnection, entry: &CreateCatalogEntry) -> AppResult<CatalogEntry> {
    let entry = sqlx::query_as::<_, CatalogEntry>(
        r#"
        INSERT INTO livros_base (titulo, autor, sinopse, isbn, capa_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&entry.title)
    .bind(&entry.author)
    .bind(&entry.synopsis)
    .bind(&entry.isbn)
    .bind(&entry.cover_url)
    .fetch_one(conn)
    .await?;

    Ok(entry)
}

pub(super) async fn get(conn: &mut PgConnection, id: i64) -> AppResult<CatalogEntry> {
    sqlx::query_as::<_, CatalogEntry>("SELECT * FROM livros_base WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn list(conn: &mut PgConnection) -> AppResult<Vec<CatalogEntry>> {
    let entries = sqlx::query_as::<_, CatalogEntry>("SELECT * FROM livros_base ORDER BY titulo")
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

pub(super) async fn update(conn: &mut PgConnection, entry: &CatalogEntry) -> AppResult<CatalogEntry> {
    sqlx::query_as::<_, CatalogEntry>(
        r#"
        UPDATE livros_base SET
            titulo = $2, autor = $3, sinopse = $4, isbn = $5, capa_url = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(&entry.title)
    .bind(&entry.author)
    .bind(&entry.synopsis)
    .bind(&entry.isbn)
    .bind(&entry.cover_url)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| not_found(entry.id))
}

pub(super) async fn delete(conn: &mut PgConnection, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM livros_base WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub(super) async fn link(conn: &mut PgConnection, entry_id: i64, category_id: i64) -> AppResult<CatalogCategoryLink> {
    let link = sqlx::query_as::<_, CatalogCategoryLink>(
        "INSERT INTO livro_categoria (livro_id, categoria_id) VALUES ($1, $2) RETURNING *",
    )
    .bind(entry_id)
    .bind(category_id)
    .fetch_one(conn)
    .await?;

    Ok(link)
}

pub(super) async fn unlink(conn: &mut PgConnection, entry_id: i64, category_id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM livro_categoria WHERE livro_id = $1 AND categoria_id = $2")
        .bind(entry_id)
        .bind(category_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Catalog entry {} is not linked to category {}",
            entry_id, category_id
        )));
    }
    Ok(())
}

pub(super) async fn categories_of(conn: &mut PgConnection, entry_id: i64) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        r#"
        SELECT c.*
        FROM categorias c
        JOIN livro_categoria lc ON lc.categoria_id = c.id
        WHERE lc.livro_id = $1
        ORDER BY c.nome
        "#,
    )
    .bind(entry_id)
    .fetch_all(conn)
    .await?;

    Ok(categories)
}
