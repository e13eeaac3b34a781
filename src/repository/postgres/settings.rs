//! `system_settings` table

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::setting::{SystemSetting, UpsertSetting},
};

pub(super) async fn get(conn: &mut PgConnection, key: &str) -> AppResult<Option<SystemSetting>> {
    let setting = sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings WHERE chave = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;

    Ok(setting)
}

pub(super) async fn list(conn: &mut PgConnection) -> AppResult<Vec<SystemSetting>> {
    let settings = sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings ORDER BY chave")
        .fetch_all(conn)
        .await?;

    Ok(settings)
}

pub(super) async fn upsert(conn: &mut PgConnection, setting: &UpsertSetting) -> AppResult<SystemSetting> {
    let setting = sqlx::query_as::<_, SystemSetting>(
        r#"
        INSERT INTO system_settings (chave, valor, descricao)
        VALUES ($1, $2, $3)
        ON CONFLICT (chave) DO UPDATE SET valor = EXCLUDED.valor, descricao = EXCLUDED.descricao
        RETURNING *
        "#,
    )
    .bind(&setting.key)
    .bind(&setting.value)
    .bind(&setting.description)
    .fetch_one(conn)
    .await?;

    Ok(setting)
}

pub(super) async fn delete(conn: &mut PgConnection, key: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM system_settings WHERE chave = $1")
        .bind(key)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Setting {} not found", key)));
    }
    Ok(())
}
