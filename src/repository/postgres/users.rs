//! `usuarios` table

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, User},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}

pub(super) async fn insert(conn: &mut PgConnection, user: &NewUser) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO usuarios (username, password, first_name, last_name, email, cpf, telefone)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.cpf)
    .bind(&user.phone)
    .fetch_one(conn)
    .await?;

    Ok(user)
}

pub(super) async fn get(conn: &mut PgConnection, id: i64) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM usuarios WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn lock(conn: &mut PgConnection, id: i64) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM usuarios WHERE id = $1 FOR UPDATE NOWAIT")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn list(conn: &mut PgConnection) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM usuarios ORDER BY username")
        .fetch_all(conn)
        .await?;
    Ok(users)
}

pub(super) async fn update(conn: &mut PgConnection, user: &User) -> AppResult<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE usuarios SET
            first_name = $2, last_name = $3, email = $4, telefone = $5,
            is_active = $6, password = $7, token_verificacao = $8,
            token_adm = $9, bloqueio_ate = $10
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(user.is_active)
    .bind(&user.password)
    .bind(&user.verification_token)
    .bind(&user.admin_token)
    .bind(user.locked_until)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| not_found(user.id))
}

/// Operation logs keep their rows with a null user (`ON DELETE SET NULL`)
pub(super) async fn delete(conn: &mut PgConnection, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM usuarios WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(())
}
