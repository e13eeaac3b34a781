//! `penalty_log` table

use sqlx::PgConnection;

use crate::{
    error::AppResult,
    models::penalty::{NewPenalty, PenaltyRecord},
};

pub(super) async fn insert(conn: &mut PgConnection, penalty: &NewPenalty) -> AppResult<PenaltyRecord> {
    let penalty = sqlx::query_as::<_, PenaltyRecord>(
        r#"
        INSERT INTO penalty_log (usuario_id, emprestimo_id, dias_atraso, data_aplicacao, bloqueio_ate)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(penalty.user_id)
    .bind(penalty.loan_id)
    .bind(penalty.days_late)
    .bind(penalty.applied_at)
    .bind(penalty.locked_until)
    .fetch_one(conn)
    .await?;

    Ok(penalty)
}

pub(super) async fn list_for_user(conn: &mut PgConnection, user_id: i64) -> AppResult<Vec<PenaltyRecord>> {
    let penalties = sqlx::query_as::<_, PenaltyRecord>(
        "SELECT * FROM penalty_log WHERE usuario_id = $1 ORDER BY data_aplicacao",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(penalties)
}
