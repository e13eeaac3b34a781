//! `reservas` table

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ReservationStatus,
        reservation::{NewReservation, Reservation, ReservationQuery},
    },
};

/// Reservation columns plus the id of the loan that consumed it
const SELECT_RESERVATION: &str = r#"
    SELECT r.*, e.id AS loan_id
    FROM reservas r
    LEFT JOIN emprestimos e ON e.reserva_id = r.id
"#;

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Reservation with id {} not found", id))
}

pub(super) async fn insert(conn: &mut PgConnection, reservation: &NewReservation) -> AppResult<Reservation> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservas (usuario_id, exemplar_id, data_solicitacao, data_agendada, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *, NULL::BIGINT AS loan_id
        "#,
    )
    .bind(reservation.user_id)
    .bind(reservation.copy_id)
    .bind(reservation.requested_at)
    .bind(reservation.scheduled_for)
    .bind(ReservationStatus::Pending)
    .fetch_one(conn)
    .await?;

    Ok(reservation)
}

pub(super) async fn get(conn: &mut PgConnection, id: i64) -> AppResult<Reservation> {
    sqlx::query_as::<_, Reservation>(&format!("{} WHERE r.id = $1", SELECT_RESERVATION))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(super) async fn lock(conn: &mut PgConnection, id: i64) -> AppResult<Reservation> {
    sqlx::query_as::<_, Reservation>(&format!(
        "{} WHERE r.id = $1 FOR UPDATE OF r NOWAIT",
        SELECT_RESERVATION
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| not_found(id))
}

pub(super) async fn list(conn: &mut PgConnection, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
    let reservations = sqlx::query_as::<_, Reservation>(&format!(
        r#"{}
        WHERE ($1::BIGINT IS NULL OR r.exemplar_id = $1)
          AND ($2::BIGINT IS NULL OR r.usuario_id = $2)
          AND ($3::VARCHAR IS NULL OR r.status = $3)
          AND ($4::TIMESTAMPTZ IS NULL OR r.data_agendada >= $4)
          AND ($5::TIMESTAMPTZ IS NULL OR r.data_agendada < $5)
        ORDER BY r.data_agendada, r.id
        "#,
        SELECT_RESERVATION
    ))
    .bind(query.copy_id)
    .bind(query.user_id)
    .bind(query.status)
    .bind(query.from)
    .bind(query.to)
    .fetch_all(conn)
    .await?;

    Ok(reservations)
}

pub(super) async fn update(conn: &mut PgConnection, reservation: &Reservation) -> AppResult<Reservation> {
    let result = sqlx::query("UPDATE reservas SET status = $2, data_confirmacao = $3 WHERE id = $1")
        .bind(reservation.id)
        .bind(reservation.status)
        .bind(reservation.confirmed_at)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(reservation.id));
    }
    get(conn, reservation.id).await
}

/// Locked with SKIP LOCKED: rows held by a running operation are left
/// for the next sweep.
pub(super) async fn lock_expirable(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
    let reservations = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT r.*, NULL::BIGINT AS loan_id
        FROM reservas r
        WHERE r.status IN ($1, $2)
          AND r.data_agendada < $3
          AND NOT EXISTS (SELECT 1 FROM emprestimos e WHERE e.reserva_id = r.id)
        ORDER BY r.data_agendada, r.id
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(ReservationStatus::Pending)
    .bind(ReservationStatus::Approved)
    .bind(now)
    .fetch_all(conn)
    .await?;

    Ok(reservations)
}
