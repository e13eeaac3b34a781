//! Reservation (hold on a copy) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::enums::ReservationStatus;

/// Reservation from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i64,
    #[sqlx(rename = "usuario_id")]
    pub user_id: i64,
    #[sqlx(rename = "exemplar_id")]
    pub copy_id: i64,
    #[sqlx(rename = "data_solicitacao")]
    pub requested_at: DateTime<Utc>,
    #[sqlx(rename = "data_agendada")]
    pub scheduled_for: DateTime<Utc>,
    pub status: ReservationStatus,
    #[sqlx(rename = "data_confirmacao")]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Loan issued from this reservation (joined from `emprestimos.reserva_id`)
    #[sqlx(default)]
    pub loan_id: Option<i64>,
}

impl Reservation {
    /// Pending, or approved and not yet picked up
    pub fn is_open(&self) -> bool {
        match self.status {
            ReservationStatus::Pending => true,
            ReservationStatus::Approved => self.loan_id.is_none(),
            ReservationStatus::Cancelled | ReservationStatus::Expired => false,
        }
    }

    /// Holds the (copy, scheduled time) slot; consumed reservations keep it
    pub fn occupies_slot(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Reservation request
#[derive(Debug, Clone, Deserialize)]
pub struct RequestReservation {
    pub user_id: i64,
    pub copy_id: i64,
    pub scheduled_for: DateTime<Utc>,
}

/// Fields ready for insertion
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: i64,
    pub copy_id: i64,
    pub requested_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
}

/// Reservation listing filter; the time range applies to `scheduled_for`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationQuery {
    pub copy_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<ReservationStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReservationQuery {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.copy_id.map_or(true, |id| reservation.copy_id == id)
            && self.user_id.map_or(true, |id| reservation.user_id == id)
            && self.status.map_or(true, |s| reservation.status == s)
            && self.from.map_or(true, |from| reservation.scheduled_for >= from)
            && self.to.map_or(true, |to| reservation.scheduled_for < to)
    }
}
