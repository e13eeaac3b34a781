//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::enums::LoanStatus;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i64,
    #[sqlx(rename = "usuario_id")]
    pub user_id: i64,
    #[sqlx(rename = "exemplar_id")]
    pub copy_id: i64,
    #[sqlx(rename = "reserva_id")]
    pub reservation_id: Option<i64>,
    #[sqlx(rename = "data_retirada")]
    pub picked_up_at: DateTime<Utc>,
    #[sqlx(rename = "data_prevista_devolucao")]
    pub due_at: DateTime<Utc>,
    #[sqlx(rename = "data_devolucao_real")]
    pub returned_at: Option<DateTime<Utc>>,
    #[sqlx(rename = "status_emprestimo")]
    pub status: LoanStatus,
    #[sqlx(rename = "num_renovacoes")]
    pub renewals: i16,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// Fields ready for insertion
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: i64,
    pub copy_id: i64,
    pub reservation_id: Option<i64>,
    pub picked_up_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Loan listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanQuery {
    pub user_id: Option<i64>,
    pub copy_id: Option<i64>,
    pub status: Option<LoanStatus>,
}

impl LoanQuery {
    pub fn matches(&self, loan: &Loan) -> bool {
        self.user_id.map_or(true, |id| loan.user_id == id)
            && self.copy_id.map_or(true, |id| loan.copy_id == id)
            && self.status.map_or(true, |s| loan.status == s)
    }
}
