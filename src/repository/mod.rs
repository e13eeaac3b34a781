//! Repository layer: the storage interface and its back ends
//!
//! Every read and write goes through a [`StoreTx`] obtained from
//! [`Repository::begin`]. A transaction is all-or-nothing: dropping it
//! without calling [`StoreTx::commit`] discards its writes. Uniqueness and
//! referential failures come back as [`AppError::ConstraintViolation`],
//! lock conflicts as [`AppError::ConcurrentModification`].

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        catalog::{CatalogCategoryLink, CatalogEntry, CreateCatalogEntry},
        category::{Category, CreateCategory},
        copy::{BookCopy, CopyQuery},
        enums::CopyState,
        loan::{Loan, LoanQuery, NewLoan},
        operation_log::{AuditEntry, OperationLog, OperationLogQuery},
        penalty::{NewPenalty, PenaltyRecord},
        report::{RegisterReport, ReportRecord},
        reservation::{NewReservation, Reservation, ReservationQuery},
        setting::{SystemSetting, UpsertSetting},
        user::{NewUser, User},
    },
};

/// Source of transactions
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;
}

/// One transaction against the lending schema.
///
/// `lock_*` methods read a row for update: the row stays locked until the
/// transaction ends, and a row already locked elsewhere fails fast with
/// `ConcurrentModification`.
#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;

    // Users
    async fn insert_user(&mut self, user: &NewUser) -> AppResult<User>;
    async fn get_user(&mut self, id: i64) -> AppResult<User>;
    async fn lock_user(&mut self, id: i64) -> AppResult<User>;
    async fn list_users(&mut self) -> AppResult<Vec<User>>;
    async fn update_user(&mut self, user: &User) -> AppResult<User>;
    async fn delete_user(&mut self, id: i64) -> AppResult<()>;

    // Categories
    async fn insert_category(&mut self, category: &CreateCategory) -> AppResult<Category>;
    async fn get_category(&mut self, id: i64) -> AppResult<Category>;
    async fn list_categories(&mut self) -> AppResult<Vec<Category>>;
    async fn update_category(&mut self, category: &Category) -> AppResult<Category>;
    async fn delete_category(&mut self, id: i64) -> AppResult<()>;

    // Catalog entries
    async fn insert_entry(&mut self, entry: &CreateCatalogEntry) -> AppResult<CatalogEntry>;
    async fn get_entry(&mut self, id: i64) -> AppResult<CatalogEntry>;
    async fn list_entries(&mut self) -> AppResult<Vec<CatalogEntry>>;
    async fn update_entry(&mut self, entry: &CatalogEntry) -> AppResult<CatalogEntry>;
    async fn delete_entry(&mut self, id: i64) -> AppResult<()>;
    async fn link_category(&mut self, entry_id: i64, category_id: i64) -> AppResult<CatalogCategoryLink>;
    async fn unlink_category(&mut self, entry_id: i64, category_id: i64) -> AppResult<()>;
    async fn list_entry_categories(&mut self, entry_id: i64) -> AppResult<Vec<Category>>;

    // Copies
    async fn insert_copy(&mut self, entry_id: i64, code: &str) -> AppResult<BookCopy>;
    async fn get_copy(&mut self, id: i64) -> AppResult<BookCopy>;
    async fn lock_copy(&mut self, id: i64) -> AppResult<BookCopy>;
    async fn list_copies(&mut self, query: &CopyQuery) -> AppResult<Vec<BookCopy>>;
    async fn set_copy_state(&mut self, id: i64, state: CopyState) -> AppResult<BookCopy>;
    async fn delete_copy(&mut self, id: i64) -> AppResult<()>;

    // Reservations
    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation>;
    async fn get_reservation(&mut self, id: i64) -> AppResult<Reservation>;
    async fn lock_reservation(&mut self, id: i64) -> AppResult<Reservation>;
    async fn list_reservations(&mut self, query: &ReservationQuery) -> AppResult<Vec<Reservation>>;
    /// Writes status and confirmation timestamp
    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<Reservation>;
    /// Pending or approved-but-unconsumed reservations scheduled before `now`, locked
    async fn lock_expirable_reservations(&mut self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>>;

    // Loans
    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;
    async fn get_loan(&mut self, id: i64) -> AppResult<Loan>;
    async fn lock_loan(&mut self, id: i64) -> AppResult<Loan>;
    async fn list_loans(&mut self, query: &LoanQuery) -> AppResult<Vec<Loan>>;
    /// Writes due date, return date, status and renewal count
    async fn update_loan(&mut self, loan: &Loan) -> AppResult<Loan>;
    /// Moves every in-use loan due before `now` to overdue, returning the moved rows
    async fn mark_overdue(&mut self, now: DateTime<Utc>) -> AppResult<Vec<Loan>>;
    async fn delete_loan(&mut self, id: i64) -> AppResult<()>;

    // Penalties
    async fn insert_penalty(&mut self, penalty: &NewPenalty) -> AppResult<PenaltyRecord>;
    async fn list_penalties(&mut self, user_id: i64) -> AppResult<Vec<PenaltyRecord>>;

    // Reports
    async fn insert_report(&mut self, report: &RegisterReport, generated_at: DateTime<Utc>) -> AppResult<ReportRecord>;
    async fn find_report(&mut self, month: i16, year: i32) -> AppResult<Option<ReportRecord>>;
    async fn list_reports(&mut self) -> AppResult<Vec<ReportRecord>>;

    // Settings
    async fn get_setting(&mut self, key: &str) -> AppResult<Option<SystemSetting>>;
    async fn list_settings(&mut self) -> AppResult<Vec<SystemSetting>>;
    async fn upsert_setting(&mut self, setting: &UpsertSetting) -> AppResult<SystemSetting>;
    async fn delete_setting(&mut self, key: &str) -> AppResult<()>;

    // Operation log
    async fn insert_operation_log(&mut self, entry: &AuditEntry, at: DateTime<Utc>) -> AppResult<OperationLog>;
    async fn list_operation_logs(&mut self, query: &OperationLogQuery) -> AppResult<Vec<OperationLog>>;
}

/// Handle on the configured store, shared by all services
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    /// Create a repository backed by PostgreSQL
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_store(Arc::new(postgres::PgStore::new(pool)))
    }

    /// Create a repository backed by process memory
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(memory::MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Start a transaction
    pub async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        self.store.begin().await
    }
}
