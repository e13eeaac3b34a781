//! PostgreSQL store
//!
//! Row locks are taken with `FOR UPDATE NOWAIT`, so two operations racing
//! for the same copy, reservation, loan or user fail one side immediately
//! with `ConcurrentModification` instead of queueing.

mod catalog;
mod categories;
mod copies;
mod loans;
mod operation_logs;
mod penalties;
mod reports;
mod reservations;
mod settings;
mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{Store, StoreTx};
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

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// Open database transaction; rolled back by sqlx when dropped uncommitted
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn insert_user(&mut self, user: &NewUser) -> AppResult<User> {
        users::insert(&mut self.tx, user).await
    }

    async fn get_user(&mut self, id: i64) -> AppResult<User> {
        users::get(&mut self.tx, id).await
    }

    async fn lock_user(&mut self, id: i64) -> AppResult<User> {
        users::lock(&mut self.tx, id).await
    }

    async fn list_users(&mut self) -> AppResult<Vec<User>> {
        users::list(&mut self.tx).await
    }

    async fn update_user(&mut self, user: &User) -> AppResult<User> {
        users::update(&mut self.tx, user).await
    }

    async fn delete_user(&mut self, id: i64) -> AppResult<()> {
        users::delete(&mut self.tx, id).await
    }

    async fn insert_category(&mut self, category: &CreateCategory) -> AppResult<Category> {
        categories::insert(&mut self.tx, category).await
    }

    async fn get_category(&mut self, id: i64) -> AppResult<Category> {
        categories::get(&mut self.tx, id).await
    }

    async fn list_categories(&mut self) -> AppResult<Vec<Category>> {
        categories::list(&mut self.tx).await
    }

    async fn update_category(&mut self, category: &Category) -> AppResult<Category> {
        categories::update(&mut self.tx, category).await
    }

    async fn delete_category(&mut self, id: i64) -> AppResult<()> {
        categories::delete(&mut self.tx, id).await
    }

    async fn insert_entry(&mut self, entry: &CreateCatalogEntry) -> AppResult<CatalogEntry> {
        catalog::insert(&mut self.tx, entry).await
    }

    async fn get_entry(&mut self, id: i64) -> AppResult<CatalogEntry> {
        catalog::get(&mut self.tx, id).await
    }

    async fn list_entries(&mut self) -> AppResult<Vec<CatalogEntry>> {
        catalog::list(&mut self.tx).await
    }

    async fn update_entry(&mut self, entry: &CatalogEntry) -> AppResult<CatalogEntry> {
        catalog::update(&mut self.tx, entry).await
    }

    async fn delete_entry(&mut self, id: i64) -> AppResult<()> {
        catalog::delete(&mut self.tx, id).await
    }

    async fn link_category(&mut self, entry_id: i64, category_id: i64) -> AppResult<CatalogCategoryLink> {
        catalog::link(&mut self.tx, entry_id, category_id).await
    }

    async fn unlink_category(&mut self, entry_id: i64, category_id: i64) -> AppResult<()> {
        catalog::unlink(&mut self.tx, entry_id, category_id).await
    }

    async fn list_entry_categories(&mut self, entry_id: i64) -> AppResult<Vec<Category>> {
        catalog::categories_of(&mut self.tx, entry_id).await
    }

    async fn insert_copy(&mut self, entry_id: i64, code: &str) -> AppResult<BookCopy> {
        copies::insert(&mut self.tx, entry_id, code).await
    }

    async fn get_copy(&mut self, id: i64) -> AppResult<BookCopy> {
        copies::get(&mut self.tx, id).await
    }

    async fn lock_copy(&mut self, id: i64) -> AppResult<BookCopy> {
        copies::lock(&mut self.tx, id).await
    }

    async fn list_copies(&mut self, query: &CopyQuery) -> AppResult<Vec<BookCopy>> {
        copies::list(&mut self.tx, query).await
    }

    async fn set_copy_state(&mut self, id: i64, state: CopyState) -> AppResult<BookCopy> {
        copies::set_state(&mut self.tx, id, state).await
    }

    async fn delete_copy(&mut self, id: i64) -> AppResult<()> {
        copies::delete(&mut self.tx, id).await
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        reservations::insert(&mut self.tx, reservation).await
    }

    async fn get_reservation(&mut self, id: i64) -> AppResult<Reservation> {
        reservations::get(&mut self.tx, id).await
    }

    async fn lock_reservation(&mut self, id: i64) -> AppResult<Reservation> {
        reservations::lock(&mut self.tx, id).await
    }

    async fn list_reservations(&mut self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        reservations::list(&mut self.tx, query).await
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<Reservation> {
        reservations::update(&mut self.tx, reservation).await
    }

    async fn lock_expirable_reservations(&mut self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        reservations::lock_expirable(&mut self.tx, now).await
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        loans::insert(&mut self.tx, loan).await
    }

    async fn get_loan(&mut self, id: i64) -> AppResult<Loan> {
        loans::get(&mut self.tx, id).await
    }

    async fn lock_loan(&mut self, id: i64) -> AppResult<Loan> {
        loans::lock(&mut self.tx, id).await
    }

    async fn list_loans(&mut self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        loans::list(&mut self.tx, query).await
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
        loans::update(&mut self.tx, loan).await
    }

    async fn mark_overdue(&mut self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        loans::mark_overdue(&mut self.tx, now).await
    }

    async fn delete_loan(&mut self, id: i64) -> AppResult<()> {
        loans::delete(&mut self.tx, id).await
    }

    async fn insert_penalty(&mut self, penalty: &NewPenalty) -> AppResult<PenaltyRecord> {
        penalties::insert(&mut self.tx, penalty).await
    }

    async fn list_penalties(&mut self, user_id: i64) -> AppResult<Vec<PenaltyRecord>> {
        penalties::list_for_user(&mut self.tx, user_id).await
    }

    async fn insert_report(&mut self, report: &RegisterReport, generated_at: DateTime<Utc>) -> AppResult<ReportRecord> {
        reports::insert(&mut self.tx, report, generated_at).await
    }

    async fn find_report(&mut self, month: i16, year: i32) -> AppResult<Option<ReportRecord>> {
        reports::find(&mut self.tx, month, year).await
    }

    async fn list_reports(&mut self) -> AppResult<Vec<ReportRecord>> {
        reports::list(&mut self.tx).await
    }

    async fn get_setting(&mut self, key: &str) -> AppResult<Option<SystemSetting>> {
        settings::get(&mut self.tx, key).await
    }

    async fn list_settings(&mut self) -> AppResult<Vec<SystemSetting>> {
        settings::list(&mut self.tx).await
    }

    async fn upsert_setting(&mut self, setting: &UpsertSetting) -> AppResult<SystemSetting> {
        settings::upsert(&mut self.tx, setting).await
    }

    async fn delete_setting(&mut self, key: &str) -> AppResult<()> {
        settings::delete(&mut self.tx, key).await
    }

    async fn insert_operation_log(&mut self, entry: &AuditEntry, at: DateTime<Utc>) -> AppResult<OperationLog> {
        operation_logs::insert(&mut self.tx, entry, at).await
    }

    async fn list_operation_logs(&mut self, query: &OperationLogQuery) -> AppResult<Vec<OperationLog>> {
        operation_logs::list(&mut self.tx, query).await
    }
}
