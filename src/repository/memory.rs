//! In-memory store
//!
//! Mirrors the constraints of the SQL schema (unique keys, `RESTRICT` and
//! `SET NULL` foreign keys) so the services behave the same on either back
//! end. A transaction holds the whole store for its lifetime and works on a
//! private copy that replaces the shared tables on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        catalog::{CatalogCategoryLink, CatalogEntry, CreateCatalogEntry},
        category::{Category, CreateCategory},
        copy::{BookCopy, CopyQuery},
        enums::{CopyState, LoanStatus, ReservationStatus},
        loan::{Loan, LoanQuery, NewLoan},
        operation_log::{AuditEntry, OperationLog, OperationLogQuery},
        penalty::{NewPenalty, PenaltyRecord},
        report::{RegisterReport, ReportRecord},
        reservation::{NewReservation, Reservation, ReservationQuery},
        setting::{SystemSetting, UpsertSetting},
        user::{NewUser, User},
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    sequence: i64,
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    entries: BTreeMap<i64, CatalogEntry>,
    links: BTreeMap<i64, CatalogCategoryLink>,
    copies: BTreeMap<i64, BookCopy>,
    reservations: BTreeMap<i64, Reservation>,
    loans: BTreeMap<i64, Loan>,
    penalties: BTreeMap<i64, PenaltyRecord>,
    reports: BTreeMap<i64, ReportRecord>,
    settings: BTreeMap<String, SystemSetting>,
    logs: BTreeMap<i64, OperationLog>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    /// Fill the derived `loan_id` column
    fn reservation_view(&self, reservation: &Reservation) -> Reservation {
        let mut view = reservation.clone();
        view.loan_id = self
            .loans
            .values()
            .find(|l| l.reservation_id == Some(reservation.id))
            .map(|l| l.id);
        view
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", what, id))
}

fn duplicate(constraint: &str) -> AppError {
    AppError::ConstraintViolation(format!("duplicate value violates {}", constraint))
}

fn restricted(what: &str, id: i64, by: &str) -> AppError {
    AppError::ConstraintViolation(format!("{} {} is still referenced by {}", what, id, by))
}

fn missing_reference(what: &str, id: i64) -> AppError {
    AppError::ConstraintViolation(format!("referenced {} {} does not exist", what, id))
}

/// Process-local store, mostly for tests and embedding
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }

    // -- users -------------------------------------------------------------

    async fn insert_user(&mut self, user: &NewUser) -> AppResult<User> {
        let t = &mut self.work;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(duplicate("usuarios_username_key"));
        }
        if t.users.values().any(|u| u.cpf == user.cpf) {
            return Err(duplicate("usuarios_cpf_key"));
        }
        let row = User {
            id: t.next_id(),
            username: user.username.clone(),
            password: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            is_active: true,
            date_joined: Utc::now(),
            cpf: user.cpf.clone(),
            phone: user.phone.clone(),
            verification_token: None,
            admin_token: None,
            locked_until: None,
        };
        t.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_user(&mut self, id: i64) -> AppResult<User> {
        self.work.users.get(&id).cloned().ok_or_else(|| not_found("User", id))
    }

    async fn lock_user(&mut self, id: i64) -> AppResult<User> {
        self.get_user(id).await
    }

    async fn list_users(&mut self) -> AppResult<Vec<User>> {
        Ok(self.work.users.values().cloned().collect())
    }

    async fn update_user(&mut self, user: &User) -> AppResult<User> {
        let row = self.work.users.get_mut(&user.id).ok_or_else(|| not_found("User", user.id))?;
        row.first_name = user.first_name.clone();
        row.last_name = user.last_name.clone();
        row.email = user.email.clone();
        row.phone = user.phone.clone();
        row.is_active = user.is_active;
        row.password = user.password.clone();
        row.verification_token = user.verification_token.clone();
        row.admin_token = user.admin_token.clone();
        row.locked_until = user.locked_until;
        Ok(row.clone())
    }

    async fn delete_user(&mut self, id: i64) -> AppResult<()> {
        let t = &mut self.work;
        if !t.users.contains_key(&id) {
            return Err(not_found("User", id));
        }
        if t.reservations.values().any(|r| r.user_id == id) {
            return Err(restricted("User", id, "reservas"));
        }
        if t.loans.values().any(|l| l.user_id == id) {
            return Err(restricted("User", id, "emprestimos"));
        }
        if t.penalties.values().any(|p| p.user_id == id) {
            return Err(restricted("User", id, "penalty_log"));
        }
        for log in t.logs.values_mut().filter(|l| l.user_id == Some(id)) {
            log.user_id = None;
        }
        t.users.remove(&id);
        Ok(())
    }

    // -- categories --------------------------------------------------------

    async fn insert_category(&mut self, category: &CreateCategory) -> AppResult<Category> {
        let t = &mut self.work;
        if t.categories.values().any(|c| c.name == category.name) {
            return Err(duplicate("categorias_nome_key"));
        }
        if let Some(parent_id) = category.parent_id {
            if !t.categories.contains_key(&parent_id) {
                return Err(missing_reference("category", parent_id));
            }
        }
        let row = Category {
            id: t.next_id(),
            name: category.name.clone(),
            description: category.description.clone(),
            parent_id: category.parent_id,
        };
        t.categories.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_category(&mut self, id: i64) -> AppResult<Category> {
        self.work.categories.get(&id).cloned().ok_or_else(|| not_found("Category", id))
    }

    async fn list_categories(&mut self) -> AppResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.work.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn update_category(&mut self, category: &Category) -> AppResult<Category> {
        let t = &mut self.work;
        if t.categories.values().any(|c| c.id != category.id && c.name == category.name) {
            return Err(duplicate("categorias_nome_key"));
        }
        if let Some(parent_id) = category.parent_id {
            if !t.categories.contains_key(&parent_id) {
                return Err(missing_reference("category", parent_id));
            }
        }
        let row = t
            .categories
            .get_mut(&category.id)
            .ok_or_else(|| not_found("Category", category.id))?;
        *row = category.clone();
        Ok(row.clone())
    }

    async fn delete_category(&mut self, id: i64) -> AppResult<()> {
        let t = &mut self.work;
        if !t.categories.contains_key(&id) {
            return Err(not_found("Category", id));
        }
        if t.categories.values().any(|c| c.parent_id == Some(id)) {
            return Err(restricted("Category", id, "subcategories"));
        }
        if t.links.values().any(|l| l.category_id == id) {
            return Err(restricted("Category", id, "livro_categoria"));
        }
        t.categories.remove(&id);
        Ok(())
    }

    // -- catalog entries ---------------------------------------------------

    async fn insert_entry(&mut self, entry: &CreateCatalogEntry) -> AppResult<CatalogEntry> {
        let t = &mut self.work;
        if entry.isbn.is_some() && t.entries.values().any(|e| e.isbn == entry.isbn) {
            return Err(duplicate("livros_base_isbn_key"));
        }
        let row = CatalogEntry {
            id: t.next_id(),
            title: entry.title.clone(),
            author: entry.author.clone(),
            synopsis: entry.synopsis.clone(),
            isbn: entry.isbn.clone(),
            cover_url: entry.cover_url.clone(),
        };
        t.entries.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_entry(&mut self, id: i64) -> AppResult<CatalogEntry> {
        self.work.entries.get(&id).cloned().ok_or_else(|| not_found("Catalog entry", id))
    }

    async fn list_entries(&mut self) -> AppResult<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = self.work.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(entries)
    }

    async fn update_entry(&mut self, entry: &CatalogEntry) -> AppResult<CatalogEntry> {
        let t = &mut self.work;
        if entry.isbn.is_some()
            && t.entries.values().any(|e| e.id != entry.id && e.isbn == entry.isbn)
        {
            return Err(duplicate("livros_base_isbn_key"));
        }
        let row = t
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| not_found("Catalog entry", entry.id))?;
        *row = entry.clone();
        Ok(row.clone())
    }

    async fn delete_entry(&mut self, id: i64) -> AppResult<()> {
        let t = &mut self.work;
        if !t.entries.contains_key(&id) {
            return Err(not_found("Catalog entry", id));
        }
        if t.copies.values().any(|c| c.entry_id == id) {
            return Err(restricted("Catalog entry", id, "livros"));
        }
        if t.links.values().any(|l| l.entry_id == id) {
            return Err(restricted("Catalog entry", id, "livro_categoria"));
        }
        t.entries.remove(&id);
        Ok(())
    }

    async fn link_category(&mut self, entry_id: i64, category_id: i64) -> AppResult<CatalogCategoryLink> {
        let t = &mut self.work;
        if !t.entries.contains_key(&entry_id) {
            return Err(missing_reference("catalog entry", entry_id));
        }
        if !t.categories.contains_key(&category_id) {
            return Err(missing_reference("category", category_id));
        }
        if t
            .links
            .values()
            .any(|l| l.entry_id == entry_id && l.category_id == category_id)
        {
            return Err(duplicate("livro_categoria_livro_categoria_key"));
        }
        let row = CatalogCategoryLink {
            id: t.next_id(),
            entry_id,
            category_id,
        };
        t.links.insert(row.id, row.clone());
        Ok(row)
    }

    async fn unlink_category(&mut self, entry_id: i64, category_id: i64) -> AppResult<()> {
        let t = &mut self.work;
        let id = t
            .links
            .values()
            .find(|l| l.entry_id == entry_id && l.category_id == category_id)
            .map(|l| l.id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Catalog entry {} is not linked to category {}",
                    entry_id, category_id
                ))
            })?;
        t.links.remove(&id);
        Ok(())
    }

    async fn list_entry_categories(&mut self, entry_id: i64) -> AppResult<Vec<Category>> {
        let t = &self.work;
        let mut categories: Vec<Category> = t
            .links
            .values()
            .filter(|l| l.entry_id == entry_id)
            .filter_map(|l| t.categories.get(&l.category_id).cloned())
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    // -- copies ------------------------------------------------------------

    async fn insert_copy(&mut self, entry_id: i64, code: &str) -> AppResult<BookCopy> {
        let t = &mut self.work;
        if !t.entries.contains_key(&entry_id) {
            return Err(missing_reference("catalog entry", entry_id));
        }
        if t.copies.values().any(|c| c.code == code) {
            return Err(duplicate("livros_codigo_exemplar_key"));
        }
        let row = BookCopy {
            id: t.next_id(),
            entry_id,
            code: code.to_string(),
            state: CopyState::Available,
        };
        t.copies.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_copy(&mut self, id: i64) -> AppResult<BookCopy> {
        self.work.copies.get(&id).cloned().ok_or_else(|| not_found("Copy", id))
    }

    async fn lock_copy(&mut self, id: i64) -> AppResult<BookCopy> {
        self.get_copy(id).await
    }

    async fn list_copies(&mut self, query: &CopyQuery) -> AppResult<Vec<BookCopy>> {
        let mut copies: Vec<BookCopy> = self
            .work
            .copies
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        copies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(copies)
    }

    async fn set_copy_state(&mut self, id: i64, state: CopyState) -> AppResult<BookCopy> {
        let row = self.work.copies.get_mut(&id).ok_or_else(|| not_found("Copy", id))?;
        row.state = state;
        Ok(row.clone())
    }

    async fn delete_copy(&mut self, id: i64) -> AppResult<()> {
        let t = &mut self.work;
        if !t.copies.contains_key(&id) {
            return Err(not_found("Copy", id));
        }
        if t.reservations.values().any(|r| r.copy_id == id) {
            return Err(restricted("Copy", id, "reservas"));
        }
        if t.loans.values().any(|l| l.copy_id == id) {
            return Err(restricted("Copy", id, "emprestimos"));
        }
        t.copies.remove(&id);
        Ok(())
    }

    // -- reservations ------------------------------------------------------

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        let t = &mut self.work;
        if !t.users.contains_key(&reservation.user_id) {
            return Err(missing_reference("user", reservation.user_id));
        }
        if !t.copies.contains_key(&reservation.copy_id) {
            return Err(missing_reference("copy", reservation.copy_id));
        }
        if t.reservations.values().any(|r| {
            r.copy_id == reservation.copy_id
                && r.scheduled_for == reservation.scheduled_for
                && r.occupies_slot()
        }) {
            return Err(duplicate("reservas_exemplar_agendada_key"));
        }
        let row = Reservation {
            id: t.next_id(),
            user_id: reservation.user_id,
            copy_id: reservation.copy_id,
            requested_at: reservation.requested_at,
            scheduled_for: reservation.scheduled_for,
            status: ReservationStatus::Pending,
            confirmed_at: None,
            loan_id: None,
        };
        t.reservations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_reservation(&mut self, id: i64) -> AppResult<Reservation> {
        let t = &self.work;
        t.reservations
            .get(&id)
            .map(|r| t.reservation_view(r))
            .ok_or_else(|| not_found("Reservation", id))
    }

    async fn lock_reservation(&mut self, id: i64) -> AppResult<Reservation> {
        self.get_reservation(id).await
    }

    async fn list_reservations(&mut self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let t = &self.work;
        let mut reservations: Vec<Reservation> = t
            .reservations
            .values()
            .filter(|r| query.matches(r))
            .map(|r| t.reservation_view(r))
            .collect();
        reservations.sort_by_key(|r| (r.scheduled_for, r.id));
        Ok(reservations)
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<Reservation> {
        let t = &mut self.work;
        let row = t
            .reservations
            .get_mut(&reservation.id)
            .ok_or_else(|| not_found("Reservation", reservation.id))?;
        row.status = reservation.status;
        row.confirmed_at = reservation.confirmed_at;
        let row = row.clone();
        Ok(t.reservation_view(&row))
    }

    async fn lock_expirable_reservations(&mut self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        let t = &self.work;
        Ok(t.reservations
            .values()
            .filter(|r| r.scheduled_for < now)
            .map(|r| t.reservation_view(r))
            .filter(|r| r.is_open())
            .collect())
    }

    // -- loans -------------------------------------------------------------

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let t = &mut self.work;
        if !t.users.contains_key(&loan.user_id) {
            return Err(missing_reference("user", loan.user_id));
        }
        if !t.copies.contains_key(&loan.copy_id) {
            return Err(missing_reference("copy", loan.copy_id));
        }
        if loan.reservation_id.is_some()
            && t.loans.values().any(|l| l.reservation_id == loan.reservation_id)
        {
            return Err(duplicate("emprestimos_reserva_id_key"));
        }
        if t.loans.values().any(|l| l.copy_id == loan.copy_id && l.is_open()) {
            return Err(duplicate("emprestimos_exemplar_aberto_key"));
        }
        let row = Loan {
            id: t.next_id(),
            user_id: loan.user_id,
            copy_id: loan.copy_id,
            reservation_id: loan.reservation_id,
            picked_up_at: loan.picked_up_at,
            due_at: loan.due_at,
            returned_at: None,
            status: LoanStatus::InUse,
            renewals: 0,
        };
        t.loans.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_loan(&mut self, id: i64) -> AppResult<Loan> {
        self.work.loans.get(&id).cloned().ok_or_else(|| not_found("Loan", id))
    }

    async fn lock_loan(&mut self, id: i64) -> AppResult<Loan> {
        self.get_loan(id).await
    }

    async fn list_loans(&mut self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .work
            .loans
            .values()
            .filter(|l| query.matches(l))
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.due_at, l.id));
        Ok(loans)
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
        let row = self.work.loans.get_mut(&loan.id).ok_or_else(|| not_found("Loan", loan.id))?;
        row.due_at = loan.due_at;
        row.returned_at = loan.returned_at;
        row.status = loan.status;
        row.renewals = loan.renewals;
        Ok(row.clone())
    }

    async fn mark_overdue(&mut self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let mut moved = Vec::new();
        for loan in self.work.loans.values_mut() {
            if loan.status == LoanStatus::InUse && loan.due_at < now {
                loan.status = LoanStatus::Overdue;
                moved.push(loan.clone());
            }
        }
        Ok(moved)
    }

    async fn delete_loan(&mut self, id: i64) -> AppResult<()> {
        let t = &mut self.work;
        let loan = t.loans.get(&id).ok_or_else(|| not_found("Loan", id))?;
        if loan.is_open() {
            return Err(AppError::ConstraintViolation(format!(
                "Loan {} is still {} and cannot be deleted",
                id, loan.status
            )));
        }
        t.loans.remove(&id);
        for penalty in t.penalties.values_mut().filter(|p| p.loan_id == Some(id)) {
            penalty.loan_id = None;
        }
        Ok(())
    }

    // -- penalties ---------------------------------------------------------

    async fn insert_penalty(&mut self, penalty: &NewPenalty) -> AppResult<PenaltyRecord> {
        let t = &mut self.work;
        if !t.users.contains_key(&penalty.user_id) {
            return Err(missing_reference("user", penalty.user_id));
        }
        let row = PenaltyRecord {
            id: t.next_id(),
            user_id: penalty.user_id,
            loan_id: penalty.loan_id,
            days_late: penalty.days_late,
            applied_at: penalty.applied_at,
            locked_until: penalty.locked_until,
        };
        t.penalties.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_penalties(&mut self, user_id: i64) -> AppResult<Vec<PenaltyRecord>> {
        Ok(self
            .work
            .penalties
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    // -- reports -----------------------------------------------------------

    async fn insert_report(&mut self, report: &RegisterReport, generated_at: DateTime<Utc>) -> AppResult<ReportRecord> {
        let t = &mut self.work;
        if t
            .reports
            .values()
            .any(|r| r.month == report.month && r.year == report.year)
        {
            return Err(duplicate("report_record_mes_ano_key"));
        }
        let row = ReportRecord {
            id: t.next_id(),
            month: report.month,
            year: report.year,
            generated_at,
            file_path: report.file_path.clone(),
        };
        t.reports.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_report(&mut self, month: i16, year: i32) -> AppResult<Option<ReportRecord>> {
        Ok(self
            .work
            .reports
            .values()
            .find(|r| r.month == month && r.year == year)
            .cloned())
    }

    async fn list_reports(&mut self) -> AppResult<Vec<ReportRecord>> {
        let mut reports: Vec<ReportRecord> = self.work.reports.values().cloned().collect();
        reports.sort_by_key(|r| (std::cmp::Reverse(r.year), std::cmp::Reverse(r.month)));
        Ok(reports)
    }

    // -- settings ----------------------------------------------------------

    async fn get_setting(&mut self, key: &str) -> AppResult<Option<SystemSetting>> {
        Ok(self.work.settings.get(key).cloned())
    }

    async fn list_settings(&mut self) -> AppResult<Vec<SystemSetting>> {
        Ok(self.work.settings.values().cloned().collect())
    }

    async fn upsert_setting(&mut self, setting: &UpsertSetting) -> AppResult<SystemSetting> {
        let row = SystemSetting {
            key: setting.key.clone(),
            value: setting.value.clone(),
            description: setting.description.clone(),
        };
        self.work.settings.insert(row.key.clone(), row.clone());
        Ok(row)
    }

    async fn delete_setting(&mut self, key: &str) -> AppResult<()> {
        self.work
            .settings
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Setting {} not found", key)))
    }

    // -- operation log -----------------------------------------------------

    async fn insert_operation_log(&mut self, entry: &AuditEntry, at: DateTime<Utc>) -> AppResult<OperationLog> {
        let t = &mut self.work;
        if let Some(user_id) = entry.actor {
            if !t.users.contains_key(&user_id) {
                return Err(missing_reference("user", user_id));
            }
        }
        let row = OperationLog {
            id: t.next_id(),
            user_id: entry.actor,
            table: entry.table.to_string(),
            action: entry.action.to_string(),
            description: entry.description.clone(),
            occurred_at: at,
        };
        t.logs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_operation_logs(&mut self, query: &OperationLogQuery) -> AppResult<Vec<OperationLog>> {
        let mut logs: Vec<OperationLog> = self
            .work
            .logs
            .values()
            .filter(|l| query.matches(l))
            .cloned()
            .collect();
        logs.sort_by_key(|l| std::cmp::Reverse((l.occurred_at, l.id)));
        if let Some(limit) = query.limit {
            logs.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(logs)
    }
}
