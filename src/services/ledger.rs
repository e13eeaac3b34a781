//! Lending ledger: reservation, loan and penalty lifecycle
//!
//! Every operation runs in one transaction and locks the rows it mutates,
//! keeping these invariants across copies, reservations and loans:
//!
//! * a copy has at most one open reservation or open loan;
//! * a user whose lock lies in the future cannot reserve or borrow;
//! * a loan's return timestamp is written once;
//! * a penalty's lock never ends before the loan's due date.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{CopyState, LoanStatus, ReservationStatus},
        loan::{Loan, LoanQuery, NewLoan},
        operation_log::AuditEntry,
        penalty::{self, NewPenalty, PenaltyRecord},
        reservation::{NewReservation, RequestReservation, Reservation, ReservationQuery},
        setting::LendingPolicy,
        user::User,
    },
    repository::Repository,
    services::{
        audit::{self, AuditSink},
        settings::resolve_policy,
    },
};

/// Result of a return: the closed loan and the penalty it triggered, if late
#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub loan: Loan,
    pub penalty: Option<PenaltyRecord>,
}

#[derive(Clone)]
pub struct LedgerService {
    repository: Repository,
    defaults: LendingPolicy,
    audit: Arc<dyn AuditSink>,
}

fn ensure_unlocked(user: &User, now: DateTime<Utc>) -> AppResult<()> {
    match user.locked_until {
        Some(until) if until > now => Err(AppError::UserLocked {
            user_id: user.id,
            until,
        }),
        _ => Ok(()),
    }
}

impl LedgerService {
    pub fn new(repository: Repository, defaults: LendingPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            repository,
            defaults,
            audit,
        }
    }

    async fn audit(&self, entry: AuditEntry) {
        audit::emit(self.audit.as_ref(), entry).await;
    }

    /// Place a pending hold on an available copy
    pub async fn request_reservation(
        &self,
        request: RequestReservation,
        actor: Option<i64>,
    ) -> AppResult<Reservation> {
        let now = Utc::now();
        if request.scheduled_for <= now {
            return Err(AppError::Validation(
                "Reservation must be scheduled in the future".to_string(),
            ));
        }

        let mut tx = self.repository.begin().await?;

        let user = tx.lock_user(request.user_id).await?;
        ensure_unlocked(&user, now)?;

        let copy = tx.lock_copy(request.copy_id).await?;
        if copy.state != CopyState::Available {
            return Err(AppError::CopyUnavailable(format!(
                "Copy {} is {}",
                copy.code, copy.state
            )));
        }

        let holds = tx
            .list_reservations(&ReservationQuery {
                copy_id: Some(copy.id),
                ..Default::default()
            })
            .await?;
        if holds.iter().any(|r| r.is_open()) {
            return Err(AppError::CopyUnavailable(format!(
                "Copy {} already has an open reservation",
                copy.code
            )));
        }
        if holds
            .iter()
            .any(|r| r.occupies_slot() && r.scheduled_for == request.scheduled_for)
        {
            return Err(AppError::CopyUnavailable(format!(
                "Copy {} is already reserved for {}",
                copy.code, request.scheduled_for
            )));
        }

        let reservation = tx
            .insert_reservation(&NewReservation {
                user_id: user.id,
                copy_id: copy.id,
                requested_at: now,
                scheduled_for: request.scheduled_for,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = reservation.id,
            user_id = user.id,
            copy_id = copy.id,
            "Reservation requested"
        );
        self.audit(AuditEntry::new(
            "reservas",
            "create",
            format!(
                "Reservation {} of copy {} for user {} at {}",
                reservation.id, copy.code, user.id, reservation.scheduled_for
            ),
            actor,
        ))
        .await;

        Ok(reservation)
    }

    /// Confirm a pending reservation and set its copy aside
    pub async fn approve_reservation(&self, reservation_id: i64, actor: Option<i64>) -> AppResult<Reservation> {
        let now = Utc::now();
        let mut tx = self.repository.begin().await?;

        let mut reservation = tx.lock_reservation(reservation_id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is {}, expected pending",
                reservation.id, reservation.status
            )));
        }

        let copy = tx.lock_copy(reservation.copy_id).await?;
        if copy.state != CopyState::Available {
            return Err(AppError::CopyUnavailable(format!(
                "Copy {} is {}",
                copy.code, copy.state
            )));
        }

        reservation.status = ReservationStatus::Approved;
        reservation.confirmed_at = Some(now);
        let reservation = tx.update_reservation(&reservation).await?;
        tx.set_copy_state(copy.id, CopyState::Reserved).await?;
        tx.commit().await?;

        tracing::info!(reservation_id = reservation.id, copy_id = copy.id, "Reservation approved");
        self.audit(AuditEntry::new(
            "reservas",
            "approve",
            format!("Reservation {} approved, copy {} reserved", reservation.id, copy.code),
            actor,
        ))
        .await;

        Ok(reservation)
    }

    /// Withdraw a reservation that was never approved
    pub async fn cancel_reservation(&self, reservation_id: i64, actor: Option<i64>) -> AppResult<Reservation> {
        let mut tx = self.repository.begin().await?;

        let mut reservation = tx.lock_reservation(reservation_id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is {}, only pending reservations can be cancelled",
                reservation.id, reservation.status
            )));
        }

        reservation.status = ReservationStatus::Cancelled;
        let reservation = tx.update_reservation(&reservation).await?;
        tx.commit().await?;

        tracing::info!(reservation_id = reservation.id, "Reservation cancelled");
        self.audit(AuditEntry::new(
            "reservas",
            "cancel",
            format!("Reservation {} cancelled", reservation.id),
            actor,
        ))
        .await;

        Ok(reservation)
    }

    /// Hand the reserved copy over, consuming the reservation
    pub async fn issue_loan(&self, reservation_id: i64, actor: Option<i64>) -> AppResult<Loan> {
        let now = Utc::now();
        let mut tx = self.repository.begin().await?;

        let reservation = tx.lock_reservation(reservation_id).await?;
        if reservation.status != ReservationStatus::Approved {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is {}, expected approved",
                reservation.id, reservation.status
            )));
        }
        if let Some(loan_id) = reservation.loan_id {
            return Err(AppError::InvalidState(format!(
                "Reservation {} was already turned into loan {}",
                reservation.id, loan_id
            )));
        }

        let user = tx.lock_user(reservation.user_id).await?;
        ensure_unlocked(&user, now)?;

        let copy = tx.lock_copy(reservation.copy_id).await?;
        if copy.state != CopyState::Reserved {
            return Err(AppError::InvalidState(format!(
                "Copy {} is {}, expected reserved",
                copy.code, copy.state
            )));
        }

        let policy = resolve_policy(tx.as_mut(), self.defaults).await?;
        let loan = tx
            .insert_loan(&NewLoan {
                user_id: user.id,
                copy_id: copy.id,
                reservation_id: Some(reservation.id),
                picked_up_at: now,
                due_at: policy.due_after(now)?,
            })
            .await?;
        tx.set_copy_state(copy.id, CopyState::Unavailable).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            reservation_id = reservation.id,
            copy_id = copy.id,
            due_at = %loan.due_at,
            "Loan issued"
        );
        self.audit(AuditEntry::new(
            "emprestimos",
            "create",
            format!(
                "Loan {} of copy {} to user {} due {}",
                loan.id, copy.code, user.id, loan.due_at
            ),
            actor,
        ))
        .await;

        Ok(loan)
    }

    /// Close a loan and release its copy; a late return locks the borrower
    pub async fn return_copy(
        &self,
        loan_id: i64,
        returned_at: DateTime<Utc>,
        actor: Option<i64>,
    ) -> AppResult<ReturnOutcome> {
        let now = Utc::now();
        let mut tx = self.repository.begin().await?;

        let mut loan = tx.lock_loan(loan_id).await?;
        if !loan.is_open() {
            return Err(AppError::InvalidState(format!(
                "Loan {} is already returned",
                loan.id
            )));
        }
        if returned_at < loan.picked_up_at {
            return Err(AppError::Validation(format!(
                "Return time {} precedes pickup {}",
                returned_at, loan.picked_up_at
            )));
        }

        let copy = tx.lock_copy(loan.copy_id).await?;
        let mut user = tx.lock_user(loan.user_id).await?;
        let policy = resolve_policy(tx.as_mut(), self.defaults).await?;
        let late = penalty::assess_return(loan.due_at, returned_at, &policy)?;

        loan.returned_at = Some(returned_at);
        loan.status = LoanStatus::Returned;
        let loan = tx.update_loan(&loan).await?;
        tx.set_copy_state(copy.id, CopyState::Available).await?;

        let penalty = match late {
            Some(late) => {
                let record = tx
                    .insert_penalty(&NewPenalty {
                        user_id: user.id,
                        loan_id: Some(loan.id),
                        days_late: late.days_late,
                        applied_at: now,
                        locked_until: late.locked_until,
                    })
                    .await?;
                user.locked_until = Some(match user.locked_until {
                    Some(existing) if existing > late.locked_until => existing,
                    _ => late.locked_until,
                });
                tx.update_user(&user).await?;
                Some(record)
            }
            None => None,
        };
        tx.commit().await?;

        tracing::info!(loan_id = loan.id, copy_id = copy.id, "Copy returned");
        self.audit(AuditEntry::new(
            "emprestimos",
            "return",
            format!("Loan {} returned, copy {} available", loan.id, copy.code),
            actor,
        ))
        .await;

        if let Some(record) = &penalty {
            tracing::info!(
                user_id = user.id,
                days_late = record.days_late,
                locked_until = %record.locked_until,
                "Late return penalty applied"
            );
            self.audit(AuditEntry::new(
                "penalty_log",
                "create",
                format!(
                    "User {} locked until {} ({} days late on loan {})",
                    user.id, record.locked_until, record.days_late, loan.id
                ),
                actor,
            ))
            .await;
        }

        Ok(ReturnOutcome { loan, penalty })
    }

    /// Push the due date back by one loan period
    pub async fn renew_loan(&self, loan_id: i64, actor: Option<i64>) -> AppResult<Loan> {
        let mut tx = self.repository.begin().await?;

        let mut loan = tx.lock_loan(loan_id).await?;
        if loan.status != LoanStatus::InUse {
            return Err(AppError::InvalidState(format!(
                "Loan {} is {}, only loans in use can be renewed",
                loan.id, loan.status
            )));
        }

        let policy = resolve_policy(tx.as_mut(), self.defaults).await?;
        if loan.renewals >= policy.max_renewals {
            return Err(AppError::RenewalLimitExceeded {
                current: loan.renewals,
                max: policy.max_renewals,
            });
        }

        loan.renewals += 1;
        loan.due_at = policy.due_after(loan.due_at)?;
        let loan = tx.update_loan(&loan).await?;
        tx.commit().await?;

        tracing::info!(loan_id = loan.id, renewals = loan.renewals, due_at = %loan.due_at, "Loan renewed");
        self.audit(AuditEntry::new(
            "emprestimos",
            "renew",
            format!(
                "Loan {} renewed ({}/{}), due {}",
                loan.id, loan.renewals, policy.max_renewals, loan.due_at
            ),
            actor,
        ))
        .await;

        Ok(loan)
    }

    /// Flag loans past due. Returns only the loans moved by this pass.
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let mut tx = self.repository.begin().await?;
        let moved = tx.mark_overdue(now).await?;
        tx.commit().await?;

        if moved.is_empty() {
            tracing::debug!("No loan became overdue");
            return Ok(moved);
        }

        tracing::info!(count = moved.len(), "Loans marked overdue");
        let ids: Vec<String> = moved.iter().map(|l| l.id.to_string()).collect();
        self.audit(AuditEntry::new(
            "emprestimos",
            "overdue",
            format!("Loans marked overdue: {}", ids.join(", ")),
            None,
        ))
        .await;

        Ok(moved)
    }

    /// Expire reservations whose time has passed without pickup, releasing
    /// copies held for approved ones. Returns only the expired reservations.
    pub async fn expire_reservations(&self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        let mut tx = self.repository.begin().await?;

        let candidates = tx.lock_expirable_reservations(now).await?;
        let mut expired = Vec::with_capacity(candidates.len());
        for mut reservation in candidates {
            if reservation.status == ReservationStatus::Approved {
                let copy = tx.lock_copy(reservation.copy_id).await?;
                if copy.state == CopyState::Reserved {
                    tx.set_copy_state(copy.id, CopyState::Available).await?;
                }
            }
            reservation.status = ReservationStatus::Expired;
            expired.push(tx.update_reservation(&reservation).await?);
        }
        tx.commit().await?;

        if expired.is_empty() {
            tracing::debug!("No reservation expired");
            return Ok(expired);
        }

        tracing::info!(count = expired.len(), "Reservations expired");
        let ids: Vec<String> = expired.iter().map(|r| r.id.to_string()).collect();
        self.audit(AuditEntry::new(
            "reservas",
            "expire",
            format!("Reservations expired: {}", ids.join(", ")),
            None,
        ))
        .await;

        Ok(expired)
    }

    pub async fn get_reservation(&self, id: i64) -> AppResult<Reservation> {
        let mut tx = self.repository.begin().await?;
        tx.get_reservation(id).await
    }

    /// Reservations by copy, user, status and scheduled-time range
    pub async fn list_reservations(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let mut tx = self.repository.begin().await?;
        tx.list_reservations(query).await
    }

    pub async fn get_loan(&self, id: i64) -> AppResult<Loan> {
        let mut tx = self.repository.begin().await?;
        tx.get_loan(id).await
    }

    /// Loans by user, copy and status
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let mut tx = self.repository.begin().await?;
        tx.list_loans(query).await
    }
}
