//! Lending lifecycle tests against the in-memory store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockall::mock;

use lending_ledger::{
    error::{AppError, AppResult},
    models::{
        catalog::CreateCatalogEntry,
        category::{CreateCategory, UpdateCategory},
        copy::{BookCopy, CreateCopy},
        enums::{CopyState, LoanStatus, ReservationStatus},
        loan::{Loan, LoanQuery},
        operation_log::{AuditEntry, OperationLogQuery},
        report::RegisterReport,
        reservation::{RequestReservation, Reservation, ReservationQuery},
        setting::{LendingPolicy, UpsertSetting, MAX_RENEWALS_KEY, LOAN_PERIOD_DAYS_KEY},
        user::{CreateUser, User},
    },
    services::audit::AuditSink,
    Repository, Services,
};

mock! {
    pub Sink {}

    #[async_trait]
    impl AuditSink for Sink {
        async fn record(&self, entry: AuditEntry) -> AppResult<()>;
    }
}

/// Keeps every entry it receives
#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingSink {
    fn actions(&self) -> Vec<(&'static str, &'static str)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.table, e.action))
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

fn setup() -> (Repository, Services) {
    let repository = Repository::in_memory();
    let services = Services::new(repository.clone(), LendingPolicy::default());
    (repository, services)
}

async fn create_reader(services: &Services, username: &str, cpf: &str) -> User {
    services
        .users
        .create_user(
            CreateUser {
                username: username.to_string(),
                password: "leitura-diaria".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Souza".to_string(),
                email: format!("{}@example.org", username),
                cpf: cpf.to_string(),
                phone: String::new(),
            },
            None,
        )
        .await
        .unwrap()
}

async fn create_copy(services: &Services, code: &str) -> BookCopy {
    let entry = services
        .catalog
        .create_entry(
            CreateCatalogEntry {
                title: "Dom Casmurro".to_string(),
                author: "Machado de Assis".to_string(),
                synopsis: None,
                isbn: None,
                cover_url: None,
            },
            None,
        )
        .await
        .unwrap();
    services
        .catalog
        .create_copy(
            CreateCopy {
                entry_id: entry.id,
                code: code.to_string(),
            },
            None,
        )
        .await
        .unwrap()
}

async fn reserve(services: &Services, user: &User, copy: &BookCopy) -> AppResult<Reservation> {
    services
        .ledger
        .request_reservation(
            RequestReservation {
                user_id: user.id,
                copy_id: copy.id,
                scheduled_for: Utc::now() + Duration::hours(1),
            },
            Some(user.id),
        )
        .await
}

async fn open_loan(services: &Services, user: &User, copy: &BookCopy) -> Loan {
    let reservation = reserve(services, user, copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    services.ledger.issue_loan(reservation.id, None).await.unwrap()
}

async fn lock_user_until(repository: &Repository, user_id: i64, days: i64) {
    let mut tx = repository.begin().await.unwrap();
    let mut user = tx.lock_user(user_id).await.unwrap();
    user.locked_until = Some(Utc::now() + Duration::days(days));
    tx.update_user(&user).await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_full_cycle_with_late_return() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Available);

    let reservation = services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Approved);
    assert!(reservation.confirmed_at.is_some());
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Reserved);

    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();
    assert_eq!(loan.status, LoanStatus::InUse);
    assert_eq!(loan.reservation_id, Some(reservation.id));
    assert_eq!(loan.due_at - loan.picked_up_at, Duration::days(14));
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Unavailable);

    let consumed = services.ledger.get_reservation(reservation.id).await.unwrap();
    assert_eq!(consumed.loan_id, Some(loan.id));
    assert!(!consumed.is_open());

    let returned_at = loan.due_at + Duration::days(3);
    let outcome = services.ledger.return_copy(loan.id, returned_at, None).await.unwrap();

    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert_eq!(outcome.loan.returned_at, Some(returned_at));
    let penalty = outcome.penalty.expect("late return must be penalised");
    assert_eq!(penalty.days_late, 3);
    assert_eq!(penalty.loan_id, Some(loan.id));
    assert_eq!(penalty.locked_until, returned_at + Duration::days(3));
    assert!(penalty.locked_until >= loan.due_at);

    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Available);
    let reader = services.users.get_by_id(reader.id).await.unwrap();
    assert_eq!(reader.locked_until, Some(penalty.locked_until));
    assert_eq!(services.users.penalties(reader.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_on_time_return_leaves_user_unlocked() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();

    let outcome = services
        .ledger
        .return_copy(loan.id, loan.due_at - Duration::hours(1), None)
        .await
        .unwrap();
    assert!(outcome.penalty.is_none());
    assert!(services.users.get_by_id(reader.id).await.unwrap().locked_until.is_none());
    assert!(services.users.penalties(reader.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_locked_user_cannot_reserve() {
    let (repository, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    lock_user_until(&repository, reader.id, 2).await;

    let err = reserve(&services, &reader, &copy).await.unwrap_err();
    assert!(matches!(err, AppError::UserLocked { user_id, .. } if user_id == reader.id));

    let reservations = services
        .ledger
        .list_reservations(&ReservationQuery {
            user_id: Some(reader.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(reservations.is_empty());
}

#[tokio::test]
async fn test_expired_lock_does_not_bar_user() {
    let (repository, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    lock_user_until(&repository, reader.id, -1).await;

    assert!(reserve(&services, &reader, &copy).await.is_ok());
}

#[tokio::test]
async fn test_locked_user_cannot_pick_up() {
    let (repository, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    lock_user_until(&repository, reader.id, 5).await;

    let err = services.ledger.issue_loan(reservation.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::UserLocked { .. }));
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Reserved);
    assert!(services.ledger.list_loans(&LoanQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_double_return_is_rejected() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();

    let first_return = loan.due_at + Duration::days(1);
    services.ledger.return_copy(loan.id, first_return, None).await.unwrap();
    let after_first = services.ledger.get_loan(loan.id).await.unwrap();

    let err = services
        .ledger
        .return_copy(loan.id, first_return + Duration::days(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    assert_eq!(services.ledger.get_loan(loan.id).await.unwrap(), after_first);
    assert_eq!(services.users.penalties(reader.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_return_before_pickup_is_invalid() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();

    let err = services
        .ledger
        .return_copy(loan.id, loan.picked_up_at - Duration::minutes(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(services.ledger.get_loan(loan.id).await.unwrap().is_open());
}

#[tokio::test]
async fn test_overdue_sweep_is_idempotent() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();

    assert!(services.ledger.sweep_overdue(Utc::now()).await.unwrap().is_empty());

    let later = loan.due_at + Duration::days(1);
    let moved = services.ledger.sweep_overdue(later).await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].id, loan.id);
    assert_eq!(moved[0].status, LoanStatus::Overdue);

    let snapshot = services.ledger.list_loans(&LoanQuery::default()).await.unwrap();
    assert!(services.ledger.sweep_overdue(later).await.unwrap().is_empty());
    assert_eq!(services.ledger.list_loans(&LoanQuery::default()).await.unwrap(), snapshot);

    // overdue loans can still come back, but not be renewed
    let err = services.ledger.renew_loan(loan.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let outcome = services.ledger.return_copy(loan.id, later, None).await.unwrap();
    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert_eq!(outcome.penalty.map(|p| p.days_late), Some(1));
}

#[tokio::test]
async fn test_concurrent_pickup_issues_one_loan() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();

    let first = services.clone();
    let second = services.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.ledger.issue_loan(reservation.id, None).await }),
        tokio::spawn(async move { second.ledger.issue_loan(reservation.id, None).await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        loser,
        AppError::InvalidState(_) | AppError::ConcurrentModification(_)
    ));
    assert_eq!(services.ledger.list_loans(&LoanQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_renewal_limit() {
    let (_, services) = setup();
    services
        .settings
        .set(
            UpsertSetting {
                key: MAX_RENEWALS_KEY.to_string(),
                value: "1".to_string(),
                description: None,
            },
            None,
        )
        .await
        .unwrap();

    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();

    let renewed = services.ledger.renew_loan(loan.id, None).await.unwrap();
    assert_eq!(renewed.renewals, 1);
    assert_eq!(renewed.due_at, loan.due_at + Duration::days(14));

    let err = services.ledger.renew_loan(loan.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::RenewalLimitExceeded { current: 1, max: 1 }));

    let stored = services.ledger.get_loan(loan.id).await.unwrap();
    assert_eq!(stored.renewals, 1);
    assert_eq!(stored.due_at, renewed.due_at);
}

#[tokio::test]
async fn test_loan_period_follows_settings() {
    let (_, services) = setup();
    services
        .settings
        .set(
            UpsertSetting {
                key: LOAN_PERIOD_DAYS_KEY.to_string(),
                value: "7".to_string(),
                description: Some("Short loans".to_string()),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(services.settings.policy().await.unwrap().loan_period_days, 7);

    let bad = services
        .settings
        .set(
            UpsertSetting {
                key: LOAN_PERIOD_DAYS_KEY.to_string(),
                value: "zero".to_string(),
                description: None,
            },
            None,
        )
        .await;
    assert!(matches!(bad, Err(AppError::Validation(_))));

    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();
    assert_eq!(loan.due_at - loan.picked_up_at, Duration::days(7));
}

#[tokio::test]
async fn test_expiry_releases_reserved_copy() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();

    assert!(services.ledger.expire_reservations(Utc::now()).await.unwrap().is_empty());

    let later = reservation.scheduled_for + Duration::minutes(1);
    let expired = services.ledger.expire_reservations(later).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, ReservationStatus::Expired);
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Available);

    assert!(services.ledger.expire_reservations(later).await.unwrap().is_empty());

    let err = services.ledger.issue_loan(reservation.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_one_open_reservation_per_copy() {
    let (_, services) = setup();
    let first = create_reader(&services, "asouza", "12345678901").await;
    let second = create_reader(&services, "bcosta", "10987654321").await;
    let copy = create_copy(&services, "DC-001").await;

    let held = reserve(&services, &first, &copy).await.unwrap();
    let err = reserve(&services, &second, &copy).await.unwrap_err();
    assert!(matches!(err, AppError::CopyUnavailable(_)));

    // cancelling frees the copy for the next reader
    let cancelled = services.ledger.cancel_reservation(held.id, None).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert!(reserve(&services, &second, &copy).await.is_ok());

    let err = services.ledger.cancel_reservation(held.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_withdrawn_copy_cannot_be_reserved() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    services.catalog.withdraw_copy(copy.id, None).await.unwrap();
    let err = reserve(&services, &reader, &copy).await.unwrap_err();
    assert!(matches!(err, AppError::CopyUnavailable(_)));

    services.catalog.reinstate_copy(copy.id, None).await.unwrap();
    assert!(reserve(&services, &reader, &copy).await.is_ok());
}

#[tokio::test]
async fn test_approve_requires_pending() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();

    let err = services.ledger.approve_reservation(reservation.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = services.ledger.approve_reservation(9999, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reservation_must_be_in_future() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;

    let err = services
        .ledger
        .request_reservation(
            RequestReservation {
                user_id: reader.id,
                copy_id: copy.id,
                scheduled_for: Utc::now() - Duration::hours(1),
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_category_tree_rules() {
    let (_, services) = setup();
    let fiction = services
        .catalog
        .create_category(
            CreateCategory {
                name: "Ficção".to_string(),
                description: None,
                parent_id: None,
            },
            None,
        )
        .await
        .unwrap();
    let novels = services
        .catalog
        .create_category(
            CreateCategory {
                name: "Romance".to_string(),
                description: None,
                parent_id: Some(fiction.id),
            },
            None,
        )
        .await
        .unwrap();

    let err = services
        .catalog
        .update_category(
            fiction.id,
            UpdateCategory {
                parent_id: Some(Some(novels.id)),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    let err = services.catalog.delete_category(fiction.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    let tree = services.catalog.category_tree().await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].subcategories[0].category.id, novels.id);

    let copy = create_copy(&services, "DC-001").await;
    services.catalog.link_category(copy.entry_id, novels.id, None).await.unwrap();
    let err = services.catalog.link_category(copy.entry_id, novels.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
    assert_eq!(services.catalog.entry_categories(copy.entry_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_referenced_rows_cannot_be_deleted() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    reserve(&services, &reader, &copy).await.unwrap();

    let err = services.users.delete_user(reader.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    let err = services.catalog.delete_copy(copy.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    let err = services.catalog.delete_entry(copy.entry_id, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_duplicate_username_and_report() {
    let (_, services) = setup();
    create_reader(&services, "asouza", "12345678901").await;

    let err = services
        .users
        .create_user(
            CreateUser {
                username: "asouza".to_string(),
                password: "outra-senha".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: "other@example.org".to_string(),
                cpf: "10987654321".to_string(),
                phone: String::new(),
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    let report = RegisterReport {
        month: 3,
        year: 2026,
        file_path: "reports/2026-03.pdf".to_string(),
    };
    services.reports.register(report.clone(), None).await.unwrap();
    let err = services.reports.register(report, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    assert_eq!(services.reports.get(3, 2026).await.unwrap().file_path, "reports/2026-03.pdf");
    assert!(matches!(services.reports.get(4, 2026).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_operations_are_audited() {
    let repository = Repository::in_memory();
    let sink = Arc::new(RecordingSink::default());
    let services = Services::with_audit_sink(repository, LendingPolicy::default(), sink.clone());

    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let reservation = reserve(&services, &reader, &copy).await.unwrap();
    services.ledger.approve_reservation(reservation.id, None).await.unwrap();
    let loan = services.ledger.issue_loan(reservation.id, None).await.unwrap();
    services
        .ledger
        .return_copy(loan.id, loan.due_at + Duration::days(2), None)
        .await
        .unwrap();

    let actions = sink.actions();
    for expected in [
        ("usuarios", "create"),
        ("reservas", "create"),
        ("reservas", "approve"),
        ("emprestimos", "create"),
        ("emprestimos", "return"),
        ("penalty_log", "create"),
    ] {
        assert!(actions.contains(&expected), "missing audit entry {:?}", expected);
    }

    // rejected operations leave no trace
    let before = sink.actions().len();
    assert!(services.ledger.renew_loan(loan.id, None).await.is_err());
    assert_eq!(sink.actions().len(), before);
}

#[tokio::test]
async fn test_operation_log_is_queryable() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    reserve(&services, &reader, &copy).await.unwrap();

    let logs = services
        .audit
        .list(&OperationLogQuery {
            table: Some("reservas".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].user_id, Some(reader.id));
    assert_eq!(logs[0].action, "create");
}

#[tokio::test]
async fn test_failing_audit_sink_does_not_fail_operation() {
    let mut sink = MockSink::new();
    sink.expect_record()
        .withf(|entry| entry.table == "categorias" && entry.action == "create")
        .times(1)
        .returning(|_| Err(AppError::Internal("audit store offline".to_string())));

    let services = Services::with_audit_sink(
        Repository::in_memory(),
        LendingPolicy::default(),
        Arc::new(sink),
    );

    let category = services
        .catalog
        .create_category(
            CreateCategory {
                name: "Poesia".to_string(),
                description: None,
                parent_id: None,
            },
            Some(1),
        )
        .await
        .unwrap();
    assert_eq!(services.catalog.get_category(category.id).await.unwrap().name, "Poesia");
}

#[tokio::test]
async fn test_oversized_loan_period_is_refused() {
    let (_, services) = setup();
    let result = services
        .settings
        .set(
            UpsertSetting {
                key: LOAN_PERIOD_DAYS_KEY.to_string(),
                value: "100000000".to_string(),
                description: None,
            },
            None,
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(services.settings.list().await.unwrap().is_empty());

    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let loan = open_loan(&services, &reader, &copy).await;
    assert_eq!(loan.due_at - loan.picked_up_at, Duration::days(14));
}

#[tokio::test]
async fn test_return_too_far_in_future_is_refused() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let loan = open_loan(&services, &reader, &copy).await;

    let err = services
        .ledger
        .return_copy(loan.id, DateTime::<Utc>::MAX_UTC - Duration::days(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(services.ledger.get_loan(loan.id).await.unwrap(), loan);
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Unavailable);
    assert!(services.users.penalties(reader.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_renewal_past_calendar_end_is_refused() {
    let (repository, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let loan = open_loan(&services, &reader, &copy).await;

    let mut tx = repository.begin().await.unwrap();
    let mut stored = tx.lock_loan(loan.id).await.unwrap();
    stored.due_at = DateTime::<Utc>::MAX_UTC - Duration::days(1);
    let stored = tx.update_loan(&stored).await.unwrap();
    tx.commit().await.unwrap();

    let err = services.ledger.renew_loan(loan.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(services.ledger.get_loan(loan.id).await.unwrap(), stored);
}

#[tokio::test]
async fn test_late_return_keeps_longer_existing_lock() {
    let (repository, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let loan = open_loan(&services, &reader, &copy).await;

    lock_user_until(&repository, reader.id, 400).await;
    let existing = services.users.get_by_id(reader.id).await.unwrap().locked_until.unwrap();

    let outcome = services
        .ledger
        .return_copy(loan.id, loan.due_at + Duration::days(3), None)
        .await
        .unwrap();
    let penalty = outcome.penalty.unwrap();
    assert!(penalty.locked_until < existing);

    let reader = services.users.get_by_id(reader.id).await.unwrap();
    assert_eq!(reader.locked_until, Some(existing));
}

#[tokio::test]
async fn test_expiry_of_pending_reservation() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let reservation = reserve(&services, &reader, &copy).await.unwrap();

    let later = reservation.scheduled_for + Duration::minutes(1);
    let expired = services.ledger.expire_reservations(later).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, reservation.id);
    assert_eq!(expired[0].status, ReservationStatus::Expired);
    assert_eq!(
        services.ledger.get_reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Expired
    );
    assert_eq!(services.catalog.get_copy(copy.id).await.unwrap().state, CopyState::Available);
}

#[tokio::test]
async fn test_only_closed_loans_can_be_deleted() {
    let (repository, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    let copy = create_copy(&services, "DC-001").await;
    let loan = open_loan(&services, &reader, &copy).await;

    let mut tx = repository.begin().await.unwrap();
    let err = tx.delete_loan(loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
    drop(tx);
    assert!(services.ledger.get_loan(loan.id).await.unwrap().is_open());

    services
        .ledger
        .return_copy(loan.id, loan.due_at + Duration::days(2), None)
        .await
        .unwrap();

    let mut tx = repository.begin().await.unwrap();
    tx.delete_loan(loan.id).await.unwrap();
    tx.commit().await.unwrap();

    assert!(matches!(services.ledger.get_loan(loan.id).await, Err(AppError::NotFound(_))));
    let penalties = services.users.penalties(reader.id).await.unwrap();
    assert_eq!(penalties.len(), 1);
    assert_eq!(penalties[0].loan_id, None);
    assert_eq!(penalties[0].days_late, 2);
}

#[tokio::test]
async fn test_user_json_hides_credentials() {
    let (_, services) = setup();
    let reader = create_reader(&services, "asouza", "12345678901").await;
    assert!(reader.password.starts_with("$argon2"));

    let json = serde_json::to_value(&reader).unwrap();
    assert_eq!(json["username"], "asouza");
    assert!(json.get("password").is_none());
    assert!(json.get("verification_token").is_none());
    assert!(json.get("admin_token").is_none());
    assert!(!json.to_string().contains("$argon2"));
}

#[tokio::test]
async fn test_usernames_are_case_sensitive() {
    let (_, services) = setup();
    create_reader(&services, "asouza", "12345678901").await;
    let other = create_reader(&services, "ASouza", "10987654321").await;
    assert_eq!(other.username, "ASouza");
    assert_eq!(services.users.list_users().await.unwrap().len(), 2);
}
