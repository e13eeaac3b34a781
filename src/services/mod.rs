//! Business logic services

pub mod audit;
pub mod catalog;
pub mod ledger;
pub mod reports;
pub mod settings;
pub mod users;

use std::sync::Arc;

use crate::{models::setting::LendingPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub ledger: ledger::LedgerService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub settings: settings::SettingsService,
    pub reports: reports::ReportsService,
    pub audit: audit::AuditService,
}

impl Services {
    /// Create all services, auditing into `logs_operacoes`
    pub fn new(repository: Repository, lending: LendingPolicy) -> Self {
        let sink = Arc::new(audit::OperationLogSink::new(repository.clone()));
        Self::with_audit_sink(repository, lending, sink)
    }

    /// Create all services with a caller-provided audit hook
    pub fn with_audit_sink(
        repository: Repository,
        lending: LendingPolicy,
        sink: Arc<dyn audit::AuditSink>,
    ) -> Self {
        Self {
            ledger: ledger::LedgerService::new(repository.clone(), lending, sink.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), sink.clone()),
            users: users::UsersService::new(repository.clone(), sink.clone()),
            settings: settings::SettingsService::new(repository.clone(), lending, sink.clone()),
            reports: reports::ReportsService::new(repository.clone(), sink),
            audit: audit::AuditService::new(repository),
        }
    }
}
