//! Report registry. The files themselves come from an external generator.

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        operation_log::AuditEntry,
        report::{RegisterReport, ReportRecord},
    },
    repository::Repository,
    services::audit::{self, AuditSink},
};

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
}

impl ReportsService {
    pub fn new(repository: Repository, audit: Arc<dyn AuditSink>) -> Self {
        Self { repository, audit }
    }

    /// Record a generated report; one per month and year
    pub async fn register(&self, report: RegisterReport, actor: Option<i64>) -> AppResult<ReportRecord> {
        report.validate()?;

        let mut tx = self.repository.begin().await?;
        let record = tx.insert_report(&report, Utc::now()).await?;
        tx.commit().await?;

        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new(
                "report_record",
                "create",
                format!("Report {:02}/{} at {}", record.month, record.year, record.file_path),
                actor,
            ),
        )
        .await;
        Ok(record)
    }

    pub async fn get(&self, month: i16, year: i32) -> AppResult<ReportRecord> {
        let mut tx = self.repository.begin().await?;
        tx.find_report(month, year)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No report for {:02}/{}", month, year)))
    }

    /// Newest period first
    pub async fn list(&self) -> AppResult<Vec<ReportRecord>> {
        let mut tx = self.repository.begin().await?;
        tx.list_reports().await
    }
}
