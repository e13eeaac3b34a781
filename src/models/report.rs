//! Generated report metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One generated monthly report (unique per month and year)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReportRecord {
    pub id: i64,
    #[sqlx(rename = "mes")]
    pub month: i16,
    #[sqlx(rename = "ano")]
    pub year: i32,
    #[sqlx(rename = "data_geracao")]
    pub generated_at: DateTime<Utc>,
    #[sqlx(rename = "arquivo_pdf")]
    pub file_path: String,
}

/// Register a report produced by the external generator
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterReport {
    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub month: i16,
    #[validate(range(min = 0, message = "Year must not be negative"))]
    pub year: i32,
    #[validate(length(min = 1, max = 255, message = "File path must be 1-255 characters"))]
    pub file_path: String,
}
