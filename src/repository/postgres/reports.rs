//! `report_record` table

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    error::AppResult,
    models::report::{RegisterReport, ReportRecord},
};

pub(super) async fn insert(
    conn: &mut PgConnection,
    report: &RegisterReport,
    generated_at: DateTime<Utc>,
) -> AppResult<ReportRecord> {
    let report = sqlx::query_as::<_, ReportRecord>(
        "INSERT INTO report_record (mes, ano, data_geracao, arquivo_pdf) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(report.month)
    .bind(report.year)
    .bind(generated_at)
    .bind(&report.file_path)
    .fetch_one(conn)
    .await?;

    Ok(report)
}

pub(super) async fn find(conn: &mut PgConnection, month: i16, year: i32) -> AppResult<Option<ReportRecord>> {
    let report = sqlx::query_as::<_, ReportRecord>(
        "SELECT * FROM report_record WHERE mes = $1 AND ano = $2",
    )
    .bind(month)
    .bind(year)
    .fetch_optional(conn)
    .await?;

    Ok(report)
}

pub(super) async fn list(conn: &mut PgConnection) -> AppResult<Vec<ReportRecord>> {
    let reports = sqlx::query_as::<_, ReportRecord>(
        "SELECT * FROM report_record ORDER BY ano DESC, mes DESC",
    )
    .fetch_all(conn)
    .await?;

    Ok(reports)
}
