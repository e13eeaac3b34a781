//! System settings and the lending policy they drive

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const LOAN_PERIOD_DAYS_KEY: &str = "loan_period_days";
pub const MAX_RENEWALS_KEY: &str = "max_renewals";
pub const SUSPENSION_DAYS_KEY: &str = "suspension_days_per_day_late";

/// Upper bounds accepted for the day-valued policy keys
pub const MAX_LOAN_PERIOD_DAYS: i64 = 3650;
pub const MAX_SUSPENSION_DAYS_PER_DAY_LATE: i64 = 365;

/// Key/value configuration row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SystemSetting {
    #[sqlx(rename = "chave")]
    pub key: String,
    #[sqlx(rename = "valor")]
    pub value: String,
    #[sqlx(rename = "descricao")]
    pub description: Option<String>,
}

/// Create or replace a setting
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertSetting {
    #[validate(length(min = 1, max = 50, message = "Key must be 1-50 characters"))]
    pub key: String,
    #[validate(length(min = 1, max = 100, message = "Value must be 1-100 characters"))]
    pub value: String,
    pub description: Option<String>,
}

/// Loan length, renewal limit and late-return suspension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingPolicy {
    pub loan_period_days: i64,
    pub max_renewals: i16,
    /// Days of suspension per (started) day late
    pub suspension_days_per_day_late: i64,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            max_renewals: 2,
            suspension_days_per_day_late: 1,
        }
    }
}

impl LendingPolicy {
    pub fn loan_period(&self) -> AppResult<Duration> {
        Duration::try_days(self.loan_period_days).ok_or_else(|| {
            AppError::Validation(format!(
                "{} is out of range: {}",
                LOAN_PERIOD_DAYS_KEY, self.loan_period_days
            ))
        })
    }

    /// Due date one loan period after `from`
    pub fn due_after(&self, from: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        from.checked_add_signed(self.loan_period()?).ok_or_else(|| {
            AppError::Validation(format!(
                "Due date {} + {} days is out of range",
                from, self.loan_period_days
            ))
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(1..=MAX_LOAN_PERIOD_DAYS).contains(&self.loan_period_days) {
            return Err(AppError::Validation(format!(
                "{} must be between 1 and {}",
                LOAN_PERIOD_DAYS_KEY, MAX_LOAN_PERIOD_DAYS
            )));
        }
        if self.max_renewals < 0 {
            return Err(AppError::Validation(format!(
                "{} must not be negative",
                MAX_RENEWALS_KEY
            )));
        }
        if !(0..=MAX_SUSPENSION_DAYS_PER_DAY_LATE).contains(&self.suspension_days_per_day_late) {
            return Err(AppError::Validation(format!(
                "{} must be between 0 and {}",
                SUSPENSION_DAYS_KEY, MAX_SUSPENSION_DAYS_PER_DAY_LATE
            )));
        }
        Ok(())
    }

    /// Apply the policy rows found in `settings` on top of `self`
    pub fn with_overrides(mut self, settings: &[SystemSetting]) -> AppResult<Self> {
        for setting in settings {
            match setting.key.as_str() {
                LOAN_PERIOD_DAYS_KEY => self.loan_period_days = parse_setting(setting)?,
                MAX_RENEWALS_KEY => self.max_renewals = parse_setting(setting)?,
                SUSPENSION_DAYS_KEY => {
                    self.suspension_days_per_day_late = parse_setting(setting)?
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_setting<T: std::str::FromStr>(setting: &SystemSetting) -> AppResult<T> {
    setting.value.trim().parse().map_err(|_| {
        AppError::Validation(format!(
            "Setting {} has an invalid value: {}",
            setting.key, setting.value
        ))
    })
}
