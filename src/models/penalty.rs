//! Late-return penalty model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::setting::LendingPolicy;
use crate::error::{AppError, AppResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Penalty applied to a user for a late return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PenaltyRecord {
    pub id: i64,
    #[sqlx(rename = "usuario_id")]
    pub user_id: i64,
    /// Cleared when the loan row is deleted
    #[sqlx(rename = "emprestimo_id")]
    pub loan_id: Option<i64>,
    #[sqlx(rename = "dias_atraso")]
    pub days_late: i32,
    #[sqlx(rename = "data_aplicacao")]
    pub applied_at: DateTime<Utc>,
    #[sqlx(rename = "bloqueio_ate")]
    pub locked_until: DateTime<Utc>,
}

/// Fields ready for insertion
#[derive(Debug, Clone)]
pub struct NewPenalty {
    pub user_id: i64,
    pub loan_id: Option<i64>,
    pub days_late: i32,
    pub applied_at: DateTime<Utc>,
    pub locked_until: DateTime<Utc>,
}

/// Outcome of checking a return against its due date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateReturn {
    pub days_late: i32,
    pub locked_until: DateTime<Utc>,
}

/// Assess a return. Any started day counts as a full day late; the
/// suspension window starts at the return itself.
pub fn assess_return(
    due_at: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    policy: &LendingPolicy,
) -> AppResult<Option<LateReturn>> {
    if returned_at <= due_at {
        return Ok(None);
    }

    let late_seconds = (returned_at - due_at).num_seconds().max(1);
    let days_late = (late_seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    let out_of_range = || {
        AppError::Validation(format!(
            "Return at {} is too far past due date {}",
            returned_at, due_at
        ))
    };

    let locked_until = days_late
        .checked_mul(policy.suspension_days_per_day_late)
        .and_then(Duration::try_days)
        .and_then(|suspension| returned_at.checked_add_signed(suspension))
        .ok_or_else(out_of_range)?;

    Ok(Some(LateReturn {
        days_late: i32::try_from(days_late).map_err(|_| out_of_range())?,
        locked_until,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_on_time_return_has_no_penalty() {
        let policy = LendingPolicy::default();
        assert_eq!(assess_return(due(), due(), &policy).unwrap(), None);
        assert_eq!(assess_return(due(), due() - Duration::hours(5), &policy).unwrap(), None);
    }

    #[test]
    fn test_partial_day_rounds_up() {
        let policy = LendingPolicy::default();
        let late = assess_return(due(), due() + Duration::minutes(1), &policy).unwrap().unwrap();
        assert_eq!(late.days_late, 1);

        let late = assess_return(due(), due() + Duration::hours(49), &policy).unwrap().unwrap();
        assert_eq!(late.days_late, 3);
    }

    #[test]
    fn test_suspension_scales_with_policy() {
        let policy = LendingPolicy {
            suspension_days_per_day_late: 2,
            ..LendingPolicy::default()
        };
        let returned = due() + Duration::days(3);
        let late = assess_return(due(), returned, &policy).unwrap().unwrap();
        assert_eq!(late.days_late, 3);
        assert_eq!(late.locked_until, returned + Duration::days(6));
        assert!(late.locked_until >= due());
    }

    #[test]
    fn test_out_of_range_lock_is_rejected() {
        let policy = LendingPolicy::default();
        let far_future = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let result = assess_return(due(), far_future, &policy);
        assert!(matches!(result, Err(AppError::Validation(_))));

        let unbounded = LendingPolicy {
            suspension_days_per_day_late: i64::MAX,
            ..LendingPolicy::default()
        };
        let result = assess_return(due(), due() + Duration::days(2), &unbounded);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
