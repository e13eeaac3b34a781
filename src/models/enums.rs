//! Closed status enums, persisted as the short codes of the legacy schema

use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgTypeInfo, Decode, Encode, Postgres};

/// Implements the sqlx text-column codec for a status enum through
/// its `as_code` / `FromStr` pair.
macro_rules! text_column {
    ($ty:ty) => {
        impl sqlx::Type<Postgres> for $ty {
            fn type_info() -> PgTypeInfo {
                <&str as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <&str as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_code(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// CopyState
// ---------------------------------------------------------------------------

/// Circulation state of a physical copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyState {
    Available,
    Reserved,
    Unavailable,
}

impl CopyState {
    pub fn as_code(&self) -> &'static str {
        match self {
            CopyState::Available => "disp",
            CopyState::Reserved => "reservado",
            CopyState::Unavailable => "indisp",
        }
    }
}

impl Default for CopyState {
    fn default() -> Self {
        CopyState::Available
    }
}

impl std::str::FromStr for CopyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disp" => Ok(CopyState::Available),
            "reservado" => Ok(CopyState::Reserved),
            "indisp" => Ok(CopyState::Unavailable),
            _ => Err(format!("Invalid copy state: {}", s)),
        }
    }
}

impl std::fmt::Display for CopyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CopyState::Available => "available",
            CopyState::Reserved => "reserved",
            CopyState::Unavailable => "unavailable",
        };
        write!(f, "{}", label)
    }
}

text_column!(CopyState);

// ---------------------------------------------------------------------------
// ReservationStatus
// ---------------------------------------------------------------------------

/// Reservation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pendente",
            ReservationStatus::Approved => "aprovada",
            ReservationStatus::Cancelled => "cancelada",
            ReservationStatus::Expired => "expirada",
        }
    }

    /// Cancelled and expired reservations never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Cancelled | ReservationStatus::Expired)
    }
}

impl Default for ReservationStatus {
    fn default() -> Self {
        ReservationStatus::Pending
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente" => Ok(ReservationStatus::Pending),
            "aprovada" => Ok(ReservationStatus::Approved),
            "cancelada" => Ok(ReservationStatus::Cancelled),
            "expirada" => Ok(ReservationStatus::Expired),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        };
        write!(f, "{}", label)
    }
}

text_column!(ReservationStatus);

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    InUse,
    Returned,
    Overdue,
}

impl LoanStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            LoanStatus::InUse => "em_uso",
            LoanStatus::Returned => "devolvido",
            LoanStatus::Overdue => "atrasado",
        }
    }

    /// The copy is still out with the borrower
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::InUse | LoanStatus::Overdue)
    }
}

impl Default for LoanStatus {
    fn default() -> Self {
        LoanStatus::InUse
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "em_uso" => Ok(LoanStatus::InUse),
            "devolvido" => Ok(LoanStatus::Returned),
            "atrasado" => Ok(LoanStatus::Overdue),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanStatus::InUse => "in use",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
        };
        write!(f, "{}", label)
    }
}

text_column!(LoanStatus);
