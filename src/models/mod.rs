//! Data models for the lending ledger

pub mod catalog;
pub mod category;
pub mod copy;
pub mod enums;
pub mod loan;
pub mod operation_log;
pub mod penalty;
pub mod report;
pub mod reservation;
pub mod setting;
pub mod user;

// Re-export commonly used types
pub use catalog::{CatalogCategoryLink, CatalogEntry};
pub use category::{Category, CategoryNode};
pub use copy::BookCopy;
pub use enums::{CopyState, LoanStatus, ReservationStatus};
pub use loan::Loan;
pub use operation_log::{AuditEntry, OperationLog};
pub use penalty::PenaltyRecord;
pub use report::ReportRecord;
pub use reservation::Reservation;
pub use setting::{LendingPolicy, SystemSetting};
pub use user::User;
