//! Lending Ledger
//!
//! Reservation, loan and penalty bookkeeping for a lending library: a
//! catalog of entries in a category tree, physical copies, and the state
//! machine that moves copies between readers.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::Repository;
pub use services::Services;
