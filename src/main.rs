//! Lending Ledger - background worker
//!
//! Applies migrations, then periodically flags overdue loans and expires
//! approved reservations that were never picked up.

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lending_ledger::{config::AppConfig, repository::Repository, services::Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lending_ledger={},sqlx=warn", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Lending Ledger v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let repository = Repository::new(pool);
    let services = Services::new(repository, config.lending);

    match services.settings.policy().await {
        Ok(policy) => tracing::info!(
            loan_period_days = policy.loan_period_days,
            max_renewals = policy.max_renewals,
            suspension_days_per_day_late = policy.suspension_days_per_day_late,
            "Effective lending policy"
        ),
        Err(e) => tracing::warn!(error = %e, "Could not resolve lending policy"),
    }

    let period = Duration::from_secs(config.scheduler.sweep_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_sweeps(&services).await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

/// One pass of the scheduled jobs; failures are logged and retried next tick
async fn run_sweeps(services: &Services) {
    match services.ledger.sweep_overdue(Utc::now()).await {
        Ok(loans) if !loans.is_empty() => tracing::info!(count = loans.len(), "Loans flagged overdue"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Overdue sweep failed"),
    }

    match services.ledger.expire_reservations(Utc::now()).await {
        Ok(expired) if !expired.is_empty() => {
            tracing::info!(count = expired.len(), "Reservations expired")
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Reservation expiry failed"),
    }
}
