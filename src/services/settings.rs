//! Settings service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        operation_log::AuditEntry,
        setting::{LendingPolicy, SystemSetting, UpsertSetting},
    },
    repository::{Repository, StoreTx},
    services::audit::{self, AuditSink},
};

/// Effective policy inside an open transaction: `defaults` overlaid with
/// the policy rows of `system_settings`.
pub async fn resolve_policy(tx: &mut dyn StoreTx, defaults: LendingPolicy) -> AppResult<LendingPolicy> {
    let settings = tx.list_settings().await?;
    defaults.with_overrides(&settings)
}

#[derive(Clone)]
pub struct SettingsService {
    repository: Repository,
    defaults: LendingPolicy,
    audit: Arc<dyn AuditSink>,
}

impl SettingsService {
    pub fn new(repository: Repository, defaults: LendingPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            repository,
            defaults,
            audit,
        }
    }

    pub async fn get(&self, key: &str) -> AppResult<SystemSetting> {
        let mut tx = self.repository.begin().await?;
        tx.get_setting(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Setting {} not found", key)))
    }

    pub async fn list(&self) -> AppResult<Vec<SystemSetting>> {
        let mut tx = self.repository.begin().await?;
        tx.list_settings().await
    }

    /// Create or replace a setting. Policy keys are checked against the
    /// resulting policy before anything is written.
    pub async fn set(&self, setting: UpsertSetting, actor: Option<i64>) -> AppResult<SystemSetting> {
        setting.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut current = tx.list_settings().await?;
        current.retain(|s| s.key != setting.key);
        current.push(SystemSetting {
            key: setting.key.clone(),
            value: setting.value.clone(),
            description: setting.description.clone(),
        });
        self.defaults.with_overrides(&current)?;

        let saved = tx.upsert_setting(&setting).await?;
        tx.commit().await?;

        tracing::info!(key = %saved.key, value = %saved.value, "Setting updated");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new(
                "system_settings",
                "upsert",
                format!("{} = {}", saved.key, saved.value),
                actor,
            ),
        )
        .await;
        Ok(saved)
    }

    pub async fn delete(&self, key: &str, actor: Option<i64>) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        tx.delete_setting(key).await?;
        tx.commit().await?;

        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("system_settings", "delete", format!("Removed {}", key), actor),
        )
        .await;
        Ok(())
    }

    /// Policy currently in force
    pub async fn policy(&self) -> AppResult<LendingPolicy> {
        let mut tx = self.repository.begin().await?;
        resolve_policy(tx.as_mut(), self.defaults).await
    }
}
