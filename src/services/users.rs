//! User management service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        operation_log::AuditEntry,
        penalty::PenaltyRecord,
        user::{CreateUser, NewUser, UpdateUser, User},
    },
    repository::Repository,
    services::audit::{self, AuditSink},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

impl UsersService {
    pub fn new(repository: Repository, audit: Arc<dyn AuditSink>) -> Self {
        Self { repository, audit }
    }

    /// Create a user; username and CPF must be unused
    pub async fn create_user(&self, user: CreateUser, actor: Option<i64>) -> AppResult<User> {
        user.validate()?;

        let new_user = NewUser {
            username: user.username.trim().to_string(),
            password_hash: hash_password(&user.password)?,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            cpf: user.cpf,
            phone: user.phone,
        };

        let mut tx = self.repository.begin().await?;
        let created = tx.insert_user(&new_user).await?;
        tx.commit().await?;

        tracing::info!(user_id = created.id, username = %created.username, "User created");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("usuarios", "create", format!("User {} ({})", created.id, created.username), actor),
        )
        .await;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        let mut tx = self.repository.begin().await?;
        tx.get_user(id).await
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut tx = self.repository.begin().await?;
        tx.list_users().await
    }

    pub async fn update_user(&self, id: i64, update: UpdateUser, actor: Option<i64>) -> AppResult<User> {
        update.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut user = tx.lock_user(id).await?;
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(phone) = update.phone {
            user.phone = phone;
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        let user = tx.update_user(&user).await?;
        tx.commit().await?;

        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("usuarios", "update", format!("User {} ({})", user.id, user.username), actor),
        )
        .await;
        Ok(user)
    }

    /// Lift a borrowing suspension before it runs out
    pub async fn clear_lock(&self, id: i64, actor: Option<i64>) -> AppResult<User> {
        let mut tx = self.repository.begin().await?;
        let mut user = tx.lock_user(id).await?;
        let previous = user.locked_until.take();
        let user = tx.update_user(&user).await?;
        tx.commit().await?;

        if let Some(until) = previous {
            tracing::info!(user_id = user.id, was_locked_until = %until, "User lock cleared");
            audit::emit(
                self.audit.as_ref(),
                AuditEntry::new("usuarios", "unlock", format!("User {} lock until {} lifted", user.id, until), actor),
            )
            .await;
        }
        Ok(user)
    }

    /// Refused while reservations, loans or penalties reference the user
    pub async fn delete_user(&self, id: i64, actor: Option<i64>) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let user = tx.get_user(id).await?;
        tx.delete_user(id).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, "User deleted");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("usuarios", "delete", format!("User {} ({})", id, user.username), actor),
        )
        .await;
        Ok(())
    }

    pub async fn penalties(&self, user_id: i64) -> AppResult<Vec<PenaltyRecord>> {
        let mut tx = self.repository.begin().await?;
        tx.get_user(user_id).await?;
        tx.list_penalties(user_id).await
    }
}
