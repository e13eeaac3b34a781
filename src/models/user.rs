//! User model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// National ID (CPF): eleven digits, no punctuation
pub static CPF_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{11}$").unwrap());

/// User model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub cpf: String,
    #[sqlx(rename = "telefone")]
    pub phone: String,
    #[sqlx(rename = "token_verificacao")]
    #[serde(skip_serializing, default)]
    pub verification_token: Option<String>,
    #[sqlx(rename = "token_adm")]
    #[serde(skip_serializing, default)]
    pub admin_token: Option<String>,
    #[sqlx(rename = "bloqueio_ate")]
    pub locked_until: Option<DateTime<Utc>>,
}

impl User {
    /// A lock only bars the user while it lies in the future
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| until > now).unwrap_or(false)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Create user request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(regex(path = *CPF_PATTERN, message = "CPF must be exactly 11 digits"))]
    pub cpf: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    #[serde(default)]
    pub phone: String,
}

/// Fields ready for insertion (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    pub phone: String,
}

/// Update user request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}
