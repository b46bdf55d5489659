use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use model_vault::{Role, UserContext};
use regex::Regex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::error::{Result, VaultError};

/// A tenant. Every other entity belongs to exactly one organization.
#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user account. The password hash is never part of this type.
#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Always lowercased
    pub email: String,
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn context(&self) -> UserContext {
        UserContext {
            user_id: self.id,
            organization_id: self.organization_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// A user together with their stored password hash
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Changes applied by an admin to an account. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, serde::Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub organization_name: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub password: String,
}

/// Returned by register and login
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+$"
    )
    .unwrap();
}

/// Trims and lowercases an email address, rejecting anything that is not one
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.len() > 254 || !EMAIL_REGEX.is_match(&email) {
        return Err(VaultError::validation("email address is invalid"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_emails() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.COM ").unwrap(),
            "jane.doe@example.com"
        );
        assert_eq!(
            normalize_email("jane+docs@mail.example.io").unwrap(),
            "jane+docs@mail.example.io"
        );
        for bad in [
            "",
            "jane",
            "@example.com",
            "jane@",
            "ja ne@example.com",
            "a@b@c",
            "a@.com",
            "a@b",
            "x@-bad-.com",
            "jane@exa_mple.com",
        ] {
            assert!(normalize_email(bad).is_err(), "{bad}");
        }
    }
}
