use chrono::Utc;
use model_vault::{Page, Pagination, Role, UserContext};
use serde_json::json;
use uuid::Uuid;
use vault_auth::password::{PasswordHasher, validate_password_strength};

use super::{AuditService, auth::hash_password};
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, CreateUserRequest, EntityType, ResetPasswordRequest,
        UpdateUserRequest, User, normalize_email, required_text,
    },
    ports::VaultStorage,
};

/// Account management inside one organization. Every operation requires an admin.
#[derive(Debug, Clone)]
pub struct AdminService<S> {
    storage: S,
    hasher: PasswordHasher,
    audit: AuditService<S>,
}

impl<S: VaultStorage> AdminService<S> {
    pub fn new(storage: S, hasher: PasswordHasher) -> Self {
        Self {
            audit: AuditService::new(storage.clone()),
            storage,
            hasher,
        }
    }

    pub async fn list_users(&self, admin: &UserContext, pagination: Pagination) -> Result<Page<User>> {
        ensure_admin(admin)?;
        let (users, total) = self
            .storage
            .list_users(admin.organization_id, &pagination)
            .await?;
        Ok(Page::new(users, total, &pagination))
    }

    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn create_user(&self, admin: &UserContext, request: CreateUserRequest) -> Result<User> {
        ensure_admin(admin)?;
        let email = normalize_email(&request.email)?;
        let full_name = required_text("full name", &request.full_name, 200)?;
        validate_password_strength(&request.password)?;

        if self.storage.email_exists(&email).await? {
            return Err(VaultError::conflict("email is already registered"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            organization_id: admin.organization_id,
            email,
            full_name,
            role: request.role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let password_hash = hash_password(self.hasher, request.password).await?;
        self.storage.insert_user(&user, &password_hash).await?;

        self.audit
            .record(
                AuditLog::new(admin, AuditAction::UserCreate, EntityType::User, Some(user.id))
                    .with_metadata(json!({ "email": user.email, "role": user.role })),
            )
            .await;
        Ok(user)
    }

    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn update_user(
        &self,
        admin: &UserContext,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<User> {
        ensure_admin(admin)?;
        let mut user = self.get_user(admin, user_id).await?;

        let demoted = request.role.is_some_and(|role| role != Role::Admin);
        let deactivated = request.is_active == Some(false);

        if user.role == Role::Admin && user.is_active && (demoted || deactivated) {
            if user.id == admin.user_id {
                return Err(VaultError::forbidden(
                    "admins cannot demote or deactivate themselves",
                ));
            }
            self.ensure_not_last_admin(admin).await?;
        }

        if let Some(full_name) = request.full_name.as_deref() {
            user.full_name = required_text("full name", full_name, 200)?;
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        if let Some(is_active) = request.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        self.storage.update_user(&user).await?;

        self.audit
            .record(
                AuditLog::new(admin, AuditAction::UserUpdate, EntityType::User, Some(user.id))
                    .with_metadata(json!({
                        "full_name": request.full_name,
                        "role": request.role,
                        "is_active": request.is_active,
                    })),
            )
            .await;
        Ok(user)
    }

    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn reset_password(
        &self,
        admin: &UserContext,
        user_id: Uuid,
        request: ResetPasswordRequest,
    ) -> Result<()> {
        ensure_admin(admin)?;
        let user = self.get_user(admin, user_id).await?;
        validate_password_strength(&request.new_password)?;

        let password_hash = hash_password(self.hasher, request.new_password).await?;
        self.storage
            .set_password_hash(user.id, &password_hash, Utc::now())
            .await?;

        self.audit
            .record(AuditLog::new(
                admin,
                AuditAction::UserPasswordReset,
                EntityType::User,
                Some(user.id),
            ))
            .await;
        Ok(())
    }

    /// Deletes the account. Everything it owned now belongs to the calling admin.
    #[tracing::instrument(skip(self, admin), fields(admin_id=%admin.user_id), err)]
    pub async fn delete_user(&self, admin: &UserContext, user_id: Uuid) -> Result<()> {
        ensure_admin(admin)?;
        if user_id == admin.user_id {
            return Err(VaultError::forbidden("admins cannot delete themselves"));
        }

        let user = self.get_user(admin, user_id).await?;
        if user.role == Role::Admin && user.is_active {
            self.ensure_not_last_admin(admin).await?;
        }

        if !self
            .storage
            .delete_user(admin.organization_id, user.id, admin.user_id)
            .await?
        {
            return Err(VaultError::not_found("user"));
        }

        self.audit
            .record(
                AuditLog::new(admin, AuditAction::UserDelete, EntityType::User, Some(user.id))
                    .with_metadata(json!({ "email": user.email })),
            )
            .await;
        Ok(())
    }

    async fn get_user(&self, admin: &UserContext, user_id: Uuid) -> Result<User> {
        self.storage
            .get_user(admin.organization_id, user_id)
            .await?
            .ok_or_else(|| VaultError::not_found("user"))
    }

    async fn ensure_not_last_admin(&self, admin: &UserContext) -> Result<()> {
        if self
            .storage
            .count_active_admins(admin.organization_id)
            .await?
            <= 1
        {
            return Err(VaultError::conflict(
                "the organization must keep at least one active admin",
            ));
        }
        Ok(())
    }
}

fn ensure_admin(user: &UserContext) -> Result<()> {
    if !user.is_admin() {
        return Err(VaultError::forbidden("admin role required"));
    }
    Ok(())
}
