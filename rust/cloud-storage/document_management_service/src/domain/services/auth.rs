use chrono::Utc;
use model_vault::{Role, UserContext};
use serde_json::json;
use uuid::Uuid;
use vault_auth::{
    jwt::{JwtArgs, issue_access_token},
    password::{PasswordHasher, validate_password_strength},
};

use super::AuditService;
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, AuthResponse, ChangePasswordRequest, EntityType, LoginRequest,
        Organization, RegisterRequest, User, normalize_email, required_text,
    },
    ports::VaultStorage,
};

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Registration, login and the caller's own account
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    storage: S,
    hasher: PasswordHasher,
    jwt_args: JwtArgs,
    audit: AuditService<S>,
}

impl<S: VaultStorage> AuthService<S> {
    pub fn new(storage: S, hasher: PasswordHasher, jwt_args: JwtArgs) -> Self {
        Self {
            audit: AuditService::new(storage.clone()),
            storage,
            hasher,
            jwt_args,
        }
    }

    /// Creates a new organization with the caller as its first admin
    #[tracing::instrument(skip_all, err)]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let organization_name = required_text("organization name", &request.organization_name, 200)?;
        let full_name = required_text("full name", &request.full_name, 200)?;
        let email = normalize_email(&request.email)?;
        validate_password_strength(&request.password)?;

        if self.storage.email_exists(&email).await? {
            return Err(VaultError::conflict("email is already registered"));
        }

        let now = Utc::now();
        let organization = Organization {
            id: Uuid::now_v7(),
            name: organization_name,
            created_at: now,
        };
        let admin = User {
            id: Uuid::now_v7(),
            organization_id: organization.id,
            email,
            full_name,
            role: Role::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        };

        let password_hash = self.hash(request.password).await?;
        self.storage
            .create_organization(&organization, &admin, &password_hash)
            .await?;

        tracing::info!(organization_id=%organization.id, user_id=%admin.id, "registered organization");

        let context = admin.context();
        self.audit
            .record(
                AuditLog::new(&context, AuditAction::UserRegister, EntityType::Organization, Some(organization.id))
                    .with_metadata(json!({ "organization_name": organization.name })),
            )
            .await;

        self.respond(admin)
    }

    #[tracing::instrument(skip_all, err)]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let Ok(email) = normalize_email(&request.email) else {
            return Err(VaultError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        let Some(credentials) = self.storage.find_credentials_by_email(&email).await? else {
            tracing::debug!("login attempt for unknown email");
            // same bcrypt cost as a known account
            self.verify(request.password, None).await?;
            return Err(VaultError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !self
            .verify(request.password, Some(credentials.password_hash))
            .await?
        {
            self.audit
                .record(AuditLog::new(
                    &credentials.user.context(),
                    AuditAction::UserLoginFailed,
                    EntityType::User,
                    Some(credentials.user.id),
                ))
                .await;
            return Err(VaultError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let mut user = credentials.user;
        if !user.is_active {
            return Err(VaultError::forbidden("account is deactivated"));
        }

        let now = Utc::now();
        self.storage.record_login(user.id, now).await?;
        user.last_login_at = Some(now);

        self.audit
            .record(AuditLog::new(
                &user.context(),
                AuditAction::UserLogin,
                EntityType::User,
                Some(user.id),
            ))
            .await;

        self.respond(user)
    }

    /// The caller's own account
    pub async fn me(&self, user: &UserContext) -> Result<User> {
        self.storage
            .get_user(user.organization_id, user.user_id)
            .await?
            .ok_or_else(|| VaultError::not_found("user"))
    }

    /// Loads the caller's account, rejecting deleted and deactivated accounts
    pub async fn active_user(&self, user: &UserContext) -> Result<User> {
        match self
            .storage
            .get_user(user.organization_id, user.user_id)
            .await?
        {
            None => Err(VaultError::Unauthorized("account no longer exists".to_string())),
            Some(user) if !user.is_active => Err(VaultError::forbidden("account is deactivated")),
            Some(user) => Ok(user),
        }
    }

    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn change_password(
        &self,
        user: &UserContext,
        request: ChangePasswordRequest,
    ) -> Result<()> {
        let credentials = self
            .storage
            .get_credentials(user.organization_id, user.user_id)
            .await?
            .ok_or_else(|| VaultError::not_found("user"))?;

        if !self
            .verify(request.current_password, Some(credentials.password_hash))
            .await?
        {
            return Err(VaultError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }
        validate_password_strength(&request.new_password)?;

        let password_hash = self.hash(request.new_password).await?;
        self.storage
            .set_password_hash(user.user_id, &password_hash, Utc::now())
            .await?;

        self.audit
            .record(AuditLog::new(
                user,
                AuditAction::UserPasswordChanged,
                EntityType::User,
                Some(user.user_id),
            ))
            .await;
        Ok(())
    }

    async fn hash(&self, plain: String) -> Result<String> {
        hash_password(self.hasher, plain).await
    }

    async fn verify(&self, plain: String, hash: Option<String>) -> Result<bool> {
        let hasher = self.hasher;
        let valid = tokio::task::spawn_blocking(move || {
            hasher.verify_password_or_dummy(&plain, hash.as_deref())
        })
        .await
        .map_err(anyhow::Error::from)??;
        Ok(valid)
    }

    fn respond(&self, user: User) -> Result<AuthResponse> {
        let issued = issue_access_token(&self.jwt_args, &user.context())?;
        Ok(AuthResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
    }
}

/// bcrypt blocks, so hashing runs on the blocking pool
pub(crate) async fn hash_password(hasher: PasswordHasher, plain: String) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || hasher.hash_password(&plain))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(hash)
}
