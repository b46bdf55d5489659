use chrono::{Duration, Utc};
use model_vault::{AccessLevel, UserContext};
use serde_json::json;
use uuid::Uuid;

use super::{AuditService, access::AccessResolver};
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, CreateShareCodeRequest, EntityType, RedeemShareCodeResponse,
        SHARE_CODE_LENGTH, ShareCode, ShareGrant, ShareResource, SharedItem, generate_share_code,
        normalize_share_code,
    },
    ports::VaultStorage,
};

const MAX_EXPIRY_HOURS: i64 = 24 * 365;
const MAX_USES: i32 = 10_000;
const MAX_CODE_ATTEMPTS: usize = 5;

/// Share codes and the grants created by redeeming them
#[derive(Debug, Clone)]
pub struct ShareService<S> {
    storage: S,
    access: AccessResolver<S>,
    audit: AuditService<S>,
}

impl<S: VaultStorage> ShareService<S> {
    pub fn new(storage: S) -> Self {
        Self {
            access: AccessResolver::new(storage.clone()),
            audit: AuditService::new(storage.clone()),
            storage,
        }
    }

    /// Only the owner of a resource may share it, and only with view or edit access
    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn create_code(
        &self,
        user: &UserContext,
        request: CreateShareCodeRequest,
    ) -> Result<ShareCode> {
        if request.access_level == AccessLevel::Owner {
            return Err(VaultError::validation(
                "share codes grant view or edit access only",
            ));
        }
        if let Some(hours) = request.expires_in_hours
            && !(1..=MAX_EXPIRY_HOURS).contains(&hours)
        {
            return Err(VaultError::validation(format!(
                "expires_in_hours must be between 1 and {MAX_EXPIRY_HOURS}"
            )));
        }
        if let Some(max_uses) = request.max_uses
            && !(1..=MAX_USES).contains(&max_uses)
        {
            return Err(VaultError::validation(format!(
                "max_uses must be between 1 and {MAX_USES}"
            )));
        }

        self.require_resource(user, request.resource, AccessLevel::Owner)
            .await?;

        let now = Utc::now();
        let mut share_code = ShareCode {
            id: Uuid::now_v7(),
            code: String::new(),
            organization_id: user.organization_id,
            resource: request.resource,
            access_level: request.access_level,
            created_by: user.user_id,
            expires_at: request.expires_in_hours.map(|hours| now + Duration::hours(hours)),
            max_uses: request.max_uses,
            use_count: 0,
            revoked_at: None,
            created_at: now,
        };

        let mut inserted = false;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            share_code.code = generate_share_code();
            if self.storage.insert_share_code(&share_code).await? {
                inserted = true;
                break;
            }
            tracing::debug!(attempt, "share code collision");
        }
        if !inserted {
            return Err(VaultError::Internal(anyhow::anyhow!(
                "unable to allocate a unique share code after {MAX_CODE_ATTEMPTS} attempts"
            )));
        }

        self.audit
            .record(
                AuditLog::new(user, AuditAction::ShareCreate, EntityType::ShareCode, Some(share_code.id))
                    .with_metadata(json!({
                        "resource_type": share_code.resource.resource_type(),
                        "resource_id": share_code.resource.id(),
                        "access_level": share_code.access_level,
                    })),
            )
            .await;
        Ok(share_code)
    }

    /// Codes only resolve inside the caller's organization
    #[tracing::instrument(skip(self, user, code), fields(user_id=%user.user_id), err)]
    pub async fn redeem(&self, user: &UserContext, code: &str) -> Result<RedeemShareCodeResponse> {
        let code = normalize_share_code(code);
        if code.len() != SHARE_CODE_LENGTH {
            return Err(VaultError::not_found("share code"));
        }

        let share_code = self
            .storage
            .find_share_code(user.organization_id, &code)
            .await?
            .ok_or_else(|| VaultError::not_found("share code"))?;

        let now = Utc::now();
        if let Some(reason) = share_code.unusable_reason(now) {
            return Err(VaultError::validation(reason));
        }

        if self.owns(user, share_code.resource).await? {
            return Ok(RedeemShareCodeResponse {
                resource: share_code.resource,
                access_level: AccessLevel::Owner,
            });
        }

        let grant = ShareGrant {
            user_id: user.user_id,
            resource: share_code.resource,
            access_level: share_code.access_level,
            share_code_id: Some(share_code.id),
            granted_at: now,
        };
        if !self
            .storage
            .redeem_share_code(share_code.id, &grant, now)
            .await?
        {
            return Err(VaultError::validation("share code is no longer valid"));
        }

        self.audit
            .record(
                AuditLog::new(user, AuditAction::ShareRedeem, EntityType::ShareCode, Some(share_code.id))
                    .with_metadata(json!({
                        "resource_type": share_code.resource.resource_type(),
                        "resource_id": share_code.resource.id(),
                        "access_level": share_code.access_level,
                    })),
            )
            .await;

        let access_level = self
            .storage
            .grants_for_user(user.user_id)
            .await?
            .into_iter()
            .filter(|g| g.resource == share_code.resource)
            .map(|g| g.access_level)
            .max()
            .unwrap_or(share_code.access_level);

        Ok(RedeemShareCodeResponse {
            resource: share_code.resource,
            access_level,
        })
    }

    /// Owner only
    pub async fn list_codes(
        &self,
        user: &UserContext,
        resource: ShareResource,
    ) -> Result<Vec<ShareCode>> {
        self.require_resource(user, resource, AccessLevel::Owner)
            .await?;
        Ok(self
            .storage
            .list_share_codes(user.organization_id, resource)
            .await?)
    }

    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn revoke(&self, user: &UserContext, id: Uuid) -> Result<()> {
        let share_code = self
            .storage
            .get_share_code(user.organization_id, id)
            .await?
            .ok_or_else(|| VaultError::not_found("share code"))?;
        self.require_resource(user, share_code.resource, AccessLevel::Owner)
            .await?;

        if share_code.revoked_at.is_some() {
            return Err(VaultError::conflict("share code is already revoked"));
        }
        if !self
            .storage
            .revoke_share_code(user.organization_id, id, Utc::now())
            .await?
        {
            return Err(VaultError::not_found("share code"));
        }

        self.audit
            .record(AuditLog::new(
                user,
                AuditAction::ShareRevoke,
                EntityType::ShareCode,
                Some(id),
            ))
            .await;
        Ok(())
    }

    /// Resources other users shared with the caller. Trashed and removed items are skipped.
    pub async fn list_shared_with_me(&self, user: &UserContext) -> Result<Vec<SharedItem>> {
        let grants = self.storage.grants_for_user(user.user_id).await?;

        let mut items = Vec::with_capacity(grants.len());
        for grant in grants {
            let item = match grant.resource {
                ShareResource::Document(id) => self
                    .storage
                    .get_document(user.organization_id, id)
                    .await?
                    .filter(|document| !document.is_deleted())
                    .map(|document| (document.title, document.owner_id)),
                ShareResource::Folder(id) => self
                    .storage
                    .get_folder(user.organization_id, id)
                    .await?
                    .map(|folder| (folder.name, folder.owner_id)),
            };

            if let Some((name, owner_id)) = item {
                items.push(SharedItem {
                    resource: grant.resource,
                    name,
                    owner_id,
                    access_level: grant.access_level,
                    granted_at: grant.granted_at,
                });
            }
        }
        items.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(items)
    }

    async fn require_resource(
        &self,
        user: &UserContext,
        resource: ShareResource,
        required: AccessLevel,
    ) -> Result<()> {
        match resource {
            ShareResource::Document(id) => {
                self.access.require_document(user, id, required).await?;
            }
            ShareResource::Folder(id) => {
                self.access.require_folder(user, id, required).await?;
            }
        }
        Ok(())
    }

    async fn owns(&self, user: &UserContext, resource: ShareResource) -> Result<bool> {
        let owner_id = match resource {
            ShareResource::Document(id) => self
                .storage
                .get_document(user.organization_id, id)
                .await?
                .map(|document| document.owner_id),
            ShareResource::Folder(id) => self
                .storage
                .get_folder(user.organization_id, id)
                .await?
                .map(|folder| folder.owner_id),
        };
        match owner_id {
            Some(owner_id) => Ok(owner_id == user.user_id),
            None => Err(VaultError::not_found("shared resource")),
        }
    }
}
