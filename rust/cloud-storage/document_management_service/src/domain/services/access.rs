//! Effective access resolution for documents and folders

use model_vault::{AccessLevel, UserContext};
use uuid::Uuid;

use crate::domain::{
    error::{Result, VaultError},
    models::{Document, Folder, ShareGrant, ShareResource},
    ports::VaultStorage,
};

/// Resolves what a user may do with a document or folder.
///
/// Owners and tenant admins hold [AccessLevel::Owner]. Everyone else gets the highest level
/// granted on the item itself or on any folder above it.
#[derive(Debug, Clone)]
pub struct AccessResolver<S> {
    storage: S,
}

impl<S: VaultStorage> AccessResolver<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn document_access(
        &self,
        user: &UserContext,
        document: &Document,
    ) -> Result<Option<AccessLevel>> {
        if document.organization_id != user.organization_id {
            return Ok(None);
        }
        if document.owner_id == user.user_id || user.is_admin() {
            return Ok(Some(AccessLevel::Owner));
        }

        let grants = self.storage.grants_for_user(user.user_id).await?;
        let direct = best_grant(&grants, |resource| {
            resource == ShareResource::Document(document.id)
        });

        let inherited = match document.folder_id {
            Some(folder_id) => self.inherited_access(user, folder_id, &grants).await?,
            None => None,
        };

        Ok(direct.max(inherited))
    }

    pub async fn folder_access(
        &self,
        user: &UserContext,
        folder: &Folder,
    ) -> Result<Option<AccessLevel>> {
        if folder.organization_id != user.organization_id {
            return Ok(None);
        }
        if folder.owner_id == user.user_id || user.is_admin() {
            return Ok(Some(AccessLevel::Owner));
        }

        let grants = self.storage.grants_for_user(user.user_id).await?;
        self.inherited_access(user, folder.id, &grants).await
    }

    /// Loads a document outside the trash and checks the caller holds at least `required`.
    /// Documents the caller cannot see at all are reported as missing.
    pub async fn require_document(
        &self,
        user: &UserContext,
        id: Uuid,
        required: AccessLevel,
    ) -> Result<Document> {
        let document = self.load_document(user, id, required).await?;
        if document.is_deleted() {
            return Err(VaultError::not_found("document"));
        }
        Ok(document)
    }

    /// Like [AccessResolver::require_document] but also returns trashed documents
    pub async fn require_document_including_trash(
        &self,
        user: &UserContext,
        id: Uuid,
        required: AccessLevel,
    ) -> Result<Document> {
        self.load_document(user, id, required).await
    }

    pub async fn require_folder(
        &self,
        user: &UserContext,
        id: Uuid,
        required: AccessLevel,
    ) -> Result<Folder> {
        let folder = self
            .storage
            .get_folder(user.organization_id, id)
            .await?
            .ok_or_else(|| VaultError::not_found("folder"))?;

        let access = self.folder_access(user, &folder).await?;
        check(access, required, "folder")?;
        Ok(folder)
    }

    async fn load_document(
        &self,
        user: &UserContext,
        id: Uuid,
        required: AccessLevel,
    ) -> Result<Document> {
        let document = self
            .storage
            .get_document(user.organization_id, id)
            .await?
            .ok_or_else(|| VaultError::not_found("document"))?;

        let access = self.document_access(user, &document).await?;
        check(access, required, "document")?;
        Ok(document)
    }

    async fn inherited_access(
        &self,
        user: &UserContext,
        folder_id: Uuid,
        grants: &[ShareGrant],
    ) -> Result<Option<AccessLevel>> {
        if !grants
            .iter()
            .any(|grant| matches!(grant.resource, ShareResource::Folder(_)))
        {
            return Ok(None);
        }

        let path = self
            .storage
            .folder_path(user.organization_id, folder_id)
            .await?;

        Ok(best_grant(grants, |resource| match resource {
            ShareResource::Folder(id) => path.iter().any(|folder| folder.id == id),
            ShareResource::Document(_) => false,
        }))
    }
}

fn best_grant(
    grants: &[ShareGrant],
    applies: impl Fn(ShareResource) -> bool,
) -> Option<AccessLevel> {
    grants
        .iter()
        .filter(|grant| applies(grant.resource))
        .map(|grant| grant.access_level)
        .max()
}

fn check(access: Option<AccessLevel>, required: AccessLevel, entity: &str) -> Result<()> {
    match access {
        None => Err(VaultError::not_found(entity)),
        Some(access) if access < required => Err(VaultError::forbidden(format!(
            "{required} access to this {entity} is required"
        ))),
        Some(_) => Ok(()),
    }
}
