use chrono::Utc;
use model_vault::{AccessLevel, UserContext};
use serde_json::json;
use uuid::Uuid;

use super::{AuditService, access::AccessResolver};
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, CreateFolderRequest, EntityType, Folder, FolderCrumb,
        FolderDetails, ListFoldersQuery, UpdateFolderRequest, validate_folder_name,
    },
    ports::VaultStorage,
};

/// The folder tree of an organization
#[derive(Debug, Clone)]
pub struct FolderService<S> {
    storage: S,
    access: AccessResolver<S>,
    audit: AuditService<S>,
}

impl<S: VaultStorage> FolderService<S> {
    pub fn new(storage: S) -> Self {
        Self {
            access: AccessResolver::new(storage.clone()),
            audit: AuditService::new(storage.clone()),
            storage,
        }
    }

    /// Creating inside a folder requires edit access to it
    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn create(&self, user: &UserContext, request: CreateFolderRequest) -> Result<Folder> {
        let name = validate_folder_name(&request.name)?;
        if let Some(parent_id) = request.parent_id {
            self.access
                .require_folder(user, parent_id, AccessLevel::Edit)
                .await?;
        }
        self.ensure_name_free(user, request.parent_id, &name, None)
            .await?;

        let now = Utc::now();
        let folder = Folder {
            id: Uuid::now_v7(),
            organization_id: user.organization_id,
            owner_id: user.user_id,
            parent_id: request.parent_id,
            name,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_folder(&folder).await?;

        self.audit
            .record(
                AuditLog::new(user, AuditAction::FolderCreate, EntityType::Folder, Some(folder.id))
                    .with_metadata(json!({ "name": folder.name, "parent_id": folder.parent_id })),
            )
            .await;
        Ok(folder)
    }

    /// Children of a folder the caller can view. At the root, admins see every root folder and
    /// everyone else sees the root folders they own.
    pub async fn list(&self, user: &UserContext, query: ListFoldersQuery) -> Result<Vec<Folder>> {
        let folders = match query.parent_id {
            Some(parent_id) => {
                self.access
                    .require_folder(user, parent_id, AccessLevel::View)
                    .await?;
                self.storage
                    .list_folders(user.organization_id, Some(parent_id), None)
                    .await?
            }
            None => {
                let owner_id = (!user.is_admin()).then_some(user.user_id);
                self.storage
                    .list_folders(user.organization_id, None, owner_id)
                    .await?
            }
        };
        Ok(folders)
    }

    pub async fn get(&self, user: &UserContext, id: Uuid) -> Result<FolderDetails> {
        let folder = self
            .access
            .require_folder(user, id, AccessLevel::View)
            .await?;
        let path = self
            .storage
            .folder_path(user.organization_id, id)
            .await?
            .iter()
            .map(FolderCrumb::from)
            .collect();
        Ok(FolderDetails { folder, path })
    }

    pub async fn rename(&self, user: &UserContext, id: Uuid, name: &str) -> Result<Folder> {
        let request = UpdateFolderRequest {
            name: Some(name.to_string()),
            ..Default::default()
        };
        self.update(user, id, request).await
    }

    /// Moves a folder below `parent_id`, or to the root when `None`
    pub async fn move_folder(
        &self,
        user: &UserContext,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<Folder> {
        let request = UpdateFolderRequest {
            name: None,
            parent_id,
            move_to_root: parent_id.is_none(),
        };
        self.update(user, id, request).await
    }

    /// Renames and/or moves a folder
    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn update(
        &self,
        user: &UserContext,
        id: Uuid,
        request: UpdateFolderRequest,
    ) -> Result<Folder> {
        let mut folder = self
            .access
            .require_folder(user, id, AccessLevel::Edit)
            .await?;

        let name = match request.name.as_deref() {
            Some(name) => validate_folder_name(name)?,
            None => folder.name.clone(),
        };
        let parent_id = if request.move_to_root {
            None
        } else {
            request.parent_id.or(folder.parent_id)
        };

        if parent_id != folder.parent_id {
            self.ensure_valid_destination(user, &folder, parent_id)
                .await?;
        }
        if parent_id != folder.parent_id || !name.eq_ignore_ascii_case(&folder.name) {
            self.ensure_name_free(user, parent_id, &name, Some(folder.id))
                .await?;
        }

        let previous_parent = folder.parent_id;
        folder.name = name;
        folder.parent_id = parent_id;
        folder.updated_at = Utc::now();
        self.storage.update_folder(&folder).await?;

        self.audit
            .record(
                AuditLog::new(user, AuditAction::FolderUpdate, EntityType::Folder, Some(folder.id))
                    .with_metadata(json!({
                        "name": folder.name,
                        "parent_id": folder.parent_id,
                        "previous_parent_id": previous_parent,
                    })),
            )
            .await;
        Ok(folder)
    }

    /// Deletes an empty folder. With `recursive` the contents are removed too and their documents
    /// go to the trash. Trashed documents never block a delete and are detached from the folder.
    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn delete(&self, user: &UserContext, id: Uuid, recursive: bool) -> Result<()> {
        self.access
            .require_folder(user, id, AccessLevel::Owner)
            .await?;

        if !recursive && !self.storage.folder_is_empty(user.organization_id, id).await? {
            return Err(VaultError::conflict(
                "folder is not empty, delete it recursively to remove its contents",
            ));
        }

        let trashed = self
            .storage
            .delete_folder_tree(user.organization_id, id, Utc::now())
            .await?;

        self.audit
            .record(
                AuditLog::new(user, AuditAction::FolderDelete, EntityType::Folder, Some(id))
                    .with_metadata(json!({ "recursive": recursive, "trashed_documents": trashed })),
            )
            .await;
        Ok(())
    }

    async fn ensure_valid_destination(
        &self,
        user: &UserContext,
        folder: &Folder,
        parent_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if parent_id == folder.id {
            return Err(VaultError::validation("a folder cannot be moved into itself"));
        }

        self.access
            .require_folder(user, parent_id, AccessLevel::Edit)
            .await?;
        let destination_path = self
            .storage
            .folder_path(user.organization_id, parent_id)
            .await?;
        if destination_path.iter().any(|f| f.id == folder.id) {
            return Err(VaultError::validation(
                "a folder cannot be moved into one of its subfolders",
            ));
        }
        Ok(())
    }

    async fn ensure_name_free(
        &self,
        user: &UserContext,
        parent_id: Option<Uuid>,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<()> {
        if self
            .storage
            .folder_name_taken(user.organization_id, parent_id, name, except)
            .await?
        {
            return Err(VaultError::conflict(
                "a folder with this name already exists here",
            ));
        }
        Ok(())
    }
}
