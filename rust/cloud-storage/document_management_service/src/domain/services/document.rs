use std::collections::HashSet;

use chrono::Utc;
use file_conversion::archive::{self, ArchiveEntry};
use model_vault::{AccessLevel, Page, Pagination, UserContext};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{AuditService, access::AccessResolver};
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, Document, DocumentContent, DocumentQuery, DocumentSearch, EntityType,
        MAX_BUNDLE_SIZE, Tag, UpdateDocumentRequest, UploadDocument, normalize_tags,
        optional_text, required_text,
    },
    ports::{BlobStorage, VaultStorage},
};

const MAX_TITLE_LENGTH: usize = 255;
const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_QUERY_LENGTH: usize = 200;

/// Uploads, metadata, trash, search and bundles
#[derive(Debug, Clone)]
pub struct DocumentService<S, B> {
    storage: S,
    blob: B,
    access: AccessResolver<S>,
    audit: AuditService<S>,
    max_upload_bytes: usize,
}

impl<S: VaultStorage, B: BlobStorage> DocumentService<S, B> {
    pub fn new(storage: S, blob: B, max_upload_bytes: usize) -> Self {
        Self {
            access: AccessResolver::new(storage.clone()),
            audit: AuditService::new(storage.clone()),
            storage,
            blob,
            max_upload_bytes,
        }
    }

    pub(crate) fn access(&self) -> &AccessResolver<S> {
        &self.access
    }

    /// Stores a new document owned by the caller
    #[tracing::instrument(
        skip(self, user, upload),
        fields(user_id=%user.user_id, filename=%upload.filename, size=upload.bytes.len()),
        err
    )]
    pub async fn upload(&self, user: &UserContext, upload: UploadDocument) -> Result<Document> {
        let document = self.store(user, upload).await?;

        self.audit
            .record(
                AuditLog::new(
                    user,
                    AuditAction::DocumentUpload,
                    EntityType::Document,
                    Some(document.id),
                )
                .with_metadata(json!({
                    "filename": document.original_filename,
                    "mime_type": document.mime_type,
                    "size_bytes": document.size_bytes,
                })),
            )
            .await;
        Ok(document)
    }

    /// Validates and writes a document without auditing it. Conversion output goes through here.
    pub(crate) async fn store(&self, user: &UserContext, upload: UploadDocument) -> Result<Document> {
        if upload.bytes.is_empty() {
            return Err(VaultError::validation("file is empty"));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(VaultError::PayloadTooLarge(format!(
                "file exceeds the upload limit of {} bytes",
                self.max_upload_bytes
            )));
        }

        let filename = archive::sanitize_name(&upload.filename);
        let title = match upload.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => required_text("title", title, MAX_TITLE_LENGTH)?,
            _ => required_text("title", &filename, MAX_TITLE_LENGTH)?,
        };
        let description = optional_text(
            "description",
            upload.description.as_deref(),
            MAX_DESCRIPTION_LENGTH,
        )?;
        let tags = normalize_tags(&upload.tags)?;

        if let Some(folder_id) = upload.folder_id {
            self.access
                .require_folder(user, folder_id, AccessLevel::Edit)
                .await?;
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let storage_key = Document::storage_key_for(user.organization_id, id);
        let document = Document {
            id,
            organization_id: user.organization_id,
            owner_id: user.user_id,
            folder_id: upload.folder_id,
            title,
            description,
            original_filename: filename,
            mime_type: upload.resolved_mime_type(),
            size_bytes: upload.bytes.len() as i64,
            checksum: hex::encode(Sha256::digest(&upload.bytes)),
            storage_key,
            tags,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.blob.put(&document.storage_key, &upload.bytes).await?;

        if let Err(e) = self.storage.insert_document(&document).await {
            if let Err(cleanup) = self.blob.delete(&document.storage_key).await {
                tracing::error!(
                    error=?cleanup,
                    storage_key=%document.storage_key,
                    "unable to remove blob of failed upload"
                );
            }
            return Err(e.into());
        }

        Ok(document)
    }

    pub async fn get(&self, user: &UserContext, id: Uuid) -> Result<Document> {
        self.access
            .require_document(user, id, AccessLevel::View)
            .await
    }

    /// The document and its bytes
    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn download(&self, user: &UserContext, id: Uuid) -> Result<DocumentContent> {
        let content = self.read(user, id).await?;

        self.audit
            .record(AuditLog::new(
                user,
                AuditAction::DocumentDownload,
                EntityType::Document,
                Some(id),
            ))
            .await;
        Ok(content)
    }

    /// Loads a readable document with its bytes, without auditing
    pub(crate) async fn read(&self, user: &UserContext, id: Uuid) -> Result<DocumentContent> {
        let document = self
            .access
            .require_document(user, id, AccessLevel::View)
            .await?;
        let bytes = self.blob.get(&document.storage_key).await?;
        Ok(DocumentContent { document, bytes })
    }

    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn update_metadata(
        &self,
        user: &UserContext,
        id: Uuid,
        request: UpdateDocumentRequest,
    ) -> Result<Document> {
        let mut document = self
            .access
            .require_document(user, id, AccessLevel::Edit)
            .await?;

        if let Some(title) = request.title.as_deref() {
            document.title = required_text("title", title, MAX_TITLE_LENGTH)?;
        }
        if let Some(description) = request.description.as_deref() {
            document.description =
                optional_text("description", Some(description), MAX_DESCRIPTION_LENGTH)?;
        }
        if let Some(tags) = request.tags.as_deref() {
            document.tags = normalize_tags(tags)?;
        }

        let folder_id = if request.move_to_root {
            None
        } else {
            request.folder_id.or(document.folder_id)
        };
        if folder_id != document.folder_id
            && let Some(folder_id) = folder_id
        {
            self.access
                .require_folder(user, folder_id, AccessLevel::Edit)
                .await?;
        }
        document.folder_id = folder_id;
        document.updated_at = Utc::now();

        self.storage.update_document(&document).await?;

        self.audit
            .record(
                AuditLog::new(
                    user,
                    AuditAction::DocumentUpdate,
                    EntityType::Document,
                    Some(document.id),
                )
                .with_metadata(json!({
                    "title": document.title,
                    "folder_id": document.folder_id,
                    "tags": document.tags,
                })),
            )
            .await;
        Ok(document)
    }

    /// Moves a document to the trash
    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn delete(&self, user: &UserContext, id: Uuid) -> Result<()> {
        let document = self
            .access
            .require_document_including_trash(user, id, AccessLevel::Owner)
            .await?;
        if document.is_deleted() {
            return Err(VaultError::conflict("document is already in the trash"));
        }

        self.storage
            .set_deleted(user.organization_id, id, Some(Utc::now()), document.folder_id)
            .await?;

        self.audit
            .record(AuditLog::new(
                user,
                AuditAction::DocumentDelete,
                EntityType::Document,
                Some(id),
            ))
            .await;
        Ok(())
    }

    /// Takes a document out of the trash. Documents whose folder no longer exists return to
    /// the root.
    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn restore(&self, user: &UserContext, id: Uuid) -> Result<Document> {
        let mut document = self
            .access
            .require_document_including_trash(user, id, AccessLevel::Owner)
            .await?;
        if !document.is_deleted() {
            return Err(VaultError::conflict("document is not in the trash"));
        }

        let folder_id = match document.folder_id {
            Some(folder_id) => self
                .storage
                .get_folder(user.organization_id, folder_id)
                .await?
                .map(|folder| folder.id),
            None => None,
        };

        self.storage
            .set_deleted(user.organization_id, id, None, folder_id)
            .await?;
        document.deleted_at = None;
        document.folder_id = folder_id;

        self.audit
            .record(
                AuditLog::new(user, AuditAction::DocumentRestore, EntityType::Document, Some(id))
                    .with_metadata(json!({ "folder_id": folder_id })),
            )
            .await;
        Ok(document)
    }

    /// Removes a document and its content for good
    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn purge(&self, user: &UserContext, id: Uuid) -> Result<()> {
        let document = self
            .access
            .require_document_including_trash(user, id, AccessLevel::Owner)
            .await?;

        if !self.storage.purge_document(user.organization_id, id).await? {
            return Err(VaultError::not_found("document"));
        }
        if let Err(e) = self.blob.delete(&document.storage_key).await {
            tracing::error!(error=?e, storage_key=%document.storage_key, "unable to delete blob");
        }

        self.audit
            .record(
                AuditLog::new(user, AuditAction::DocumentPurge, EntityType::Document, Some(id))
                    .with_metadata(json!({ "title": document.title })),
            )
            .await;
        Ok(())
    }

    /// Removes documents written by a conversion that failed part way, without auditing them
    pub(crate) async fn discard(&self, documents: &[Document]) {
        for document in documents {
            if let Err(e) = self
                .storage
                .purge_document(document.organization_id, document.id)
                .await
            {
                tracing::error!(error=?e, document_id=%document.id, "unable to discard document");
                continue;
            }
            if let Err(e) = self.blob.delete(&document.storage_key).await {
                tracing::error!(error=?e, storage_key=%document.storage_key, "unable to delete blob");
            }
        }
    }

    /// Admins see the whole trash of the organization, everyone else their own documents
    pub async fn list_trash(
        &self,
        user: &UserContext,
        pagination: Pagination,
    ) -> Result<Page<Document>> {
        let owner_id = (!user.is_admin()).then_some(user.user_id);
        let (items, total) = self
            .storage
            .list_trash(user.organization_id, owner_id, &pagination)
            .await?;
        Ok(Page::new(items, total, &pagination))
    }

    pub async fn search(&self, user: &UserContext, search: DocumentSearch) -> Result<Page<Document>> {
        if let (Some(from), Some(to)) = (search.created_from, search.created_to)
            && from > to
        {
            return Err(VaultError::validation("created_from must not be after created_to"));
        }
        let text = optional_text("query", search.query.as_deref(), MAX_QUERY_LENGTH)?;
        let tag = search
            .tag
            .as_deref()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty());
        let mime_prefix = search
            .mime_prefix
            .as_deref()
            .map(|prefix| prefix.trim().to_lowercase())
            .filter(|prefix| !prefix.is_empty());

        let pagination = search.pagination();
        let query = DocumentQuery {
            organization_id: user.organization_id,
            visible_to: (!user.is_admin()).then_some(user.user_id),
            text,
            folder_id: search.folder_id,
            tag,
            mime_prefix,
            owner_id: search.owner_id,
            created_from: search.created_from,
            created_to: search.created_to,
            sort: search.sort.unwrap_or_default(),
            limit: pagination.limit(),
            offset: pagination.offset(),
        };

        let (items, total) = self.storage.search_documents(&query).await?;
        Ok(Page::new(items, total, &pagination))
    }

    pub async fn list_tags(&self, user: &UserContext) -> Result<Vec<Tag>> {
        Ok(self.storage.list_tags(user.organization_id).await?)
    }

    /// Zips the given documents. Every one of them must be readable by the caller.
    #[tracing::instrument(skip(self, user, ids), fields(user_id=%user.user_id, count=ids.len()), err)]
    pub async fn bundle(&self, user: &UserContext, ids: Vec<Uuid>) -> Result<Vec<u8>> {
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(VaultError::validation("no documents to bundle"));
        }
        if ids.len() > MAX_BUNDLE_SIZE {
            return Err(VaultError::validation(format!(
                "a bundle holds at most {MAX_BUNDLE_SIZE} documents"
            )));
        }

        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let content = self.read(user, *id).await?;
            entries.push(ArchiveEntry::new(
                content.document.original_filename,
                content.bytes,
            ));
        }

        let bytes = tokio::task::spawn_blocking(move || archive::bundle(&entries))
            .await
            .map_err(anyhow::Error::from)??;

        self.audit
            .record(
                AuditLog::new(user, AuditAction::DocumentBundle, EntityType::Document, None)
                    .with_metadata(json!({ "document_ids": ids })),
            )
            .await;
        Ok(bytes)
    }
}
