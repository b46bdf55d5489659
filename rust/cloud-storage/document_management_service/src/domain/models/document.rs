use chrono::{DateTime, Utc};
use file_conversion::FileType;
use model_vault::Pagination;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::error::{Result, VaultError};

/// Most tags a document may carry
pub const MAX_TAGS_PER_DOCUMENT: usize = 20;
/// Longest tag accepted
pub const MAX_TAG_LENGTH: usize = 50;
/// Most documents in one zip bundle
pub const MAX_BUNDLE_SIZE: usize = 100;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A stored file and its metadata
#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// Hex encoded sha256 of the content
    pub checksum: String,
    #[serde(skip)]
    pub storage_key: String,
    /// Lowercased tag names, sorted
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while the document is in the trash
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mime_type(&self.mime_type)
            .or_else(|| FileType::from_filename(&self.original_filename))
    }

    /// `{organization_id}/{document_id}`
    pub fn storage_key_for(organization_id: Uuid, document_id: Uuid) -> String {
        format!("{organization_id}/{document_id}")
    }
}

/// A document with its content
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub document: Document,
    pub bytes: Vec<u8>,
}

#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Number of documents outside the trash carrying the tag
    pub document_count: i64,
}

/// A new file as received from a client
#[derive(Debug, Clone, Default)]
pub struct UploadDocument {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub folder_id: Option<Uuid>,
    pub tags: Vec<String>,
}

impl UploadDocument {
    /// The mime type to store. Generic client types are replaced by one derived from the
    /// filename extension.
    pub fn resolved_mime_type(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .map(|c| c.split(';').next().unwrap_or(c).trim().to_lowercase())
            .filter(|c| !c.is_empty() && c != FALLBACK_MIME_TYPE);

        match declared {
            Some(declared) => declared,
            None => FileType::from_filename(&self.filename)
                .map(|file_type| file_type.mime_type().to_string())
                .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string()),
        }
    }
}

/// Metadata changes. `None` leaves a field untouched; `move_to_root` detaches the document from
/// its folder and `tags` replaces the whole tag set.
#[derive(Debug, Clone, Default, serde::Deserialize, ToSchema)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub move_to_root: bool,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct BundleRequest {
    pub document_ids: Vec<Uuid>,
}

#[derive(
    serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
    TitleAsc,
    TitleDesc,
    SizeDesc,
    SizeAsc,
}

/// Search filters as given in the query string
#[derive(Debug, Clone, Default, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentSearch {
    /// Case-insensitive match against title, description and filename
    pub query: Option<String>,
    pub folder_id: Option<Uuid>,
    pub tag: Option<String>,
    /// e.g. `image/` or `application/pdf`
    pub mime_prefix: Option<String>,
    pub owner_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub sort: Option<DocumentSort>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DocumentSearch {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// A search after validation, scoped to one organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub organization_id: Uuid,
    /// When set only documents this user owns or was granted are returned
    pub visible_to: Option<Uuid>,
    pub text: Option<String>,
    pub folder_id: Option<Uuid>,
    pub tag: Option<String>,
    pub mime_prefix: Option<String>,
    pub owner_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub sort: DocumentSort,
    pub limit: i64,
    pub offset: i64,
}

/// Trims, lowercases and de-duplicates tags, keeping the first occurrence order
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(VaultError::validation(format!(
                "tags must be at most {MAX_TAG_LENGTH} characters"
            )));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    if normalized.len() > MAX_TAGS_PER_DOCUMENT {
        return Err(VaultError::validation(format!(
            "a document may have at most {MAX_TAGS_PER_DOCUMENT} tags"
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content_type: Option<&str>) -> UploadDocument {
        UploadDocument {
            filename: filename.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: vec![1],
            ..Default::default()
        }
    }

    #[test]
    fn sniffs_generic_mime_types() {
        assert_eq!(
            upload("report.pdf", Some("application/octet-stream")).resolved_mime_type(),
            "application/pdf"
        );
        assert_eq!(upload("photo.JPG", None).resolved_mime_type(), "image/jpeg");
        assert_eq!(
            upload("notes.txt", Some("text/plain; charset=utf-8")).resolved_mime_type(),
            "text/plain"
        );
        assert_eq!(
            upload("blob", Some("application/octet-stream")).resolved_mime_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn normalizes_tag_lists() {
        let tags = vec![
            " Finance ".to_string(),
            "finance".to_string(),
            "".to_string(),
            "Q3".to_string(),
        ];
        assert_eq!(normalize_tags(&tags).unwrap(), vec!["finance", "q3"]);

        let too_many: Vec<String> = (0..21).map(|i| format!("tag{i}")).collect();
        assert!(normalize_tags(&too_many).is_err());
        assert!(normalize_tags(&["x".repeat(51)]).is_err());
    }
}
