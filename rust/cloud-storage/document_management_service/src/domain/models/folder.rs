use chrono::{DateTime, Utc};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::error::{Result, VaultError};

/// Longest folder name accepted
pub const MAX_FOLDER_NAME_LENGTH: usize = 255;

/// A folder. Folders form a single-parent tree per organization.
#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Folder {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub owner_id: Uuid,
    /// `None` for root folders
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct FolderCrumb {
    pub id: Uuid,
    pub name: String,
}

impl From<&Folder> for FolderCrumb {
    fn from(folder: &Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name.clone(),
        }
    }
}

/// A folder together with its breadcrumb, root first and ending with the folder itself
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct FolderDetails {
    #[serde(flatten)]
    pub folder: Folder,
    pub path: Vec<FolderCrumb>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// Renames and/or moves a folder. Set `move_to_root` to detach it from its parent.
#[derive(Debug, Clone, Default, serde::Deserialize, ToSchema)]
pub struct UpdateFolderRequest {
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub move_to_root: bool,
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFoldersQuery {
    /// List the children of this folder. Omit for root folders.
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteFolderQuery {
    /// Also trash every document and remove every folder below this one
    #[serde(default)]
    pub recursive: bool,
}

/// Trims a folder name and rejects empty names, names with `/` and names that are too long
pub fn validate_folder_name(name: &str) -> Result<String> {
    let name = super::required_text("folder name", name, MAX_FOLDER_NAME_LENGTH)?;
    if name.contains('/') || name.contains('\\') {
        return Err(VaultError::validation("folder name must not contain slashes"));
    }
    if name == "." || name == ".." {
        return Err(VaultError::validation("folder name is reserved"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names() {
        assert_eq!(validate_folder_name("  Reports ").unwrap(), "Reports");
        assert!(validate_folder_name("").is_err());
        assert!(validate_folder_name("   ").is_err());
        assert!(validate_folder_name("a/b").is_err());
        assert!(validate_folder_name("..").is_err());
        assert!(validate_folder_name(&"x".repeat(256)).is_err());
        assert!(validate_folder_name(&"x".repeat(255)).is_ok());
    }
}
