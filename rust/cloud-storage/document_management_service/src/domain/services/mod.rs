//! Domain services. Each one owns a clone of the storage adapter and enforces tenant scoping
//! and role checks before touching it.

mod access;
mod admin;
mod analytics;
mod audit;
mod auth;
mod conversion;
mod directory;
mod document;
mod folder;
mod share;

#[cfg(test)]
mod test;

pub use access::AccessResolver;
pub use admin::AdminService;
pub use analytics::AnalyticsService;
pub use audit::AuditService;
pub use auth::AuthService;
pub use conversion::ConversionService;
pub use directory::DirectoryService;
pub use document::DocumentService;
pub use folder::FolderService;
pub use share::ShareService;

use vault_auth::{jwt::JwtArgs, password::PasswordHasher};

use crate::domain::ports::{BlobStorage, VaultStorage};

/// Every service, sharing one storage adapter and one blob store
#[derive(Debug, Clone)]
pub struct VaultServices<S, B> {
    pub auth: AuthService<S>,
    pub admin: AdminService<S>,
    pub directory: DirectoryService<S>,
    pub folders: FolderService<S>,
    pub documents: DocumentService<S, B>,
    pub shares: ShareService<S>,
    pub conversions: ConversionService<S, B>,
    pub audit: AuditService<S>,
    pub analytics: AnalyticsService<S>,
}

impl<S: VaultStorage, B: BlobStorage> VaultServices<S, B> {
    pub fn new(
        storage: S,
        blob: B,
        jwt_args: JwtArgs,
        hasher: PasswordHasher,
        max_upload_bytes: usize,
    ) -> Self {
        let documents = DocumentService::new(storage.clone(), blob, max_upload_bytes);
        Self {
            auth: AuthService::new(storage.clone(), hasher, jwt_args),
            admin: AdminService::new(storage.clone(), hasher),
            directory: DirectoryService::new(storage.clone()),
            folders: FolderService::new(storage.clone()),
            conversions: ConversionService::new(storage.clone(), documents.clone()),
            documents,
            shares: ShareService::new(storage.clone()),
            audit: AuditService::new(storage.clone()),
            analytics: AnalyticsService::new(storage),
        }
    }
}
