//! Ports - the interfaces the domain needs from the outside world.
//!
//! Storage ports return [anyhow::Result]; the services turn those failures into
//! [crate::domain::VaultError::Internal].

use chrono::{DateTime, Utc};
use model_vault::Pagination;
use uuid::Uuid;

use crate::domain::models::{
    AuditLog, AuditQuery, Department, Document, DocumentQuery, EmployeeFilter, EmployeeProfile,
    EmployeeProfileInput, EmploymentStatus, Folder, Organization, ShareCode, ShareGrant,
    ShareResource, Tag, UsageFacts, User, UserCredentials,
};

pub trait OrganizationRepository: Clone + Send + Sync + 'static {
    /// Creates a tenant together with its first admin account, atomically
    fn create_organization(
        &self,
        organization: &Organization,
        admin: &User,
        password_hash: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get_organization(
        &self,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Organization>>> + Send;
}

pub trait UserRepository: Clone + Send + Sync + 'static {
    /// Emails are unique across every organization
    fn email_exists(&self, email: &str) -> impl Future<Output = anyhow::Result<bool>> + Send;

    fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = anyhow::Result<Option<UserCredentials>>> + Send;

    fn get_credentials(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<UserCredentials>>> + Send;

    fn get_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<User>>> + Send;

    fn insert_user(
        &self,
        user: &User,
        password_hash: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Saves name, role and active flag
    fn update_user(&self, user: &User) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn set_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn record_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Deletes the account and hands everything it owns over to `successor_id`
    fn delete_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        successor_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Users ordered by name, with the total count
    fn list_users(
        &self,
        organization_id: Uuid,
        pagination: &Pagination,
    ) -> impl Future<Output = anyhow::Result<(Vec<User>, i64)>> + Send;

    fn count_active_admins(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<i64>> + Send;
}

pub trait DepartmentRepository: Clone + Send + Sync + 'static {
    fn insert_department(
        &self,
        department: &Department,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get_department(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Department>>> + Send;

    fn list_departments(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Vec<Department>>> + Send;

    fn update_department(
        &self,
        department: &Department,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Employees of the department are left without a department
    fn delete_department(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Case-insensitive, ignoring the department `except`
    fn department_name_taken(
        &self,
        organization_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

pub trait EmployeeRepository: Clone + Send + Sync + 'static {
    fn upsert_profile(
        &self,
        profile: &EmployeeProfileInput,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get_profile(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<EmployeeProfile>>> + Send;

    fn list_profiles(
        &self,
        organization_id: Uuid,
        filter: &EmployeeFilter,
    ) -> impl Future<Output = anyhow::Result<Vec<EmployeeProfile>>> + Send;

    fn set_status(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        status: EmploymentStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

pub trait FolderRepository: Clone + Send + Sync + 'static {
    fn insert_folder(&self, folder: &Folder) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get_folder(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Folder>>> + Send;

    /// Children of `parent_id`, or root folders when `None`. `owner_id` narrows the result to
    /// one owner.
    fn list_folders(
        &self,
        organization_id: Uuid,
        parent_id: Option<Uuid>,
        owner_id: Option<Uuid>,
    ) -> impl Future<Output = anyhow::Result<Vec<Folder>>> + Send;

    /// Saves name, parent and updated_at
    fn update_folder(&self, folder: &Folder) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Case-insensitive among the children of `parent_id`, ignoring the folder `except`
    fn folder_name_taken(
        &self,
        organization_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        except: Option<Uuid>,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// The chain of folders from the root down to and including `id`
    fn folder_path(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Vec<Folder>>> + Send;

    /// Whether the folder has no subfolders and no live documents. Trashed documents don't count.
    fn folder_is_empty(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Removes the folder and every folder below it. Documents inside are moved to the trash
    /// and detached from the removed folders; share codes and grants on the removed folders
    /// are dropped. Returns the ids of the documents that were trashed.
    fn delete_folder_tree(
        &self,
        organization_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<Vec<Uuid>>> + Send;
}

pub trait DocumentRepository: Clone + Send + Sync + 'static {
    /// Inserts the document and links its tags, creating missing tags
    fn insert_document(
        &self,
        document: &Document,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Includes trashed documents
    fn get_document(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Document>>> + Send;

    /// Saves title, description, folder, tags and updated_at
    fn update_document(
        &self,
        document: &Document,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Sets or clears `deleted_at`, optionally moving the document to another folder
    fn set_deleted(
        &self,
        organization_id: Uuid,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
        folder_id: Option<Uuid>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Removes the row together with its tags, share codes and grants
    fn purge_document(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Trashed documents, newest deletion first. `owner_id` narrows to one owner.
    fn list_trash(
        &self,
        organization_id: Uuid,
        owner_id: Option<Uuid>,
        pagination: &Pagination,
    ) -> impl Future<Output = anyhow::Result<(Vec<Document>, i64)>> + Send;

    /// Documents outside the trash matching the query, with the total count
    fn search_documents(
        &self,
        query: &DocumentQuery,
    ) -> impl Future<Output = anyhow::Result<(Vec<Document>, i64)>> + Send;
}

pub trait TagRepository: Clone + Send + Sync + 'static {
    /// Every tag of the organization ordered by name, with usage counts
    fn list_tags(&self, organization_id: Uuid) -> impl Future<Output = anyhow::Result<Vec<Tag>>> + Send;
}

pub trait ShareRepository: Clone + Send + Sync + 'static {
    /// Returns false when the code is already taken
    fn insert_share_code(
        &self,
        share_code: &ShareCode,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    fn find_share_code(
        &self,
        organization_id: Uuid,
        code: &str,
    ) -> impl Future<Output = anyhow::Result<Option<ShareCode>>> + Send;

    fn get_share_code(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<ShareCode>>> + Send;

    fn list_share_codes(
        &self,
        organization_id: Uuid,
        resource: ShareResource,
    ) -> impl Future<Output = anyhow::Result<Vec<ShareCode>>> + Send;

    fn revoke_share_code(
        &self,
        organization_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Atomically consumes one use of the code and upserts the grant, keeping the higher
    /// access level. Returns false when the code was no longer usable at `at`.
    fn redeem_share_code(
        &self,
        share_code_id: Uuid,
        grant: &ShareGrant,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    fn grants_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Vec<ShareGrant>>> + Send;
}

pub trait AuditLogRepository: Clone + Send + Sync + 'static {
    fn insert_audit_log(&self, log: &AuditLog) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Newest first, with the total count
    fn query_audit_logs(
        &self,
        organization_id: Uuid,
        query: &AuditQuery,
    ) -> impl Future<Output = anyhow::Result<(Vec<AuditLog>, i64)>> + Send;
}

pub trait AnalyticsRepository: Clone + Send + Sync + 'static {
    fn usage_facts(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
        top_uploaders: i64,
    ) -> impl Future<Output = anyhow::Result<UsageFacts>> + Send;
}

/// Every storage port at once
pub trait VaultStorage:
    OrganizationRepository
    + UserRepository
    + DepartmentRepository
    + EmployeeRepository
    + FolderRepository
    + DocumentRepository
    + TagRepository
    + ShareRepository
    + AuditLogRepository
    + AnalyticsRepository
{
}

impl<T> VaultStorage for T where
    T: OrganizationRepository
        + UserRepository
        + DepartmentRepository
        + EmployeeRepository
        + FolderRepository
        + DocumentRepository
        + TagRepository
        + ShareRepository
        + AuditLogRepository
        + AnalyticsRepository
{
}

/// Where file contents live
pub trait BlobStorage: Clone + Send + Sync + 'static {
    fn put(&self, key: &str, bytes: &[u8]) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;

    /// Deleting a missing blob is not an error
    fn delete(&self, key: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}
