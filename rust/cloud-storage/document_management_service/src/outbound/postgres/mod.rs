//! PostgreSQL implementation of the storage ports.
//! Each submodule holds the queries for one area; [PgVault] only delegates.

mod accounts;
mod analytics;
mod audit;
mod directory;
mod documents;
mod folders;
mod shares;

use chrono::{DateTime, Utc};
use model_vault::Pagination;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    models::{
        AuditLog, AuditQuery, Department, Document, DocumentQuery, EmployeeFilter,
        EmployeeProfile, EmployeeProfileInput, EmploymentStatus, Folder, Organization, ShareCode,
        ShareGrant, ShareResource, Tag, UsageFacts, User, UserCredentials,
    },
    ports::{
        AnalyticsRepository, AuditLogRepository, DepartmentRepository, DocumentRepository,
        EmployeeRepository, FolderRepository, OrganizationRepository, ShareRepository,
        TagRepository, UserRepository,
    },
};

/// The schema migrations, embedded at compile time
pub static MIGRATIONS: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct PgVault {
    pool: PgPool,
}

impl PgVault {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrganizationRepository for PgVault {
    async fn create_organization(
        &self,
        organization: &Organization,
        admin: &User,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        accounts::create_organization(&self.pool, organization, admin, password_hash).await
    }

    async fn get_organization(&self, id: Uuid) -> anyhow::Result<Option<Organization>> {
        accounts::get_organization(&self.pool, id).await
    }
}

impl UserRepository for PgVault {
    async fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        accounts::email_exists(&self.pool, email).await
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<UserCredentials>> {
        accounts::find_credentials_by_email(&self.pool, email).await
    }

    async fn get_credentials(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserCredentials>> {
        accounts::get_credentials(&self.pool, organization_id, user_id).await
    }

    async fn get_user(&self, organization_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<User>> {
        accounts::get_user(&self.pool, organization_id, user_id).await
    }

    async fn insert_user(&self, user: &User, password_hash: &str) -> anyhow::Result<()> {
        accounts::insert_user(&self.pool, user, password_hash).await
    }

    async fn update_user(&self, user: &User) -> anyhow::Result<()> {
        accounts::update_user(&self.pool, user).await
    }

    async fn set_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        accounts::set_password_hash(&self.pool, user_id, password_hash, at).await
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        accounts::record_login(&self.pool, user_id, at).await
    }

    async fn delete_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        successor_id: Uuid,
    ) -> anyhow::Result<bool> {
        accounts::delete_user(&self.pool, organization_id, user_id, successor_id).await
    }

    async fn list_users(
        &self,
        organization_id: Uuid,
        pagination: &Pagination,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        accounts::list_users(&self.pool, organization_id, pagination).await
    }

    async fn count_active_admins(&self, organization_id: Uuid) -> anyhow::Result<i64> {
        accounts::count_active_admins(&self.pool, organization_id).await
    }
}

impl DepartmentRepository for PgVault {
    async fn insert_department(&self, department: &Department) -> anyhow::Result<()> {
        directory::insert_department(&self.pool, department).await
    }

    async fn get_department(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Department>> {
        directory::get_department(&self.pool, organization_id, id).await
    }

    async fn list_departments(&self, organization_id: Uuid) -> anyhow::Result<Vec<Department>> {
        directory::list_departments(&self.pool, organization_id).await
    }

    async fn update_department(&self, department: &Department) -> anyhow::Result<()> {
        directory::update_department(&self.pool, department).await
    }

    async fn delete_department(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        directory::delete_department(&self.pool, organization_id, id).await
    }

    async fn department_name_taken(
        &self,
        organization_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        directory::department_name_taken(&self.pool, organization_id, name, except).await
    }
}

impl EmployeeRepository for PgVault {
    async fn upsert_profile(&self, profile: &EmployeeProfileInput) -> anyhow::Result<()> {
        directory::upsert_profile(&self.pool, profile).await
    }

    async fn get_profile(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<EmployeeProfile>> {
        directory::get_profile(&self.pool, organization_id, user_id).await
    }

    async fn list_profiles(
        &self,
        organization_id: Uuid,
        filter: &EmployeeFilter,
    ) -> anyhow::Result<Vec<EmployeeProfile>> {
        directory::list_profiles(&self.pool, organization_id, filter).await
    }

    async fn set_status(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        status: EmploymentStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        directory::set_status(&self.pool, organization_id, user_id, status, at).await
    }
}

impl FolderRepository for PgVault {
    async fn insert_folder(&self, folder: &Folder) -> anyhow::Result<()> {
        folders::insert_folder(&self.pool, folder).await
    }

    async fn get_folder(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<Option<Folder>> {
        folders::get_folder(&self.pool, organization_id, id).await
    }

    async fn list_folders(
        &self,
        organization_id: Uuid,
        parent_id: Option<Uuid>,
        owner_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Folder>> {
        folders::list_folders(&self.pool, organization_id, parent_id, owner_id).await
    }

    async fn update_folder(&self, folder: &Folder) -> anyhow::Result<()> {
        folders::update_folder(&self.pool, folder).await
    }

    async fn folder_name_taken(
        &self,
        organization_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        folders::folder_name_taken(&self.pool, organization_id, parent_id, name, except).await
    }

    async fn folder_path(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<Vec<Folder>> {
        folders::folder_path(&self.pool, organization_id, id).await
    }

    async fn folder_is_empty(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        folders::folder_is_empty(&self.pool, organization_id, id).await
    }

    async fn delete_folder_tree(
        &self,
        organization_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Uuid>> {
        folders::delete_folder_tree(&self.pool, organization_id, id, at).await
    }
}

impl DocumentRepository for PgVault {
    async fn insert_document(&self, document: &Document) -> anyhow::Result<()> {
        documents::insert_document(&self.pool, document).await
    }

    async fn get_document(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Document>> {
        documents::get_document(&self.pool, organization_id, id).await
    }

    async fn update_document(&self, document: &Document) -> anyhow::Result<()> {
        documents::update_document(&self.pool, document).await
    }

    async fn set_deleted(
        &self,
        organization_id: Uuid,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
        folder_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        documents::set_deleted(&self.pool, organization_id, id, deleted_at, folder_id).await
    }

    async fn purge_document(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        documents::purge_document(&self.pool, organization_id, id).await
    }

    async fn list_trash(
        &self,
        organization_id: Uuid,
        owner_id: Option<Uuid>,
        pagination: &Pagination,
    ) -> anyhow::Result<(Vec<Document>, i64)> {
        documents::list_trash(&self.pool, organization_id, owner_id, pagination).await
    }

    async fn search_documents(&self, query: &DocumentQuery) -> anyhow::Result<(Vec<Document>, i64)> {
        documents::search_documents(&self.pool, query).await
    }
}

impl TagRepository for PgVault {
    async fn list_tags(&self, organization_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        documents::list_tags(&self.pool, organization_id).await
    }
}

impl ShareRepository for PgVault {
    async fn insert_share_code(&self, share_code: &ShareCode) -> anyhow::Result<bool> {
        shares::insert_share_code(&self.pool, share_code).await
    }

    async fn find_share_code(
        &self,
        organization_id: Uuid,
        code: &str,
    ) -> anyhow::Result<Option<ShareCode>> {
        shares::find_share_code(&self.pool, organization_id, code).await
    }

    async fn get_share_code(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<ShareCode>> {
        shares::get_share_code(&self.pool, organization_id, id).await
    }

    async fn list_share_codes(
        &self,
        organization_id: Uuid,
        resource: ShareResource,
    ) -> anyhow::Result<Vec<ShareCode>> {
        shares::list_share_codes(&self.pool, organization_id, resource).await
    }

    async fn revoke_share_code(
        &self,
        organization_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        shares::revoke_share_code(&self.pool, organization_id, id, at).await
    }

    async fn redeem_share_code(
        &self,
        share_code_id: Uuid,
        grant: &ShareGrant,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        shares::redeem_share_code(&self.pool, share_code_id, grant, at).await
    }

    async fn grants_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ShareGrant>> {
        shares::grants_for_user(&self.pool, user_id).await
    }
}

impl AuditLogRepository for PgVault {
    async fn insert_audit_log(&self, log: &AuditLog) -> anyhow::Result<()> {
        audit::insert_audit_log(&self.pool, log).await
    }

    async fn query_audit_logs(
        &self,
        organization_id: Uuid,
        query: &AuditQuery,
    ) -> anyhow::Result<(Vec<AuditLog>, i64)> {
        audit::query_audit_logs(&self.pool, organization_id, query).await
    }
}

impl AnalyticsRepository for PgVault {
    async fn usage_facts(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
        top_uploaders: i64,
    ) -> anyhow::Result<UsageFacts> {
        analytics::usage_facts(&self.pool, organization_id, since, top_uploaders).await
    }
}
