//! In-memory adapters for every port, used by tests and the `mock` feature

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use model_vault::{Pagination, Role};
use uuid::Uuid;

use crate::domain::{
    models::{
        AuditLog, AuditQuery, DailyCount, Department, DepartmentStorage, Document, DocumentQuery,
        DocumentSort, EmployeeFilter, EmployeeProfile, EmployeeProfileInput, EmploymentStatus,
        Folder, MimeTypeCount, Organization, ShareCode, ShareGrant, ShareResource, Tag,
        UploaderStat, UsageFacts, User, UserCredentials,
    },
    ports::{
        AnalyticsRepository, AuditLogRepository, BlobStorage, DepartmentRepository,
        DocumentRepository, EmployeeRepository, FolderRepository, OrganizationRepository,
        ShareRepository, TagRepository, UserRepository,
    },
};

#[derive(Debug, Default)]
struct State {
    organizations: HashMap<Uuid, Organization>,
    users: HashMap<Uuid, UserCredentials>,
    departments: HashMap<Uuid, Department>,
    profiles: HashMap<Uuid, EmployeeProfileInput>,
    folders: HashMap<Uuid, Folder>,
    documents: HashMap<Uuid, Document>,
    tags: HashMap<(Uuid, String), Uuid>,
    share_codes: HashMap<Uuid, ShareCode>,
    grants: Vec<ShareGrant>,
    audit_logs: Vec<AuditLog>,
    fail_audit_inserts: bool,
}

impl State {
    fn folder_path(&self, organization_id: Uuid, id: Uuid) -> Vec<Folder> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(folder) = self
                .folders
                .get(&id)
                .filter(|f| f.organization_id == organization_id)
            else {
                break;
            };
            if !seen.insert(id) {
                break;
            }
            path.push(folder.clone());
            current = folder.parent_id;
        }
        path.reverse();
        path
    }

    fn descendants(&self, id: Uuid) -> HashSet<Uuid> {
        let mut found = HashSet::from([id]);
        let mut frontier = vec![id];
        while let Some(parent) = frontier.pop() {
            for folder in self.folders.values() {
                if folder.parent_id == Some(parent) && found.insert(folder.id) {
                    frontier.push(folder.id);
                }
            }
        }
        found
    }

    fn visible_to(&self, document: &Document, user_id: Uuid) -> bool {
        if document.owner_id == user_id {
            return true;
        }
        let grants: Vec<&ShareGrant> = self.grants.iter().filter(|g| g.user_id == user_id).collect();
        if grants
            .iter()
            .any(|g| g.resource == ShareResource::Document(document.id))
        {
            return true;
        }
        let Some(folder_id) = document.folder_id else {
            return false;
        };
        self.folder_path(document.organization_id, folder_id)
            .iter()
            .any(|folder| grants.iter().any(|g| g.resource == ShareResource::Folder(folder.id)))
    }

    fn link_tags(&mut self, document: &Document) {
        for tag in &document.tags {
            self.tags
                .entry((document.organization_id, tag.clone()))
                .or_insert_with(Uuid::now_v7);
        }
    }

    fn profile(&self, input: &EmployeeProfileInput) -> Option<EmployeeProfile> {
        let user = &self.users.get(&input.user_id)?.user;
        Some(EmployeeProfile {
            user_id: input.user_id,
            organization_id: input.organization_id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            department_id: input.department_id,
            monitor_id: input.monitor_id,
            job_title: input.job_title.clone(),
            employment_status: input.employment_status,
            hire_date: input.hire_date,
            updated_at: input.updated_at,
        })
    }

    fn drop_shares(&mut self, resource: ShareResource) {
        self.share_codes.retain(|_, code| code.resource != resource);
        self.grants.retain(|grant| grant.resource != resource);
    }
}

/// Every storage port backed by maps behind one mutex
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    state: Arc<Mutex<State>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panicking test must not poison the state for the rest of it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every following audit insert fail
    pub fn fail_audit_inserts(&self) {
        self.state().fail_audit_inserts = true;
    }

    /// Audit entries of one organization, oldest first
    pub fn audit_logs(&self, organization_id: Uuid) -> Vec<AuditLog> {
        self.state()
            .audit_logs
            .iter()
            .filter(|log| log.organization_id == organization_id)
            .cloned()
            .collect()
    }
}

fn page<T: Clone>(items: &[T], pagination: &Pagination) -> Vec<T> {
    items
        .iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .cloned()
        .collect()
}

impl OrganizationRepository for MemoryVault {
    async fn create_organization(
        &self,
        organization: &Organization,
        admin: &User,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        let mut state = self.state();
        anyhow::ensure!(
            !state.users.values().any(|c| c.user.email == admin.email),
            "duplicate email"
        );
        state
            .organizations
            .insert(organization.id, organization.clone());
        state.users.insert(
            admin.id,
            UserCredentials {
                user: admin.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> anyhow::Result<Option<Organization>> {
        Ok(self.state().organizations.get(&id).cloned())
    }
}

impl UserRepository for MemoryVault {
    async fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.state().users.values().any(|c| c.user.email == email))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<UserCredentials>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|c| c.user.email == email)
            .cloned())
    }

    async fn get_credentials(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserCredentials>> {
        Ok(self
            .state()
            .users
            .get(&user_id)
            .filter(|c| c.user.organization_id == organization_id)
            .cloned())
    }

    async fn get_user(&self, organization_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .get_credentials(organization_id, user_id)
            .await?
            .map(|c| c.user))
    }

    async fn insert_user(&self, user: &User, password_hash: &str) -> anyhow::Result<()> {
        let mut state = self.state();
        anyhow::ensure!(
            !state.users.values().any(|c| c.user.email == user.email),
            "duplicate email"
        );
        state.users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn update_user(&self, user: &User) -> anyhow::Result<()> {
        if let Some(credentials) = self.state().users.get_mut(&user.id) {
            credentials.user.full_name = user.full_name.clone();
            credentials.user.role = user.role;
            credentials.user.is_active = user.is_active;
            credentials.user.updated_at = user.updated_at;
        }
        Ok(())
    }

    async fn set_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(credentials) = self.state().users.get_mut(&user_id) {
            credentials.password_hash = password_hash.to_string();
            credentials.user.updated_at = at;
        }
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(credentials) = self.state().users.get_mut(&user_id) {
            credentials.user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn delete_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        successor_id: Uuid,
    ) -> anyhow::Result<bool> {
        let mut state = self.state();
        let exists = state
            .users
            .get(&user_id)
            .is_some_and(|c| c.user.organization_id == organization_id);
        if !exists {
            return Ok(false);
        }

        state.users.remove(&user_id);
        state.profiles.remove(&user_id);
        for profile in state.profiles.values_mut() {
            if profile.monitor_id == Some(user_id) {
                profile.monitor_id = None;
            }
        }
        for department in state.departments.values_mut() {
            if department.manager_id == Some(user_id) {
                department.manager_id = None;
            }
        }
        for document in state.documents.values_mut() {
            if document.owner_id == user_id {
                document.owner_id = successor_id;
            }
        }
        for folder in state.folders.values_mut() {
            if folder.owner_id == user_id {
                folder.owner_id = successor_id;
            }
        }
        for code in state.share_codes.values_mut() {
            if code.created_by == user_id {
                code.created_by = successor_id;
            }
        }
        state.grants.retain(|grant| grant.user_id != user_id);
        for log in state.audit_logs.iter_mut() {
            if log.user_id == Some(user_id) {
                log.user_id = None;
            }
        }
        Ok(true)
    }

    async fn list_users(
        &self,
        organization_id: Uuid,
        pagination: &Pagination,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        let mut users: Vec<User> = self
            .state()
            .users
            .values()
            .filter(|c| c.user.organization_id == organization_id)
            .map(|c| c.user.clone())
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok((page(&users, pagination), users.len() as i64))
    }

    async fn count_active_admins(&self, organization_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .state()
            .users
            .values()
            .filter(|c| {
                c.user.organization_id == organization_id
                    && c.user.role == Role::Admin
                    && c.user.is_active
            })
            .count() as i64)
    }
}

impl DepartmentRepository for MemoryVault {
    async fn insert_department(&self, department: &Department) -> anyhow::Result<()> {
        self.state()
            .departments
            .insert(department.id, department.clone());
        Ok(())
    }

    async fn get_department(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Department>> {
        Ok(self
            .state()
            .departments
            .get(&id)
            .filter(|d| d.organization_id == organization_id)
            .cloned())
    }

    async fn list_departments(&self, organization_id: Uuid) -> anyhow::Result<Vec<Department>> {
        let mut departments: Vec<Department> = self
            .state()
            .departments
            .values()
            .filter(|d| d.organization_id == organization_id)
            .cloned()
            .collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn update_department(&self, department: &Department) -> anyhow::Result<()> {
        self.state()
            .departments
            .insert(department.id, department.clone());
        Ok(())
    }

    async fn delete_department(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut state = self.state();
        let exists = state
            .departments
            .get(&id)
            .is_some_and(|d| d.organization_id == organization_id);
        if !exists {
            return Ok(false);
        }
        state.departments.remove(&id);
        for profile in state.profiles.values_mut() {
            if profile.department_id == Some(id) {
                profile.department_id = None;
            }
        }
        Ok(true)
    }

    async fn department_name_taken(
        &self,
        organization_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        Ok(self.state().departments.values().any(|d| {
            d.organization_id == organization_id
                && Some(d.id) != except
                && d.name.to_lowercase() == name.to_lowercase()
        }))
    }
}

impl EmployeeRepository for MemoryVault {
    async fn upsert_profile(&self, profile: &EmployeeProfileInput) -> anyhow::Result<()> {
        self.state()
            .profiles
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_profile(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<EmployeeProfile>> {
        let state = self.state();
        Ok(state
            .profiles
            .get(&user_id)
            .filter(|p| p.organization_id == organization_id)
            .and_then(|p| state.profile(p)))
    }

    async fn list_profiles(
        &self,
        organization_id: Uuid,
        filter: &EmployeeFilter,
    ) -> anyhow::Result<Vec<EmployeeProfile>> {
        let state = self.state();
        let mut profiles: Vec<EmployeeProfile> = state
            .profiles
            .values()
            .filter(|p| p.organization_id == organization_id)
            .filter(|p| filter.department_id.is_none_or(|id| p.department_id == Some(id)))
            .filter(|p| filter.status.is_none_or(|status| p.employment_status == status))
            .filter_map(|p| state.profile(p))
            .collect();
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(profiles)
    }

    async fn set_status(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        status: EmploymentStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        match self
            .state()
            .profiles
            .get_mut(&user_id)
            .filter(|p| p.organization_id == organization_id)
        {
            Some(profile) => {
                profile.employment_status = status;
                profile.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl FolderRepository for MemoryVault {
    async fn insert_folder(&self, folder: &Folder) -> anyhow::Result<()> {
        self.state().folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn get_folder(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<Option<Folder>> {
        Ok(self
            .state()
            .folders
            .get(&id)
            .filter(|f| f.organization_id == organization_id)
            .cloned())
    }

    async fn list_folders(
        &self,
        organization_id: Uuid,
        parent_id: Option<Uuid>,
        owner_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .state()
            .folders
            .values()
            .filter(|f| f.organization_id == organization_id && f.parent_id == parent_id)
            .filter(|f| owner_id.is_none_or(|owner| f.owner_id == owner))
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(folders)
    }

    async fn update_folder(&self, folder: &Folder) -> anyhow::Result<()> {
        self.state().folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn folder_name_taken(
        &self,
        organization_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        Ok(self.state().folders.values().any(|f| {
            f.organization_id == organization_id
                && f.parent_id == parent_id
                && Some(f.id) != except
                && f.name.to_lowercase() == name.to_lowercase()
        }))
    }

    async fn folder_path(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<Vec<Folder>> {
        Ok(self.state().folder_path(organization_id, id))
    }

    async fn folder_is_empty(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let state = self.state();
        let has_folders = state
            .folders
            .values()
            .any(|f| f.organization_id == organization_id && f.parent_id == Some(id));
        let has_documents = state
            .documents
            .values()
            .any(|d| {
                d.organization_id == organization_id
                    && d.folder_id == Some(id)
                    && d.deleted_at.is_none()
            });
        Ok(!has_folders && !has_documents)
    }

    async fn delete_folder_tree(
        &self,
        organization_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Uuid>> {
        let mut state = self.state();
        let removed = state.descendants(id);

        let mut trashed = Vec::new();
        for document in state.documents.values_mut() {
            if document.organization_id != organization_id
                || !document.folder_id.is_some_and(|f| removed.contains(&f))
            {
                continue;
            }
            if document.deleted_at.is_none() {
                document.deleted_at = Some(at);
                trashed.push(document.id);
            }
            document.folder_id = None;
        }

        for folder_id in &removed {
            state.folders.remove(folder_id);
            state.drop_shares(ShareResource::Folder(*folder_id));
        }
        trashed.sort();
        Ok(trashed)
    }
}

impl DocumentRepository for MemoryVault {
    async fn insert_document(&self, document: &Document) -> anyhow::Result<()> {
        let mut state = self.state();
        state.link_tags(document);
        state.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Document>> {
        Ok(self
            .state()
            .documents
            .get(&id)
            .filter(|d| d.organization_id == organization_id)
            .cloned())
    }

    async fn update_document(&self, document: &Document) -> anyhow::Result<()> {
        let mut state = self.state();
        state.link_tags(document);
        if let Some(stored) = state.documents.get_mut(&document.id) {
            stored.title = document.title.clone();
            stored.description = document.description.clone();
            stored.folder_id = document.folder_id;
            stored.tags = document.tags.clone();
            stored.tags.sort();
            stored.updated_at = document.updated_at;
        }
        Ok(())
    }

    async fn set_deleted(
        &self,
        organization_id: Uuid,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
        folder_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        if let Some(document) = self
            .state()
            .documents
            .get_mut(&id)
            .filter(|d| d.organization_id == organization_id)
        {
            document.deleted_at = deleted_at;
            document.folder_id = folder_id;
        }
        Ok(())
    }

    async fn purge_document(&self, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut state = self.state();
        let exists = state
            .documents
            .get(&id)
            .is_some_and(|d| d.organization_id == organization_id);
        if exists {
            state.documents.remove(&id);
            state.drop_shares(ShareResource::Document(id));
        }
        Ok(exists)
    }

    async fn list_trash(
        &self,
        organization_id: Uuid,
        owner_id: Option<Uuid>,
        pagination: &Pagination,
    ) -> anyhow::Result<(Vec<Document>, i64)> {
        let mut documents: Vec<Document> = self
            .state()
            .documents
            .values()
            .filter(|d| d.organization_id == organization_id && d.is_deleted())
            .filter(|d| owner_id.is_none_or(|owner| d.owner_id == owner))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok((page(&documents, pagination), documents.len() as i64))
    }

    async fn search_documents(&self, query: &DocumentQuery) -> anyhow::Result<(Vec<Document>, i64)> {
        let state = self.state();
        let text = query.text.as_deref().map(str::to_lowercase);

        let mut documents: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.organization_id == query.organization_id && !d.is_deleted())
            .filter(|d| query.visible_to.is_none_or(|user_id| state.visible_to(d, user_id)))
            .filter(|d| {
                text.as_deref().is_none_or(|text| {
                    d.title.to_lowercase().contains(text)
                        || d.original_filename.to_lowercase().contains(text)
                        || d
                            .description
                            .as_deref()
                            .is_some_and(|description| description.to_lowercase().contains(text))
                })
            })
            .filter(|d| query.folder_id.is_none_or(|id| d.folder_id == Some(id)))
            .filter(|d| query.tag.as_ref().is_none_or(|tag| d.tags.contains(tag)))
            .filter(|d| {
                query
                    .mime_prefix
                    .as_deref()
                    .is_none_or(|prefix| d.mime_type.starts_with(prefix))
            })
            .filter(|d| query.owner_id.is_none_or(|id| d.owner_id == id))
            .filter(|d| query.created_from.is_none_or(|from| d.created_at >= from))
            .filter(|d| query.created_to.is_none_or(|to| d.created_at <= to))
            .cloned()
            .collect();

        documents.sort_by(|a, b| match query.sort {
            DocumentSort::CreatedDesc => b.created_at.cmp(&a.created_at),
            DocumentSort::CreatedAsc => a.created_at.cmp(&b.created_at),
            DocumentSort::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
            DocumentSort::TitleAsc => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            DocumentSort::TitleDesc => b.title.to_lowercase().cmp(&a.title.to_lowercase()),
            DocumentSort::SizeDesc => b.size_bytes.cmp(&a.size_bytes),
            DocumentSort::SizeAsc => a.size_bytes.cmp(&b.size_bytes),
        });

        let total = documents.len() as i64;
        let items = documents
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((items, total))
    }
}

impl TagRepository for MemoryVault {
    async fn list_tags(&self, organization_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        let state = self.state();
        let mut tags: Vec<Tag> = state
            .tags
            .iter()
            .filter(|((organization, _), _)| *organization == organization_id)
            .map(|((_, name), id)| Tag {
                id: *id,
                organization_id,
                name: name.clone(),
                document_count: state
                    .documents
                    .values()
                    .filter(|d| {
                        d.organization_id == organization_id && !d.is_deleted() && d.tags.contains(name)
                    })
                    .count() as i64,
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

impl ShareRepository for MemoryVault {
    async fn insert_share_code(&self, share_code: &ShareCode) -> anyhow::Result<bool> {
        let mut state = self.state();
        if state.share_codes.values().any(|c| c.code == share_code.code) {
            return Ok(false);
        }
        state.share_codes.insert(share_code.id, share_code.clone());
        Ok(true)
    }

    async fn find_share_code(
        &self,
        organization_id: Uuid,
        code: &str,
    ) -> anyhow::Result<Option<ShareCode>> {
        Ok(self
            .state()
            .share_codes
            .values()
            .find(|c| c.organization_id == organization_id && c.code == code)
            .cloned())
    }

    async fn get_share_code(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<ShareCode>> {
        Ok(self
            .state()
            .share_codes
            .get(&id)
            .filter(|c| c.organization_id == organization_id)
            .cloned())
    }

    async fn list_share_codes(
        &self,
        organization_id: Uuid,
        resource: ShareResource,
    ) -> anyhow::Result<Vec<ShareCode>> {
        let mut codes: Vec<ShareCode> = self
            .state()
            .share_codes
            .values()
            .filter(|c| c.organization_id == organization_id && c.resource == resource)
            .cloned()
            .collect();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes)
    }

    async fn revoke_share_code(
        &self,
        organization_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        match self
            .state()
            .share_codes
            .get_mut(&id)
            .filter(|c| c.organization_id == organization_id && c.revoked_at.is_none())
        {
            Some(code) => {
                code.revoked_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn redeem_share_code(
        &self,
        share_code_id: Uuid,
        grant: &ShareGrant,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut state = self.state();
        let Some(code) = state.share_codes.get_mut(&share_code_id) else {
            return Ok(false);
        };
        if code.unusable_reason(at).is_some() {
            return Ok(false);
        }
        code.use_count += 1;

        match state
            .grants
            .iter_mut()
            .find(|g| g.user_id == grant.user_id && g.resource == grant.resource)
        {
            Some(existing) => {
                if grant.access_level > existing.access_level {
                    existing.access_level = grant.access_level;
                    existing.share_code_id = grant.share_code_id;
                }
                existing.granted_at = grant.granted_at;
            }
            None => state.grants.push(grant.clone()),
        }
        Ok(true)
    }

    async fn grants_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ShareGrant>> {
        Ok(self
            .state()
            .grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl AuditLogRepository for MemoryVault {
    async fn insert_audit_log(&self, log: &AuditLog) -> anyhow::Result<()> {
        let mut state = self.state();
        anyhow::ensure!(!state.fail_audit_inserts, "audit log is unavailable");
        state.audit_logs.push(log.clone());
        Ok(())
    }

    async fn query_audit_logs(
        &self,
        organization_id: Uuid,
        query: &AuditQuery,
    ) -> anyhow::Result<(Vec<AuditLog>, i64)> {
        let mut logs: Vec<AuditLog> = self
            .state()
            .audit_logs
            .iter()
            .filter(|l| l.organization_id == organization_id)
            .filter(|l| query.user_id.is_none_or(|id| l.user_id == Some(id)))
            .filter(|l| query.action.is_none_or(|action| l.action == action))
            .filter(|l| query.entity_type.is_none_or(|t| l.entity_type == t))
            .filter(|l| query.from.is_none_or(|from| l.created_at >= from))
            .filter(|l| query.to.is_none_or(|to| l.created_at < to))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok((page(&logs, &query.pagination()), logs.len() as i64))
    }
}

impl AnalyticsRepository for MemoryVault {
    async fn usage_facts(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
        top_uploaders: i64,
    ) -> anyhow::Result<UsageFacts> {
        let state = self.state();
        let now = Utc::now();
        let documents: Vec<&Document> = state
            .documents
            .values()
            .filter(|d| d.organization_id == organization_id)
            .collect();
        let live: Vec<&Document> = documents.iter().copied().filter(|d| !d.is_deleted()).collect();

        let mut mime_types: HashMap<String, i64> = HashMap::new();
        for document in &live {
            *mime_types.entry(document.mime_type.clone()).or_default() += 1;
        }
        let mut mime_types: Vec<MimeTypeCount> = mime_types
            .into_iter()
            .map(|(mime_type, count)| MimeTypeCount { mime_type, count })
            .collect();
        mime_types.sort_by(|a, b| a.mime_type.cmp(&b.mime_type));

        let mut per_day: HashMap<chrono::NaiveDate, i64> = HashMap::new();
        for document in documents.iter().filter(|d| d.created_at >= since) {
            *per_day.entry(document.created_at.date_naive()).or_default() += 1;
        }
        let mut uploads_per_day: Vec<DailyCount> = per_day
            .into_iter()
            .map(|(day, count)| DailyCount { day, count })
            .collect();
        uploads_per_day.sort_by_key(|d| d.day);

        let active_users = state
            .audit_logs
            .iter()
            .filter(|l| l.organization_id == organization_id && l.created_at >= since)
            .filter_map(|l| l.user_id)
            .collect::<HashSet<_>>()
            .len() as i64;

        let mut uploaders: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for document in &live {
            let entry = uploaders.entry(document.owner_id).or_default();
            entry.0 += 1;
            entry.1 += document.size_bytes;
        }
        let mut top: Vec<UploaderStat> = uploaders
            .into_iter()
            .filter_map(|(user_id, (document_count, total_bytes))| {
                let user = &state.users.get(&user_id)?.user;
                Some(UploaderStat {
                    user_id,
                    full_name: user.full_name.clone(),
                    document_count,
                    total_bytes,
                })
            })
            .collect();
        top.sort_by(|a, b| {
            b.document_count
                .cmp(&a.document_count)
                .then(b.total_bytes.cmp(&a.total_bytes))
        });
        top.truncate(top_uploaders.max(0) as usize);

        let mut by_department: HashMap<Option<Uuid>, (i64, i64)> = HashMap::new();
        for document in &live {
            let department_id = state
                .profiles
                .get(&document.owner_id)
                .and_then(|p| p.department_id);
            let entry = by_department.entry(department_id).or_default();
            entry.0 += 1;
            entry.1 += document.size_bytes;
        }
        let mut storage_by_department: Vec<DepartmentStorage> = by_department
            .into_iter()
            .map(|(department_id, (document_count, total_bytes))| DepartmentStorage {
                department_id,
                department_name: department_id
                    .and_then(|id| state.departments.get(&id))
                    .map(|d| d.name.clone()),
                document_count,
                total_bytes,
            })
            .collect();
        storage_by_department.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));

        Ok(UsageFacts {
            document_count: live.len() as i64,
            total_bytes: live.iter().map(|d| d.size_bytes).sum(),
            trashed_count: (documents.len() - live.len()) as i64,
            mime_types,
            uploads_per_day,
            active_users,
            top_uploaders: top,
            storage_by_department,
            folder_count: state
                .folders
                .values()
                .filter(|f| f.organization_id == organization_id)
                .count() as i64,
            active_share_codes: state
                .share_codes
                .values()
                .filter(|c| c.organization_id == organization_id)
                .filter(|c| c.revoked_at.is_none() && c.expires_at.is_none_or(|e| e > now))
                .count() as i64,
        })
    }
}

/// Blob storage backed by a map
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStorage {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    /// Writes still allowed before `put` starts failing. `None` never fails.
    put_budget: Arc<Mutex<Option<usize>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs().is_empty()
    }

    /// Lets `writes` more puts succeed, then fails every following one
    pub fn fail_puts_after(&self, writes: usize) {
        *self.put_budget.lock().unwrap_or_else(|e| e.into_inner()) = Some(writes);
    }
}

impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        if let Some(budget) = self
            .put_budget
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
        {
            anyhow::ensure!(*budget > 0, "blob storage is unavailable");
            *budget -= 1;
        }
        self.blobs().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.blobs()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("blob {key} does not exist"))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.blobs().remove(key);
        Ok(())
    }
}
