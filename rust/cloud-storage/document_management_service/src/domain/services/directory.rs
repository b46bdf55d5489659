use std::collections::HashSet;

use chrono::Utc;
use model_vault::UserContext;
use serde_json::json;
use uuid::Uuid;

use super::AuditService;
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, CreateDepartmentRequest, Department, EmployeeFilter,
        EmployeeProfile, EmployeeProfileInput, EntityType, SetEmploymentStatusRequest,
        UpdateDepartmentRequest, UpsertEmployeeRequest, optional_text, required_text,
    },
    ports::VaultStorage,
};

const MAX_DEPARTMENT_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_JOB_TITLE_LENGTH: usize = 200;

/// Departments and employee profiles.
///
/// Admins write, managers and admins read. Employees may read their own profile.
#[derive(Debug, Clone)]
pub struct DirectoryService<S> {
    storage: S,
    audit: AuditService<S>,
}

impl<S: VaultStorage> DirectoryService<S> {
    pub fn new(storage: S) -> Self {
        Self {
            audit: AuditService::new(storage.clone()),
            storage,
        }
    }

    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn create_department(
        &self,
        admin: &UserContext,
        request: CreateDepartmentRequest,
    ) -> Result<Department> {
        ensure_admin(admin)?;
        let name = required_text("department name", &request.name, MAX_DEPARTMENT_NAME_LENGTH)?;
        let description =
            optional_text("description", request.description.as_deref(), MAX_DESCRIPTION_LENGTH)?;

        if self
            .storage
            .department_name_taken(admin.organization_id, &name, None)
            .await?
        {
            return Err(VaultError::conflict("a department with this name already exists"));
        }
        if let Some(manager_id) = request.manager_id {
            self.ensure_member(admin, manager_id, "manager").await?;
        }

        let now = Utc::now();
        let department = Department {
            id: Uuid::now_v7(),
            organization_id: admin.organization_id,
            name,
            description,
            manager_id: request.manager_id,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_department(&department).await?;

        self.audit
            .record(
                AuditLog::new(
                    admin,
                    AuditAction::DepartmentCreate,
                    EntityType::Department,
                    Some(department.id),
                )
                .with_metadata(json!({ "name": department.name })),
            )
            .await;
        Ok(department)
    }

    pub async fn list_departments(&self, user: &UserContext) -> Result<Vec<Department>> {
        ensure_manager(user)?;
        Ok(self.storage.list_departments(user.organization_id).await?)
    }

    pub async fn get_department(&self, user: &UserContext, id: Uuid) -> Result<Department> {
        ensure_manager(user)?;
        self.load_department(user, id).await
    }

    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn update_department(
        &self,
        admin: &UserContext,
        id: Uuid,
        request: UpdateDepartmentRequest,
    ) -> Result<Department> {
        ensure_admin(admin)?;
        let mut department = self.load_department(admin, id).await?;

        if let Some(name) = request.name.as_deref() {
            let name = required_text("department name", name, MAX_DEPARTMENT_NAME_LENGTH)?;
            if self
                .storage
                .department_name_taken(admin.organization_id, &name, Some(id))
                .await?
            {
                return Err(VaultError::conflict("a department with this name already exists"));
            }
            department.name = name;
        }
        if let Some(description) = request.description.as_deref() {
            department.description =
                optional_text("description", Some(description), MAX_DESCRIPTION_LENGTH)?;
        }
        if request.remove_manager {
            department.manager_id = None;
        } else if let Some(manager_id) = request.manager_id {
            self.ensure_member(admin, manager_id, "manager").await?;
            department.manager_id = Some(manager_id);
        }
        department.updated_at = Utc::now();

        self.storage.update_department(&department).await?;

        self.audit
            .record(AuditLog::new(
                admin,
                AuditAction::DepartmentUpdate,
                EntityType::Department,
                Some(department.id),
            ))
            .await;
        Ok(department)
    }

    /// Employees of the department keep their profile without a department
    #[tracing::instrument(skip(self, admin), fields(admin_id=%admin.user_id), err)]
    pub async fn delete_department(&self, admin: &UserContext, id: Uuid) -> Result<()> {
        ensure_admin(admin)?;
        if !self
            .storage
            .delete_department(admin.organization_id, id)
            .await?
        {
            return Err(VaultError::not_found("department"));
        }

        self.audit
            .record(AuditLog::new(
                admin,
                AuditAction::DepartmentDelete,
                EntityType::Department,
                Some(id),
            ))
            .await;
        Ok(())
    }

    /// Creates or replaces the profile of `user_id`
    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn upsert_profile(
        &self,
        admin: &UserContext,
        user_id: Uuid,
        request: UpsertEmployeeRequest,
    ) -> Result<EmployeeProfile> {
        ensure_admin(admin)?;
        self.ensure_member(admin, user_id, "employee").await?;

        if let Some(department_id) = request.department_id {
            self.load_department(admin, department_id)
                .await
                .map_err(|_| VaultError::validation("department does not exist"))?;
        }
        if let Some(monitor_id) = request.monitor_id {
            if monitor_id == user_id {
                return Err(VaultError::validation("an employee cannot monitor themselves"));
            }
            self.ensure_member(admin, monitor_id, "monitor").await?;
            self.ensure_no_monitor_cycle(admin, user_id, monitor_id)
                .await?;
        }

        let input = EmployeeProfileInput {
            user_id,
            organization_id: admin.organization_id,
            department_id: request.department_id,
            monitor_id: request.monitor_id,
            job_title: optional_text("job title", request.job_title.as_deref(), MAX_JOB_TITLE_LENGTH)?,
            employment_status: request.employment_status,
            hire_date: request.hire_date,
            updated_at: Utc::now(),
        };
        self.storage.upsert_profile(&input).await?;

        self.audit
            .record(
                AuditLog::new(admin, AuditAction::EmployeeUpsert, EntityType::Employee, Some(user_id))
                    .with_metadata(json!({
                        "department_id": input.department_id,
                        "monitor_id": input.monitor_id,
                        "employment_status": input.employment_status,
                    })),
            )
            .await;

        self.load_profile(admin, user_id).await
    }

    /// Employees may read their own profile, managers and admins read every profile
    pub async fn get_profile(&self, user: &UserContext, user_id: Uuid) -> Result<EmployeeProfile> {
        if user.user_id != user_id && !user.is_manager_or_admin() {
            return Err(VaultError::forbidden("manager role required"));
        }
        self.load_profile(user, user_id).await
    }

    pub async fn list_employees(
        &self,
        user: &UserContext,
        filter: EmployeeFilter,
    ) -> Result<Vec<EmployeeProfile>> {
        ensure_manager(user)?;
        Ok(self
            .storage
            .list_profiles(user.organization_id, &filter)
            .await?)
    }

    #[tracing::instrument(skip(self, admin, request), fields(admin_id=%admin.user_id), err)]
    pub async fn set_status(
        &self,
        admin: &UserContext,
        user_id: Uuid,
        request: SetEmploymentStatusRequest,
    ) -> Result<EmployeeProfile> {
        ensure_admin(admin)?;
        if !self
            .storage
            .set_status(admin.organization_id, user_id, request.status, Utc::now())
            .await?
        {
            return Err(VaultError::not_found("employee profile"));
        }

        self.audit
            .record(
                AuditLog::new(
                    admin,
                    AuditAction::EmployeeStatusChanged,
                    EntityType::Employee,
                    Some(user_id),
                )
                .with_metadata(json!({ "status": request.status })),
            )
            .await;

        self.load_profile(admin, user_id).await
    }

    async fn load_department(&self, user: &UserContext, id: Uuid) -> Result<Department> {
        self.storage
            .get_department(user.organization_id, id)
            .await?
            .ok_or_else(|| VaultError::not_found("department"))
    }

    async fn load_profile(&self, user: &UserContext, user_id: Uuid) -> Result<EmployeeProfile> {
        self.storage
            .get_profile(user.organization_id, user_id)
            .await?
            .ok_or_else(|| VaultError::not_found("employee profile"))
    }

    async fn ensure_member(&self, user: &UserContext, user_id: Uuid, role: &str) -> Result<()> {
        match self.storage.get_user(user.organization_id, user_id).await? {
            Some(_) => Ok(()),
            None if role == "employee" => Err(VaultError::not_found("user")),
            None => Err(VaultError::validation(format!(
                "{role} must be a user of the organization"
            ))),
        }
    }

    /// Walks up the monitor chain starting at `monitor_id` looking for `employee_id`
    async fn ensure_no_monitor_cycle(
        &self,
        user: &UserContext,
        employee_id: Uuid,
        monitor_id: Uuid,
    ) -> Result<()> {
        let mut visited = HashSet::new();
        let mut current = Some(monitor_id);

        while let Some(id) = current {
            if id == employee_id {
                return Err(VaultError::validation(
                    "monitor assignment would create a reporting cycle",
                ));
            }
            if !visited.insert(id) {
                break;
            }
            current = self
                .storage
                .get_profile(user.organization_id, id)
                .await?
                .and_then(|profile| profile.monitor_id);
        }
        Ok(())
    }
}

fn ensure_admin(user: &UserContext) -> Result<()> {
    if !user.is_admin() {
        return Err(VaultError::forbidden("admin role required"));
    }
    Ok(())
}

fn ensure_manager(user: &UserContext) -> Result<()> {
    if !user.is_manager_or_admin() {
        return Err(VaultError::forbidden("manager role required"));
    }
    Ok(())
}
