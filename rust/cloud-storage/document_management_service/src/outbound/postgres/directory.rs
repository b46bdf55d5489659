//! Departments and employee profiles

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::models::{
    Department, EmployeeFilter, EmployeeProfile, EmployeeProfileInput, EmploymentStatus,
};

const DEPARTMENT_COLUMNS: &str =
    "id, organization_id, name, description, manager_id, created_at, updated_at";

const PROFILE_SELECT: &str = r#"
    SELECT p.user_id, p.organization_id, u.full_name, u.email, p.department_id, p.monitor_id,
           p.job_title, p.employment_status, p.hire_date, p.updated_at
    FROM employee_profiles p
    JOIN users u ON u.id = p.user_id
"#;

pub async fn insert_department(pool: &PgPool, department: &Department) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO departments (
            id, organization_id, name, description, manager_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(department.id)
    .bind(department.organization_id)
    .bind(&department.name)
    .bind(&department.description)
    .bind(department.manager_id)
    .bind(department.created_at)
    .bind(department.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_department(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<Department>> {
    let department = sqlx::query_as::<_, Department>(&format!(
        "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE organization_id = $1 AND id = $2"
    ))
    .bind(organization_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(department)
}

pub async fn list_departments(pool: &PgPool, organization_id: Uuid) -> anyhow::Result<Vec<Department>> {
    let departments = sqlx::query_as::<_, Department>(&format!(
        "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE organization_id = $1 ORDER BY name"
    ))
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    Ok(departments)
}

pub async fn update_department(pool: &PgPool, department: &Department) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE departments
        SET name = $3, description = $4, manager_id = $5, updated_at = $6
        WHERE organization_id = $1 AND id = $2
        "#,
    )
    .bind(department.organization_id)
    .bind(department.id)
    .bind(&department.name)
    .bind(&department.description)
    .bind(department.manager_id)
    .bind(department.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Profiles lose their department through `ON DELETE SET NULL`
pub async fn delete_department(pool: &PgPool, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM departments WHERE organization_id = $1 AND id = $2")
        .bind(organization_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn department_name_taken(
    pool: &PgPool,
    organization_id: Uuid,
    name: &str,
    except: Option<Uuid>,
) -> anyhow::Result<bool> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM departments
            WHERE organization_id = $1
              AND lower(name) = lower($2)
              AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(organization_id)
    .bind(name)
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn upsert_profile(pool: &PgPool, profile: &EmployeeProfileInput) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO employee_profiles (
            user_id, organization_id, department_id, monitor_id, job_title,
            employment_status, hire_date, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id) DO UPDATE SET
            department_id = EXCLUDED.department_id,
            monitor_id = EXCLUDED.monitor_id,
            job_title = EXCLUDED.job_title,
            employment_status = EXCLUDED.employment_status,
            hire_date = EXCLUDED.hire_date,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(profile.user_id)
    .bind(profile.organization_id)
    .bind(profile.department_id)
    .bind(profile.monitor_id)
    .bind(&profile.job_title)
    .bind(profile.employment_status.as_ref())
    .bind(profile.hire_date)
    .bind(profile.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_profile(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<EmployeeProfile>> {
    let profile = sqlx::query_as::<_, EmployeeProfile>(&format!(
        "{PROFILE_SELECT} WHERE p.organization_id = $1 AND p.user_id = $2"
    ))
    .bind(organization_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

pub async fn list_profiles(
    pool: &PgPool,
    organization_id: Uuid,
    filter: &EmployeeFilter,
) -> anyhow::Result<Vec<EmployeeProfile>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(PROFILE_SELECT);
    builder.push(" WHERE p.organization_id = ");
    builder.push_bind(organization_id);

    if let Some(department_id) = filter.department_id {
        builder.push(" AND p.department_id = ");
        builder.push_bind(department_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND p.employment_status = ");
        builder.push_bind(status.to_string());
    }
    builder.push(" ORDER BY u.full_name, p.user_id");

    let profiles = builder
        .build_query_as::<EmployeeProfile>()
        .fetch_all(pool)
        .await?;
    Ok(profiles)
}

pub async fn set_status(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
    status: EmploymentStatus,
    at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE employee_profiles
        SET employment_status = $3, updated_at = $4
        WHERE organization_id = $1 AND user_id = $2
        "#,
    )
    .bind(organization_id)
    .bind(user_id)
    .bind(status.as_ref())
    .bind(at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
