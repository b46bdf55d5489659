use chrono::{DateTime, NaiveDate, Utc};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Department {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// The user managing the department
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
}

/// `None` leaves a field untouched. Set `remove_manager` to clear the manager.
#[derive(Debug, Clone, Default, serde::Deserialize, ToSchema)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub remove_manager: bool,
}

#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    ToSchema,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmploymentStatus {
    #[default]
    Active,
    OnLeave,
    Terminated,
}

impl TryFrom<String> for EmploymentStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// HR metadata attached to a user account
#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct EmployeeProfile {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    /// Copied from the user account
    pub full_name: String,
    /// Copied from the user account
    pub email: String,
    pub department_id: Option<Uuid>,
    /// The user this employee reports to
    pub monitor_id: Option<Uuid>,
    pub job_title: Option<String>,
    #[sqlx(try_from = "String")]
    pub employment_status: EmploymentStatus,
    pub hire_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

/// Replaces the whole profile of an employee
#[derive(Debug, Clone, Default, serde::Deserialize, ToSchema)]
pub struct UpsertEmployeeRequest {
    pub department_id: Option<Uuid>,
    pub monitor_id: Option<Uuid>,
    pub job_title: Option<String>,
    #[serde(default)]
    pub employment_status: EmploymentStatus,
    pub hire_date: Option<NaiveDate>,
}

/// The values written by an upsert, after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeProfileInput {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub department_id: Option<Uuid>,
    pub monitor_id: Option<Uuid>,
    pub job_title: Option<String>,
    pub employment_status: EmploymentStatus,
    pub hire_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct SetEmploymentStatusRequest {
    pub status: EmploymentStatus,
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeFilter {
    /// Only employees of this department
    pub department_id: Option<Uuid>,
    /// Only employees with this status
    pub status: Option<EmploymentStatus>,
}
