use chrono::NaiveDate;
use file_conversion::FileCategory;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Default reporting window in days
pub const DEFAULT_USAGE_DAYS: i64 = 30;
/// Longest reporting window in days
pub const MAX_USAGE_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, Default, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageQuery {
    /// Size of the reporting window in days, 1 to 365. Defaults to 30.
    pub days: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct CategoryCount {
    pub category: FileCategory,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct UploaderStat {
    pub user_id: Uuid,
    pub full_name: String,
    pub document_count: i64,
    pub total_bytes: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct DepartmentStorage {
    /// `None` groups owners without a department
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub document_count: i64,
    pub total_bytes: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct MimeTypeCount {
    pub mime_type: String,
    pub count: i64,
}

/// Raw figures gathered by the storage layer for one organization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageFacts {
    /// Documents outside the trash
    pub document_count: i64,
    /// Bytes of documents outside the trash
    pub total_bytes: i64,
    pub trashed_count: i64,
    /// Documents outside the trash per mime type
    pub mime_types: Vec<MimeTypeCount>,
    /// Uploads per day inside the window, days without uploads omitted
    pub uploads_per_day: Vec<DailyCount>,
    /// Distinct users with an audit entry inside the window
    pub active_users: i64,
    pub top_uploaders: Vec<UploaderStat>,
    pub storage_by_department: Vec<DepartmentStorage>,
    pub folder_count: i64,
    /// Share codes that are neither revoked nor expired
    pub active_share_codes: i64,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct UsageSummary {
    pub days: i64,
    pub document_count: i64,
    pub total_bytes: i64,
    pub trashed_count: i64,
    /// One entry for every category, including empty ones
    pub by_category: Vec<CategoryCount>,
    pub uploads_per_day: Vec<DailyCount>,
    pub active_users: i64,
    pub top_uploaders: Vec<UploaderStat>,
    pub storage_by_department: Vec<DepartmentStorage>,
    pub folder_count: i64,
    pub active_share_codes: i64,
}
