use chrono::{DateTime, Utc};
use model_vault::{Pagination, UserContext};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Every action recorded in the audit log, serialized as `entity.verb`
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum AuditAction {
    #[serde(rename = "user.register")]
    #[strum(serialize = "user.register")]
    UserRegister,
    #[serde(rename = "user.login")]
    #[strum(serialize = "user.login")]
    UserLogin,
    #[serde(rename = "user.login_failed")]
    #[strum(serialize = "user.login_failed")]
    UserLoginFailed,
    #[serde(rename = "user.password_changed")]
    #[strum(serialize = "user.password_changed")]
    UserPasswordChanged,
    #[serde(rename = "user.create")]
    #[strum(serialize = "user.create")]
    UserCreate,
    #[serde(rename = "user.update")]
    #[strum(serialize = "user.update")]
    UserUpdate,
    #[serde(rename = "user.password_reset")]
    #[strum(serialize = "user.password_reset")]
    UserPasswordReset,
    #[serde(rename = "user.delete")]
    #[strum(serialize = "user.delete")]
    UserDelete,
    #[serde(rename = "department.create")]
    #[strum(serialize = "department.create")]
    DepartmentCreate,
    #[serde(rename = "department.update")]
    #[strum(serialize = "department.update")]
    DepartmentUpdate,
    #[serde(rename = "department.delete")]
    #[strum(serialize = "department.delete")]
    DepartmentDelete,
    #[serde(rename = "employee.upsert")]
    #[strum(serialize = "employee.upsert")]
    EmployeeUpsert,
    #[serde(rename = "employee.status_changed")]
    #[strum(serialize = "employee.status_changed")]
    EmployeeStatusChanged,
    #[serde(rename = "folder.create")]
    #[strum(serialize = "folder.create")]
    FolderCreate,
    #[serde(rename = "folder.update")]
    #[strum(serialize = "folder.update")]
    FolderUpdate,
    #[serde(rename = "folder.delete")]
    #[strum(serialize = "folder.delete")]
    FolderDelete,
    #[serde(rename = "document.upload")]
    #[strum(serialize = "document.upload")]
    DocumentUpload,
    #[serde(rename = "document.download")]
    #[strum(serialize = "document.download")]
    DocumentDownload,
    #[serde(rename = "document.update")]
    #[strum(serialize = "document.update")]
    DocumentUpdate,
    #[serde(rename = "document.delete")]
    #[strum(serialize = "document.delete")]
    DocumentDelete,
    #[serde(rename = "document.restore")]
    #[strum(serialize = "document.restore")]
    DocumentRestore,
    #[serde(rename = "document.purge")]
    #[strum(serialize = "document.purge")]
    DocumentPurge,
    #[serde(rename = "document.bundle")]
    #[strum(serialize = "document.bundle")]
    DocumentBundle,
    #[serde(rename = "document.convert")]
    #[strum(serialize = "document.convert")]
    DocumentConvert,
    #[serde(rename = "share.create")]
    #[strum(serialize = "share.create")]
    ShareCreate,
    #[serde(rename = "share.redeem")]
    #[strum(serialize = "share.redeem")]
    ShareRedeem,
    #[serde(rename = "share.revoke")]
    #[strum(serialize = "share.revoke")]
    ShareRevoke,
}

impl TryFrom<String> for AuditAction {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
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
    ToSchema,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    Organization,
    User,
    Department,
    Employee,
    Folder,
    Document,
    ShareCode,
}

impl TryFrom<String> for EntityType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An append-only record of something a user did
#[derive(sqlx::FromRow, serde::Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// `None` once the acting user has been deleted
    pub user_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    #[sqlx(try_from = "String")]
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        user: &UserContext,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            organization_id: user.organization_id,
            user_id: Some(user.user_id),
            action,
            entity_type,
            entity_id,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub entity_type: Option<EntityType>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn actions_round_trip_through_text() {
        for action in AuditAction::iter() {
            let text = action.to_string();
            assert!(text.contains('.'), "{text}");
            assert_eq!(AuditAction::from_str(&text).unwrap(), action);
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                serde_json::Value::String(text)
            );
        }
    }
}
