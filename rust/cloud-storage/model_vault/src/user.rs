use crate::access::Role;

/// Used to store information about the authenticated user.
/// Inserted into the request extensions by the jwt middleware.
#[derive(Clone, serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq)]
pub struct UserContext {
    /// The user id
    pub user_id: uuid::Uuid,
    /// The organization (tenant) the user belongs to
    pub organization_id: uuid::Uuid,
    /// The user's email
    pub email: String,
    /// The user's role within the organization
    pub role: Role,
}

impl UserContext {
    /// Whether the user administers their organization
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the user may read directory and analytics data
    pub fn is_manager_or_admin(&self) -> bool {
        self.role >= Role::Manager
    }
}
