use utoipa::ToSchema;

/// The role a user holds within their organization.
/// Ordered from least to most privileged top -> bottom
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Eq,
    PartialEq,
    Debug,
    ToSchema,
    Clone,
    Copy,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// A regular account, only sees its own and shared items
    Member,
    /// May read the directory and usage analytics
    Manager,
    /// Manages the organization
    Admin,
}

impl TryFrom<String> for Role {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ordered from least to most access top -> bottom
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Eq,
    PartialEq,
    Debug,
    ToSchema,
    Clone,
    Copy,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccessLevel {
    /// Read and download
    View,
    /// Change metadata and contents
    Edit,
    /// Delete, restore and share
    Owner,
}

impl TryFrom<String> for AccessLevel {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_ordering() {
        let mut access_levels = vec![
            AccessLevel::Edit,
            AccessLevel::Owner,
            AccessLevel::View,
            AccessLevel::View,
        ];

        access_levels.sort();

        assert_eq!(
            access_levels,
            vec![
                AccessLevel::View,
                AccessLevel::View,
                AccessLevel::Edit,
                AccessLevel::Owner,
            ]
        );

        assert!(AccessLevel::Owner > AccessLevel::Edit);
        assert!(AccessLevel::Edit > AccessLevel::View);
    }

    #[test]
    fn test_role_ordering_and_strings() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Member);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::try_from("manager".to_string()).unwrap(), Role::Manager);
        assert!(Role::try_from("root".to_string()).is_err());
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    }
}
