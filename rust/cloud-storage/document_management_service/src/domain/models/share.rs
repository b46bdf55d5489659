use chrono::{DateTime, Utc};
use model_vault::AccessLevel;
use rand::Rng;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Length of every share code
pub const SHARE_CODE_LENGTH: usize = 6;

/// Upper case letters and digits without the easily confused `0 O 1 I L`
pub const SHARE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

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
pub enum ShareResourceType {
    Document,
    Folder,
}

impl TryFrom<String> for ShareResourceType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Something that can be shared
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(tag = "resource_type", content = "resource_id", rename_all = "snake_case")]
pub enum ShareResource {
    Document(Uuid),
    Folder(Uuid),
}

impl ShareResource {
    pub fn new(resource_type: ShareResourceType, id: Uuid) -> Self {
        match resource_type {
            ShareResourceType::Document => ShareResource::Document(id),
            ShareResourceType::Folder => ShareResource::Folder(id),
        }
    }

    pub fn resource_type(&self) -> ShareResourceType {
        match self {
            ShareResource::Document(_) => ShareResourceType::Document,
            ShareResource::Folder(_) => ShareResourceType::Folder,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ShareResource::Document(id) | ShareResource::Folder(id) => *id,
        }
    }
}

/// A code that grants access to a resource when redeemed
#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ShareCode {
    pub id: Uuid,
    pub code: String,
    pub organization_id: Uuid,
    #[serde(flatten)]
    pub resource: ShareResource,
    pub access_level: AccessLevel,
    pub created_by: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    /// `None` means unlimited
    pub max_uses: Option<i32>,
    pub use_count: i32,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ShareCode {
    /// Why the code cannot be redeemed at `now`, if it cannot
    pub fn unusable_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if self.revoked_at.is_some() {
            return Some("share code has been revoked");
        }
        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Some("share code has expired");
        }
        if self
            .max_uses
            .is_some_and(|max_uses| self.use_count >= max_uses)
        {
            return Some("share code has been used up");
        }
        None
    }
}

/// Access a user obtained by redeeming a share code
#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ShareGrant {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub resource: ShareResource,
    pub access_level: AccessLevel,
    pub share_code_id: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct CreateShareCodeRequest {
    #[serde(flatten)]
    pub resource: ShareResource,
    pub access_level: AccessLevel,
    /// Lifetime of the code in hours
    pub expires_in_hours: Option<i64>,
    pub max_uses: Option<i32>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct RedeemShareCodeRequest {
    pub code: String,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq, ToSchema)]
pub struct RedeemShareCodeResponse {
    #[serde(flatten)]
    pub resource: ShareResource,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Copy, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShareResourceQuery {
    pub resource_type: ShareResourceType,
    pub resource_id: Uuid,
}

impl From<ShareResourceQuery> for ShareResource {
    fn from(query: ShareResourceQuery) -> Self {
        ShareResource::new(query.resource_type, query.resource_id)
    }
}

/// An item another user shared with the caller
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct SharedItem {
    #[serde(flatten)]
    pub resource: ShareResource,
    /// Document title or folder name
    pub name: String,
    pub owner_id: Uuid,
    pub access_level: AccessLevel,
    pub granted_at: DateTime<Utc>,
}

/// A random code drawn from [SHARE_CODE_ALPHABET]
pub fn generate_share_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_CODE_LENGTH)
        .map(|_| SHARE_CODE_ALPHABET[rng.gen_range(0..SHARE_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Uppercases and trims a code typed by a user
pub fn normalize_share_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
