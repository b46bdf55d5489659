/// A plain old json error response for use with axum.
#[derive(serde::Serialize, serde::Deserialize, Debug, utoipa::ToSchema)]
pub struct ErrorResponse<'a> {
    /// Message to explain failure
    pub message: &'a str,
}

/// An empty json object, returned by endpoints with nothing else to say
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, utoipa::ToSchema)]
pub struct EmptyResponse {}
