//! Domain error types

use file_conversion::ConversionError;
use thiserror::Error;
use vault_auth::error::AuthError;

/// Errors returned by every domain service
#[derive(Debug, Error)]
pub enum VaultError {
    /// The entity does not exist or is not visible to the caller
    #[error("{0}")]
    NotFound(String),
    /// The request was malformed
    #[error("{0}")]
    Validation(String),
    /// Missing or wrong credentials
    #[error("{0}")]
    Unauthorized(String),
    /// The caller is known but not allowed to do this
    #[error("{0}")]
    Forbidden(String),
    /// The request clashes with the current state
    #[error("{0}")]
    Conflict(String),
    /// The upload exceeds the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Storage failures and other unexpected errors
    #[error("an internal server error has occurred")]
    Internal(#[from] anyhow::Error),
}

impl VaultError {
    /// `"{entity} not found"`
    pub fn not_found(entity: &str) -> Self {
        VaultError::NotFound(format!("{entity} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        VaultError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        VaultError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        VaultError::Conflict(message.into())
    }
}

impl From<ConversionError> for VaultError {
    fn from(err: ConversionError) -> Self {
        if err.is_client_error() {
            VaultError::Validation(err.to_string())
        } else {
            VaultError::Internal(err.into())
        }
    }
}

impl From<AuthError> for VaultError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WeakPassword { .. } => VaultError::Validation(err.to_string()),
            AuthError::Generic(inner) => VaultError::Internal(anyhow::anyhow!(inner.message)),
            AuthError::InvalidAuthorizationHeaderFormat
            | AuthError::NoAccessTokenProvided
            | AuthError::JwtValidationFailed { .. }
            | AuthError::JwtExpired => VaultError::Unauthorized(err.to_string()),
        }
    }
}

/// Result type for domain operations
pub type Result<T, E = VaultError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_errors_split_by_blame() {
        let client: VaultError = ConversionError::invalid("bad range").into();
        assert!(matches!(client, VaultError::Validation(_)));

        let server: VaultError =
            ConversionError::Io(std::io::Error::other("disk gone")).into();
        assert!(matches!(server, VaultError::Internal(_)));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = VaultError::Internal(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "an internal server error has occurred");
    }
}
