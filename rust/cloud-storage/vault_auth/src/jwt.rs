use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use model_vault::{Role, UserContext};

use crate::error::AuthError;

/// Everything needed to issue and validate docvault access tokens
#[derive(Clone)]
pub struct JwtArgs {
    secret: Arc<str>,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl fmt::Debug for JwtArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtArgs")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwtArgs {
    /// Creates a new set of args. The secret must not be empty.
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> anyhow::Result<Self> {
        let secret = secret.into();
        anyhow::ensure!(!secret.is_empty(), "jwt secret must not be empty");
        Ok(Self {
            secret: Arc::from(secret),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
        })
    }

    /// The lifetime of newly issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// The claims carried by a docvault access token
#[derive(serde::Serialize, serde::Deserialize, Eq, PartialEq, Debug, Clone)]
pub struct AccessTokenClaims {
    /// The user id
    pub sub: uuid::Uuid,
    /// The organization id of the user
    pub org: uuid::Uuid,
    /// The email of the user
    pub email: String,
    /// The role of the user at issue time
    pub role: Role,
    /// Issued at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// The issuer of the token
    pub iss: String,
    /// The audience of the token
    pub aud: String,
}

impl From<AccessTokenClaims> for UserContext {
    fn from(claims: AccessTokenClaims) -> Self {
        UserContext {
            user_id: claims.sub,
            organization_id: claims.org,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The encoded jwt
    pub token: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Signs a new access token for the user
pub fn issue_access_token(args: &JwtArgs, user: &UserContext) -> Result<IssuedToken, AuthError> {
    issue_access_token_at(args, user, Utc::now())
}

fn issue_access_token_at(
    args: &JwtArgs,
    user: &UserContext,
    now: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    let ttl = chrono::Duration::from_std(args.ttl)
        .map_err(|e| anyhow::anyhow!(e).context("invalid token ttl"))?;
    let expires_at = now + ttl;

    let claims = AccessTokenClaims {
        sub: user.user_id,
        org: user.organization_id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        iss: args.issuer.clone(),
        aud: args.audience.clone(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(args.secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!(e).context("unable to encode jwt"))?;

    Ok(IssuedToken { token, expires_at })
}

/// Validates the signature, audience, issuer and expiry of an access token and returns its claims
pub fn validate_access_token(
    args: &JwtArgs,
    access_token: &str,
) -> Result<AccessTokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);

    validation.leeway = 0;
    validation.set_audience(&[args.audience.as_str()]);
    validation.set_issuer(&[args.issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    match decode::<AccessTokenClaims>(
        access_token,
        &DecodingKey::from_secret(args.secret.as_bytes()),
        &validation,
    ) {
        Ok(decoded) => Ok(decoded.claims),
        Err(e) => match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::JwtExpired),
            _ => Err(AuthError::JwtValidationFailed {
                details: e.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    fn args(secret: &str, issuer: &str, audience: &str) -> JwtArgs {
        JwtArgs::new(secret, issuer, audience, Duration::from_secs(3600)).unwrap()
    }

    fn user() -> UserContext {
        UserContext {
            user_id: uuid::Uuid::now_v7(),
            organization_id: uuid::Uuid::now_v7(),
            email: "test@docvault.dev".to_string(),
            role: Role::Manager,
        }
    }

    #[test]
    fn test_issue_then_validate() -> anyhow::Result<()> {
        let args = args("super_secret_key", "docvault", "docvault-api");
        let user = user();

        let issued = issue_access_token(&args, &user)?;
        let claims = validate_access_token(&args, &issued.token)?;

        assert_eq!(claims.sub, user.user_id);
        assert_eq!(claims.org, user.organization_id);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(UserContext::from(claims), user);

        Ok(())
    }

    #[test]
    fn test_invalid_audience() -> anyhow::Result<()> {
        let issued = issue_access_token(&args("super_secret_key", "docvault", "bad"), &user())?;

        let err = validate_access_token(
            &args("super_secret_key", "docvault", "docvault-api"),
            &issued.token,
        )
        .err()
        .context("expected error")?;

        assert_eq!(err.to_string(), "jwt validation failed: InvalidAudience");
        Ok(())
    }

    #[test]
    fn test_invalid_issuer() -> anyhow::Result<()> {
        let issued = issue_access_token(&args("super_secret_key", "bad", "docvault-api"), &user())?;

        let err = validate_access_token(
            &args("super_secret_key", "docvault", "docvault-api"),
            &issued.token,
        )
        .err()
        .context("expected error")?;

        assert_eq!(err.to_string(), "jwt validation failed: InvalidIssuer");
        Ok(())
    }

    #[test]
    fn test_wrong_secret() -> anyhow::Result<()> {
        let issued = issue_access_token(&args("other_secret", "docvault", "docvault-api"), &user())?;

        let err = validate_access_token(
            &args("super_secret_key", "docvault", "docvault-api"),
            &issued.token,
        )
        .err()
        .context("expected error")?;

        assert_eq!(err.to_string(), "jwt validation failed: InvalidSignature");
        Ok(())
    }

    #[test]
    fn test_expired() -> anyhow::Result<()> {
        let args = args("super_secret_key", "docvault", "docvault-api");
        let issued = issue_access_token_at(
            &args,
            &user(),
            Utc::now() - chrono::Duration::seconds(10_000),
        )?;

        let err = validate_access_token(&args, &issued.token)
            .err()
            .context("expected error")?;

        assert_eq!(err.to_string(), "jwt is expired");
        Ok(())
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtArgs::new("", "docvault", "docvault-api", Duration::from_secs(1)).is_err());
    }
}
