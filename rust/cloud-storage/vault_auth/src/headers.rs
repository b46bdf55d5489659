use cookie::Cookie;

use crate::{constant::ACCESS_TOKEN_COOKIE, error::AuthError};

/// Pulls the access token out of the `Authorization: Bearer` header, falling back to the
/// access token cookie.
pub fn extract_access_token_from_request_headers(
    headers: &axum::http::HeaderMap,
) -> Result<String, AuthError> {
    let auth_token_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let jwt = if let Some(auth_token) = auth_token_header {
        let token = auth_token
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty() && !token.contains(' '))
            .ok_or(AuthError::InvalidAuthorizationHeaderFormat)?;
        tracing::trace!("Authorization header provided");
        Some(token.to_string())
    } else {
        tracing::trace!("no Authorization header provided. checking for cookie");
        headers
            .get(axum::http::header::COOKIE)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| {
                header.split(';').find_map(|cookie| {
                    let cookie = Cookie::parse(cookie.trim()).ok()?;
                    (cookie.name() == ACCESS_TOKEN_COOKIE).then(|| cookie.value().to_owned())
                })
            })
    };

    jwt.ok_or(AuthError::NoAccessTokenProvided)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header};

    use super::*;

    #[test]
    fn test_extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(
            extract_access_token_from_request_headers(&headers).unwrap(),
            "abc.def.ghi"
        );
    }

    #[test]
    fn test_rejects_malformed_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(
            extract_access_token_from_request_headers(&headers),
            Err(AuthError::InvalidAuthorizationHeaderFormat)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(
            extract_access_token_from_request_headers(&headers),
            Err(AuthError::InvalidAuthorizationHeaderFormat)
        ));
    }

    #[test]
    fn test_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; docvault-access-token=cookie.jwt.value"),
        );
        assert_eq!(
            extract_access_token_from_request_headers(&headers).unwrap(),
            "cookie.jwt.value"
        );
    }

    #[test]
    fn test_no_token() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_access_token_from_request_headers(&headers),
            Err(AuthError::NoAccessTokenProvided)
        ));
    }
}
