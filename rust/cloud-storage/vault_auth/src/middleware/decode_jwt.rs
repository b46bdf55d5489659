use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use model_vault::{ErrorResponse, UserContext};

use crate::{error::AuthError, headers, jwt::JwtArgs};

/// Decodes the JWT and attaches the resulting [UserContext] to the request.
/// Every route that requires an authenticated user should sit behind this middleware.
pub async fn handler(
    State(jwt_args): State<JwtArgs>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let access_token = match headers::extract_access_token_from_request_headers(req.headers()) {
        Ok(access_token) => access_token,
        Err(e) => {
            tracing::trace!(error=?e, "unable to get access token");
            return Err(unauthorized("unauthorized"));
        }
    };

    let claims = crate::jwt::validate_access_token(&jwt_args, &access_token).map_err(|e| match e {
        AuthError::JwtExpired => unauthorized("jwt expired"),
        _ => {
            tracing::warn!(error=?e, "unable to decode jwt");
            unauthorized("unauthorized")
        }
    })?;

    req.extensions_mut().insert(UserContext::from(claims));

    Ok(next.run(req).await)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, header},
        routing::get,
    };
    use http_body_util::BodyExt;
    use model_vault::Role;
    use tower::util::ServiceExt;

    use super::*;
    use crate::jwt::issue_access_token;

    fn jwt_args() -> JwtArgs {
        JwtArgs::new("secret", "docvault", "docvault-api", Duration::from_secs(60)).unwrap()
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|Extension(user): Extension<UserContext>| async move { user.email }),
            )
            .layer(axum::middleware::from_fn_with_state(jwt_args(), handler))
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let res = router()
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "unauthorized" }));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_user() {
        let user = UserContext {
            user_id: uuid::Uuid::now_v7(),
            organization_id: uuid::Uuid::now_v7(),
            email: "someone@docvault.dev".to_string(),
            role: Role::Member,
        };
        let token = issue_access_token(&jwt_args(), &user).unwrap().token;

        let res = router()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"someone@docvault.dev");
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let res = router()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
