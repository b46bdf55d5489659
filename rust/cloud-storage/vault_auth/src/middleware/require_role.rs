use axum::{
    Extension, Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use model_vault::{ErrorResponse, UserContext};

/// Ensures the user administers their organization
pub async fn admin(
    Extension(user_context): Extension<UserContext>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    if !user_context.is_admin() {
        tracing::debug!(user_id=%user_context.user_id, "admin role required");
        return Err(forbidden());
    }
    Ok(next.run(req).await)
}

/// Ensures the user is at least a manager
pub async fn manager(
    Extension(user_context): Extension<UserContext>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    if !user_context.is_manager_or_admin() {
        tracing::debug!(user_id=%user_context.user_id, "manager role required");
        return Err(forbidden());
    }
    Ok(next.run(req).await)
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            message: "insufficient role",
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, http::Request, routing::get};
    use model_vault::Role;
    use tower::util::ServiceExt;

    use super::*;

    fn router(role: Role) -> Router {
        Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn(admin))
            .merge(
                Router::new()
                    .route("/manager", get(|| async { "ok" }))
                    .route_layer(axum::middleware::from_fn(manager)),
            )
            .layer(Extension(UserContext {
                user_id: uuid::Uuid::now_v7(),
                organization_id: uuid::Uuid::now_v7(),
                email: "a@b.c".to_string(),
                role,
            }))
    }

    async fn status(role: Role, uri: &str) -> StatusCode {
        router(role)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_role_gates() {
        assert_eq!(status(Role::Admin, "/admin").await, StatusCode::OK);
        assert_eq!(status(Role::Manager, "/admin").await, StatusCode::FORBIDDEN);
        assert_eq!(status(Role::Member, "/admin").await, StatusCode::FORBIDDEN);

        assert_eq!(status(Role::Admin, "/manager").await, StatusCode::OK);
        assert_eq!(status(Role::Manager, "/manager").await, StatusCode::OK);
        assert_eq!(status(Role::Member, "/manager").await, StatusCode::FORBIDDEN);
    }
}
