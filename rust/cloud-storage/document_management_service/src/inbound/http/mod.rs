//! The axum HTTP surface of the service.
//!
//! Every router here is generic over the storage adapters so that the same handlers run against
//! Postgres in production and the in-memory adapters in tests. Authentication itself happens
//! upstream in [vault_auth::middleware::decode_jwt]; the routers only expect a
//! [UserContext] in the request extensions.

pub mod analytics;
pub mod audit;
pub mod auth;
pub mod conversions;
pub mod directory;
pub mod documents;
pub mod folders;
pub mod shares;
pub mod users;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use model_vault::{ErrorResponse, UserContext};
use thiserror::Error;

use crate::domain::{
    VaultError,
    ports::{BlobStorage, VaultStorage},
    services::VaultServices,
};

pub struct VaultRouterState<S, B> {
    services: Arc<VaultServices<S, B>>,
}

impl<S, B> Clone for VaultRouterState<S, B> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
        }
    }
}

impl<S, B> VaultRouterState<S, B>
where
    S: VaultStorage,
    B: BlobStorage,
{
    pub fn new(services: VaultServices<S, B>) -> Self {
        VaultRouterState {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &VaultServices<S, B> {
        &self.services
    }
}

/// Routes reachable without a token
pub fn public_router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    auth::public_router(state)
}

/// Every route that needs an authenticated, active user. The caller is expected to layer the
/// jwt middleware on top so that a [UserContext] is present.
pub fn protected_router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .merge(auth::protected_router(state.clone()))
        .merge(users::router(state.clone()))
        .merge(directory::router(state.clone()))
        .merge(folders::router(state.clone()))
        .merge(documents::router(state.clone()))
        .merge(shares::router(state.clone()))
        .merge(conversions::router(state.clone()))
        .merge(audit::router(state.clone()))
        .merge(analytics::router(state.clone()))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            ensure_user_active::<S, B>,
        ))
}

/// Rejects tokens of deleted or deactivated accounts and refreshes the role carried in the
/// [UserContext], so a demotion takes effect before the token expires.
pub async fn ensure_user_active<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let user = state.services.auth.active_user(&user_context).await?;
    req.extensions_mut().insert(user.context());
    Ok(next.run(req).await)
}

/// A [VaultError] on its way out as a json response
#[derive(Debug, Error)]
#[error(transparent)]
pub struct HttpError(#[from] pub VaultError);

impl HttpError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            VaultError::NotFound(_) => StatusCode::NOT_FOUND,
            VaultError::Validation(_) => StatusCode::BAD_REQUEST,
            VaultError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            VaultError::Forbidden(_) => StatusCode::FORBIDDEN,
            VaultError::Conflict(_) => StatusCode::CONFLICT,
            VaultError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            VaultError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let VaultError::Internal(e) = &self.0 {
            tracing::error!(error=?e, "request failed");
        }

        (
            status,
            Json(ErrorResponse {
                message: &self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shorthand for handler results
pub type HandlerResult<T> = Result<T, HttpError>;
