use axum::{
    Extension, Json, Router,
    extract::State,
    routing::{get, post},
};
use model_vault::{EmptyResponse, ErrorResponse, UserContext};

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, User},
    ports::{BlobStorage, VaultStorage},
};

pub fn public_router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .with_state(state)
}

pub fn protected_router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/auth/me", get(me_handler))
        .route("/auth/password", post(change_password_handler))
        .with_state(state)
}

/// Creates an organization together with its first admin and logs the admin in
#[utoipa::path(
    post,
    operation_id = "register",
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, body = AuthResponse),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, request), fields(email = %request.email))]
pub async fn register_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Json(request): Json<RegisterRequest>,
) -> HandlerResult<Json<AuthResponse>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.auth.register(request).await?))
}

/// Exchanges an email and password for an access token
#[utoipa::path(
    post,
    operation_id = "login",
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, request), fields(email = %request.email))]
pub async fn login_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Json(request): Json<LoginRequest>,
) -> HandlerResult<Json<AuthResponse>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.auth.login(request).await?))
}

/// The account behind the access token
#[utoipa::path(
    get,
    operation_id = "me",
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, body = User),
        (status = 401, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn me_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
) -> HandlerResult<Json<User>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.auth.me(&user_context).await?))
}

#[utoipa::path(
    post,
    operation_id = "change_password",
    path = "/auth/password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, body = EmptyResponse),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn change_password_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<ChangePasswordRequest>,
) -> HandlerResult<Json<EmptyResponse>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state
        .services
        .auth
        .change_password(&user_context, request)
        .await?;
    Ok(Json(EmptyResponse::default()))
}
