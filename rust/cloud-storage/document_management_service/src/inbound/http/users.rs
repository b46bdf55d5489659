//! Account administration. The service checks the admin role on every call; the routes are
//! additionally gated by [vault_auth::middleware::require_role::admin].

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use model_vault::{EmptyResponse, ErrorResponse, Page, Pagination, UserContext};
use uuid::Uuid;

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{CreateUserRequest, ResetPasswordRequest, UpdateUserRequest, User},
    ports::{BlobStorage, VaultStorage},
};

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/users/{id}",
            patch(update_user_handler).delete(delete_user_handler),
        )
        .route("/users/{id}/password", post(reset_password_handler))
        .route_layer(axum::middleware::from_fn(
            vault_auth::middleware::require_role::admin,
        ))
        .with_state(state)
}

#[utoipa::path(
    get,
    operation_id = "list_users",
    path = "/users",
    tag = "users",
    params(Pagination),
    responses(
        (status = 200, body = Page<User>),
        (status = 403, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_users_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(pagination): Query<Pagination>,
) -> HandlerResult<Json<Page<User>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .admin
            .list_users(&user_context, pagination)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "create_user",
    path = "/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, body = User),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn create_user_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<CreateUserRequest>,
) -> HandlerResult<(StatusCode, Json<User>)>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let user = state
        .services
        .admin
        .create_user(&user_context, request)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Changes the name, role or active flag of an account
#[utoipa::path(
    patch,
    operation_id = "update_user",
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, body = User),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn update_user_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> HandlerResult<Json<User>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .admin
            .update_user(&user_context, id, request)
            .await?,
    ))
}

/// Deletes an account. Everything it owned moves to the calling admin.
#[utoipa::path(
    delete,
    operation_id = "delete_user",
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn delete_user_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state.services.admin.delete_user(&user_context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    operation_id = "reset_password",
    path = "/users/{id}/password",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, body = EmptyResponse),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn reset_password_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResetPasswordRequest>,
) -> HandlerResult<Json<EmptyResponse>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state
        .services
        .admin
        .reset_password(&user_context, id, request)
        .await?;
    Ok(Json(EmptyResponse::default()))
}
