use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use model_vault::{ErrorResponse, UserContext};
use uuid::Uuid;

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{
        CreateShareCodeRequest, RedeemShareCodeRequest, RedeemShareCodeResponse, ShareCode,
        ShareResourceQuery, SharedItem,
    },
    ports::{BlobStorage, VaultStorage},
};

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/shares",
            get(list_share_codes_handler).post(create_share_code_handler),
        )
        .route("/shares/redeem", post(redeem_share_code_handler))
        .route("/shares/received", get(list_shared_with_me_handler))
        .route("/shares/{id}", delete(revoke_share_code_handler))
        .with_state(state)
}

/// Creates a share code for a document or folder the caller owns
#[utoipa::path(
    post,
    operation_id = "create_share_code",
    path = "/shares",
    tag = "shares",
    request_body = CreateShareCodeRequest,
    responses(
        (status = 201, body = ShareCode),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn create_share_code_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<CreateShareCodeRequest>,
) -> HandlerResult<(StatusCode, Json<ShareCode>)>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let share_code = state
        .services
        .shares
        .create_code(&user_context, request)
        .await?;
    Ok((StatusCode::CREATED, Json(share_code)))
}

/// Redeems a code, granting the caller access to the shared resource
#[utoipa::path(
    post,
    operation_id = "redeem_share_code",
    path = "/shares/redeem",
    tag = "shares",
    request_body = RedeemShareCodeRequest,
    responses(
        (status = 200, body = RedeemShareCodeResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn redeem_share_code_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<RedeemShareCodeRequest>,
) -> HandlerResult<Json<RedeemShareCodeResponse>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .shares
            .redeem(&user_context, &request.code)
            .await?,
    ))
}

/// The share codes of one resource
#[utoipa::path(
    get,
    operation_id = "list_share_codes",
    path = "/shares",
    tag = "shares",
    params(ShareResourceQuery),
    responses(
        (status = 200, body = Vec<ShareCode>),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_share_codes_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(query): Query<ShareResourceQuery>,
) -> HandlerResult<Json<Vec<ShareCode>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .shares
            .list_codes(&user_context, query.into())
            .await?,
    ))
}

#[utoipa::path(
    delete,
    operation_id = "revoke_share_code",
    path = "/shares/{id}",
    tag = "shares",
    params(("id" = Uuid, Path, description = "Share code id")),
    responses(
        (status = 204),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn revoke_share_code_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state.services.shares.revoke(&user_context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Documents and folders other users shared with the caller
#[utoipa::path(
    get,
    operation_id = "list_shared_with_me",
    path = "/shares/received",
    tag = "shares",
    responses(
        (status = 200, body = Vec<SharedItem>),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_shared_with_me_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
) -> HandlerResult<Json<Vec<SharedItem>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .shares
            .list_shared_with_me(&user_context)
            .await?,
    ))
}
