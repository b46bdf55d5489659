use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use model_vault::{ErrorResponse, UserContext};
use uuid::Uuid;

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{
        CreateFolderRequest, DeleteFolderQuery, Folder, FolderDetails, ListFoldersQuery,
        UpdateFolderRequest,
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
            "/folders",
            get(list_folders_handler).post(create_folder_handler),
        )
        .route(
            "/folders/{id}",
            get(get_folder_handler)
                .patch(update_folder_handler)
                .delete(delete_folder_handler),
        )
        .with_state(state)
}

/// Lists the children of a folder, or the caller's root folders
#[utoipa::path(
    get,
    operation_id = "list_folders",
    path = "/folders",
    tag = "folders",
    params(ListFoldersQuery),
    responses(
        (status = 200, body = Vec<Folder>),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_folders_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(query): Query<ListFoldersQuery>,
) -> HandlerResult<Json<Vec<Folder>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.folders.list(&user_context, query).await?))
}

#[utoipa::path(
    post,
    operation_id = "create_folder",
    path = "/folders",
    tag = "folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, body = Folder),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn create_folder_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<CreateFolderRequest>,
) -> HandlerResult<(StatusCode, Json<Folder>)>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let folder = state.services.folders.create(&user_context, request).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// A folder together with its breadcrumb path
#[utoipa::path(
    get,
    operation_id = "get_folder",
    path = "/folders/{id}",
    tag = "folders",
    params(("id" = Uuid, Path, description = "Folder id")),
    responses(
        (status = 200, body = FolderDetails),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn get_folder_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<FolderDetails>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.folders.get(&user_context, id).await?))
}

/// Renames and/or moves a folder
#[utoipa::path(
    patch,
    operation_id = "update_folder",
    path = "/folders/{id}",
    tag = "folders",
    params(("id" = Uuid, Path, description = "Folder id")),
    request_body = UpdateFolderRequest,
    responses(
        (status = 200, body = Folder),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn update_folder_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFolderRequest>,
) -> HandlerResult<Json<Folder>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .folders
            .update(&user_context, id, request)
            .await?,
    ))
}

/// Deletes an empty folder, or with `recursive=true` the whole subtree
#[utoipa::path(
    delete,
    operation_id = "delete_folder",
    path = "/folders/{id}",
    tag = "folders",
    params(("id" = Uuid, Path, description = "Folder id"), DeleteFolderQuery),
    responses(
        (status = 204),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn delete_folder_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteFolderQuery>,
) -> HandlerResult<StatusCode>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state
        .services
        .folders
        .delete(&user_context, id, query.recursive)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
