use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use model_vault::{ErrorResponse, Page, Pagination, UserContext};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    VaultError,
    models::{BundleRequest, Document, DocumentSearch, Tag, UpdateDocumentRequest, UploadDocument},
    ports::{BlobStorage, VaultStorage},
};

const BUNDLE_FILENAME: &str = "documents.zip";

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/documents",
            get(search_documents_handler).post(upload_document_handler),
        )
        .route("/documents/trash", get(list_trash_handler))
        .route("/documents/bundle", post(bundle_documents_handler))
        .route(
            "/documents/{id}",
            get(get_document_handler)
                .patch(update_document_handler)
                .delete(delete_document_handler),
        )
        .route("/documents/{id}/download", get(download_document_handler))
        .route("/documents/{id}/restore", post(restore_document_handler))
        .route("/documents/{id}/purge", delete(purge_document_handler))
        .route("/tags", get(list_tags_handler))
        .with_state(state)
}

/// The multipart form accepted by [upload_document_handler]
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadDocumentForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Defaults to the filename
    title: Option<String>,
    description: Option<String>,
    folder_id: Option<Uuid>,
    /// Comma separated, the field may also be repeated
    tags: Option<String>,
}

/// Searches the documents visible to the caller
#[utoipa::path(
    get,
    operation_id = "search_documents",
    path = "/documents",
    tag = "documents",
    params(DocumentSearch),
    responses(
        (status = 200, body = Page<Document>),
        (status = 400, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn search_documents_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(search): Query<DocumentSearch>,
) -> HandlerResult<Json<Page<Document>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .documents
            .search(&user_context, search)
            .await?,
    ))
}

/// Uploads a file. Use the field `file` for the content.
#[utoipa::path(
    post,
    operation_id = "upload_document",
    path = "/documents",
    tag = "documents",
    request_body(content = UploadDocumentForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, body = Document),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 413, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, multipart), fields(user_id = %user_context.user_id))]
pub async fn upload_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    multipart: Multipart,
) -> HandlerResult<(StatusCode, Json<Document>)>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let upload = read_upload(multipart).await?;
    let document = state
        .services
        .documents
        .upload(&user_context, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadDocument, VaultError> {
    let mut upload = UploadDocument::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                upload.filename = field.file_name().unwrap_or("upload").to_string();
                upload.content_type = field.content_type().map(str::to_string);
                upload.bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                has_file = true;
            }
            "title" => upload.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => {
                upload.description = Some(field.text().await.map_err(multipart_error)?)
            }
            "folder_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    let folder_id = text
                        .parse()
                        .map_err(|_| VaultError::validation("folder_id must be a uuid"))?;
                    upload.folder_id = Some(folder_id);
                }
            }
            "tags" => {
                let text = field.text().await.map_err(multipart_error)?;
                upload.tags.extend(text.split(',').map(str::to_string));
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    if !has_file {
        return Err(VaultError::validation("missing multipart field `file`"));
    }
    Ok(upload)
}

fn multipart_error(err: MultipartError) -> VaultError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        VaultError::PayloadTooLarge(err.body_text())
    } else {
        VaultError::validation(err.body_text())
    }
}

#[utoipa::path(
    get,
    operation_id = "list_trash",
    path = "/documents/trash",
    tag = "documents",
    params(Pagination),
    responses(
        (status = 200, body = Page<Document>),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_trash_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(pagination): Query<Pagination>,
) -> HandlerResult<Json<Page<Document>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .documents
            .list_trash(&user_context, pagination)
            .await?,
    ))
}

/// Zips the requested documents. Documents the caller cannot see are rejected.
#[utoipa::path(
    post,
    operation_id = "bundle_documents",
    path = "/documents/bundle",
    tag = "documents",
    request_body = BundleRequest,
    responses(
        (status = 200, content_type = "application/zip", body = Vec<u8>),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn bundle_documents_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<BundleRequest>,
) -> HandlerResult<Response>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let bytes = state
        .services
        .documents
        .bundle(&user_context, request.document_ids)
        .await?;
    Ok(attachment(BUNDLE_FILENAME, "application/zip", bytes))
}

#[utoipa::path(
    get,
    operation_id = "get_document",
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, body = Document),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn get_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Document>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.documents.get(&user_context, id).await?))
}

#[utoipa::path(
    patch,
    operation_id = "update_document",
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, body = Document),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn update_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDocumentRequest>,
) -> HandlerResult<Json<Document>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .documents
            .update_metadata(&user_context, id, request)
            .await?,
    ))
}

/// Moves a document to the trash
#[utoipa::path(
    delete,
    operation_id = "delete_document",
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn delete_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state.services.documents.delete(&user_context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    operation_id = "download_document",
    path = "/documents/{id}/download",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, content_type = "application/octet-stream", body = Vec<u8>),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn download_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Response>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let content = state.services.documents.download(&user_context, id).await?;
    Ok(attachment(
        &content.document.original_filename,
        &content.document.mime_type,
        content.bytes,
    ))
}

#[utoipa::path(
    post,
    operation_id = "restore_document",
    path = "/documents/{id}/restore",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, body = Document),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn restore_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Document>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state.services.documents.restore(&user_context, id).await?,
    ))
}

/// Removes a document and its content for good
#[utoipa::path(
    delete,
    operation_id = "purge_document",
    path = "/documents/{id}/purge",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn purge_document_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state.services.documents.purge(&user_context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    operation_id = "list_tags",
    path = "/tags",
    tag = "documents",
    responses(
        (status = 200, body = Vec<Tag>),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_tags_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
) -> HandlerResult<Json<Vec<Tag>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.documents.list_tags(&user_context).await?))
}

fn attachment(filename: &str, content_type: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
        ],
        bytes,
    )
        .into_response()
}

/// `attachment; filename="..."` with anything that could break the header replaced
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
