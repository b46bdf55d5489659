//! Conversion jobs over stored documents. Every successful job answers 201 with the documents
//! it created.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use model_vault::{ErrorResponse, UserContext};

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{
        BatchConversionRequest, BatchConversionResult, CompressImageRequest, ConversionResult,
        ConvertImageRequest, MergePdfsRequest, NumberPdfPagesRequest, ResizeImageRequest,
        RotatePdfRequest, SplitPdfRequest, WatermarkPdfRequest,
    },
    ports::{BlobStorage, VaultStorage},
};

type Created = (StatusCode, Json<ConversionResult>);

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/conversions/pdf/merge", post(merge_pdfs_handler))
        .route("/conversions/pdf/split", post(split_pdf_handler))
        .route("/conversions/pdf/rotate", post(rotate_pdf_handler))
        .route("/conversions/pdf/watermark", post(watermark_pdf_handler))
        .route(
            "/conversions/pdf/page-numbers",
            post(number_pdf_pages_handler),
        )
        .route("/conversions/image/resize", post(resize_image_handler))
        .route("/conversions/image/compress", post(compress_image_handler))
        .route("/conversions/image/convert", post(convert_image_handler))
        .route("/conversions/batch", post(batch_conversion_handler))
        .with_state(state)
}

fn created(result: ConversionResult) -> Created {
    (StatusCode::CREATED, Json(result))
}

/// Merges pdf documents into a new one, in the given order
#[utoipa::path(
    post,
    operation_id = "merge_pdfs",
    path = "/conversions/pdf/merge",
    tag = "conversions",
    request_body = MergePdfsRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn merge_pdfs_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<MergePdfsRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .merge_pdfs(&user_context, request)
            .await?,
    ))
}

/// Splits a pdf into one document per range, or per page when no ranges are given
#[utoipa::path(
    post,
    operation_id = "split_pdf",
    path = "/conversions/pdf/split",
    tag = "conversions",
    request_body = SplitPdfRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn split_pdf_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<SplitPdfRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .split_pdf(&user_context, request)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "rotate_pdf",
    path = "/conversions/pdf/rotate",
    tag = "conversions",
    request_body = RotatePdfRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn rotate_pdf_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<RotatePdfRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .rotate_pdf(&user_context, request)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "watermark_pdf",
    path = "/conversions/pdf/watermark",
    tag = "conversions",
    request_body = WatermarkPdfRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn watermark_pdf_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<WatermarkPdfRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .watermark_pdf(&user_context, request)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "number_pdf_pages",
    path = "/conversions/pdf/page-numbers",
    tag = "conversions",
    request_body = NumberPdfPagesRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn number_pdf_pages_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<NumberPdfPagesRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .number_pdf_pages(&user_context, request)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "resize_image",
    path = "/conversions/image/resize",
    tag = "conversions",
    request_body = ResizeImageRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn resize_image_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<ResizeImageRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .resize_image(&user_context, request)
            .await?,
    ))
}

/// Re-encodes an image as jpeg at the given quality
#[utoipa::path(
    post,
    operation_id = "compress_image",
    path = "/conversions/image/compress",
    tag = "conversions",
    request_body = CompressImageRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn compress_image_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<CompressImageRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .compress_image(&user_context, request)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "convert_image",
    path = "/conversions/image/convert",
    tag = "conversions",
    request_body = ConvertImageRequest,
    responses(
        (status = 201, body = ConversionResult),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn convert_image_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<ConvertImageRequest>,
) -> HandlerResult<Created>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(created(
        state
            .services
            .conversions
            .convert_image(&user_context, request)
            .await?,
    ))
}

/// Applies one operation to many documents. Failing items are reported, not fatal.
#[utoipa::path(
    post,
    operation_id = "batch_conversion",
    path = "/conversions/batch",
    tag = "conversions",
    request_body = BatchConversionRequest,
    responses(
        (status = 200, description = "Per document outcomes, keyed by source document id"),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn batch_conversion_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<BatchConversionRequest>,
) -> HandlerResult<Json<BatchConversionResult>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .conversions
            .batch(&user_context, request)
            .await?,
    ))
}
