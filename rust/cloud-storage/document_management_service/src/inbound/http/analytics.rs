use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use model_vault::{ErrorResponse, UserContext};

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{UsageQuery, UsageSummary},
    ports::{BlobStorage, VaultStorage},
};

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/analytics/usage", get(usage_summary_handler))
        .route_layer(axum::middleware::from_fn(
            vault_auth::middleware::require_role::manager,
        ))
        .with_state(state)
}

/// Storage and activity figures for the organization over the last `days` days
#[utoipa::path(
    get,
    operation_id = "usage_summary",
    path = "/analytics/usage",
    tag = "analytics",
    params(UsageQuery),
    responses(
        (status = 200, body = UsageSummary),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn usage_summary_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(query): Query<UsageQuery>,
) -> HandlerResult<Json<UsageSummary>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .analytics
            .usage_summary(&user_context, query)
            .await?,
    ))
}
