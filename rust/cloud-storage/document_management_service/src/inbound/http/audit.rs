use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use model_vault::{ErrorResponse, Page, UserContext};

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{AuditLog, AuditQuery},
    ports::{BlobStorage, VaultStorage},
};

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/audit-logs", get(query_audit_logs_handler))
        .route_layer(axum::middleware::from_fn(
            vault_auth::middleware::require_role::admin,
        ))
        .with_state(state)
}

/// The organization's audit log, newest first
#[utoipa::path(
    get,
    operation_id = "query_audit_logs",
    path = "/audit-logs",
    tag = "audit",
    params(AuditQuery),
    responses(
        (status = 200, body = Page<AuditLog>),
        (status = 403, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn query_audit_logs_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(query): Query<AuditQuery>,
) -> HandlerResult<Json<Page<AuditLog>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(state.services.audit.query(&user_context, query).await?))
}
