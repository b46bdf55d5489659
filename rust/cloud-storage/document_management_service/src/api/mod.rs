use crate::api::context::ApiContext;
use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use document_management_service::inbound::http::{protected_router, public_router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod context;
mod health;
pub mod swagger;

/// Room for multipart boundaries and the non-file fields of an upload
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub async fn setup_and_serve(state: ApiContext) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_headers(vec![AUTHORIZATION, CONTENT_TYPE])
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any);

    let port = state.config.port;
    let env = state.config.environment;
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    let app = api_router(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .merge(health::router())
        .layer(cors)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", swagger::ApiDoc::openapi()));

    let bind_address = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind to address {}", bind_address))?;

    tracing::info!(
        "document management service is up and running with environment {:?} on port {}",
        &env,
        &port
    );

    axum::serve(listener, app.into_make_service())
        .await
        .context("error running axum server")
}

fn api_router(app_state: ApiContext) -> Router {
    Router::new()
        .merge(public_router(app_state.vault.clone()))
        .merge(
            protected_router(app_state.vault).layer(axum::middleware::from_fn_with_state(
                app_state.jwt_args,
                vault_auth::middleware::decode_jwt::handler,
            )),
        )
}
