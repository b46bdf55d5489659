use std::sync::Arc;

use crate::api::context::ApiContext;
use anyhow::Context;
use config::Config;
use document_management_service::{
    domain::services::VaultServices,
    inbound::http::VaultRouterState,
    outbound::{
        local_blob::LocalBlobStorage,
        postgres::{MIGRATIONS, PgVault},
    },
};
use sqlx::postgres::PgPoolOptions;
use vault_auth::{jwt::JwtArgs, password::PasswordHasher};
use vault_entrypoint::VaultEntrypoint;

mod api;
mod config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    VaultEntrypoint::default()
        .default_filter("info,document_management_service=debug,sqlx=warn")
        .init();

    // Parse our configuration from the environment.
    let config = Config::from_env().context("expected to be able to generate config")?;

    tracing::info!(?config, "initialized config");

    let (min_connections, max_connections) = config.environment.pool_size();

    let db = PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .connect(&config.database_url)
        .await
        .context("could not connect to db")?;

    tracing::info!(
        min_connections,
        max_connections,
        "initialized db connection"
    );

    if config.run_migrations {
        MIGRATIONS
            .run(&db)
            .await
            .context("unable to run migrations")?;
        tracing::info!("applied migrations");
    }

    let jwt_args = JwtArgs::new(
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.jwt_audience.clone(),
        config.jwt_ttl,
    )
    .context("invalid jwt configuration")?;

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("unable to create {}", config.storage_dir.display()))?;
    let blob = LocalBlobStorage::new(config.storage_dir.clone());
    tracing::info!(storage_dir = %config.storage_dir.display(), "initialized blob storage");

    let services = VaultServices::new(
        PgVault::new(db),
        blob,
        jwt_args.clone(),
        PasswordHasher::default(),
        config.max_upload_bytes,
    );

    api::setup_and_serve(ApiContext {
        config: Arc::new(config),
        jwt_args,
        vault: VaultRouterState::new(services),
    })
    .await?;
    Ok(())
}
