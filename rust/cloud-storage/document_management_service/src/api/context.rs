use std::sync::Arc;

use document_management_service::{
    inbound::http::VaultRouterState,
    outbound::{local_blob::LocalBlobStorage, postgres::PgVault},
};
use vault_auth::jwt::JwtArgs;

use crate::config::Config;

#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<Config>,
    pub jwt_args: JwtArgs,
    /// Every domain service, backed by Postgres and the local blob store
    pub vault: VaultRouterState<PgVault, LocalBlobStorage>,
}
