use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
pub use vault_env::Environment;

/// Configuration parameters for the application.
pub struct Config {
    /// The connection URL for the Postgres database
    pub database_url: String,
    /// The port to listen for HTTP requests on.
    pub port: u16,
    /// The environment we are in
    pub environment: Environment,
    /// HS256 secret used to sign access tokens
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Lifetime of an access token
    pub jwt_ttl: Duration,
    /// Root directory of the local blob store
    pub storage_dir: PathBuf,
    /// Largest file accepted by an upload
    pub max_upload_bytes: usize,
    /// Apply the embedded migrations at boot
    pub run_migrations: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("storage_dir", &self.storage_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("run_migrations", &self.run_migrations)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let port = parsed_or("PORT", 8080)?;
        let environment = Environment::new_or_prod();
        let jwt_issuer = parsed_or("JWT_ISSUER", "docvault".to_string())?;
        let jwt_audience = parsed_or("JWT_AUDIENCE", "docvault-api".to_string())?;
        let jwt_ttl = Duration::from_secs(parsed_or("JWT_TTL_SECONDS", 86_400)?);
        let storage_dir = parsed_or("STORAGE_DIR", PathBuf::from("./storage"))?;
        let max_upload_bytes = parsed_or("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?;
        let run_migrations = parsed_or("RUN_MIGRATIONS", true)?;

        anyhow::ensure!(jwt_ttl.as_secs() > 0, "JWT_TTL_SECONDS must be positive");
        anyhow::ensure!(max_upload_bytes > 0, "MAX_UPLOAD_BYTES must be positive");

        Ok(Config {
            database_url,
            port,
            environment,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_ttl,
            storage_dir,
            max_upload_bytes,
            run_migrations,
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be provided"))
}

fn parsed_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        Err(_) => Ok(default),
    }
}
