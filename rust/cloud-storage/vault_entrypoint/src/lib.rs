#![deny(missing_docs)]
//! This crate provides a standardized initialization process that should be used across entrypoint crates.
//! This is used to provide consistent behaviour with e.g. tracing configurations

use tracing_subscriber::EnvFilter;
use vault_env::Environment;

/// unit struct which defines the behaviour for instantiation
#[derive(Debug)]
pub struct VaultEntrypoint {
    env: Environment,
    /// the filter used when `RUST_LOG` is not set
    default_filter: &'static str,
}

impl Default for VaultEntrypoint {
    fn default() -> Self {
        VaultEntrypoint {
            env: Environment::new_or_prod(),
            default_filter: "info,sqlx=warn,tower_http=info",
        }
    }
}

/// sentinel struct which guarantees that we called [VaultEntrypoint::init]
#[derive(Debug)]
pub struct InitializedEntrypoint(());

impl VaultEntrypoint {
    /// create a new instance of [Self] from an input [Environment]
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            ..Default::default()
        }
    }

    /// override the filter directives used when `RUST_LOG` is unset
    pub fn default_filter(mut self, directives: &'static str) -> Self {
        self.default_filter = directives;
        self
    }

    /// consume self, initialize this binary, and return a proof that it was initialized [InitializedEntrypoint]
    pub fn init(self) -> InitializedEntrypoint {
        dotenv::dotenv().ok();
        std::panic::set_hook(Box::new(tracing_panic::panic_hook));

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_filter));

        match self.env {
            Environment::Local => {
                tracing_subscriber::fmt()
                    .with_ansi(true)
                    .with_env_filter(filter)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty()
                    .init();
            }
            Environment::Production | Environment::Develop => {
                tracing_subscriber::fmt()
                    .with_ansi(false)
                    .with_env_filter(filter)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true)
                    .init();
            }
        }

        InitializedEntrypoint(())
    }
}
