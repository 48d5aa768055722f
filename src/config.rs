use std::net::SocketAddr;
use structopt::StructOpt;
use crate::auth::{Credentials, DEFAULT_TOKEN_TTL_SECS};

/// server settings; every flag can also come from the environment (or `.env`)
#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "fitfusion-server", about = "fitness tracking api server")]
pub struct Config {
    /// sqlite connection string, e.g. `sqlite://fitfusion.db` or `sqlite::memory:`
    #[structopt(long, env = "DATABASE_URL", default_value = "sqlite://fitfusion.db")]
    pub database_url: String,

    #[structopt(long, env = "FITFUSION_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// secret used to sign access tokens. when absent a random one is generated,
    /// so tokens stop working after a restart
    #[structopt(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret_key: Option<String>,

    /// lifetime of issued access tokens, in seconds
    #[structopt(long, env = "JWT_ACCESS_TOKEN_EXPIRES", default_value = "900")]
    pub token_ttl_secs: i64,

    #[structopt(long, env = "PASSWORD_HASH_ROUNDS", default_value = "100000")]
    pub password_hash_rounds: u32,

    /// tracing filter used when `RUST_LOG` is unset
    #[structopt(long, default_value = "info,fitfusion=debug")]
    pub log_filter: String,
}

impl Config {
    /// settings for an isolated instance backed by an in-memory database
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind: ([127, 0, 0, 1], 0).into(),
            jwt_secret_key: Some("in-memory-secret".to_string()),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            password_hash_rounds: 1_000,
            log_filter: "info".to_string(),
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }

    pub fn credentials(&self) -> Credentials {
        match &self.jwt_secret_key {
            Some(secret) => Credentials::new(secret.as_bytes(), self.token_ttl(), self.password_hash_rounds),
            None => Credentials::ephemeral(self.token_ttl(), self.password_hash_rounds),
        }
    }
}
