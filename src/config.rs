use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use log::{info, warn};
use thiserror::Error;

use crate::constants::DEFAULT_PAGE_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Without it the server runs on the in-process store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// Absolute base for pagination links, short links and media urls.
    pub public_url: String,
    pub secret_key: String,
    pub media_root: PathBuf,
    pub page_size: i64,
    pub token_ttl_hours: i64,
    /// Reference data applied at startup.
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Reads the process environment, after loading `.env` when one exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            info!("No .env loaded: {e}");
        }

        let secret_key = env::var("SECRET_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("SECRET_KEY"))?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8000")?,
            public_url: try_load::<String>("PUBLIC_URL", "http://localhost:8000")?
                .trim_end_matches('/')
                .to_string(),
            secret_key,
            media_root: try_load("MEDIA_ROOT", "media")?,
            page_size: try_load("PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "720")?,
            seed_file: env::var("SEED_FILE")
                .ok()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Defaults for everything but the signing key.
    pub fn with_secret(secret_key: &str) -> Self {
        Self {
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            public_url: String::from("http://localhost:8000"),
            secret_key: secret_key.to_string(),
            media_root: PathBuf::from("media"),
            page_size: DEFAULT_PAGE_SIZE,
            token_ttl_hours: 720,
            seed_file: None,
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}
