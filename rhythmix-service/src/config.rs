use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rhythmix_flow::DEFAULT_CHECKPOINT_TTL;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_LOG_FILTER: &str = "rhythmix_service=debug,rhythmix_flow=debug,tower_http=debug";

/// Log line shape; JSON unless `LOG_FORMAT=pretty`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime settings, read from the environment at startup
#[derive(Clone)]
pub struct ServiceConfig {
    pub openrouter_api_key: String,
    pub model: String,
    /// Checkpoint database; in-memory checkpoints when absent
    pub database_url: Option<String>,
    pub songs_database_url: String,
    /// Genre list file; the bundled catalog when absent
    pub genres_path: Option<PathBuf>,
    pub checkpoint_ttl: Duration,
    pub purge_interval: Duration,
    pub port: u16,
    pub log_format: LogFormat,
    /// `RUST_LOG` directives, or the service's own defaults
    pub log_filter: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let openrouter_api_key =
            get("OPENROUTER_API_KEY").context("OPENROUTER_API_KEY environment variable not set")?;
        let songs_database_url =
            get("SONGS_DATABASE_URL").context("SONGS_DATABASE_URL environment variable not set")?;

        let checkpoint_ttl = match get("CHECKPOINT_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("CHECKPOINT_TTL_SECS is not a number: {raw}"))?,
            ),
            None => DEFAULT_CHECKPOINT_TTL,
        };
        if checkpoint_ttl.is_zero() {
            anyhow::bail!("CHECKPOINT_TTL_SECS must be positive");
        }

        let purge_interval = match get("CHECKPOINT_PURGE_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("CHECKPOINT_PURGE_SECS is not a number: {raw}"))?,
            ),
            None => DEFAULT_PURGE_INTERVAL,
        };
        if purge_interval.is_zero() {
            anyhow::bail!("CHECKPOINT_PURGE_SECS must be positive");
        }

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            openrouter_api_key,
            model: get("RHYTHMIX_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            database_url: get("DATABASE_URL"),
            songs_database_url,
            genres_path: get("RHYTHMIX_GENRES_PATH").map(PathBuf::from),
            checkpoint_ttl,
            purge_interval,
            port,
            log_format,
            log_filter: get("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

// Keeps secrets and connection strings out of logs
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("openrouter_api_key", &"<redacted>")
            .field("model", &self.model)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("songs_database_url", &"<redacted>")
            .field("genres_path", &self.genres_path)
            .field("checkpoint_ttl", &self.checkpoint_ttl)
            .field("purge_interval", &self.purge_interval)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}
