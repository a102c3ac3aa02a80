use std::env;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The port the HTTP server listens on.
    pub port: u16,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// The master key used for credential encryption at rest.
    pub master_key: Zeroizing<Vec<u8>>,
    /// Base URL of the generative content API.
    pub genai_base_url: String,
    /// API key for the generative content API.
    pub genai_api_key: String,
    /// Model name requested from the generative content API.
    pub genai_model: String,
    /// Base URL of the platform bridge sidecar.
    pub bridge_base_url: String,
    /// Seconds between scheduled-post polls.
    pub scheduler_poll_secs: u64,
    /// How far ahead of now a post counts as due, in seconds.
    pub scheduler_lookahead_secs: u64,
    /// Root directory for generated images and caption sidecars.
    pub media_root: String,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut master_key_hex = env::var("MASTER_KEY")
            .context("MASTER_KEY must be set (generate with: openssl rand -hex 32)")?;

        let master_key_bytes = hex::decode(&master_key_hex)
            .context("MASTER_KEY must be valid hexadecimal")?;

        master_key_hex.zeroize();

        if master_key_bytes.len() != 32 {
            anyhow::bail!("MASTER_KEY must be exactly 32 bytes (64 hex characters)");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,
            session_duration_days: env::var("SESSION_DURATION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_DAYS")?,
            master_key: Zeroizing::new(master_key_bytes),
            genai_base_url: env::var("GENAI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            genai_api_key: env::var("GENAI_API_KEY")
                .context("GENAI_API_KEY must be set")?,
            genai_model: env::var("GENAI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash-preview-image-generation".to_string()),
            bridge_base_url: env::var("BRIDGE_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            scheduler_poll_secs: env::var("SCHEDULER_POLL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid SCHEDULER_POLL_SECS")?,
            scheduler_lookahead_secs: env::var("SCHEDULER_LOOKAHEAD_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid SCHEDULER_LOOKAHEAD_SECS")?,
            media_root: env::var("MEDIA_ROOT")
                .unwrap_or_else(|_| "static".to_string()),
        })
    }
}
