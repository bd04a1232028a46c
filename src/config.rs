use std::env;

use chrono_tz::Tz;

use crate::application::services::{BreakerConfig, RetryPolicy};
use crate::infrastructure::workers::WorkerConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Display-only timezone; storage and scheduling stay UTC.
    pub display_tz: Tz,

    // Worker loop
    pub poll_interval_secs: u64,
    pub worker_batch_size: i64,
    pub worker_concurrency: usize,
    pub worker_staleness_secs: u64,

    // Retry/backoff
    pub max_attempts: i32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub backoff_jitter: f64,

    // Circuit breakers
    pub breaker_threshold: i32,
    pub breaker_cooldown_secs: i64,

    // Channel API endpoints (overridable for tests/staging)
    pub graph_api_url: String,
    pub tiktok_api_url: String,
    pub youtube_api_url: String,
    pub google_business_api_url: String,
    pub blog_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://crosspost.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let tz_name = env::var("CROSSPOST_DISPLAY_TZ").unwrap_or_else(|_| "UTC".to_string());
        let display_tz: Tz = tz_name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(tz_name))?;

        Ok(Config {
            database_url,
            server_host,
            server_port,
            display_tz,
            poll_interval_secs: env_or("CROSSPOST_POLL_INTERVAL_SECS", 5),
            worker_batch_size: env_or("CROSSPOST_WORKER_BATCH_SIZE", 20),
            worker_concurrency: env_or("CROSSPOST_WORKER_CONCURRENCY", 4),
            worker_staleness_secs: env_or("CROSSPOST_WORKER_STALENESS_SECS", 900),
            max_attempts: env_or("CROSSPOST_MAX_ATTEMPTS", 5),
            backoff_base_secs: env_or("CROSSPOST_BACKOFF_BASE_SECS", 30),
            backoff_max_secs: env_or("CROSSPOST_BACKOFF_MAX_SECS", 3600),
            backoff_jitter: env_or("CROSSPOST_BACKOFF_JITTER", 0.1),
            breaker_threshold: env_or("CROSSPOST_BREAKER_THRESHOLD", 5),
            breaker_cooldown_secs: env_or("CROSSPOST_BREAKER_COOLDOWN_SECS", 60),
            graph_api_url: env::var("CROSSPOST_GRAPH_API_URL")
                .unwrap_or_else(|_| "https://graph.facebook.com/v19.0".to_string()),
            tiktok_api_url: env::var("CROSSPOST_TIKTOK_API_URL")
                .unwrap_or_else(|_| "https://open.tiktokapis.com".to_string()),
            youtube_api_url: env::var("CROSSPOST_YOUTUBE_API_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            google_business_api_url: env::var("CROSSPOST_GBP_API_URL")
                .unwrap_or_else(|_| "https://mybusiness.googleapis.com".to_string()),
            blog_api_url: env::var("CROSSPOST_BLOG_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_secs: self.backoff_base_secs,
            max_delay_secs: self.backoff_max_secs,
            jitter: self.backoff_jitter,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            threshold: self.breaker_threshold,
            cooldown_secs: self.breaker_cooldown_secs,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval_secs: self.poll_interval_secs,
            batch_size: self.worker_batch_size,
            concurrency: self.worker_concurrency,
            staleness_secs: self.worker_staleness_secs,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Unknown display timezone '{0}'")]
    InvalidTimezone(String),
}
