use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use eventface_core::{RetryPolicy, DEFAULT_MAX_DISTANCE};

const DEFAULT_PORT: u16 = 8080;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub listen_addr: SocketAddr,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Largest descriptor distance still accepted as a match.
    pub max_distance: f32,
    /// Minimum detector confidence for a face to be reported.
    pub min_confidence: f32,
    /// Download attempts per image.
    pub fetch_attempts: u32,
    /// Timeout for a single download attempt.
    pub fetch_timeout_secs: u64,
    /// Wait before the second attempt; doubles after each further failure.
    pub fetch_backoff_ms: u64,
    /// Images processed concurrently within one batch.
    pub batch_concurrency: usize,
}

impl Config {
    /// Load configuration from `EVENTFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("eventface");

        let listen_addr = var("EVENTFACE_LISTEN_ADDR")
            .or_else(|| var("PORT").map(|port| format!("0.0.0.0:{port}")))
            .and_then(|addr| match addr.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!(addr = %addr, "invalid listen address; using default");
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)));

        Self {
            listen_addr,
            db_path: var("EVENTFACE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("eventface.db")),
            model_dir: var("EVENTFACE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("models")),
            max_distance: env_parse(&var, "EVENTFACE_MAX_DISTANCE").unwrap_or(DEFAULT_MAX_DISTANCE),
            min_confidence: env_parse(&var, "EVENTFACE_MIN_CONFIDENCE").unwrap_or(0.6),
            fetch_attempts: env_parse::<u32>(&var, "EVENTFACE_FETCH_ATTEMPTS").unwrap_or(3).max(1),
            fetch_timeout_secs: env_parse(&var, "EVENTFACE_FETCH_TIMEOUT_SECS").unwrap_or(30),
            fetch_backoff_ms: env_parse(&var, "EVENTFACE_FETCH_BACKOFF_MS").unwrap_or(1000),
            batch_concurrency: env_parse::<usize>(&var, "EVENTFACE_BATCH_CONCURRENCY").unwrap_or(1).max(1),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_attempts,
            attempt_timeout: Duration::from_secs(self.fetch_timeout_secs),
            initial_backoff: Duration::from_millis(self.fetch_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

fn env_parse<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}
