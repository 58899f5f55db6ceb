//! Configuration Module
//!
//! Handles loading coordinator configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_TTL_SECS;
use crate::tasks::DEFAULT_SWEEP_INTERVAL_SECS;

/// Coordinator configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote retrieval engine
    pub remote_url: String,
    /// Seconds after which a cached record is no longer trusted
    pub cache_ttl: u64,
    /// Expiry sweeper interval in seconds
    pub sweep_interval: u64,
    /// Availability probe timeout in seconds
    pub probe_timeout: u64,
    /// Directory holding the durable slots
    pub state_dir: PathBuf,
    /// Bearer credential, when the caller is authenticated
    pub auth_token: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REMOTE_ENGINE_URL` - Remote engine base URL (default: http://localhost:8000)
    /// - `CACHE_TTL_SECS` - Record time-to-live in seconds (default: 1800)
    /// - `SWEEP_INTERVAL_SECS` - Sweeper frequency in seconds (default: 300)
    /// - `PROBE_TIMEOUT_SECS` - Health probe timeout in seconds (default: 5)
    /// - `STATE_DIR` - Durable slot directory (default: .doc_activation)
    /// - `AUTH_TOKEN` - Optional bearer credential
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            remote_url: env::var("REMOTE_ENGINE_URL").unwrap_or(defaults.remote_url),
            cache_ttl: parse_secs(env::var("CACHE_TTL_SECS").ok(), defaults.cache_ttl),
            sweep_interval: parse_secs(
                env::var("SWEEP_INTERVAL_SECS").ok(),
                defaults.sweep_interval,
            ),
            probe_timeout: parse_secs(env::var("PROBE_TIMEOUT_SECS").ok(), defaults.probe_timeout),
            state_dir: env::var("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            auth_token: env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn sweep_every(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_url: "http://localhost:8000".to_string(),
            cache_ttl: DEFAULT_TTL_SECS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL_SECS,
            probe_timeout: 5,
            state_dir: PathBuf::from(".doc_activation"),
            auth_token: None,
        }
    }
}

/// A positive number of seconds; anything else falls back to `default`.
fn parse_secs(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}
