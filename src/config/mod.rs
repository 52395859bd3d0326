//! # Controller Configuration
//!
//! Controller settings loaded from environment variables.
//!
//! | variable              | default                     |
//! |-----------------------|-----------------------------|
//! | `KEYPAIR_PATH`        | `/etc/lockbox/keypair.yaml` |
//! | `METRICS_ADDR`        | `0.0.0.0:8080`              |
//! | `HTTP_ADDR`           | `0.0.0.0:8081`              |
//! | `SYNC_PERIOD_SECS`    | `3600`                      |
//! | `BACKOFF_MIN_MINUTES` | `1`                         |
//! | `BACKOFF_MAX_MINUTES` | `10`                        |
//! | `LOG_FORMAT`          | `text`                      |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_HTTP_ADDR,
    DEFAULT_KEYPAIR_PATH, DEFAULT_METRICS_ADDR, DEFAULT_SYNC_PERIOD_SECS,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

impl LogFormat {
    /// Read `LOG_FORMAT` without logging, before the subscriber exists
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("LOG_FORMAT")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or_default()
    }
}

/// Controller configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Key-pair file holding this controller's identity
    pub keypair_path: PathBuf,
    /// Bind address for `/metrics`, `/healthz` and `/readyz`
    pub metrics_addr: SocketAddr,
    /// Bind address for the public key server
    pub http_addr: SocketAddr,
    /// Requeue interval after a successful reconcile (seconds)
    pub sync_period_secs: u64,
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            keypair_path: lookup("KEYPAIR_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_KEYPAIR_PATH), PathBuf::from),
            metrics_addr: var_or_default(&lookup, "METRICS_ADDR", default_addr(DEFAULT_METRICS_ADDR)),
            http_addr: var_or_default(&lookup, "HTTP_ADDR", default_addr(DEFAULT_HTTP_ADDR)),
            sync_period_secs: var_or_default(&lookup, "SYNC_PERIOD_SECS", DEFAULT_SYNC_PERIOD_SECS),
            backoff_min_minutes: var_or_default(
                &lookup,
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: var_or_default(
                &lookup,
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            log_format: var_or_default(&lookup, "LOG_FORMAT", LogFormat::default()),
        }
    }

    pub fn sync_period(&self) -> Duration {
        Duration::from_secs(self.sync_period_secs)
    }
}

fn default_addr(addr: &str) -> SocketAddr {
    addr.parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)))
}

/// Parse a variable, falling back to `default` when it is unset or invalid
fn var_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            warn!(key, value = %raw, error = %e, "invalid configuration value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn config(vars: &[(&str, &str)]) -> ControllerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.keypair_path, PathBuf::from("/etc/lockbox/keypair.yaml"));
        assert_eq!(config.metrics_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.http_addr.to_string(), "0.0.0.0:8081");
        assert_eq!(config.sync_period(), Duration::from_secs(3600));
        assert_eq!((config.backoff_min_minutes, config.backoff_max_minutes), (1, 10));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("KEYPAIR_PATH", "/tmp/keys.json"),
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("SYNC_PERIOD_SECS", "60"),
            ("LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(config.keypair_path, PathBuf::from("/tmp/keys.json"));
        assert_eq!(config.http_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.sync_period_secs, 60);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_log_format_is_read_without_the_rest() {
        let lookup = |key: &str| (key == "LOG_FORMAT").then(|| "json".to_string());
        assert_eq!(LogFormat::from_lookup(lookup), LogFormat::Json);
        assert_eq!(LogFormat::from_lookup(|_| Some("xml".to_string())), LogFormat::Text);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_invalid_values_are_reported_once_tracing_is_installed() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let config = tracing::subscriber::with_default(subscriber, || {
            config(&[("SYNC_PERIOD_SECS", "soon")])
        });

        assert_eq!(config.sync_period_secs, 3600);
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("invalid configuration value, using default"));
        assert!(logs.contains("SYNC_PERIOD_SECS"));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config(&[
            ("METRICS_ADDR", "not an address"),
            ("SYNC_PERIOD_SECS", "-5"),
            ("LOG_FORMAT", "xml"),
        ]);
        assert_eq!(config.metrics_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.sync_period_secs, 3600);
        assert_eq!(config.log_format, LogFormat::Text);
    }
}
