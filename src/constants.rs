//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// Default key-pair file mounted into the controller pod
pub const DEFAULT_KEYPAIR_PATH: &str = "/etc/lockbox/keypair.yaml";

/// Default bind address for metrics and health probes
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Default bind address for the public key server
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8081";

/// Default interval between periodic resyncs of a healthy Lockbox (seconds)
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 3600;

/// Default first retry delay after a failed reconcile (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default longest retry delay after repeated failures (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Path the public key is published on
pub const PUBLIC_KEY_PATH: &str = "/v1/public";

/// Timeout for fetching the public key through the API server proxy (seconds)
pub const PUBLIC_KEY_FETCH_TIMEOUT_SECS: u64 = 30;
