//! # Observability
//!
//! - `metrics`: Prometheus metrics for the reconcile loop
//! - `state_metrics`: Per-Lockbox state gauges

pub mod metrics;
pub mod state_metrics;
