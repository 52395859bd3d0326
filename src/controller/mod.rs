//! # Controller
//!
//! Core controller modules for the Lockbox controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `events`: Event sinks used to report failures on a Lockbox
//! - `reconciler`: Core reconciliation logic
//! - `store`: Object store capability and its Kubernetes and in-memory implementations

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod store;
