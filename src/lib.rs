//! # Lockbox Controller
//!
//! A Kubernetes controller that turns `Lockbox` resources into `Secret`s.
//!
//! ## Overview
//!
//! A Lockbox carries Secret data sealed with NaCl `crypto_box` for one
//! reconciling identity, so it can be committed to Git and applied by any
//! GitOps tool:
//!
//! 1. **Sealing** - `locket` seals each value and the target namespace for the controller's public key
//! 2. **Validation** - the controller checks key lengths, the peer key and the namespace binding
//! 3. **Unlocking** - every value is opened, all or nothing
//! 4. **Convergence** - the owned Secret is created or updated, and the `Ready` condition recorded
//!
//! ## Module Structure
//!
//! - `crypto` - key pairs and sealed boxes
//! - `crd` - the `Lockbox` custom resource and its status
//! - `lockbox` - sealing Secrets into Lockboxes and unlocking them again
//! - `conditions` - status condition bookkeeping
//! - `controller` - reconciler, object store and event sink
//! - `runtime` - kube-runtime wiring for the controller binary
//! - `server` - metrics, probe and public key HTTP servers
//! - `observability` - Prometheus metrics
//! - `cli` - the `locket` sealing tool

pub mod cli;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod crypto;
pub mod lockbox;
pub mod observability;
pub mod runtime;
pub mod server;

pub use crd::{Lockbox, LockboxSpec, LockboxStatus};
pub use crypto::KeyPair;
