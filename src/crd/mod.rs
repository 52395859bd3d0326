//! # Custom Resource Definitions
//!
//! The `Lockbox` resource (`lockbox.k8s.cloudflare.com/v1`) and its status types.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Lockbox` CRD, sealed payload and Secret template
//! - `status.rs` - Status and condition types

mod spec;
mod status;

pub use spec::{Lockbox, LockboxSecretTemplate, LockboxSecretTemplateMetadata, LockboxSpec};
pub use status::{
    Condition, ConditionSeverity, ConditionStatus, LockboxStatus, READY_CONDITION,
};
