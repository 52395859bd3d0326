//! # Reconciler
//!
//! Core reconciliation logic for `Lockbox` resources.
//!
//! The reconciler:
//! - Validates the Lockbox keys and checks it is addressed to this controller
//! - Verifies the Lockbox has not been moved out of the namespace it was sealed for
//! - Unlocks every value into a Secret controlled by the Lockbox
//! - Refuses to touch Secrets controlled by anything else
//! - Records the outcome as the `Ready` condition and as Kubernetes Events

mod ownership;
mod reconcile;
mod types;

pub use ownership::{controller_of, controller_reference};
pub use reconcile::reconcile;
pub use types::{BackoffState, Context, Outcome, ReconcileError, Reconciler};
