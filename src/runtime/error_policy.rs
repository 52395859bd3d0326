//! # Error Policy
//!
//! Requeue policy for Lockboxes whose reconcile failed.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use kube_runtime::controller::Action;
use tracing::{error, info};

use crate::controller::reconciler::{BackoffState, Context, ReconcileError};
use crate::crd::Lockbox;
use crate::observability::metrics;

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one broken Lockbox does not slow
/// down retries of the others. A successful reconcile clears the state.
pub fn handle_reconciliation_error(
    obj: Arc<Lockbox>,
    error: &ReconcileError,
    ctx: Arc<Context>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    error!(
        lockbox.namespace = namespace,
        lockbox.name = name,
        reason = error.reason(),
        "Reconciliation error: {}",
        error
    );
    metrics::increment_reconciliation_errors(error.reason());

    let (backoff_seconds, error_count) = {
        let mut states = ctx
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(Context::backoff_key(namespace, name))
            .or_insert_with(|| BackoffState::new(ctx.backoff_min_minutes, ctx.backoff_max_minutes));
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    };

    info!(
        lockbox.namespace = namespace,
        lockbox.name = name,
        error_count,
        "Retrying with Fibonacci backoff in {}s",
        backoff_seconds
    );
    metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}
