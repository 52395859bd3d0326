//! # Watch Loop
//!
//! Runs the kube-runtime controller for Lockboxes, plus a separate lifecycle
//! watch that keeps the per-Lockbox state metrics in step with the cluster and
//! forgets the retry state of deleted Lockboxes.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use tracing::{debug, info, warn};

use crate::controller::reconciler::{reconcile, Context};
use crate::crd::Lockbox;
use crate::observability::state_metrics::StateMetrics;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::server::ServerState;

/// Run the controller until a shutdown signal is received
///
/// Lockboxes are watched in every namespace. Secrets controlled by a Lockbox
/// are watched too, so editing or deleting one re-triggers its Lockbox.
pub async fn run_watch_loop(client: Client, ctx: Arc<Context>, server_state: Arc<ServerState>) {
    let lockboxes: Api<Lockbox> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client);

    info!("Starting controller watch loop...");
    server_state.set_ready(true);

    Controller::new(lockboxes, watcher::Config::default())
        .owns(secrets, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(lockbox = %object, "reconciled"),
                Err(e) => warn!(error = %e, "reconcile loop error"),
            }
        })
        .await;

    server_state.set_ready(false);
    info!("Controller watch loop stopped");
}

/// Follow every Lockbox in the cluster, keeping `metrics` in step and
/// dropping the retry state of deleted Lockboxes
///
/// Series for Lockboxes that vanish while the watch is down are dropped when
/// the next relist completes.
pub async fn run_lockbox_watch(client: Client, metrics: Arc<StateMetrics>, ctx: Arc<Context>) {
    let lockboxes: Api<Lockbox> = Api::all(client);
    let mut known: HashSet<String> = HashSet::new();
    let mut relisted: HashSet<String> = HashSet::new();

    let mut events = watcher(lockboxes, watcher::Config::default()).boxed();
    loop {
        match events.try_next().await {
            Ok(Some(event)) => apply_event(&metrics, &ctx, &mut known, &mut relisted, event),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Lockbox watch error");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }
}

fn uid(lockbox: &Lockbox) -> Option<String> {
    lockbox.metadata.uid.clone()
}

fn apply_event(
    metrics: &StateMetrics,
    ctx: &Context,
    known: &mut HashSet<String>,
    relisted: &mut HashSet<String>,
    event: watcher::Event<Lockbox>,
) {
    match event {
        watcher::Event::Apply(lockbox) => {
            metrics.update(&lockbox);
            known.extend(uid(&lockbox));
        }
        watcher::Event::Delete(lockbox) => {
            if let Some(uid) = uid(&lockbox) {
                metrics.remove(&uid);
                known.remove(&uid);
            }
            ctx.clear_backoff(
                lockbox.metadata.namespace.as_deref().unwrap_or_default(),
                lockbox.metadata.name.as_deref().unwrap_or_default(),
            );
        }
        watcher::Event::Init => relisted.clear(),
        watcher::Event::InitApply(lockbox) => {
            metrics.update(&lockbox);
            relisted.extend(uid(&lockbox));
        }
        watcher::Event::InitDone => {
            for gone in known.difference(relisted) {
                metrics.remove(gone);
            }
            *known = std::mem::take(relisted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::controller::events::NoopEventSink;
    use crate::controller::reconciler::{BackoffState, Reconciler};
    use crate::controller::store::MemoryStore;
    use crate::crypto::KeyPair;

    fn lockbox(uid: &str) -> Lockbox {
        let mut lockbox = Lockbox::new(uid, Default::default());
        lockbox.metadata.namespace = Some("ns".to_string());
        lockbox.metadata.uid = Some(uid.to_string());
        lockbox
    }

    fn context() -> Context {
        let reconciler = Reconciler::new(
            Arc::new(KeyPair::generate()),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopEventSink),
        );
        Context::new(reconciler, Duration::from_secs(3600))
    }

    #[test]
    fn test_relist_drops_vanished_lockboxes() {
        let metrics = StateMetrics::new().unwrap();
        let ctx = context();
        let mut known = HashSet::new();
        let mut relisted = HashSet::new();

        for event in [
            watcher::Event::Apply(lockbox("a")),
            watcher::Event::Apply(lockbox("b")),
            watcher::Event::Init,
            watcher::Event::InitApply(lockbox("b")),
            watcher::Event::InitDone,
        ] {
            apply_event(&metrics, &ctx, &mut known, &mut relisted, event);
        }

        assert_eq!(known, HashSet::from(["b".to_string()]));
        assert_eq!(metrics.info.len(), 1);
    }

    #[test]
    fn test_delete_drops_series_and_retry_state() {
        let metrics = StateMetrics::new().unwrap();
        let ctx = context();
        let mut known = HashSet::new();
        let mut relisted = HashSet::new();
        {
            let mut states = ctx.backoff_states.lock().unwrap();
            states.insert(Context::backoff_key("ns", "a"), BackoffState::new(1, 10));
            states.insert(Context::backoff_key("ns", "b"), BackoffState::new(1, 10));
        }

        apply_event(&metrics, &ctx, &mut known, &mut relisted, watcher::Event::Apply(lockbox("a")));
        apply_event(&metrics, &ctx, &mut known, &mut relisted, watcher::Event::Delete(lockbox("a")));

        assert!(known.is_empty());
        assert!(metrics.info.is_empty());
        let states = ctx.backoff_states.lock().unwrap();
        assert!(!states.contains_key("ns/a"));
        assert!(states.contains_key("ns/b"));
    }
}
