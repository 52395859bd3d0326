//! # Reconcile
//!
//! Converges a Lockbox into the Secret of the same namespace and name.
//!
//! Steps run strictly in order and the first failure ends the pass:
//!
//! 1. `sender` and `peer` must be 32 bytes
//! 2. `peer` must be this controller's public key
//! 3. the sealed namespace must open
//! 4. the opened namespace must match the Lockbox's namespace
//! 5. the Secret is created, or patched when unowned or owned by this Lockbox
//!
//! The `Ready` condition is persisted to the Lockbox status after every pass.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube_runtime::controller::Action;
use tracing::{debug, info, warn, Instrument};

use super::ownership::{controller_of, controller_reference, refers_to_same_object, upsert_owner_reference};
use super::types::{Context, Outcome, ReconcileError, Reconciler};
use crate::conditions;
use crate::crd::{Lockbox, READY_CONDITION};
use crate::crypto::KEY_SIZE;
use crate::lockbox::UnlockError;
use crate::observability::metrics;

impl Reconciler {
    /// Run one reconcile pass for `lockbox` and persist the resulting `Ready` condition.
    ///
    /// Failures are recorded on the Lockbox before being returned. A failure to
    /// write the status is only returned when the pass itself succeeded.
    pub async fn reconcile_lockbox(&self, lockbox: &Lockbox) -> Result<Outcome, ReconcileError> {
        let namespace = lockbox
            .metadata
            .namespace
            .as_deref()
            .ok_or(ReconcileError::MissingMetadata("namespace"))?;
        let name = lockbox
            .metadata
            .name
            .as_deref()
            .ok_or(ReconcileError::MissingMetadata("name"))?;

        let result = self.sync_secret(lockbox, namespace, name).await;

        let condition = match &result {
            Ok(outcome) => {
                debug!(outcome = outcome.as_str(), "Secret in sync");
                conditions::true_condition(READY_CONDITION)
            }
            Err(e) => {
                warn!(reason = e.reason(), error = %e, "reconcile failed");
                self.events.warning(lockbox, e.reason(), &e.message()).await;
                e.condition()
            }
        };

        let mut status = lockbox.status.clone().unwrap_or_default();
        conditions::set(&mut status.conditions, condition);
        let written = self.store.update_lockbox_status(namespace, name, &status).await;

        match (result, written) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Err(status_err)) => {
                warn!(error = %status_err, "unable to update Lockbox status");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn sync_secret(
        &self,
        lockbox: &Lockbox,
        namespace: &str,
        name: &str,
    ) -> Result<Outcome, ReconcileError> {
        let spec = &lockbox.spec;
        for (which, key) in [("sender", &spec.sender), ("peer", &spec.peer)] {
            if key.0.len() != KEY_SIZE {
                return Err(ReconcileError::InvalidKeyLength {
                    which,
                    actual: key.0.len(),
                });
            }
        }

        let peer = base64::engine::general_purpose::STANDARD.encode(&spec.peer.0);
        if spec.peer.0.as_slice() != self.keypair.public.as_bytes() {
            return Err(ReconcileError::UnknownPeerKey { peer });
        }

        let opened = lockbox
            .open_namespace(&self.keypair.private)
            .map_err(|e| match e {
                UnlockError::Namespace(source) | UnlockError::Key { source, .. } => {
                    ReconcileError::InvalidLockbox { peer, source }
                }
                other => ReconcileError::Unlock(other),
            })?;
        if opened != namespace.as_bytes() {
            return Err(ReconcileError::InvalidNamespace {
                found: String::from_utf8_lossy(&opened).into_owned(),
                expected: namespace.to_string(),
            });
        }

        let owner = controller_reference(lockbox);
        let Some(current) = self.store.get_secret(namespace, name).await? else {
            let mut secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    owner_references: Some(vec![owner]),
                    ..ObjectMeta::default()
                },
                ..Secret::default()
            };
            lockbox.unlock_into(&mut secret, &self.keypair.private)?;
            self.store.create_secret(namespace, secret).await?;
            info!("created Secret");
            return Ok(Outcome::Created);
        };

        if let Some(existing) = controller_of(&current) {
            if !refers_to_same_object(existing, &owner) {
                return Err(ReconcileError::OwnershipConflict {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    kind: existing.kind.clone(),
                    owner: existing.name.clone(),
                });
            }
        }

        let mut desired = current.clone();
        upsert_owner_reference(&mut desired, owner);
        lockbox.unlock_into(&mut desired, &self.keypair.private)?;
        if desired == current {
            return Ok(Outcome::Unchanged);
        }

        self.store.replace_secret(namespace, desired).await?;
        info!("updated Secret");
        Ok(Outcome::Updated)
    }
}

/// kube-runtime entry point: reconcile and schedule the next periodic resync
pub async fn reconcile(lockbox: Arc<Lockbox>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let namespace = lockbox.metadata.namespace.clone().unwrap_or_default();
    let name = lockbox.metadata.name.clone().unwrap_or_default();
    let span = tracing::info_span!(
        "reconcile",
        lockbox.namespace = %namespace,
        lockbox.name = %name,
    );

    let started = Instant::now();
    metrics::increment_reconciliations();
    let result = ctx.reconciler.reconcile_lockbox(&lockbox).instrument(span).await;
    metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());

    let outcome = result?;
    metrics::increment_secret_sync(outcome.as_str());

    ctx.clear_backoff(&namespace, &name);
    metrics::increment_requeues_total("periodic");
    Ok(Action::requeue(ctx.sync_period))
}
