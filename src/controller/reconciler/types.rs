//! # Types
//!
//! Core types for the reconciler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::conditions;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::EventSink;
use crate::controller::store::{SecretStore, StoreError};
use crate::crd::{Condition, ConditionSeverity, READY_CONDITION};
use crate::crypto::{CryptoError, KeyPair, KEY_SIZE};
use crate::lockbox::UnlockError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("incorrect {which} key length: {actual}, should be {KEY_SIZE}")]
    InvalidKeyLength { which: &'static str, actual: usize },

    #[error("unknown peer key {peer}")]
    UnknownPeerKey { peer: String },

    #[error("unable to open lockbox with peer key {peer}: {source}")]
    InvalidLockbox {
        peer: String,
        #[source]
        source: CryptoError,
    },

    #[error("incorrect namespace: {found}, should be {expected}")]
    InvalidNamespace { found: String, expected: String },

    #[error(transparent)]
    Unlock(#[from] UnlockError),

    #[error("Object {namespace}/{name} is already owned by another {kind} controller {owner}")]
    OwnershipConflict {
        namespace: String,
        name: String,
        kind: String,
        owner: String,
    },

    #[error("Lockbox has no {0}")]
    MissingMetadata(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Condition reason, also used as the event reason and error metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidKeyLength { .. } => "InvalidKeyLength",
            Self::UnknownPeerKey { .. } => "UnknownPeerKey",
            Self::InvalidLockbox { .. } | Self::Unlock(_) | Self::MissingMetadata(_) => {
                "InvalidLockbox"
            }
            Self::InvalidNamespace { .. } => "InvalidNamespace",
            Self::OwnershipConflict { .. } => "OwnershipConflict",
            Self::Store(_) => "SecretSyncFailed",
        }
    }

    pub fn severity(&self) -> ConditionSeverity {
        match self {
            Self::InvalidKeyLength { .. }
            | Self::UnknownPeerKey { .. }
            | Self::InvalidLockbox { .. }
            | Self::MissingMetadata(_) => ConditionSeverity::Error,
            Self::InvalidNamespace { .. }
            | Self::Unlock(_)
            | Self::OwnershipConflict { .. }
            | Self::Store(_) => ConditionSeverity::Warning,
        }
    }

    /// Message shown to users in the condition and the event
    pub fn message(&self) -> String {
        match self {
            Self::InvalidKeyLength { which, actual } => {
                format!("invalid {which} key length, got {actual} wanted {KEY_SIZE}")
            }
            Self::UnknownPeerKey { peer } => format!("lockbox has unknown peer key {peer:?}"),
            Self::InvalidLockbox { peer, .. } => {
                format!("unable to open lockbox with peer key {peer:?}")
            }
            Self::InvalidNamespace { found, expected } => {
                format!("locked for namespace {found:?}, found in namespace {expected}")
            }
            Self::Store(e) => format!("unable to sync Secret: {e}"),
            other => other.to_string(),
        }
    }

    /// `Ready=False` condition describing this failure
    pub fn condition(&self) -> Condition {
        conditions::false_condition(READY_CONDITION, self.severity(), self.reason(), self.message())
    }
}

/// What a successful reconcile did to the Secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl Outcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
        }
    }
}

/// Unlocks Lockboxes addressed to a single key pair into Secrets
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) keypair: Arc<KeyPair>,
    pub(crate) store: Arc<dyn SecretStore>,
    pub(crate) events: Arc<dyn EventSink>,
}

impl Reconciler {
    pub fn new(keypair: Arc<KeyPair>, store: Arc<dyn SecretStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            keypair,
            store,
            events,
        }
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("public_key", &self.keypair.public)
            .finish_non_exhaustive()
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared state handed to every kube-runtime reconcile and error policy call
#[derive(Debug)]
pub struct Context {
    pub reconciler: Reconciler,
    /// Requeue interval after a successful reconcile
    pub sync_period: Duration,
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    /// Backoff state per resource (identified by namespace/name)
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Context {
    pub fn new(reconciler: Reconciler, sync_period: Duration) -> Self {
        Self {
            reconciler,
            sync_period,
            backoff_min_minutes: 1,
            backoff_max_minutes: 10,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, min_minutes: u64, max_minutes: u64) -> Self {
        self.backoff_min_minutes = min_minutes;
        self.backoff_max_minutes = max_minutes;
        self
    }

    /// Key of a Lockbox in `backoff_states`
    pub fn backoff_key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }

    /// Forget the retry history of a Lockbox that reconciled or was deleted
    pub fn clear_backoff(&self, namespace: &str, name: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&Self::backoff_key(namespace, name));
    }
}
