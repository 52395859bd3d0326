//! # Store
//!
//! The object store the reconciler converges against, behind a capability
//! trait so reconciliation can run against the Kubernetes API or in memory.
//!
//! - `kube_store.rs` - `KubeSecretStore`, backed by `kube::Api`
//! - `memory.rs` - `MemoryStore`, an in-memory store with resource versions

mod kube_store;
mod memory;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

use crate::crd::LockboxStatus;

pub use kube_store::KubeSecretStore;
pub use memory::MemoryStore;

/// Errors raised by the object store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} {name} was modified concurrently")]
    Conflict { kind: &'static str, name: String },

    #[error("Kubernetes API error: {message}")]
    Api { message: String },
}

impl StoreError {
    pub(crate) fn from_kube(err: kube::Error, kind: &'static str, name: &str) -> Self {
        match err {
            kube::Error::Api(response) => match (response.code, response.reason.as_str()) {
                (404, _) => Self::NotFound {
                    kind,
                    name: name.to_string(),
                },
                (409, "AlreadyExists") => Self::AlreadyExists {
                    kind,
                    name: name.to_string(),
                },
                (409, _) => Self::Conflict {
                    kind,
                    name: name.to_string(),
                },
                _ => Self::Api {
                    message: response.message.clone(),
                },
            },
            other => Self::Api {
                message: other.to_string(),
            },
        }
    }
}

/// Object store operations needed to converge a Lockbox into its Secret.
///
/// Implementations must be safe to share across concurrent reconciles.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a Secret, `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, StoreError>;

    /// Replace a Secret, conditioned on the `resourceVersion` it carries
    async fn replace_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, StoreError>;

    /// Persist a Lockbox status through the status subresource
    async fn update_lockbox_status(
        &self,
        namespace: &str,
        name: &str,
        status: &LockboxStatus,
    ) -> Result<(), StoreError>;
}
