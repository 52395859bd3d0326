use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

use super::{SecretStore, StoreError};
use crate::crd::LockboxStatus;

type Key = (String, String);

#[derive(Debug, Default)]
struct Inner {
    secrets: HashMap<Key, Secret>,
    statuses: HashMap<Key, LockboxStatus>,
    resource_version: u64,
    secret_writes: usize,
    unavailable: bool,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Api {
                message: "store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory object store.
///
/// Every write bumps a store-wide resource version, and replacing a Secret
/// with a stale `resourceVersion` fails with [`StoreError::Conflict`], the same
/// way the API server enforces optimistic concurrency.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn secret_name(secret: &Secret) -> String {
    secret.metadata.name.clone().unwrap_or_default()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a Secret as if another actor had created it; not counted as a write
    pub fn insert_secret(&self, namespace: &str, mut secret: Secret) -> Secret {
        let mut inner = self.lock();
        secret.metadata.namespace = Some(namespace.to_string());
        secret.metadata.resource_version = Some(inner.next_version());
        inner
            .secrets
            .insert(key(namespace, &secret_name(&secret)), secret.clone());
        secret
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock().secrets.get(&key(namespace, name)).cloned()
    }

    pub fn lockbox_status(&self, namespace: &str, name: &str) -> Option<LockboxStatus> {
        self.lock().statuses.get(&key(namespace, name)).cloned()
    }

    /// Number of Secret creates and replaces that succeeded
    pub fn secret_writes(&self) -> usize {
        self.lock().secret_writes
    }

    /// Make every subsequent call fail with a transport error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let inner = self.lock();
        inner.check_available()?;
        Ok(inner.secrets.get(&key(namespace, name)).cloned())
    }

    async fn create_secret(&self, namespace: &str, mut secret: Secret) -> Result<Secret, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;

        let name = secret_name(&secret);
        let key = key(namespace, &name);
        if inner.secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: "Secret", name });
        }

        secret.metadata.namespace = Some(namespace.to_string());
        secret.metadata.resource_version = Some(inner.next_version());
        inner.secrets.insert(key, secret.clone());
        inner.secret_writes += 1;
        Ok(secret)
    }

    async fn replace_secret(&self, namespace: &str, mut secret: Secret) -> Result<Secret, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;

        let name = secret_name(&secret);
        let key = key(namespace, &name);
        let Some(current) = inner.secrets.get(&key) else {
            return Err(StoreError::NotFound { kind: "Secret", name });
        };
        if secret.metadata.resource_version.is_some()
            && secret.metadata.resource_version != current.metadata.resource_version
        {
            return Err(StoreError::Conflict { kind: "Secret", name });
        }

        secret.metadata.namespace = Some(namespace.to_string());
        secret.metadata.resource_version = Some(inner.next_version());
        inner.secrets.insert(key, secret.clone());
        inner.secret_writes += 1;
        Ok(secret)
    }

    async fn update_lockbox_status(
        &self,
        namespace: &str,
        name: &str,
        status: &LockboxStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        inner.statuses.insert(key(namespace, name), status.clone());
        Ok(())
    }
}
