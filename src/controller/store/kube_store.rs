use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

use super::{SecretStore, StoreError};
use crate::crd::{Lockbox, LockboxStatus};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "lockbox-controller";

/// Production store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.secrets(namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", name))
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, StoreError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        let created = self
            .secrets(namespace)
            .create(&params, &secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", &name))?;
        debug!(namespace, name = %name, "created Secret");
        Ok(created)
    }

    async fn replace_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, StoreError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        let replaced = self
            .secrets(namespace)
            .replace(&name, &params, &secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", &name))?;
        debug!(namespace, name = %name, "updated Secret");
        Ok(replaced)
    }

    async fn update_lockbox_status(
        &self,
        namespace: &str,
        name: &str,
        status: &LockboxStatus,
    ) -> Result<(), StoreError> {
        let api: Api<Lockbox> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": status
        });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| StoreError::from_kube(e, "Lockbox", name))?;
        Ok(())
    }
}
