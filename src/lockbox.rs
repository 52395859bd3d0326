//! # Lockbox
//!
//! Sealing a Secret into a Lockbox, and unlocking a Lockbox back into a Secret.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use thiserror::Error;

use crate::crd::{Lockbox, LockboxSecretTemplate, LockboxSecretTemplateMetadata, LockboxSpec};
use crate::crypto::{self, CryptoError, KeyPair, KeyPairError, PublicKey, SecretKey};

/// Type the API server assigns to a Secret created without one
pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

fn non_empty<V>(map: Option<BTreeMap<String, V>>) -> Option<BTreeMap<String, V>> {
    map.filter(|m| !m.is_empty())
}

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("invalid sender key: {0}")]
    Sender(#[from] KeyPairError),

    #[error("namespace could not be unlocked: {0}")]
    Namespace(#[source] CryptoError),

    #[error("lockbox contained key {key:?} that could not be unlocked")]
    Key {
        key: String,
        #[source]
        source: CryptoError,
    },
}

impl Lockbox {
    /// Create a Lockbox wrapping `secret`, each value sealed individually for `peer`.
    ///
    /// `stringData` entries are folded into `data` and win on collision, the same
    /// way the API server merges them.
    pub fn new_from_secret(
        secret: &Secret,
        namespace: &str,
        peer: &PublicKey,
        sender: &KeyPair,
    ) -> Result<Self, CryptoError> {
        let seal = |plaintext: &[u8]| crypto::seal(plaintext, peer, &sender.private).map(ByteString);

        let mut data = BTreeMap::new();
        for (key, value) in secret.data.iter().flatten() {
            data.insert(key.clone(), seal(&value.0)?);
        }
        for (key, value) in secret.string_data.iter().flatten() {
            data.insert(key.clone(), seal(value.as_bytes())?);
        }

        let spec = LockboxSpec {
            sender: ByteString(sender.public.as_bytes().to_vec()),
            peer: ByteString(peer.as_bytes().to_vec()),
            namespace: seal(namespace.as_bytes())?,
            data,
            template: LockboxSecretTemplate {
                metadata: LockboxSecretTemplateMetadata {
                    labels: secret.metadata.labels.clone(),
                    annotations: secret.metadata.annotations.clone(),
                },
                type_: secret.type_.clone(),
            },
        };

        Ok(Self {
            metadata: ObjectMeta {
                name: secret.metadata.name.clone(),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            spec,
            status: None,
        })
    }

    pub fn sender_key(&self) -> Result<PublicKey, KeyPairError> {
        PublicKey::from_slice(&self.spec.sender.0)
    }

    pub fn peer_key(&self) -> Result<PublicKey, KeyPairError> {
        PublicKey::from_slice(&self.spec.peer.0)
    }

    /// Open the sealed namespace this Lockbox is bound to
    pub fn open_namespace(&self, private: &SecretKey) -> Result<Vec<u8>, UnlockError> {
        let sender = self.sender_key()?;
        crypto::open(&self.spec.namespace.0, &sender, private).map_err(UnlockError::Namespace)
    }

    /// Unlock every value into `secret`, overwriting its data, type, labels and annotations.
    ///
    /// Nothing is written to `secret` unless every value opens.
    pub fn unlock_into(&self, secret: &mut Secret, private: &SecretKey) -> Result<(), UnlockError> {
        let sender = self.sender_key()?;

        let mut data = BTreeMap::new();
        for (key, sealed) in &self.spec.data {
            let value = crypto::open(&sealed.0, &sender, private).map_err(|source| {
                UnlockError::Key {
                    key: key.clone(),
                    source,
                }
            })?;
            data.insert(key.clone(), ByteString(value));
        }

        // Shaped the way the API server stores Secrets, so an unchanged Secret compares equal
        secret.data = non_empty(Some(data));
        secret.type_ = Some(
            self.spec
                .template
                .type_
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| SECRET_TYPE_OPAQUE.to_string()),
        );
        secret.metadata.labels = non_empty(self.spec.template.metadata.labels.clone());
        secret.metadata.annotations = non_empty(self.spec.template.metadata.annotations.clone());
        Ok(())
    }
}
