//! Shared fixtures for the scenario tests.
//!
//! The Lockbox below was sealed by the reference Go implementation with
//! `nacl/box`, so unlocking it proves wire compatibility.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use lockbox_controller::controller::events::RecordingEventSink;
use lockbox_controller::controller::reconciler::Reconciler;
use lockbox_controller::controller::store::MemoryStore;
use lockbox_controller::crd::Lockbox;
use lockbox_controller::crypto::KeyPair;

pub const PUBLIC_HEX: &str = "6a42b9fc2b011fb88c01741483e3bffe455bdab1ae35d0bb53a3c00d406d8836";
pub const PRIVATE_HEX: &str = "252173f975f0a0ddb198a7e5958c074203a0e9f44275e0b840f95d456c4acc2e";

pub const FIXTURE_LOCKBOX: &str = "\
apiVersion: lockbox.k8s.cloudflare.com/v1
kind: Lockbox
metadata:
  name: example
  namespace: example
  labels:
    type: lockbox
  annotations:
    helm.sh/hook: pre-install
spec:
  sender: sqMPhQpYz5RMYjfU7/XtEVL6G8OwTSfVWGdhZ+AQsVw=
  peer: akK5/CsBH7iMAXQUg+O//kVb2rGuNdC7U6PADUBtiDY=
  namespace: TaBzi5XD1GTpqw23HgUQ7UwvimZt7Hxdm6e3iEmKuX/wMOCtSXw/4xwu6bEqcCg=
  template:
    metadata:
      labels:
        type: secret
      annotations:
        wave: ignore
    type: Opaque
  data:
    test: e8oykPeXOwb7fNw6JYIp350eRo3UmUkCY1ZUZK6e8sA19fHLZ7fisRRCcQw=
    test1: LGjtU1VV4i1xloX925Med5EtdrquRjCetmWiSf54wMttD6jrqPzAoNwEFgeg
";

pub fn fixture_keypair() -> KeyPair {
    KeyPair::from_hex(PUBLIC_HEX, PRIVATE_HEX).unwrap()
}

pub fn fixture_lockbox() -> Lockbox {
    serde_yaml::from_str(FIXTURE_LOCKBOX).unwrap()
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEventSink>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(keypair: KeyPair) -> Self {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let reconciler = Reconciler::new(Arc::new(keypair), store.clone(), events.clone());
        Self {
            store,
            events,
            reconciler,
        }
    }

    /// The Lockbox as the API server would return it after the last status write
    pub fn refreshed(&self, lockbox: &Lockbox) -> Lockbox {
        let mut lockbox = lockbox.clone();
        lockbox.status = self.store.lockbox_status(
            lockbox.metadata.namespace.as_deref().unwrap(),
            lockbox.metadata.name.as_deref().unwrap(),
        );
        lockbox
    }
}

/// A plaintext Secret named `name`
pub fn plain_secret(name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    }
}

/// Decoded `data` of a Secret as UTF-8 strings
pub fn data_of(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), String::from_utf8(v.0.clone()).unwrap()))
        .collect()
}
