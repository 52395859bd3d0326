//! # Lockbox Spec
//!
//! A Lockbox carries Secret data encrypted to a single peer key, together with
//! the sender key needed to open it and an encrypted copy of the namespace it
//! was locked for.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::LockboxStatus;

/// Lockbox Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: lockbox.k8s.cloudflare.com/v1
/// kind: Lockbox
/// metadata:
///   name: example
///   namespace: example
/// spec:
///   sender: sqMPhQpYz5RMYjfU7/XtEVL6G8OwTSfVWGdhZ+AQsVw=
///   peer: akK5/CsBH7iMAXQUg+O//kVb2rGuNdC7U6PADUBtiDY=
///   namespace: TaBzi5XD1GTpqw23HgUQ7UwvimZt7Hxdm6e3iEmKuX/wMOCtSXw/4xwu6bEqcCg=
///   data:
///     test: e8oykPeXOwb7fNw6JYIp350eRo3UmUkCY1ZUZK6e8sA19fHLZ7fisRRCcQw=
///   template:
///     type: Opaque
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Lockbox",
    group = "lockbox.k8s.cloudflare.com",
    version = "v1",
    namespaced,
    status = "LockboxStatus",
    shortname = "lb",
    printcolumn = r#"{"name":"SecretType", "type":"string", "jsonPath":".spec.template.type"}, {"name":"Peer", "type":"string", "jsonPath":".spec.peer"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LockboxSpec {
    /// Public key used to lock this Lockbox
    #[schemars(with = "String")]
    pub sender: ByteString,
    /// Public key able to unlock this Lockbox
    #[schemars(with = "String")]
    pub peer: ByteString,
    /// Encrypted name of the namespace this Lockbox is locked for, so it cannot
    /// be replayed into a namespace under an attacker's control
    #[schemars(with = "String")]
    pub namespace: ByteString,
    /// Secret data, each value encrypted to the peer's public key
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, String>")]
    pub data: BTreeMap<String, ByteString>,
    /// Structure of the Secret created from this Lockbox
    #[serde(default)]
    pub template: LockboxSecretTemplate,
}

/// API metadata and type of Secrets controlled by a Lockbox
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct LockboxSecretTemplate {
    #[serde(default, skip_serializing_if = "LockboxSecretTemplateMetadata::is_empty")]
    pub metadata: LockboxSecretTemplateMetadata,
    /// Secret type, e.g. `Opaque` or `kubernetes.io/dockerconfigjson`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct LockboxSecretTemplateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl LockboxSecretTemplateMetadata {
    pub fn is_empty(&self) -> bool {
        self.labels.is_none() && self.annotations.is_none()
    }
}
