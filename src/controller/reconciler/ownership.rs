//! # Ownership
//!
//! Controller references between a Lockbox and the Secret it manages.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::crd::Lockbox;

/// Controller reference pointing at `lockbox`
pub fn controller_reference(lockbox: &Lockbox) -> OwnerReference {
    OwnerReference {
        api_version: Lockbox::api_version(&()).to_string(),
        kind: Lockbox::kind(&()).to_string(),
        name: lockbox.metadata.name.clone().unwrap_or_default(),
        uid: lockbox.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// The owner reference with controller authority, if any
pub fn controller_of(secret: &Secret) -> Option<&OwnerReference> {
    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .find(|r| r.controller == Some(true))
}

fn group(api_version: &str) -> &str {
    api_version.rsplit_once('/').map_or("", |(group, _)| group)
}

/// Whether two references point at the same object, ignoring version and uid
pub fn refers_to_same_object(a: &OwnerReference, b: &OwnerReference) -> bool {
    group(&a.api_version) == group(&b.api_version) && a.kind == b.kind && a.name == b.name
}

/// Add `owner` to the Secret, replacing any reference to the same object
pub fn upsert_owner_reference(secret: &mut Secret, owner: OwnerReference) {
    let refs = secret.metadata.owner_references.get_or_insert_with(Vec::new);
    match refs.iter_mut().find(|r| refers_to_same_object(r, &owner)) {
        Some(existing) => *existing = owner,
        None => refs.push(owner),
    }
}
