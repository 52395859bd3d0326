//! # State Metrics
//!
//! kube-state-metrics style gauges describing every Lockbox in the cluster.
//!
//! Each gauge is keyed by the Lockbox UID so that a new resource version or a
//! relabelled Lockbox replaces its previous series instead of adding another,
//! and deleting the Lockbox drops all of its series.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts, Registry};
use tracing::warn;

use crate::crd::Lockbox;

/// Gauges sharing one name, at most one per object UID
pub struct ObjectGauges {
    name: String,
    help: String,
    desc: Desc,
    gauges: Mutex<HashMap<String, Gauge>>,
}

impl ObjectGauges {
    pub fn new(name: &str, help: &str) -> prometheus::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            help: help.to_string(),
            desc: Desc::new(name.to_string(), help.to_string(), Vec::new(), HashMap::new())?,
            gauges: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the series for `uid`
    pub fn set(&self, uid: &str, labels: HashMap<String, String>, value: f64) -> prometheus::Result<()> {
        let gauge = Gauge::with_opts(Opts::new(&self.name, &self.help).const_labels(labels))?;
        gauge.set(value);
        self.gauges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uid.to_string(), gauge);
        Ok(())
    }

    pub fn delete(&self, uid: &str) {
        self.gauges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);
    }

    pub fn len(&self) -> usize {
        self.gauges.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObjectGauges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGauges")
            .field("name", &self.name)
            .field("series", &self.len())
            .finish()
    }
}

impl Collector for ObjectGauges {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flat_map(|gauge| gauge.collect())
            .collect()
    }
}

/// Replace every character Prometheus does not allow in a label name with `_`
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Turn Kubernetes labels into `label_<name>` Prometheus labels
pub fn kubernetes_labels_to_prometheus<'a>(
    labels: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> HashMap<String, String> {
    labels
        .into_iter()
        .map(|(k, v)| (format!("label_{}", sanitize_label(k)), v.clone()))
        .collect()
}

/// Per-Lockbox gauges: existence, creation time, resource version, type, peer and labels
#[derive(Debug)]
pub struct StateMetrics {
    pub info: ObjectGauges,
    pub created: ObjectGauges,
    pub resource_version: ObjectGauges,
    pub lockbox_type: ObjectGauges,
    pub peer: ObjectGauges,
    pub labels: ObjectGauges,
}

impl StateMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            info: ObjectGauges::new("kube_lockbox_info", "Information about Lockbox")?,
            created: ObjectGauges::new("kube_lockbox_created", "Unix creation timestamp")?,
            resource_version: ObjectGauges::new(
                "kube_lockbox_resource_version",
                "Resource version representing a specific version of a Lockbox",
            )?,
            lockbox_type: ObjectGauges::new("kube_lockbox_type", "Lockbox secret type")?,
            peer: ObjectGauges::new("kube_lockbox_peer", "Lockbox peer key")?,
            labels: ObjectGauges::new(
                "kube_lockbox_labels",
                "Kubernetes labels converted to Prometheus labels",
            )?,
        })
    }

    fn all(&self) -> [&ObjectGauges; 6] {
        [
            &self.info,
            &self.created,
            &self.resource_version,
            &self.lockbox_type,
            &self.peer,
            &self.labels,
        ]
    }

    /// Register every gauge family; the registry keeps its own handles
    pub fn register(self: &std::sync::Arc<Self>, registry: &Registry) -> prometheus::Result<()> {
        for index in 0..6 {
            registry.register(Box::new(Family {
                metrics: std::sync::Arc::clone(self),
                index,
            }))?;
        }
        Ok(())
    }

    /// Record the current state of `lockbox`
    pub fn update(&self, lockbox: &Lockbox) {
        if let Err(e) = self.try_update(lockbox) {
            warn!(error = %e, "unable to update Lockbox state metrics");
        }
    }

    fn try_update(&self, lockbox: &Lockbox) -> prometheus::Result<()> {
        let Some(uid) = lockbox.metadata.uid.as_deref() else {
            return Ok(());
        };
        let namespace = lockbox.metadata.namespace.clone().unwrap_or_default();
        let name = lockbox.metadata.name.clone().unwrap_or_default();
        let identity = |extra: &[(&str, String)]| {
            let mut labels = HashMap::from([
                ("namespace".to_string(), namespace.clone()),
                ("lockbox".to_string(), name.clone()),
            ]);
            labels.extend(extra.iter().map(|(k, v)| ((*k).to_string(), v.clone())));
            labels
        };

        self.info.set(uid, identity(&[]), 1.0)?;
        if let Some(created) = creation_unix_seconds(lockbox) {
            self.created.set(uid, identity(&[]), created as f64)?;
        }
        let resource_version = lockbox.metadata.resource_version.clone().unwrap_or_default();
        self.resource_version
            .set(uid, identity(&[("resource_version", resource_version)]), 1.0)?;
        let secret_type = lockbox.spec.template.type_.clone().unwrap_or_default();
        self.lockbox_type.set(uid, identity(&[("type", secret_type)]), 1.0)?;
        self.peer
            .set(uid, identity(&[("peer", hex::encode(&lockbox.spec.peer.0))]), 1.0)?;

        let mut labels = kubernetes_labels_to_prometheus(lockbox.metadata.labels.iter().flatten());
        labels.insert("namespace".to_string(), namespace.clone());
        labels.insert("lockbox".to_string(), name.clone());
        self.labels.set(uid, labels, 1.0)?;
        Ok(())
    }

    /// Drop every series of the Lockbox with `uid`
    pub fn remove(&self, uid: &str) {
        for gauges in self.all() {
            gauges.delete(uid);
        }
    }
}

/// Registry handle onto one gauge family of a shared [`StateMetrics`]
struct Family {
    metrics: std::sync::Arc<StateMetrics>,
    index: usize,
}

impl Collector for Family {
    fn desc(&self) -> Vec<&Desc> {
        let gauges: &ObjectGauges = self.metrics.all()[self.index];
        gauges.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let gauges: &ObjectGauges = self.metrics.all()[self.index];
        gauges.collect()
    }
}

fn creation_unix_seconds(lockbox: &Lockbox) -> Option<i64> {
    lockbox
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|created| created.0.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn lockbox() -> Lockbox {
        let mut lockbox = Lockbox::new("creds", Default::default());
        lockbox.metadata.namespace = Some("prod".to_string());
        lockbox.metadata.uid = Some("uid-1".to_string());
        lockbox.metadata.resource_version = Some("42".to_string());
        lockbox.metadata.labels = Some(BTreeMap::from([(
            "app.kubernetes.io/name".to_string(),
            "db".to_string(),
        )]));
        lockbox.spec.peer = ByteString(vec![0xab; 32]);
        lockbox.spec.template.type_ = Some("Opaque".to_string());
        lockbox
    }

    fn text(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        prometheus::Encoder::encode(&prometheus::TextEncoder::new(), &registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("app.kubernetes.io/name"), "app_kubernetes_io_name");
        assert_eq!(sanitize_label("tier"), "tier");
    }

    #[test]
    fn test_update_exports_every_family() {
        let registry = Registry::new();
        let metrics = std::sync::Arc::new(StateMetrics::new().unwrap());
        metrics.register(&registry).unwrap();

        metrics.update(&lockbox());
        let text = text(&registry);

        assert!(text.contains("kube_lockbox_info{lockbox=\"creds\",namespace=\"prod\"} 1"));
        assert!(text.contains("resource_version=\"42\""));
        assert!(text.contains("type=\"Opaque\""));
        assert!(text.contains(&format!("peer=\"{}\"", "ab".repeat(32))));
        assert!(text.contains("label_app_kubernetes_io_name=\"db\""));
    }

    #[test]
    fn test_new_resource_version_replaces_series() {
        let metrics = StateMetrics::new().unwrap();
        let mut lockbox = lockbox();
        metrics.update(&lockbox);
        lockbox.metadata.resource_version = Some("43".to_string());
        metrics.update(&lockbox);

        assert_eq!(metrics.resource_version.len(), 1);
    }

    #[test]
    fn test_created_gauge_is_unix_seconds() {
        let metrics = StateMetrics::new().unwrap();
        let mut lockbox = lockbox();
        lockbox.metadata.creation_timestamp =
            Some(serde_json::from_value(serde_json::json!("2023-11-14T22:13:20Z")).unwrap());

        assert_eq!(creation_unix_seconds(&lockbox), Some(1_700_000_000));
        metrics.update(&lockbox);
        assert_eq!(metrics.created.len(), 1);
    }

    #[test]
    fn test_remove_drops_all_series() {
        let metrics = StateMetrics::new().unwrap();
        metrics.update(&lockbox());
        metrics.remove("uid-1");

        assert!(metrics.all().iter().all(|g| g.is_empty()));
    }
}
