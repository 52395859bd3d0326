//! # Events
//!
//! Kubernetes Events raised against a Lockbox when reconciliation fails.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

use crate::crd::Lockbox;

/// Name events are reported under
pub const REPORTER: &str = "lockbox";

/// Sink for human-readable events about a Lockbox
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn warning(&self, lockbox: &Lockbox, reason: &str, message: &str);
}

/// Publishes events through the Kubernetes events API
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: REPORTER.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn warning(&self, lockbox: &Lockbox, reason: &str, message: &str) {
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        // Best effort
        if let Err(e) = self.recorder.publish(&event, &lockbox.object_ref(&())).await {
            warn!(reason, error = %e, "failed to publish event");
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn warning(&self, _lockbox: &Lockbox, _reason: &str, _message: &str) {}
}

/// An event captured by [`RecordingEventSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: String,
    pub reason: String,
    pub message: String,
}

/// Keeps every event in memory so tests can assert on them
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn warning(&self, lockbox: &Lockbox, reason: &str, message: &str) {
        let object = format!(
            "{}/{}",
            lockbox.metadata.namespace.as_deref().unwrap_or_default(),
            lockbox.metadata.name.as_deref().unwrap_or_default()
        );
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                object,
                reason: reason.to_string(),
                message: message.to_string(),
            });
    }
}
