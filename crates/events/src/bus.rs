//! Topic-addressed event sinks.
//!
//! The core never talks to a UI directly; it emits JSON payloads on named topics
//! and whoever hosts the session decides how to present them.

use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Destination for session events.
pub trait EventBus: Send + Sync {
    /// Publish `payload` under `topic` (one of [`crate::event_names`]).
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

pub type EventBusRef = Arc<dyn EventBus>;

/// Serialize `event` and emit it on `topic`.
pub fn emit_event<T: Serialize>(bus: &dyn EventBus, topic: &str, event: &T) {
    match serde_json::to_value(event) {
        Ok(payload) => bus.emit(topic, payload),
        Err(e) => tracing::error!(topic, error = %e, "failed to serialize event"),
    }
}

#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Bus that keeps every event in emission order. Used by tests.
#[derive(Default)]
pub struct InMemoryEventBus {
    log: Mutex<Vec<EmittedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published on `topic`, oldest first.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.log
            .lock()
            .map(|log| log.iter().filter(|e| e.topic == topic).cloned().collect())
            .unwrap_or_default()
    }

    /// Topic of every event, oldest first.
    pub fn topics(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.iter().map(|e| e.topic.clone()).collect())
            .unwrap_or_default()
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        if let Ok(mut log) = self.log.lock() {
            log.push(EmittedEvent {
                topic: topic.to_string(),
                payload,
            });
        }
    }
}

/// Drops everything.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}

/// Event bus that writes every event to the log.
///
/// Used by headless hosts where the log is the only user-facing surface.
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        tracing::info!(topic, %payload, "event");
    }
}
