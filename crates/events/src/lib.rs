//! Shared event contracts between the session core and its host.
//!
//! Using shared types keeps producers and consumers agreeing on field names.
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{
    emit_event, EmittedEvent, EventBus, EventBusRef, InMemoryEventBus, NullEventBus,
    TracingEventBus,
};

use serde::{Deserialize, Serialize};
use stillcue_awareness::{DetectedActivity, Weather};

/// User-visible notification.
///
/// Producers: session transition worker
/// Consumers: host UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub text: String,
    #[serde(default)]
    pub ts_ms: Option<i64>,
}

impl NotificationEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ts_ms: Some(chrono::Utc::now().timestamp_millis()),
        }
    }
}

/// Audio session moved between phases.
///
/// Producers: session transition worker
/// Consumers: host UI, logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChangedEvent {
    pub from: String,
    pub to: String,
}

/// Outcome of a fence registration or removal.
///
/// Producers: session lifecycle
/// Consumers: host UI, logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    pub success: bool,
    /// Fence keys the request covered.
    pub keys: Vec<String>,
    /// True for removals.
    #[serde(default)]
    pub removal: bool,
    #[serde(default)]
    pub status: Option<String>,
}

/// Result of a one-shot activity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySnapshotEvent {
    pub activity: DetectedActivity,
    /// Human-readable rendering shown to the user.
    pub label: String,
}

impl From<DetectedActivity> for ActivitySnapshotEvent {
    fn from(activity: DetectedActivity) -> Self {
        Self {
            label: activity.to_string(),
            activity,
        }
    }
}

/// Result of a one-shot weather query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshotEvent {
    pub weather: Weather,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// User-visible notification.
    pub const NOTIFICATION: &str = "cue:notification";
    /// Audio session phase change.
    pub const PHASE_CHANGED: &str = "cue:phase_changed";
    /// Fence registration result.
    pub const REGISTRATION: &str = "fence:registration";
    /// Activity snapshot.
    pub const SNAPSHOT_ACTIVITY: &str = "snapshot:activity";
    /// Weather snapshot.
    pub const SNAPSHOT_WEATHER: &str = "snapshot:weather";
}
