use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity kinds reported by the detection provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    InVehicle,
    OnBicycle,
    OnFoot,
    Running,
    Still,
    Tilting,
    Unknown,
    Walking,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::InVehicle => "IN_VEHICLE",
            ActivityKind::OnBicycle => "ON_BICYCLE",
            ActivityKind::OnFoot => "ON_FOOT",
            ActivityKind::Running => "RUNNING",
            ActivityKind::Still => "STILL",
            ActivityKind::Tilting => "TILTING",
            ActivityKind::Unknown => "UNKNOWN",
            ActivityKind::Walking => "WALKING",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most probable activity with the provider's confidence (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedActivity {
    pub kind: ActivityKind,
    pub confidence: u8,
}

impl DetectedActivity {
    pub fn new(kind: ActivityKind, confidence: u8) -> Self {
        Self {
            kind,
            confidence: confidence.min(100),
        }
    }
}

impl fmt::Display for DetectedActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectedActivity [type={}, confidence={}]",
            self.kind, self.confidence
        )
    }
}

/// Predicate over the activity stream that the provider evaluates.
///
/// `Starting(kind)` is true for the evaluation in which the user enters `kind`;
/// `Stopping(kind)` is true for the evaluation in which the user leaves it.
/// Both fall back to false on the next evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "edge", content = "activity", rename_all = "snake_case")]
pub enum ActivityFence {
    Starting(ActivityKind),
    Stopping(ActivityKind),
}

impl ActivityFence {
    /// Evaluate the fence for a change from `previous` to `current`.
    pub fn evaluate(&self, previous: Option<ActivityKind>, current: ActivityKind) -> bool {
        match *self {
            ActivityFence::Starting(kind) => current == kind && previous != Some(kind),
            ActivityFence::Stopping(kind) => previous == Some(kind) && current != kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_label() {
        let activity = DetectedActivity::new(ActivityKind::Still, 92);
        assert_eq!(
            activity.to_string(),
            "DetectedActivity [type=STILL, confidence=92]"
        );
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(DetectedActivity::new(ActivityKind::Walking, 250).confidence, 100);
    }

    #[test]
    fn test_starting_fence_fires_on_entry_only() {
        let fence = ActivityFence::Starting(ActivityKind::Still);
        assert!(fence.evaluate(None, ActivityKind::Still));
        assert!(fence.evaluate(Some(ActivityKind::Walking), ActivityKind::Still));
        assert!(!fence.evaluate(Some(ActivityKind::Still), ActivityKind::Still));
        assert!(!fence.evaluate(Some(ActivityKind::Still), ActivityKind::Walking));
    }

    #[test]
    fn test_stopping_fence_fires_on_exit_only() {
        let fence = ActivityFence::Stopping(ActivityKind::Still);
        assert!(fence.evaluate(Some(ActivityKind::Still), ActivityKind::Running));
        assert!(!fence.evaluate(None, ActivityKind::Running));
        assert!(!fence.evaluate(Some(ActivityKind::Still), ActivityKind::Still));
        assert!(!fence.evaluate(Some(ActivityKind::Walking), ActivityKind::Running));
    }
}
