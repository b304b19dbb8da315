mod normalizer;
mod registry;

pub use normalizer::{normalize, Normalizer};
pub use registry::TriggerRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;
use stillcue_awareness::{ActivityFence, ActivityKind, Status};

/// The two transitions the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    EnteredSteadyState,
    ExitedSteadyState,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::EnteredSteadyState, Condition::ExitedSteadyState];

    /// Stable fence key registered with the provider.
    pub fn key(&self) -> &'static str {
        match self {
            Condition::EnteredSteadyState => "start_fence_key",
            Condition::ExitedSteadyState => "stop_fence_key",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Provider fence backing this condition for the given steady activity.
    pub fn fence(&self, steady: ActivityKind) -> ActivityFence {
        match self {
            Condition::EnteredSteadyState => ActivityFence::Starting(steady),
            Condition::ExitedSteadyState => ActivityFence::Stopping(steady),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::EnteredSteadyState => f.write_str("entered_steady_state"),
            Condition::ExitedSteadyState => f.write_str("exited_steady_state"),
        }
    }
}

/// Fence delivery collapsed to a two-state model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTransition {
    pub condition: Condition,
    pub started: bool,
}

impl NormalizedTransition {
    pub fn new(condition: Condition, started: bool) -> Self {
        Self { condition, started }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FenceError {
    #[error("fence registration rejected: {0}")]
    Registration(Status),
    #[error("unrecognized delivery: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, FenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        for condition in Condition::ALL {
            assert_eq!(Condition::from_key(condition.key()), Some(condition));
        }
        assert_eq!(Condition::from_key("fence_key"), None);
    }

    #[test]
    fn test_conditions_map_to_complementary_fences() {
        assert_eq!(
            Condition::EnteredSteadyState.fence(ActivityKind::Still),
            ActivityFence::Starting(ActivityKind::Still)
        );
        assert_eq!(
            Condition::ExitedSteadyState.fence(ActivityKind::Still),
            ActivityFence::Stopping(ActivityKind::Still)
        );
    }
}
