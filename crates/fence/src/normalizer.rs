//! Collapses raw tri-state deliveries into normalized transitions.

use crate::{Condition, FenceError, NormalizedTransition};
use stillcue_awareness::{Delivery, FenceState, TriState};

/// Map a raw fence state onto the two-state model.
///
/// `Unknown` yields `Ok(None)` for every key, known or not. A definite state with a
/// key that matches no condition is a protocol error.
pub fn normalize(state: &FenceState) -> crate::Result<Option<NormalizedTransition>> {
    let started = match state.current_state {
        TriState::True => true,
        TriState::False => false,
        TriState::Unknown => return Ok(None),
    };

    let condition = Condition::from_key(&state.fence_key)
        .ok_or_else(|| FenceError::Protocol(format!("unknown fence key '{}'", state.fence_key)))?;

    Ok(Some(NormalizedTransition::new(condition, started)))
}

/// Normalizer bound to the receiver action the session listens on.
#[derive(Debug, Clone)]
pub struct Normalizer {
    action: String,
}

impl Normalizer {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Reject deliveries addressed to another receiver, then [`normalize`].
    pub fn normalize(&self, delivery: &Delivery) -> crate::Result<Option<NormalizedTransition>> {
        if delivery.target.action != self.action {
            return Err(FenceError::Protocol(format!(
                "unexpected action '{}'",
                delivery.target.action
            )));
        }
        normalize(&delivery.state)
    }
}
