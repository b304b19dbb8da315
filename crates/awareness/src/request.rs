use crate::{ActivityFence, DeliveryTarget};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One fence to add, keyed by a stable string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FenceRegistration {
    pub key: String,
    pub fence: ActivityFence,
    pub target: DeliveryTarget,
}

/// Atomic batch of fence additions and removals.
///
/// The provider applies either the whole batch or nothing. Adding a key that is
/// already registered replaces the previous registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FenceUpdateRequest {
    pub add: Vec<FenceRegistration>,
    pub remove: Vec<String>,
}

impl FenceUpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fence(
        mut self,
        key: impl Into<String>,
        fence: ActivityFence,
        target: DeliveryTarget,
    ) -> Self {
        self.add.push(FenceRegistration {
            key: key.into(),
            fence,
            target,
        });
        self
    }

    pub fn remove_fence(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Result status of a provider request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
}

impl Status {
    pub const SUCCESS: i32 = 0;
    pub const INTERNAL_ERROR: i32 = 8;
    pub const API_NOT_CONNECTED: i32 = 17;

    pub fn ok() -> Self {
        Self {
            success: true,
            code: Self::SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "Status{{code={}, message={}}}", self.code, message),
            None => write!(f, "Status{{code={}}}", self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActivityKind;

    #[test]
    fn test_builder_collects_adds_and_removes() {
        let request = FenceUpdateRequest::new()
            .add_fence(
                "start",
                ActivityFence::Starting(ActivityKind::Still),
                DeliveryTarget::new("a", "start"),
            )
            .remove_fence("stop");

        assert_eq!(request.add.len(), 1);
        assert_eq!(request.add[0].key, "start");
        assert_eq!(request.remove, vec!["stop".to_string()]);
        assert!(!request.is_empty());
        assert!(FenceUpdateRequest::new().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::ok().to_string(), "Status{code=0}");
        assert_eq!(
            Status::error(Status::INTERNAL_ERROR, "boom").to_string(),
            "Status{code=8, message=boom}"
        );
    }
}
