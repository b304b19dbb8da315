use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Runtime-granted permissions a query may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Location,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Location => f.write_str("location"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantResult {
    Granted,
    Denied,
}

/// Host-side permission checks and prompts.
#[async_trait]
pub trait CapabilityGate: Send + Sync {
    fn has_capability(&self, capability: Capability) -> bool;

    /// Prompt for the capability. Resolves when the user answers.
    async fn request_capability(&self, capability: Capability) -> GrantResult;
}

pub type CapabilityGateRef = Arc<dyn CapabilityGate>;

/// Capability gate with scripted answers, for tests and headless hosts.
pub struct InMemoryCapabilityGate {
    granted: Mutex<HashSet<Capability>>,
    answer: Mutex<GrantResult>,
    requests: AtomicUsize,
}

impl Default for InMemoryCapabilityGate {
    fn default() -> Self {
        Self {
            granted: Mutex::new(HashSet::new()),
            answer: Mutex::new(GrantResult::Denied),
            requests: AtomicUsize::new(0),
        }
    }
}

impl InMemoryCapabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant up front, as if the user had already accepted.
    pub fn grant(&self, capability: Capability) {
        if let Ok(mut granted) = self.granted.lock() {
            granted.insert(capability);
        }
    }

    pub fn revoke(&self, capability: Capability) {
        if let Ok(mut granted) = self.granted.lock() {
            granted.remove(&capability);
        }
    }

    /// How future prompts are answered.
    pub fn answer_requests_with(&self, result: GrantResult) {
        if let Ok(mut answer) = self.answer.lock() {
            *answer = result;
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityGate for InMemoryCapabilityGate {
    fn has_capability(&self, capability: Capability) -> bool {
        self.granted
            .lock()
            .map(|granted| granted.contains(&capability))
            .unwrap_or(false)
    }

    async fn request_capability(&self, capability: Capability) -> GrantResult {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answer
            .lock()
            .map(|a| *a)
            .unwrap_or(GrantResult::Denied);
        if answer == GrantResult::Granted {
            self.grant(capability);
        }
        tracing::debug!(%capability, ?answer, "capability prompt answered");
        answer
    }
}
