//! Capability-gated snapshot queries.
//!
//! Activity queries only need a connected provider. Weather queries need the
//! location capability; without it the query is deferred until the grant arrives
//! and replayed exactly once.

mod capability;
mod gate;

pub use capability::{
    Capability, CapabilityGate, CapabilityGateRef, GrantResult, InMemoryCapabilityGate,
};
pub use gate::{SnapshotGate, SnapshotReport};

use stillcue_awareness::ProviderError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    #[error("{0} capability not granted")]
    CapabilityDenied(Capability),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
