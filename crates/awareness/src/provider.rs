//! Provider trait for the external detection service.
//!
//! Abstracts the platform service so the fence and snapshot logic stay testable.

use crate::{DeliverySink, DetectedActivity, FenceUpdateRequest, Status, Weather};
use async_trait::async_trait;
use std::sync::Arc;

/// Asynchronous detection service.
///
/// Every method returns without blocking the caller; results arrive when the
/// future resolves, possibly on another worker thread.
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    /// Establish the connection. Fence deliveries are pushed into `sink` from now on.
    async fn connect(&self, sink: DeliverySink) -> crate::Result<()>;

    /// Tear down the connection. Registered fences stop delivering.
    async fn disconnect(&self);

    /// Apply a batch of fence additions and removals.
    async fn update_fences(&self, request: FenceUpdateRequest) -> Status;

    /// Current most probable activity.
    async fn detected_activity(&self) -> crate::Result<DetectedActivity>;

    /// Current weather. Callers must hold the location capability.
    async fn weather(&self) -> crate::Result<Weather>;
}

pub type DetectionProviderRef = Arc<dyn DetectionProvider>;
