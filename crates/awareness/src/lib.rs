//! Boundary contracts for the external detection provider.
//!
//! The provider is opaque: it evaluates activity fences on its own schedule and
//! pushes a [`Delivery`] every time a registered fence changes state. It also answers
//! one-shot snapshot queries for the current activity and weather.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Layer                             │
//! │  activity.rs - Activity kinds and fence descriptors          │
//! │  weather.rs  - Weather snapshot                              │
//! │  delivery.rs - Fence state, delivery targets, delivery sink  │
//! │  request.rs  - Fence update requests and provider status     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                        │
//! │  provider.rs  - DetectionProvider trait                      │
//! │  simulated.rs - In-process provider driven by activity feed  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod activity;
mod delivery;
mod provider;
mod request;
mod simulated;
mod weather;

pub use activity::{ActivityFence, ActivityKind, DetectedActivity};
pub use delivery::{
    Delivery, DeliverySink, DeliveryTarget, FenceState, TriState, WeakDeliverySink,
};
pub use provider::{DetectionProvider, DetectionProviderRef};
pub use request::{FenceRegistration, FenceUpdateRequest, Status};
pub use simulated::SimulatedProvider;
pub use weather::{Weather, WeatherCondition};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("provider not connected")]
    NotConnected,
    #[error("no {0} snapshot available")]
    Unavailable(&'static str),
    #[error("provider request failed: {0}")]
    Failed(Status),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
