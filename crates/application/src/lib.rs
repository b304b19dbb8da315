//! Session lifecycle for the stillcue core.
//!
//! A [`Session`] owns the provider connection. On `connect` it spawns a single
//! transition worker that consumes fence deliveries in order:
//!
//! ```text
//! provider ──▶ DeliverySink ──▶ worker ──▶ Normalizer ──▶ ResourceController ──▶ audio
//!                                  │
//!                                  └──▶ EventBus (notifications, phase changes)
//! ```
//!
//! Snapshot queries run on the caller's task through the capability-gated
//! [`SnapshotGate`](stillcue_snapshot::SnapshotGate).

mod config;
mod session;
mod worker;

pub use config::{ConfigError, SessionConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_RECEIVER_ACTION};
pub use session::{Result, Session, SessionError};
pub use worker::SessionStatus;
