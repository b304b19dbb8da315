//! Fence deliveries pushed from the provider to the host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Raw fence state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    True,
    False,
    Unknown,
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriState::True => f.write_str("TRUE"),
            TriState::False => f.write_str("FALSE"),
            TriState::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Snapshot of one fence at the moment it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FenceState {
    pub fence_key: String,
    pub current_state: TriState,
    #[serde(default = "unknown_state")]
    pub previous_state: TriState,
    /// Milliseconds since epoch of the provider's last evaluation.
    #[serde(default)]
    pub last_updated_ms: i64,
}

fn unknown_state() -> TriState {
    TriState::Unknown
}

impl FenceState {
    pub fn new(fence_key: impl Into<String>, current_state: TriState) -> Self {
        Self {
            fence_key: fence_key.into(),
            current_state,
            previous_state: TriState::Unknown,
            last_updated_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Address the provider notifies when a fence changes.
///
/// Every registration gets its own target so the two conditions never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryTarget {
    /// Receiver action the host filters on.
    pub action: String,
    /// Distinguishes targets sharing the same action.
    pub tag: String,
}

impl DeliveryTarget {
    pub fn new(action: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            tag: tag.into(),
        }
    }
}

/// Payload the provider pushes for a fence change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub target: DeliveryTarget,
    pub state: FenceState,
}

/// Sending half handed to the provider on connect.
///
/// Deliveries are queued without blocking the provider's callback context. When
/// the queue is full the new delivery is dropped and counted.
#[derive(Clone)]
pub struct DeliverySink {
    tx: mpsc::Sender<Delivery>,
    dropped: Arc<AtomicU64>,
}

impl DeliverySink {
    /// Create a bounded sink and its receiving queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Queue a delivery. Returns false if it was dropped.
    pub fn deliver(&self, delivery: Delivery) -> bool {
        match self.tx.try_send(delivery) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(delivery)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    dropped,
                    key = %delivery.state.fence_key,
                    "delivery queue full, dropping fence update"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("delivery queue closed");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Handle that observes the sink without keeping the queue open.
    pub fn downgrade(&self) -> WeakDeliverySink {
        WeakDeliverySink {
            tx: self.tx.downgrade(),
        }
    }
}

/// Non-owning view of a [`DeliverySink`].
#[derive(Clone)]
pub struct WeakDeliverySink {
    tx: mpsc::WeakSender<Delivery>,
}

impl WeakDeliverySink {
    /// True while some clone of the sink is still held, typically by the provider.
    pub fn has_senders(&self) -> bool {
        self.tx.upgrade().is_some()
    }
}
