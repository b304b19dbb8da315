//! Single consumer of the delivery queue.
//!
//! The worker owns the [`ResourceController`] for as long as it runs, so transitions
//! are applied strictly one after another. Backend calls may block on the audio
//! device, so each one runs on the blocking pool with the controller moved in and
//! back out. When the worker stops it hands the controller back through its join
//! handle, which lets the session reconnect later.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stillcue_awareness::{Delivery, WeakDeliverySink};
use stillcue_events::{
    emit_event, event_names, EventBusRef, NotificationEvent, PhaseChangedEvent,
};
use stillcue_fence::{FenceError, NormalizedTransition, Normalizer};
use stillcue_player::{Outcome, Phase, ResourceController};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observable progress of the transition worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub phase: Phase,
    /// Deliveries taken off the queue, whatever became of them.
    pub deliveries_received: u64,
    /// Deliveries discarded: receiver detached or not recognized.
    pub deliveries_rejected: u64,
    /// Start notifications emitted.
    pub notifications: u64,
}

pub(crate) struct WorkerContext {
    pub rx: mpsc::Receiver<Delivery>,
    pub normalizer: Normalizer,
    pub controller: ResourceController,
    pub bus: EventBusRef,
    pub attached: Arc<AtomicBool>,
    pub status: Arc<watch::Sender<SessionStatus>>,
}

pub(crate) struct Worker {
    cancel: CancellationToken,
    queue: WeakDeliverySink,
    join: JoinHandle<Option<ResourceController>>,
}

impl Worker {
    /// Spawn the consumer. `queue` observes the sending half held by the provider.
    pub fn spawn(ctx: WorkerContext, queue: WeakDeliverySink) -> Self {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(run(ctx, cancel.child_token()));
        Self {
            cancel,
            queue,
            join,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// False once the task has exited or the provider dropped its sink.
    pub fn is_live(&self) -> bool {
        !self.join.is_finished() && self.queue.has_senders()
    }

    /// Cancel and wait for the controller to come back.
    pub async fn stop(self) -> Option<ResourceController> {
        self.cancel.cancel();
        match self.join.await {
            Ok(controller) => controller,
            Err(e) => {
                tracing::error!(error = %e, "transition worker panicked, audio controller lost");
                None
            }
        }
    }
}

/// Whether a delivery reaches the controller.
enum Admission {
    Rejected,
    Ignored,
    Transition(NormalizedTransition),
}

async fn run(ctx: WorkerContext, cancel: CancellationToken) -> Option<ResourceController> {
    let WorkerContext {
        mut rx,
        normalizer,
        mut controller,
        bus,
        attached,
        status,
    } = ctx;

    tracing::info!(action = normalizer.action(), "transition worker started");

    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("transition worker cancelled");
                break;
            }
            delivery = rx.recv() => delivery,
        };

        let Some(delivery) = delivery else {
            tracing::info!("delivery queue closed, stopping worker");
            break;
        };

        let accepted = match admit(&delivery, &normalizer, &attached) {
            Admission::Rejected => None,
            Admission::Ignored => Some(Outcome::Unchanged),
            Admission::Transition(transition) => {
                let (returned, outcome) = apply_blocking(controller, transition).await?;
                controller = returned;
                Some(outcome)
            }
        };
        let notified = publish(&bus, &mut controller, accepted);

        status.send_modify(|s| {
            s.phase = controller.phase();
            s.deliveries_received += 1;
            if accepted.is_none() {
                s.deliveries_rejected += 1;
            }
            if notified {
                s.notifications += 1;
            }
        });
    }

    let mut controller = shutdown_blocking(controller).await?;
    publish(&bus, &mut controller, None);
    status.send_modify(|s| s.phase = controller.phase());

    tracing::info!("transition worker stopped");
    Some(controller)
}

/// Check attachment and normalize one delivery.
fn admit(delivery: &Delivery, normalizer: &Normalizer, attached: &AtomicBool) -> Admission {
    let key = &delivery.state.fence_key;

    if !attached.load(Ordering::Acquire) {
        tracing::debug!(%key, "receiver detached, delivery discarded");
        return Admission::Rejected;
    }

    match normalizer.normalize(delivery) {
        Ok(Some(transition)) => {
            tracing::debug!(
                condition = %transition.condition,
                started = transition.started,
                "fence transition"
            );
            Admission::Transition(transition)
        }
        Ok(None) => {
            tracing::debug!(%key, "fence state unknown, ignored");
            Admission::Ignored
        }
        Err(FenceError::Protocol(reason)) => {
            tracing::warn!(%key, %reason, "unrecognized delivery dropped");
            Admission::Rejected
        }
        Err(e) => {
            tracing::warn!(%key, error = %e, "delivery dropped");
            Admission::Rejected
        }
    }
}

/// Apply `transition` on the blocking pool. `None` means the controller was lost.
async fn apply_blocking(
    mut controller: ResourceController,
    transition: NormalizedTransition,
) -> Option<(ResourceController, Outcome)> {
    let joined = tokio::task::spawn_blocking(move || {
        // Controller errors leave the session idle and are already logged.
        let outcome = controller.apply(transition).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "transition abandoned");
            Outcome::Unchanged
        });
        (controller, outcome)
    })
    .await;

    match joined {
        Ok(pair) => Some(pair),
        Err(e) => {
            tracing::error!(error = %e, "audio transition panicked, stopping worker");
            None
        }
    }
}

async fn shutdown_blocking(mut controller: ResourceController) -> Option<ResourceController> {
    let joined = tokio::task::spawn_blocking(move || {
        controller.shutdown();
        controller
    })
    .await;

    match joined {
        Ok(controller) => Some(controller),
        Err(e) => {
            tracing::error!(error = %e, "audio shutdown panicked");
            None
        }
    }
}

/// Emit phase changes and, for a start, the user notification.
fn publish(bus: &EventBusRef, controller: &mut ResourceController, outcome: Option<Outcome>) -> bool {
    for change in controller.drain_phase_changes() {
        emit_event(
            bus.as_ref(),
            event_names::PHASE_CHANGED,
            &PhaseChangedEvent {
                from: change.from.to_string(),
                to: change.to.to_string(),
            },
        );
    }

    match outcome {
        Some(Outcome::Started { label }) => {
            emit_event(bus.as_ref(), event_names::NOTIFICATION, &NotificationEvent::new(label));
            true
        }
        Some(Outcome::Stopped { label }) => {
            tracing::debug!(label, "cue stopped without notification");
            false
        }
        _ => false,
    }
}
