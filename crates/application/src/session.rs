use crate::worker::{SessionStatus, Worker, WorkerContext};
use crate::SessionConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stillcue_awareness::{DeliverySink, DetectionProviderRef, ProviderError, Weather};
use stillcue_events::{emit_event, event_names, EventBusRef, RegistrationEvent};
use stillcue_fence::{Condition, FenceError, Normalizer, TriggerRegistry};
use stillcue_player::{AudioBackend, Phase, ResourceController};
use stillcue_snapshot::{CapabilityGateRef, GrantResult, SnapshotGate, SnapshotReport};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("provider connection failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("audio controller lost after a worker failure")]
    ControllerLost,
}

pub type Result<T> = std::result::Result<T, SessionError>;

struct Lifecycle {
    /// Parked here while no worker runs.
    controller: Option<ResourceController>,
    worker: Option<Worker>,
}

/// Top-level object owning the provider connection for one host lifetime.
///
/// `connect` / `disconnect` bracket the connection. In between, `stop` and `pause`
/// mirror a host going to the background: `stop` detaches the receiver, `pause`
/// removes the stop fence.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    provider: DetectionProviderRef,
    registry: Arc<TriggerRegistry>,
    snapshots: SnapshotGate,
    bus: EventBusRef,
    attached: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        provider: DetectionProviderRef,
        capabilities: CapabilityGateRef,
        backend: Box<dyn AudioBackend>,
        bus: EventBusRef,
    ) -> Self {
        let registry = Arc::new(TriggerRegistry::new(
            Arc::clone(&provider),
            config.receiver_action.clone(),
            config.activity,
        ));
        let snapshots = SnapshotGate::new(Arc::clone(&provider), capabilities, Arc::clone(&bus));
        let controller = ResourceController::new(backend, config.cue.clone());
        let (status, _) = watch::channel(SessionStatus::default());

        Self {
            id: Uuid::new_v4(),
            config,
            provider,
            registry,
            snapshots,
            bus,
            attached: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle {
                controller: Some(controller),
                worker: None,
            }),
            status: Arc::new(status),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to the provider, attach the receiver and register both fences.
    ///
    /// Calling it again while connected re-attaches and re-registers; fences are
    /// replaced by key, never duplicated. A worker whose provider dropped the
    /// delivery sink is reaped first and the connection is rebuilt. A rejected
    /// registration is logged and reported on the bus but does not fail the session.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn connect(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().await;

            if lifecycle.worker.as_ref().is_some_and(|w| !w.is_live()) {
                if let Some(stale) = lifecycle.worker.take() {
                    tracing::info!("provider connection lost, reconnecting");
                    let controller = stale.stop().await.ok_or(SessionError::ControllerLost)?;
                    lifecycle.controller = Some(controller);
                }
            }

            if lifecycle.worker.is_none() {
                let controller = lifecycle
                    .controller
                    .take()
                    .ok_or(SessionError::ControllerLost)?;

                let (sink, rx) = DeliverySink::channel(self.config.queue_capacity);
                let queue = sink.downgrade();
                if let Err(e) = self.provider.connect(sink).await {
                    tracing::error!(error = %e, "provider connection failed");
                    lifecycle.controller = Some(controller);
                    return Err(e.into());
                }

                let ctx = WorkerContext {
                    rx,
                    normalizer: Normalizer::new(self.config.receiver_action.clone()),
                    controller,
                    bus: Arc::clone(&self.bus),
                    attached: Arc::clone(&self.attached),
                    status: Arc::clone(&self.status),
                };
                lifecycle.worker = Some(Worker::spawn(ctx, queue));
            }
        }

        self.attached.store(true, Ordering::Release);
        tracing::info!(action = %self.config.receiver_action, "receiver attached");

        let result = self.registry.register_all().await;
        emit_registration(self.bus.as_ref(), &Condition::ALL, false, &result);
        Ok(())
    }

    /// Check the location capability, prompting if it is missing.
    pub async fn resume(&self) -> bool {
        self.snapshots.check_and_request().await
    }

    /// Remove the stop fence without waiting for the provider.
    ///
    /// The start fence stays registered. The returned handle resolves once the
    /// provider has answered; dropping it is fine.
    pub fn pause(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            let condition = Condition::ExitedSteadyState;
            if !registry.is_registered(condition) {
                tracing::debug!(%condition, "nothing to deregister on pause");
                return;
            }
            let result = registry.deregister(condition).await;
            emit_registration(bus.as_ref(), &[condition], true, &result);
        })
    }

    /// Detach the receiver. Deliveries are discarded until the next `connect`.
    pub fn stop(&self) {
        if self.attached.swap(false, Ordering::AcqRel) {
            tracing::info!(session = %self.id, "receiver detached");
        }
    }

    /// Stop the worker, release any held audio and drop the provider connection.
    ///
    /// The session can be connected again afterwards.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn disconnect(&self) -> Result<()> {
        self.attached.store(false, Ordering::Release);

        let mut lifecycle = self.lifecycle.lock().await;
        let outcome = match lifecycle.worker.take() {
            Some(worker) => match worker.stop().await {
                Some(controller) => {
                    lifecycle.controller = Some(controller);
                    Ok(())
                }
                None => Err(SessionError::ControllerLost),
            },
            None => Ok(()),
        };
        drop(lifecycle);

        self.provider.disconnect().await;
        tracing::info!("session disconnected");
        outcome
    }

    /// Activity and weather, asking for the location capability if needed.
    pub async fn snapshot(&self) -> SnapshotReport {
        self.snapshots.snapshot().await
    }

    /// Forward a capability answer that arrived outside `snapshot`.
    pub async fn on_capability_result(&self, result: GrantResult) -> Option<Weather> {
        self.snapshots.on_capability_result(result).await
    }

    pub fn snapshots(&self) -> &SnapshotGate {
        &self.snapshots
    }

    pub fn is_registered(&self, condition: Condition) -> bool {
        self.registry.is_registered(condition)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// True while a worker runs and the provider still holds the delivery sink.
    pub async fn is_connected(&self) -> bool {
        self.lifecycle
            .lock()
            .await
            .worker
            .as_ref()
            .is_some_and(Worker::is_live)
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.status().phase
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(worker) = self.lifecycle.get_mut().worker.as_ref() {
            worker.cancel();
        }
    }
}

fn emit_registration(
    bus: &dyn stillcue_events::EventBus,
    conditions: &[Condition],
    removal: bool,
    result: &std::result::Result<(), FenceError>,
) {
    let status = match result {
        Ok(()) => None,
        Err(FenceError::Registration(status)) => Some(status.to_string()),
        Err(e) => Some(e.to_string()),
    };
    emit_event(
        bus,
        event_names::REGISTRATION,
        &RegistrationEvent {
            success: result.is_ok(),
            keys: conditions.iter().map(|c| c.key().to_string()).collect(),
            removal,
            status,
        },
    );
}
