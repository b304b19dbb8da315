//! In-process detection provider driven by an activity feed.
//!
//! Evaluates registered fences every time a new activity is reported and pushes a
//! delivery for each fence whose state changed. Used by the CLI and by tests.

use crate::{
    ActivityFence, ActivityKind, Delivery, DeliverySink, DeliveryTarget, DetectedActivity,
    DetectionProvider, FenceState, FenceUpdateRequest, ProviderError, Status, TriState, Weather,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

struct RegisteredFence {
    fence: ActivityFence,
    target: DeliveryTarget,
    state: TriState,
}

#[derive(Default)]
struct SimState {
    sink: Option<DeliverySink>,
    fences: HashMap<String, RegisteredFence>,
    activity: Option<DetectedActivity>,
    weather: Option<Weather>,
    update_failure: Option<Status>,
    update_log: Vec<FenceUpdateRequest>,
    activity_queries: usize,
    weather_queries: usize,
}

#[derive(Default)]
pub struct SimulatedProvider {
    state: Mutex<SimState>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the weather snapshot.
    pub fn set_weather(&self, weather: Weather) {
        if let Ok(mut state) = self.state.lock() {
            state.weather = Some(weather);
        }
    }

    /// Make every following fence update fail with `status`. `None` restores success.
    pub fn set_update_failure(&self, status: Option<Status>) {
        if let Ok(mut state) = self.state.lock() {
            state.update_failure = status;
        }
    }

    /// Report a new most probable activity and evaluate every registered fence.
    ///
    /// Returns the number of deliveries pushed.
    pub fn report_activity(&self, kind: ActivityKind, confidence: u8) -> usize {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };

        let previous = state.activity.map(|a| a.kind);
        state.activity = Some(DetectedActivity::new(kind, confidence));

        let now = chrono::Utc::now().timestamp_millis();
        let mut pending = Vec::new();
        for (key, registered) in state.fences.iter_mut() {
            let next = TriState::from(registered.fence.evaluate(previous, kind));
            if next == registered.state {
                continue;
            }
            pending.push(Delivery {
                target: registered.target.clone(),
                state: FenceState {
                    fence_key: key.clone(),
                    current_state: next,
                    previous_state: registered.state,
                    last_updated_ms: now,
                },
            });
            registered.state = next;
        }

        let sink = state.sink.clone();
        drop(state);

        tracing::debug!(activity = %kind, changed = pending.len(), "fences evaluated");
        deliver_all(sink, pending)
    }

    /// Push a delivery for a registered fence with an arbitrary state.
    ///
    /// Returns false if the key is not registered or nothing is connected.
    pub fn fire(&self, key: &str, current_state: TriState) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };

        let Some(registered) = state.fences.get_mut(key) else {
            tracing::debug!(key, "fire requested for unregistered fence");
            return false;
        };

        let delivery = Delivery {
            target: registered.target.clone(),
            state: FenceState {
                fence_key: key.to_string(),
                current_state,
                previous_state: registered.state,
                last_updated_ms: chrono::Utc::now().timestamp_millis(),
            },
        };
        registered.state = current_state;

        let sink = state.sink.clone();
        drop(state);

        deliver_all(sink, vec![delivery]) == 1
    }

    /// Push a delivery verbatim, bypassing the fence table.
    pub fn push_raw(&self, delivery: Delivery) -> bool {
        let sink = self.state.lock().ok().and_then(|state| state.sink.clone());
        deliver_all(sink, vec![delivery]) == 1
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.sink.is_some())
            .unwrap_or(false)
    }

    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .lock()
            .map(|state| state.fences.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Every fence update request received, including rejected ones.
    pub fn update_requests(&self) -> Vec<FenceUpdateRequest> {
        self.state
            .lock()
            .map(|state| state.update_log.clone())
            .unwrap_or_default()
    }

    pub fn activity_queries(&self) -> usize {
        self.state.lock().map(|s| s.activity_queries).unwrap_or(0)
    }

    pub fn weather_queries(&self) -> usize {
        self.state.lock().map(|s| s.weather_queries).unwrap_or(0)
    }
}

fn deliver_all(sink: Option<DeliverySink>, deliveries: Vec<Delivery>) -> usize {
    let Some(sink) = sink else {
        if !deliveries.is_empty() {
            tracing::debug!(count = deliveries.len(), "not connected, deliveries discarded");
        }
        return 0;
    };

    deliveries
        .into_iter()
        .filter(|delivery| sink.deliver(delivery.clone()))
        .count()
}

#[async_trait]
impl DetectionProvider for SimulatedProvider {
    async fn connect(&self, sink: DeliverySink) -> crate::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProviderError::Failed(Status::error(Status::INTERNAL_ERROR, "poisoned")))?;
        if state.sink.replace(sink).is_some() {
            tracing::debug!("simulated provider reconnected, previous sink replaced");
        }
        tracing::info!("simulated provider connected");
        Ok(())
    }

    async fn disconnect(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.sink = None;
            tracing::info!("simulated provider disconnected");
        }
    }

    async fn update_fences(&self, request: FenceUpdateRequest) -> Status {
        let Ok(mut state) = self.state.lock() else {
            return Status::error(Status::INTERNAL_ERROR, "provider state poisoned");
        };

        state.update_log.push(request.clone());

        if state.sink.is_none() {
            return Status::error(Status::API_NOT_CONNECTED, "provider not connected");
        }
        if let Some(failure) = state.update_failure.clone() {
            return failure;
        }

        for key in &request.remove {
            state.fences.remove(key);
        }
        for registration in request.add {
            state.fences.insert(
                registration.key,
                RegisteredFence {
                    fence: registration.fence,
                    target: registration.target,
                    state: TriState::Unknown,
                },
            );
        }

        Status::ok()
    }

    async fn detected_activity(&self) -> crate::Result<DetectedActivity> {
        let mut state = self.state.lock().map_err(|_| ProviderError::NotConnected)?;
        if state.sink.is_none() {
            return Err(ProviderError::NotConnected);
        }
        state.activity_queries += 1;
        state.activity.ok_or(ProviderError::Unavailable("activity"))
    }

    async fn weather(&self) -> crate::Result<Weather> {
        let mut state = self.state.lock().map_err(|_| ProviderError::NotConnected)?;
        if state.sink.is_none() {
            return Err(ProviderError::NotConnected);
        }
        state.weather_queries += 1;
        state.weather.clone().ok_or(ProviderError::Unavailable("weather"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WeatherCondition;

    fn still_fences() -> FenceUpdateRequest {
        FenceUpdateRequest::new()
            .add_fence(
                "start",
                ActivityFence::Starting(ActivityKind::Still),
                DeliveryTarget::new("test.ACTION", "start"),
            )
            .add_fence(
                "stop",
                ActivityFence::Stopping(ActivityKind::Still),
                DeliveryTarget::new("test.ACTION", "stop"),
            )
    }

    fn drain(rx: &mut tokio::sync::mpsc::Receiver<Delivery>) -> Vec<(String, TriState)> {
        let mut out = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            out.push((delivery.state.fence_key, delivery.state.current_state));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    #[tokio::test]
    async fn test_update_requires_connection() {
        let provider = SimulatedProvider::new();
        let status = provider.update_fences(still_fences()).await;
        assert!(!status.is_success());
        assert_eq!(status.code, Status::API_NOT_CONNECTED);
        assert!(provider.registered_keys().is_empty());
    }

    #[tokio::test]
    async fn test_fences_track_activity_transitions() {
        let provider = SimulatedProvider::new();
        let (sink, mut rx) = DeliverySink::channel(16);
        provider.connect(sink).await.unwrap();
        assert!(provider.update_fences(still_fences()).await.is_success());

        provider.report_activity(ActivityKind::Walking, 80);
        assert_eq!(
            drain(&mut rx),
            vec![
                ("start".to_string(), TriState::False),
                ("stop".to_string(), TriState::False)
            ]
        );

        provider.report_activity(ActivityKind::Still, 90);
        assert_eq!(drain(&mut rx), vec![("start".to_string(), TriState::True)]);

        provider.report_activity(ActivityKind::Still, 95);
        assert_eq!(drain(&mut rx), vec![("start".to_string(), TriState::False)]);

        provider.report_activity(ActivityKind::Running, 70);
        assert_eq!(drain(&mut rx), vec![("stop".to_string(), TriState::True)]);
    }

    #[tokio::test]
    async fn test_re_adding_a_key_replaces_it() {
        let provider = SimulatedProvider::new();
        let (sink, mut rx) = DeliverySink::channel(16);
        provider.connect(sink).await.unwrap();
        provider.update_fences(still_fences()).await;
        provider.update_fences(still_fences()).await;

        assert_eq!(provider.registered_keys(), vec!["start", "stop"]);
        assert!(provider.fire("start", TriState::True));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_applies_nothing() {
        let provider = SimulatedProvider::new();
        let (sink, _rx) = DeliverySink::channel(4);
        provider.connect(sink).await.unwrap();
        provider.set_update_failure(Some(Status::error(Status::INTERNAL_ERROR, "rejected")));

        let status = provider.update_fences(still_fences()).await;
        assert!(!status.is_success());
        assert!(provider.registered_keys().is_empty());
        assert_eq!(provider.update_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_count_queries() {
        let provider = SimulatedProvider::new();
        assert!(matches!(
            provider.weather().await,
            Err(ProviderError::NotConnected)
        ));

        let (sink, _rx) = DeliverySink::channel(4);
        provider.connect(sink).await.unwrap();
        assert!(matches!(
            provider.detected_activity().await,
            Err(ProviderError::Unavailable("activity"))
        ));

        provider.set_weather(Weather::new(vec![WeatherCondition::Clear], 21.5));
        provider.report_activity(ActivityKind::Still, 88);

        let weather = provider.weather().await.unwrap();
        assert!(weather.has_condition(WeatherCondition::Clear));
        assert_eq!(
            provider.detected_activity().await.unwrap().kind,
            ActivityKind::Still
        );
        assert_eq!(provider.weather_queries(), 1);
        assert_eq!(provider.activity_queries(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_discards_deliveries() {
        let provider = SimulatedProvider::new();
        let (sink, _rx) = DeliverySink::channel(4);
        provider.connect(sink).await.unwrap();
        provider.update_fences(still_fences()).await;
        provider.disconnect().await;

        assert!(!provider.is_connected());
        assert!(!provider.fire("start", TriState::True));
    }
}
