use crate::{Capability, CapabilityGateRef, GrantResult, SnapshotError};
use stillcue_awareness::{DetectedActivity, DetectionProviderRef, Weather};
use stillcue_events::{
    emit_event, event_names, ActivitySnapshotEvent, EventBusRef, WeatherSnapshotEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// What a combined snapshot produced. Missing parts were skipped or failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotReport {
    pub activity: Option<DetectedActivity>,
    pub weather: Option<Weather>,
}

/// One-shot queries against the provider, gated by the capability check.
///
/// A weather query issued without the location capability is parked. The next
/// grant replays it once; a denial drops it.
pub struct SnapshotGate {
    provider: DetectionProviderRef,
    capabilities: CapabilityGateRef,
    bus: EventBusRef,
    weather_pending: AtomicBool,
}

impl SnapshotGate {
    pub fn new(
        provider: DetectionProviderRef,
        capabilities: CapabilityGateRef,
        bus: EventBusRef,
    ) -> Self {
        Self {
            provider,
            capabilities,
            bus,
            weather_pending: AtomicBool::new(false),
        }
    }

    pub async fn current_activity(&self) -> crate::Result<DetectedActivity> {
        let activity = self.provider.detected_activity().await?;
        tracing::info!(%activity, "activity snapshot");
        emit_event(
            self.bus.as_ref(),
            event_names::SNAPSHOT_ACTIVITY,
            &ActivitySnapshotEvent::from(activity),
        );
        Ok(activity)
    }

    /// Query the weather. Never reaches the provider without the location capability.
    pub async fn current_weather(&self) -> crate::Result<Weather> {
        if !self.capabilities.has_capability(Capability::Location) {
            return Err(SnapshotError::CapabilityDenied(Capability::Location));
        }
        let weather = self.provider.weather().await?;
        tracing::info!(
            temperature_c = weather.temperature_c,
            conditions = ?weather.conditions,
            "weather snapshot"
        );
        emit_event(
            self.bus.as_ref(),
            event_names::SNAPSHOT_WEATHER,
            &WeatherSnapshotEvent {
                weather: weather.clone(),
            },
        );
        Ok(weather)
    }

    /// Activity and weather together, prompting for the location capability if needed.
    pub async fn snapshot(&self) -> SnapshotReport {
        let activity = match self.current_activity().await {
            Ok(activity) => Some(activity),
            Err(e) => {
                tracing::warn!(error = %e, "activity snapshot failed");
                None
            }
        };

        let weather = if self.capabilities.has_capability(Capability::Location) {
            match self.current_weather().await {
                Ok(weather) => Some(weather),
                Err(e) => {
                    tracing::warn!(error = %e, "weather snapshot failed");
                    None
                }
            }
        } else {
            self.weather_pending.store(true, Ordering::SeqCst);
            let result = self
                .capabilities
                .request_capability(Capability::Location)
                .await;
            self.on_capability_result(result).await
        };

        SnapshotReport { activity, weather }
    }

    /// True if the capability is already held. Otherwise prompts and reports the answer.
    pub async fn check_and_request(&self) -> bool {
        if self.capabilities.has_capability(Capability::Location) {
            return true;
        }
        let result = self
            .capabilities
            .request_capability(Capability::Location)
            .await;
        result == GrantResult::Granted
    }

    /// Handle the answer to a location prompt.
    ///
    /// Replays a parked weather query at most once. Returns the replayed result.
    pub async fn on_capability_result(&self, result: GrantResult) -> Option<Weather> {
        match result {
            GrantResult::Granted => {
                if !self.weather_pending.swap(false, Ordering::SeqCst) {
                    tracing::debug!("location granted, no weather query pending");
                    return None;
                }
                match self.current_weather().await {
                    Ok(weather) => Some(weather),
                    Err(e) => {
                        tracing::warn!(error = %e, "deferred weather snapshot failed");
                        None
                    }
                }
            }
            GrantResult::Denied => {
                self.weather_pending.store(false, Ordering::SeqCst);
                tracing::warn!("Location permission denied. Weather snapshot skipped.");
                None
            }
        }
    }

    pub fn weather_pending(&self) -> bool {
        self.weather_pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCapabilityGate;
    use std::sync::Arc;
    use stillcue_awareness::{
        ActivityKind, DeliverySink, DetectionProvider, SimulatedProvider, WeatherCondition,
    };
    use stillcue_events::InMemoryEventBus;

    struct Fixture {
        provider: Arc<SimulatedProvider>,
        capabilities: Arc<InMemoryCapabilityGate>,
        bus: Arc<InMemoryEventBus>,
        gate: SnapshotGate,
    }

    async fn fixture() -> Fixture {
        let provider = Arc::new(SimulatedProvider::new());
        let (sink, _rx) = DeliverySink::channel(4);
        provider.connect(sink).await.unwrap();
        provider.report_activity(ActivityKind::Still, 92);
        provider.set_weather(Weather::new(vec![WeatherCondition::Cloudy], 14.5));

        let capabilities = Arc::new(InMemoryCapabilityGate::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let gate = SnapshotGate::new(provider.clone(), capabilities.clone(), bus.clone());
        Fixture {
            provider,
            capabilities,
            bus,
            gate,
        }
    }

    #[tokio::test]
    async fn test_activity_needs_no_capability() {
        let f = fixture().await;

        let activity = f.gate.current_activity().await.unwrap();

        assert_eq!(activity.kind, ActivityKind::Still);
        assert_eq!(f.provider.activity_queries(), 1);
        assert_eq!(f.bus.events_for(event_names::SNAPSHOT_ACTIVITY).len(), 1);
    }

    #[tokio::test]
    async fn test_weather_without_capability_never_queries() {
        let f = fixture().await;

        let err = f.gate.current_weather().await.unwrap_err();

        assert!(matches!(err, SnapshotError::CapabilityDenied(Capability::Location)));
        assert_eq!(f.provider.weather_queries(), 0);
    }

    #[tokio::test]
    async fn test_denied_prompt_skips_weather() {
        let f = fixture().await;
        f.capabilities.answer_requests_with(GrantResult::Denied);

        let report = f.gate.snapshot().await;

        assert!(report.activity.is_some());
        assert!(report.weather.is_none());
        assert_eq!(f.provider.weather_queries(), 0);
        assert!(!f.gate.weather_pending());
    }

    #[tokio::test]
    async fn test_grant_replays_deferred_query_once() {
        let f = fixture().await;
        f.capabilities.answer_requests_with(GrantResult::Granted);

        let report = f.gate.snapshot().await;
        assert_eq!(report.weather.map(|w| w.temperature_c), Some(14.5));
        assert_eq!(f.provider.weather_queries(), 1);

        // A second grant callback finds nothing pending.
        assert!(f.gate.on_capability_result(GrantResult::Granted).await.is_none());
        assert_eq!(f.provider.weather_queries(), 1);
    }

    #[tokio::test]
    async fn test_grant_without_pending_query_replays_nothing() {
        let f = fixture().await;
        f.capabilities.grant(Capability::Location);

        assert!(f.gate.on_capability_result(GrantResult::Granted).await.is_none());
        assert_eq!(f.provider.weather_queries(), 0);
    }

    #[tokio::test]
    async fn test_held_capability_queries_directly() {
        let f = fixture().await;
        f.capabilities.grant(Capability::Location);

        let report = f.gate.snapshot().await;

        assert!(report.weather.is_some());
        assert_eq!(f.capabilities.request_count(), 0);
        assert_eq!(f.bus.events_for(event_names::SNAPSHOT_WEATHER).len(), 1);
    }

    #[tokio::test]
    async fn test_check_and_request() {
        let f = fixture().await;
        assert!(!f.gate.check_and_request().await);

        f.capabilities.answer_requests_with(GrantResult::Granted);
        assert!(f.gate.check_and_request().await);
        assert!(f.gate.check_and_request().await);
        assert_eq!(f.capabilities.request_count(), 2);
    }
}
