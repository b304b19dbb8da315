//! Owns the provider subscriptions for both conditions.

use crate::{Condition, FenceError};
use std::collections::HashMap;
use std::sync::Mutex;
use stillcue_awareness::{ActivityKind, DeliveryTarget, DetectionProviderRef, FenceUpdateRequest};

/// Live record of which conditions are subscribed with the provider.
///
/// Holds at most one subscription per condition. Registering again replaces the
/// provider-side fence under the same key instead of adding a second one.
pub struct TriggerRegistry {
    provider: DetectionProviderRef,
    action: String,
    steady: ActivityKind,
    active: Mutex<HashMap<Condition, DeliveryTarget>>,
}

impl TriggerRegistry {
    pub fn new(provider: DetectionProviderRef, action: impl Into<String>, steady: ActivityKind) -> Self {
        Self {
            provider,
            action: action.into(),
            steady,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Delivery target for a condition. Distinct per condition.
    pub fn target_for(&self, condition: Condition) -> DeliveryTarget {
        DeliveryTarget::new(self.action.clone(), condition.key())
    }

    /// Subscribe both conditions in one atomic provider request.
    ///
    /// Failures are logged and returned; there is no automatic retry.
    pub async fn register_all(&self) -> crate::Result<()> {
        let request = Condition::ALL
            .into_iter()
            .fold(FenceUpdateRequest::new(), |request, condition| {
                request.add_fence(
                    condition.key(),
                    condition.fence(self.steady),
                    self.target_for(condition),
                )
            });

        let status = self.provider.update_fences(request).await;
        if !status.is_success() {
            tracing::error!(%status, "Fence could not be registered");
            return Err(FenceError::Registration(status));
        }

        if let Ok(mut active) = self.active.lock() {
            for condition in Condition::ALL {
                active.insert(condition, self.target_for(condition));
            }
        }
        tracing::info!(steady = %self.steady, "Fences were successfully registered");
        Ok(())
    }

    /// Remove the subscription for one condition. Absent subscriptions are a no-op.
    pub async fn deregister(&self, condition: Condition) -> crate::Result<()> {
        if !self.is_registered(condition) {
            tracing::debug!(%condition, "fence not registered, nothing to remove");
            return Ok(());
        }

        let request = FenceUpdateRequest::new().remove_fence(condition.key());
        let status = self.provider.update_fences(request).await;
        if !status.is_success() {
            tracing::error!(%condition, %status, "Fence could not be unregistered");
            return Err(FenceError::Registration(status));
        }

        if let Ok(mut active) = self.active.lock() {
            active.remove(&condition);
        }
        tracing::info!(%condition, "Fence was successfully unregistered");
        Ok(())
    }

    pub fn is_registered(&self, condition: Condition) -> bool {
        self.active
            .lock()
            .map(|active| active.contains_key(&condition))
            .unwrap_or(false)
    }

    pub fn active_conditions(&self) -> Vec<Condition> {
        Condition::ALL
            .into_iter()
            .filter(|c| self.is_registered(*c))
            .collect()
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stillcue_awareness::{DeliverySink, DetectionProvider, SimulatedProvider, Status, TriState};

    const ACTION: &str = "test.FENCE_RECEIVER_ACTION";

    async fn connected() -> (Arc<SimulatedProvider>, tokio::sync::mpsc::Receiver<stillcue_awareness::Delivery>) {
        let provider = Arc::new(SimulatedProvider::new());
        let (sink, rx) = DeliverySink::channel(16);
        provider.connect(sink).await.unwrap();
        (provider, rx)
    }

    #[tokio::test]
    async fn test_register_all_sends_one_request() {
        let (provider, _rx) = connected().await;
        let registry = TriggerRegistry::new(provider.clone(), ACTION, ActivityKind::Still);

        registry.register_all().await.unwrap();

        let requests = provider.update_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].add.len(), 2);
        assert_ne!(requests[0].add[0].target, requests[0].add[1].target);
        assert_eq!(
            registry.active_conditions(),
            vec![Condition::EnteredSteadyState, Condition::ExitedSteadyState]
        );
    }

    #[tokio::test]
    async fn test_register_twice_does_not_duplicate() {
        let (provider, mut rx) = connected().await;
        let registry = TriggerRegistry::new(provider.clone(), ACTION, ActivityKind::Still);

        registry.register_all().await.unwrap();
        registry.register_all().await.unwrap();

        assert_eq!(provider.registered_keys(), vec!["start_fence_key", "stop_fence_key"]);
        assert!(provider.fire("start_fence_key", TriState::True));

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn test_rejected_registration_is_reported() {
        let (provider, _rx) = connected().await;
        provider.set_update_failure(Some(Status::error(Status::INTERNAL_ERROR, "quota")));
        let registry = TriggerRegistry::new(provider.clone(), ACTION, ActivityKind::Still);

        let result = registry.register_all().await;
        assert!(matches!(result, Err(FenceError::Registration(_))));
        assert!(registry.active_conditions().is_empty());
    }

    #[tokio::test]
    async fn test_deregister_removes_one_condition() {
        let (provider, _rx) = connected().await;
        let registry = TriggerRegistry::new(provider.clone(), ACTION, ActivityKind::Still);
        registry.register_all().await.unwrap();

        registry.deregister(Condition::ExitedSteadyState).await.unwrap();

        assert_eq!(provider.registered_keys(), vec!["start_fence_key"]);
        assert!(registry.is_registered(Condition::EnteredSteadyState));
        assert!(!registry.is_registered(Condition::ExitedSteadyState));
    }

    #[tokio::test]
    async fn test_deregister_absent_is_noop() {
        let (provider, _rx) = connected().await;
        let registry = TriggerRegistry::new(provider.clone(), ACTION, ActivityKind::Still);

        registry.deregister(Condition::ExitedSteadyState).await.unwrap();
        registry.register_all().await.unwrap();
        registry.deregister(Condition::ExitedSteadyState).await.unwrap();
        registry.deregister(Condition::ExitedSteadyState).await.unwrap();

        // register_all plus the single real removal
        assert_eq!(provider.update_requests().len(), 2);
    }
}
