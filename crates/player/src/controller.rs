//! Drives the audio session from normalized fence transitions.

use crate::{AudioBackend, AudioSession, Phase, PlayerError, SoundSource};
use stillcue_fence::{Condition, NormalizedTransition};

/// Label shown when the cue starts. Names the state being left.
pub const START_LABEL: &str = "NOT ACTIVE";

/// Label computed when the cue stops. Names the state being left.
pub const STOP_LABEL: &str = "ACTIVE";

/// What applying a transition did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Idle → Prepared → Playing completed.
    Started { label: &'static str },
    /// Session returned to Idle and the handle was released.
    Stopped { label: &'static str },
    /// Nothing to do in the current phase.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

/// Sole owner and writer of the audio session.
///
/// Transitions are applied one at a time through `&mut self`; callers serialize
/// access by owning the controller on a single consumer.
pub struct ResourceController {
    backend: Box<dyn AudioBackend>,
    source: SoundSource,
    session: AudioSession,
    changes: Vec<PhaseChange>,
}

impl ResourceController {
    pub fn new(backend: Box<dyn AudioBackend>, source: SoundSource) -> Self {
        Self {
            backend,
            source,
            session: AudioSession::new(),
            changes: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn session(&self) -> &AudioSession {
        &self.session
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Phase changes since the last call, oldest first.
    pub fn drain_phase_changes(&mut self) -> Vec<PhaseChange> {
        std::mem::take(&mut self.changes)
    }

    /// Apply one transition.
    ///
    /// Duplicates and out-of-order transitions are harmless: starting while
    /// prepared or playing and stopping while idle are no-ops. On error the session
    /// is always back in `Idle` with no handle held.
    pub fn apply(&mut self, transition: NormalizedTransition) -> crate::Result<Outcome> {
        match (transition.condition, transition.started) {
            (Condition::EnteredSteadyState, true) => self.start_cue(),
            (Condition::EnteredSteadyState, false) => {
                tracing::debug!(phase = %self.phase(), "entry window closed, nothing to do");
                Ok(Outcome::Unchanged)
            }
            (Condition::ExitedSteadyState, _) => Ok(self.stop_cue()),
        }
    }

    /// Stop and release whatever is held. Used on teardown.
    pub fn shutdown(&mut self) {
        if let Outcome::Stopped { .. } = self.stop_cue() {
            tracing::info!("audio session released on shutdown");
        }
    }

    fn start_cue(&mut self) -> crate::Result<Outcome> {
        if self.phase() != Phase::Idle {
            tracing::debug!(phase = %self.phase(), "cue already active, duplicate start ignored");
            return Ok(Outcome::Unchanged);
        }

        let handle = self.backend.acquire(&self.source).map_err(|e| {
            tracing::error!(error = %e, "could not acquire audio resource");
            as_prepare_error(e)
        })?;

        if let Err(e) = self.backend.prepare(handle) {
            tracing::error!(%handle, error = %e, "prepare failed, releasing handle");
            self.backend.release(handle);
            return Err(as_prepare_error(e));
        }

        if let Err(e) = self.session.mark_prepared(handle) {
            self.backend.release(handle);
            return Err(e);
        }
        self.record(Phase::Idle, Phase::Prepared);

        self.play()
    }

    fn play(&mut self) -> crate::Result<Outcome> {
        let handle = match self.session.mark_playing() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "start requested on unprepared session");
                self.force_idle();
                return Err(e);
            }
        };

        if let Err(e) = self.backend.start(handle) {
            tracing::error!(%handle, error = %e, "start failed, releasing handle");
            self.force_idle();
            return Err(e);
        }
        self.record(Phase::Prepared, Phase::Playing);

        tracing::info!(%handle, backend = self.backend.name(), "cue started");
        Ok(Outcome::Started { label: START_LABEL })
    }

    fn stop_cue(&mut self) -> Outcome {
        let Some((handle, phase)) = self.session.take() else {
            tracing::debug!("cue not active, stop ignored");
            return Outcome::Unchanged;
        };

        if phase == Phase::Playing {
            if let Err(e) = self.backend.stop(handle) {
                tracing::warn!(%handle, error = %e, "stop failed, releasing anyway");
            }
        }
        self.backend.release(handle);
        self.record(phase, Phase::Idle);

        tracing::info!(%handle, "cue stopped");
        Outcome::Stopped { label: STOP_LABEL }
    }

    fn force_idle(&mut self) {
        let before = self.phase();
        if let Some((handle, _)) = self.session.take() {
            self.backend.release(handle);
        }
        // Playing is never recorded before the backend start succeeds.
        let recorded = match before {
            Phase::Playing => Phase::Prepared,
            other => other,
        };
        if recorded != Phase::Idle {
            self.record(recorded, Phase::Idle);
        }
    }

    fn record(&mut self, from: Phase, to: Phase) {
        self.changes.push(PhaseChange { from, to });
    }
}

impl Drop for ResourceController {
    fn drop(&mut self) {
        if let Some((handle, phase)) = self.session.take() {
            if phase == Phase::Playing {
                let _ = self.backend.stop(handle);
            }
            self.backend.release(handle);
        }
    }
}

fn as_prepare_error(e: PlayerError) -> PlayerError {
    match e {
        PlayerError::Prepare(_) | PlayerError::IllegalState(_) => e,
        other => PlayerError::Prepare(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioHandle, BackendCall, FailurePlan, RecordingBackend};

    fn entered(started: bool) -> NormalizedTransition {
        NormalizedTransition::new(Condition::EnteredSteadyState, started)
    }

    fn exited(started: bool) -> NormalizedTransition {
        NormalizedTransition::new(Condition::ExitedSteadyState, started)
    }

    fn controller() -> (ResourceController, RecordingBackend) {
        let backend = RecordingBackend::new();
        let controller = ResourceController::new(Box::new(backend.clone()), SoundSource::default());
        (controller, backend)
    }

    #[test]
    fn test_start_runs_full_sequence() {
        let (mut controller, backend) = controller();

        let outcome = controller.apply(entered(true)).unwrap();

        assert_eq!(outcome, Outcome::Started { label: "NOT ACTIVE" });
        assert_eq!(controller.phase(), Phase::Playing);
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::Acquire(AudioHandle::new(1)),
                BackendCall::Prepare(AudioHandle::new(1)),
                BackendCall::Start(AudioHandle::new(1)),
            ]
        );
        assert_eq!(
            controller.drain_phase_changes(),
            vec![
                PhaseChange { from: Phase::Idle, to: Phase::Prepared },
                PhaseChange { from: Phase::Prepared, to: Phase::Playing },
            ]
        );
    }

    #[test]
    fn test_duplicate_start_is_idempotent() {
        let (mut controller, backend) = controller();

        controller.apply(entered(true)).unwrap();
        let second = controller.apply(entered(true)).unwrap();

        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(backend.acquired(), 1);
        assert_eq!(controller.drain_phase_changes().len(), 2);
    }

    #[test]
    fn test_stop_releases_once_and_next_start_gets_fresh_handle() {
        let (mut controller, backend) = controller();

        controller.apply(entered(true)).unwrap();
        let stopped = controller.apply(exited(false)).unwrap();
        assert_eq!(stopped, Outcome::Stopped { label: "ACTIVE" });
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(backend.released(), 1);

        controller.apply(entered(true)).unwrap();
        assert_eq!(controller.session().handle(), Some(AudioHandle::new(2)));
        assert_eq!(backend.acquired(), 2);
        assert_eq!(backend.live_handles(), vec![AudioHandle::new(2)]);
    }

    #[test]
    fn test_stop_from_idle_is_noop() {
        let (mut controller, backend) = controller();

        assert_eq!(controller.apply(exited(false)).unwrap(), Outcome::Unchanged);
        assert_eq!(controller.apply(exited(true)).unwrap(), Outcome::Unchanged);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_entry_window_closing_does_not_stop() {
        let (mut controller, backend) = controller();

        controller.apply(entered(true)).unwrap();
        assert_eq!(controller.apply(entered(false)).unwrap(), Outcome::Unchanged);
        assert_eq!(controller.phase(), Phase::Playing);
        assert_eq!(backend.released(), 0);
    }

    #[test]
    fn test_provider_stop_signal_stops() {
        let (mut controller, backend) = controller();

        controller.apply(entered(true)).unwrap();
        assert!(matches!(
            controller.apply(exited(true)).unwrap(),
            Outcome::Stopped { .. }
        ));
        assert!(backend.calls().contains(&BackendCall::Stop(AudioHandle::new(1))));
    }

    #[test]
    fn test_prepare_failure_leaves_idle_and_releases() {
        let (mut controller, backend) = controller();
        backend.fail_next(FailurePlan::Prepare);

        let result = controller.apply(entered(true));

        assert!(matches!(result, Err(PlayerError::Prepare(_))));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(backend.acquired(), 1);
        assert_eq!(backend.released(), 1);
        assert!(backend.live_handles().is_empty());
        assert!(controller.drain_phase_changes().is_empty());
    }

    #[test]
    fn test_acquire_failure_holds_nothing() {
        let (mut controller, backend) = controller();
        backend.fail_next(FailurePlan::Acquire);

        let result = controller.apply(entered(true));

        assert!(matches!(result, Err(PlayerError::Prepare(_))));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(backend.released(), 0);
        assert!(backend.live_handles().is_empty());
    }

    #[test]
    fn test_illegal_start_forces_idle() {
        let (mut controller, backend) = controller();
        backend.fail_next(FailurePlan::Start);

        let result = controller.apply(entered(true));

        assert!(matches!(result, Err(PlayerError::IllegalState(_))));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(backend.released(), 1);
        assert_eq!(
            controller.drain_phase_changes(),
            vec![
                PhaseChange { from: Phase::Idle, to: Phase::Prepared },
                PhaseChange { from: Phase::Prepared, to: Phase::Idle },
            ]
        );

        // The failure is local to that transition.
        assert!(matches!(
            controller.apply(entered(true)).unwrap(),
            Outcome::Started { .. }
        ));
    }

    #[test]
    fn test_stop_failure_still_releases() {
        let (mut controller, backend) = controller();
        controller.apply(entered(true)).unwrap();
        backend.fail_next(FailurePlan::Stop);

        let outcome = controller.apply(exited(false)).unwrap();

        assert!(matches!(outcome, Outcome::Stopped { .. }));
        assert_eq!(backend.released(), 1);
        assert!(backend.live_handles().is_empty());
    }

    #[test]
    fn test_drop_releases_held_handle() {
        let (mut controller, backend) = controller();
        controller.apply(entered(true)).unwrap();

        drop(controller);

        assert_eq!(backend.released(), 1);
        assert!(backend.live_handles().is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut controller, backend) = controller();
        controller.apply(entered(true)).unwrap();

        controller.shutdown();
        controller.shutdown();
        drop(controller);

        assert_eq!(backend.released(), 1);
    }
}
