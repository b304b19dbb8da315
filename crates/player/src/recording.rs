//! Backend that records every call instead of touching a device.
//!
//! Clones share the same log so a test can keep one copy while the controller
//! owns the other.

use crate::{AudioBackend, AudioHandle, PlayerError, SoundSource};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Acquire(AudioHandle),
    Prepare(AudioHandle),
    Start(AudioHandle),
    Stop(AudioHandle),
    Release(AudioHandle),
}

/// Which operation the next call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePlan {
    Acquire,
    Prepare,
    Start,
    Stop,
}

#[derive(Default)]
struct Log {
    calls: Vec<BackendCall>,
    live: BTreeSet<u64>,
    next_id: u64,
    failure: Option<FailurePlan>,
}

#[derive(Clone, Default)]
pub struct RecordingBackend {
    log: Arc<Mutex<Log>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next matching operation once.
    pub fn fail_next(&self, plan: FailurePlan) {
        if let Ok(mut log) = self.log.lock() {
            log.failure = Some(plan);
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.log.lock().map(|l| l.calls.clone()).unwrap_or_default()
    }

    pub fn acquired(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Acquire(_)))
    }

    pub fn released(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Release(_)))
    }

    /// Handles acquired and not yet released.
    pub fn live_handles(&self) -> Vec<AudioHandle> {
        self.log
            .lock()
            .map(|l| l.live.iter().copied().map(AudioHandle::new).collect())
            .unwrap_or_default()
    }

    fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.log
            .lock()
            .map(|l| l.calls.iter().filter(|c| pred(c)).count())
            .unwrap_or(0)
    }

    fn take_failure(log: &mut Log, plan: FailurePlan) -> bool {
        if log.failure == Some(plan) {
            log.failure = None;
            true
        } else {
            false
        }
    }

    fn with_live<F>(&self, handle: AudioHandle, op: &str, record: F) -> crate::Result<()>
    where
        F: FnOnce(&mut Log) -> crate::Result<()>,
    {
        let mut log = self
            .log
            .lock()
            .map_err(|_| PlayerError::Device("recording log poisoned".to_string()))?;
        if !log.live.contains(&handle.id()) {
            return Err(PlayerError::IllegalState(format!("{op} on released {handle}")));
        }
        record(&mut *log)
    }
}

impl AudioBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn acquire(&mut self, _source: &SoundSource) -> crate::Result<AudioHandle> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| PlayerError::Device("recording log poisoned".to_string()))?;
        if Self::take_failure(&mut log, FailurePlan::Acquire) {
            return Err(PlayerError::Prepare("device busy".to_string()));
        }
        log.next_id += 1;
        let handle = AudioHandle::new(log.next_id);
        log.live.insert(handle.id());
        log.calls.push(BackendCall::Acquire(handle));
        Ok(handle)
    }

    fn prepare(&mut self, handle: AudioHandle) -> crate::Result<()> {
        self.with_live(handle, "prepare", |log| {
            log.calls.push(BackendCall::Prepare(handle));
            if Self::take_failure(log, FailurePlan::Prepare) {
                return Err(PlayerError::Prepare("invalid output device".to_string()));
            }
            Ok(())
        })
    }

    fn start(&mut self, handle: AudioHandle) -> crate::Result<()> {
        self.with_live(handle, "start", |log| {
            log.calls.push(BackendCall::Start(handle));
            if Self::take_failure(log, FailurePlan::Start) {
                return Err(PlayerError::IllegalState("start on unprepared player".to_string()));
            }
            Ok(())
        })
    }

    fn stop(&mut self, handle: AudioHandle) -> crate::Result<()> {
        self.with_live(handle, "stop", |log| {
            log.calls.push(BackendCall::Stop(handle));
            if Self::take_failure(log, FailurePlan::Stop) {
                return Err(PlayerError::Device("stream vanished".to_string()));
            }
            Ok(())
        })
    }

    fn release(&mut self, handle: AudioHandle) {
        if let Ok(mut log) = self.log.lock() {
            if !log.live.remove(&handle.id()) {
                tracing::warn!(%handle, "release of unknown handle");
            }
            log.calls.push(BackendCall::Release(handle));
        }
    }
}
