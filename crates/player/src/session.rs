use crate::{AudioHandle, PlayerError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Prepared,
    Playing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Prepared => f.write_str("prepared"),
            Phase::Playing => f.write_str("playing"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Slot {
    #[default]
    Idle,
    Prepared(AudioHandle),
    Playing(AudioHandle),
}

/// The single audio session.
///
/// A handle exists exactly when the phase is not `Idle`; the two cannot drift apart
/// because they are stored as one value.
#[derive(Debug, Default)]
pub struct AudioSession {
    slot: Slot,
}

impl AudioSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match self.slot {
            Slot::Idle => Phase::Idle,
            Slot::Prepared(_) => Phase::Prepared,
            Slot::Playing(_) => Phase::Playing,
        }
    }

    pub fn handle(&self) -> Option<AudioHandle> {
        match self.slot {
            Slot::Idle => None,
            Slot::Prepared(h) | Slot::Playing(h) => Some(h),
        }
    }

    /// Idle → Prepared.
    pub(crate) fn mark_prepared(&mut self, handle: AudioHandle) -> crate::Result<()> {
        match self.slot {
            Slot::Idle => {
                self.slot = Slot::Prepared(handle);
                Ok(())
            }
            _ => Err(PlayerError::IllegalState(format!(
                "cannot prepare {handle} while {}",
                self.phase()
            ))),
        }
    }

    /// Prepared → Playing.
    pub(crate) fn mark_playing(&mut self) -> crate::Result<AudioHandle> {
        match self.slot {
            Slot::Prepared(h) => {
                self.slot = Slot::Playing(h);
                Ok(h)
            }
            _ => Err(PlayerError::IllegalState(format!(
                "cannot start while {}",
                self.phase()
            ))),
        }
    }

    /// Any → Idle, handing back what was held.
    pub(crate) fn take(&mut self) -> Option<(AudioHandle, Phase)> {
        let phase = self.phase();
        let handle = self.handle();
        self.slot = Slot::Idle;
        handle.map(|h| (h, phase))
    }
}
