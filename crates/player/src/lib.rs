mod backend;
mod controller;
mod cpal_backend;
mod null;
mod recording;
mod session;
mod source;

pub use backend::{AudioBackend, AudioHandle};
pub use controller::{Outcome, PhaseChange, ResourceController, START_LABEL, STOP_LABEL};
pub use cpal_backend::{CpalBackend, PlaybackConfig};
pub use null::NullBackend;
pub use recording::{BackendCall, FailurePlan, RecordingBackend};
pub use session::{AudioSession, Phase};
pub use source::{Clip, SoundSource, MAX_TONE_DURATION_MS};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("prepare failed: {0}")]
    Prepare(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("cannot load sound source: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
