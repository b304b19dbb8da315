use crate::SoundSource;
use std::fmt;

/// Opaque handle to an acquired audio resource.
///
/// Backends never hand out the same handle twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(u64);

impl AudioHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio#{}", self.0)
    }
}

/// Device-level audio operations driven by the resource controller.
///
/// The controller guarantees the call order `acquire → prepare → start → stop →
/// release` and never touches a handle after releasing it.
pub trait AudioBackend: Send {
    fn name(&self) -> &'static str;

    /// Load `source` and allocate a new handle.
    fn acquire(&mut self, source: &SoundSource) -> crate::Result<AudioHandle>;

    /// Bind the handle to an output device without starting playback.
    fn prepare(&mut self, handle: AudioHandle) -> crate::Result<()>;

    fn start(&mut self, handle: AudioHandle) -> crate::Result<()>;

    fn stop(&mut self, handle: AudioHandle) -> crate::Result<()>;

    /// Free everything held by the handle. Infallible from the caller's view.
    fn release(&mut self, handle: AudioHandle);
}
