use crate::{AudioBackend, AudioHandle, SoundSource};

/// Backend for headless hosts: validates the source, then only logs.
#[derive(Default)]
pub struct NullBackend {
    next_id: u64,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn acquire(&mut self, source: &SoundSource) -> crate::Result<AudioHandle> {
        let clip = source.load()?;
        self.next_id += 1;
        let handle = AudioHandle::new(self.next_id);
        tracing::debug!(%handle, duration_ms = clip.duration_ms(), "null backend acquired");
        Ok(handle)
    }

    fn prepare(&mut self, handle: AudioHandle) -> crate::Result<()> {
        tracing::debug!(%handle, "null backend prepared");
        Ok(())
    }

    fn start(&mut self, handle: AudioHandle) -> crate::Result<()> {
        tracing::info!(%handle, "cue playing (silent)");
        Ok(())
    }

    fn stop(&mut self, handle: AudioHandle) -> crate::Result<()> {
        tracing::info!(%handle, "cue stopped (silent)");
        Ok(())
    }

    fn release(&mut self, handle: AudioHandle) {
        tracing::debug!(%handle, "null backend released");
    }
}
