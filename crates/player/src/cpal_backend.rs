//! Output backend on top of cpal.
//!
//! cpal streams must stay on the thread that built them, so every stream lives on a
//! dedicated audio thread and the backend talks to it over a channel.

use crate::{AudioBackend, AudioHandle, Clip, PlayerError, SoundSource};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Playback options for the cpal backend.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Linear gain applied to every sample.
    pub volume: f32,
    /// Output device name. `None` uses the host default.
    pub device_name: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 0.8,
            device_name: None,
        }
    }
}

type Reply = Sender<crate::Result<()>>;

enum Command {
    Load { handle: AudioHandle, clip: Clip },
    Prepare { handle: AudioHandle, reply: Reply },
    Start { handle: AudioHandle, reply: Reply },
    Stop { handle: AudioHandle, reply: Reply },
    Release { handle: AudioHandle },
    Shutdown,
}

pub struct CpalBackend {
    tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    next_id: u64,
}

impl CpalBackend {
    pub fn new(config: PlaybackConfig) -> crate::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let worker = std::thread::Builder::new()
            .name("stillcue-audio".to_string())
            .spawn(move || audio_loop(config, rx))
            .map_err(|e| PlayerError::Device(format!("cannot spawn audio thread: {e}")))?;

        Ok(Self {
            tx,
            worker: Some(worker),
            next_id: 0,
        })
    }

    fn request(&self, make: impl FnOnce(Reply) -> Command) -> crate::Result<()> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(make(reply_tx))
            .map_err(|_| PlayerError::Device("audio thread stopped".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| PlayerError::Device("audio thread stopped".to_string()))?
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn acquire(&mut self, source: &SoundSource) -> crate::Result<AudioHandle> {
        let clip = source.load()?;
        self.next_id += 1;
        let handle = AudioHandle::new(self.next_id);
        self.tx
            .send(Command::Load { handle, clip })
            .map_err(|_| PlayerError::Device("audio thread stopped".to_string()))?;
        Ok(handle)
    }

    fn prepare(&mut self, handle: AudioHandle) -> crate::Result<()> {
        self.request(|reply| Command::Prepare { handle, reply })
    }

    fn start(&mut self, handle: AudioHandle) -> crate::Result<()> {
        self.request(|reply| Command::Start { handle, reply })
    }

    fn stop(&mut self, handle: AudioHandle) -> crate::Result<()> {
        self.request(|reply| Command::Stop { handle, reply })
    }

    fn release(&mut self, handle: AudioHandle) {
        if self.tx.send(Command::Release { handle }).is_err() {
            tracing::debug!(%handle, "audio thread gone, nothing to release");
        }
    }
}

struct Voice {
    clip: Clip,
    cursor: Arc<AtomicUsize>,
    stream: Option<cpal::Stream>,
}

fn audio_loop(config: PlaybackConfig, rx: Receiver<Command>) {
    tracing::info!("audio thread started");
    let host = cpal::default_host();
    let mut voices: HashMap<AudioHandle, Voice> = HashMap::new();

    while let Ok(command) = rx.recv() {
        match command {
            Command::Load { handle, clip } => {
                voices.insert(
                    handle,
                    Voice {
                        clip,
                        cursor: Arc::new(AtomicUsize::new(0)),
                        stream: None,
                    },
                );
            }
            Command::Prepare { handle, reply } => {
                let result = match voices.get_mut(&handle) {
                    Some(voice) => prepare_voice(&host, &config, voice),
                    None => Err(unknown(handle)),
                };
                let _ = reply.send(result);
            }
            Command::Start { handle, reply } => {
                let result = match voices.get(&handle).map(|v| v.stream.as_ref()) {
                    Some(Some(stream)) => stream
                        .play()
                        .map_err(|e| PlayerError::Device(e.to_string())),
                    Some(None) => Err(PlayerError::IllegalState(format!(
                        "{handle} started before prepare"
                    ))),
                    None => Err(unknown(handle)),
                };
                let _ = reply.send(result);
            }
            Command::Stop { handle, reply } => {
                let result = match voices.get(&handle) {
                    Some(voice) => {
                        voice.cursor.store(0, Ordering::Relaxed);
                        match &voice.stream {
                            Some(stream) => stream
                                .pause()
                                .map_err(|e| PlayerError::Device(e.to_string())),
                            None => Ok(()),
                        }
                    }
                    None => Err(unknown(handle)),
                };
                let _ = reply.send(result);
            }
            Command::Release { handle } => {
                if voices.remove(&handle).is_none() {
                    tracing::warn!(%handle, "release of unknown handle");
                }
            }
            Command::Shutdown => break,
        }
    }

    voices.clear();
    tracing::info!("audio thread stopped");
}

fn unknown(handle: AudioHandle) -> PlayerError {
    PlayerError::IllegalState(format!("{handle} is not acquired"))
}

fn prepare_voice(host: &cpal::Host, config: &PlaybackConfig, voice: &mut Voice) -> crate::Result<()> {
    if voice.stream.is_some() {
        return Err(PlayerError::IllegalState("already prepared".to_string()));
    }

    let device = match &config.device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| PlayerError::Prepare(e.to_string()))?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| PlayerError::Prepare(format!("output device not found: {name}")))?,
        None => host
            .default_output_device()
            .ok_or_else(|| PlayerError::Prepare("no default output device".to_string()))?,
    };

    let supported = device
        .default_output_config()
        .map_err(|e| PlayerError::Prepare(e.to_string()))?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(PlayerError::Prepare(format!(
            "unsupported sample format {:?}",
            supported.sample_format()
        )));
    }

    let channels = supported.channels().max(1) as usize;
    let out_rate = supported.sample_rate().0.max(1) as u64;
    let clip_rate = voice.clip.sample_rate as u64;
    let samples = Arc::clone(&voice.clip.samples);
    let cursor = Arc::clone(&voice.cursor);
    let volume = config.volume;
    let stream_config: cpal::StreamConfig = supported.into();

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut frame_idx = cursor.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    // Nearest-sample resampling; cues are short and not critical.
                    let src = (frame_idx as u64 * clip_rate / out_rate) as usize;
                    let value = samples.get(src).copied().unwrap_or(0.0) * volume;
                    frame.fill(value);
                    frame_idx = frame_idx.saturating_add(1);
                }
                cursor.store(frame_idx, Ordering::Relaxed);
            },
            |err| tracing::error!(error = %err, "output stream error"),
            None,
        )
        .map_err(|e| PlayerError::Prepare(e.to_string()))?;

    stream
        .pause()
        .map_err(|e| PlayerError::Prepare(e.to_string()))?;

    tracing::debug!(
        device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
        channels,
        out_rate,
        "output stream prepared"
    );
    voice.stream = Some(stream);
    Ok(())
}
