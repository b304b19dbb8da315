use crate::PlayerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TONE_SAMPLE_RATE: u32 = 44_100;
const TONE_FADE_MS: u64 = 10;

/// Longest tone [`SoundSource::Tone`] will synthesize.
pub const MAX_TONE_DURATION_MS: u64 = 60_000;

/// Where the cue's audio comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SoundSource {
    /// WAV file on disk.
    File { path: PathBuf },
    /// Generated sine tone.
    Tone { frequency_hz: f32, duration_ms: u64 },
}

impl Default for SoundSource {
    fn default() -> Self {
        SoundSource::Tone {
            frequency_hz: 440.0,
            duration_ms: 2000,
        }
    }
}

impl SoundSource {
    /// Decode the source into mono samples.
    pub fn load(&self) -> crate::Result<Clip> {
        match self {
            SoundSource::File { path } => read_wav_mono(path),
            SoundSource::Tone {
                frequency_hz,
                duration_ms,
            } => synth_tone(*frequency_hz, *duration_ms),
        }
    }
}

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct Clip {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
}

impl Clip {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

fn read_wav_mono(path: &Path) -> crate::Result<Clip> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| PlayerError::Source(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| PlayerError::Source(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| PlayerError::Source(e.to_string()))?
        }
    };

    let samples: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    if samples.is_empty() {
        return Err(PlayerError::Source(format!("{} has no samples", path.display())));
    }

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        frames = samples.len(),
        "cue decoded"
    );

    Ok(Clip {
        samples: samples.into(),
        sample_rate: spec.sample_rate,
    })
}

fn synth_tone(frequency_hz: f32, duration_ms: u64) -> crate::Result<Clip> {
    if frequency_hz.is_nan()
        || frequency_hz <= 0.0
        || duration_ms == 0
        || duration_ms > MAX_TONE_DURATION_MS
    {
        return Err(PlayerError::Source(format!(
            "invalid tone {frequency_hz} Hz for {duration_ms} ms"
        )));
    }

    let total = u64::from(TONE_SAMPLE_RATE)
        .checked_mul(duration_ms)
        .and_then(|n| usize::try_from(n / 1000).ok())
        .ok_or_else(|| PlayerError::Source(format!("tone of {duration_ms} ms is too long")))?;
    let fade = ((TONE_SAMPLE_RATE as u64 * TONE_FADE_MS / 1000) as usize).min(total / 2);
    let step = 2.0 * std::f32::consts::PI * frequency_hz / TONE_SAMPLE_RATE as f32;

    let samples: Vec<f32> = (0..total)
        .map(|i| {
            // Linear fade in/out to avoid clicks.
            let edge = i.min(total - 1 - i);
            let gain = if fade > 0 && edge < fade {
                edge as f32 / fade as f32
            } else {
                1.0
            };
            (i as f32 * step).sin() * 0.5 * gain
        })
        .collect();

    Ok(Clip {
        samples: samples.into(),
        sample_rate: TONE_SAMPLE_RATE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tone_loads() {
        let clip = SoundSource::default().load().unwrap();
        assert_eq!(clip.sample_rate, TONE_SAMPLE_RATE);
        assert_eq!(clip.duration_ms(), 2000);
        assert!(clip.samples.iter().all(|s| s.abs() <= 0.5));
        assert_eq!(clip.samples[0], 0.0);
    }

    #[test]
    fn test_invalid_tone_is_rejected() {
        let source = SoundSource::Tone {
            frequency_hz: 0.0,
            duration_ms: 100,
        };
        assert!(matches!(source.load(), Err(PlayerError::Source(_))));
    }

    #[test]
    fn test_overlong_tone_is_rejected() {
        for duration_ms in [MAX_TONE_DURATION_MS + 1, u64::MAX] {
            let source = SoundSource::Tone {
                frequency_hz: 440.0,
                duration_ms,
            };
            assert!(matches!(source.load(), Err(PlayerError::Source(_))));
        }
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let source = SoundSource::File {
            path: PathBuf::from("/definitely/not/here.wav"),
        };
        assert!(matches!(source.load(), Err(PlayerError::Source(_))));
    }

    #[test]
    fn test_stereo_wav_is_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..80 {
            writer.write_sample(i16::MAX).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let clip = SoundSource::File { path }.load().unwrap();
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.samples.len(), 80);
        assert!((clip.samples[0] - 0.5).abs() < 0.01);
        assert_eq!(clip.duration_ms(), 10);
    }
}
