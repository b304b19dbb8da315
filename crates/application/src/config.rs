//! Session configuration loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stillcue_awareness::ActivityKind;
use stillcue_player::{SoundSource, MAX_TONE_DURATION_MS};

pub const DEFAULT_RECEIVER_ACTION: &str = "stillcue.FENCE_RECEIVER_ACTION";
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Validation error in {path}: {message}")]
    Validation { path: PathBuf, message: String },
}

/// Everything a session needs to know up front.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Action every delivery must carry to be accepted.
    pub receiver_action: String,
    /// Activity treated as the steady state.
    pub activity: ActivityKind,
    /// Sound played when the steady state is entered.
    pub cue: SoundSource,
    /// Bound of the delivery queue between provider and worker.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            receiver_action: DEFAULT_RECEIVER_ACTION.to_string(),
            activity: ActivityKind::Still,
            cue: SoundSource::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate(path)?;

        tracing::info!(path = %path.display(), activity = %config.activity, "config loaded");
        Ok(config)
    }

    /// Platform config location.
    ///
    /// - macOS: ~/Library/Application Support/stillcue/config.json
    /// - Linux: ~/.config/stillcue/config.json
    /// - Windows: %APPDATA%/stillcue/config.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config| config.join("stillcue").join("config.json"))
    }

    /// Load from the default location, or fall back to defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.receiver_action.trim().is_empty() {
            return Err(ConfigError::Validation {
                path: path.to_path_buf(),
                message: "receiver_action must not be empty".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation {
                path: path.to_path_buf(),
                message: "queue_capacity must be at least 1".to_string(),
            });
        }
        if let SoundSource::Tone { duration_ms, .. } = self.cue {
            if duration_ms > MAX_TONE_DURATION_MS {
                return Err(ConfigError::Validation {
                    path: path.to_path_buf(),
                    message: format!("tone cue may last at most {MAX_TONE_DURATION_MS} ms"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"activity": "on_foot"}"#);

        let config = SessionConfig::load(&path).unwrap();

        assert_eq!(config.activity, ActivityKind::OnFoot);
        assert_eq!(config.receiver_action, DEFAULT_RECEIVER_ACTION);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_file_cue() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"cue": {"type": "file", "path": "/tmp/bell.wav"}}"#);

        let config = SessionConfig::load(&path).unwrap();

        assert_eq!(
            config.cue,
            SoundSource::File {
                path: PathBuf::from("/tmp/bell.wav")
            }
        );
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "{ not json");
        assert!(matches!(
            SessionConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"queue_capacity": 0}"#);
        assert!(matches!(
            SessionConfig::load(&path),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_overlong_tone_cue_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"{"cue": {"type": "tone", "frequency_hz": 440.0, "duration_ms": 18446744073709551615}}"#,
        );
        assert!(matches!(
            SessionConfig::load(&path),
            Err(ConfigError::Validation { .. })
        ));
    }
}
