//! Configuration for the speech coordination layer
//!
//! All configuration is supplied in-process; the demo binary can load it
//! from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keyword::KeywordSet;
use crate::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognition session configuration (dictation consumer)
    pub recognition: RecognitionConfig,

    /// Default synthesis parameters
    pub synthesis: SpeechConfig,

    /// Hands-free keyword/command configuration
    pub hands_free: HandsFreeConfig,

    /// Preferred languages for voice selection, most specific first
    pub preferred_languages: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.hands_free.keywords.normalize();
        Ok(config)
    }
}

/// Recognition session configuration
///
/// Mirrors the configuration surface the platform recognition engine
/// consumes, plus the session timeouts the manager itself enforces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Language tag passed to the engine (e.g. "es-ES")
    pub language: String,

    /// Continuous capture: final results do not end the session
    pub continuous: bool,

    /// Forward interim (non-final) transcripts
    pub interim_results: bool,

    /// Maximum alternatives requested per result
    pub max_alternatives: u8,

    /// Listening window before the session is force-stopped, in milliseconds
    pub listen_timeout_ms: u64,

    /// Cooldown before a soft error auto-resets to idle, in milliseconds
    pub error_cooldown_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "es-ES".to_string(),
            continuous: false,
            interim_results: true,
            max_alternatives: 1,
            listen_timeout_ms: 12_000,
            error_cooldown_ms: 1_500,
        }
    }
}

impl RecognitionConfig {
    /// Listening timeout as a [`Duration`]
    #[must_use]
    pub const fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    /// Soft-error cooldown as a [`Duration`]
    #[must_use]
    pub const fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }
}

/// Per-utterance synthesis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Preferred voice identifier; falls back to language-based selection
    pub voice: Option<String>,

    /// Speaking rate multiplier, clamped to [0.1, 10]
    pub rate: f32,

    /// Pitch, clamped to [0, 2]
    pub pitch: f32,

    /// Volume, clamped to [0, 1]
    pub volume: f32,

    /// Language tag for voice selection
    pub language: String,

    /// Fire word-boundary highlight callbacks during playback
    pub highlight: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            language: "es-ES".to_string(),
            highlight: false,
        }
    }
}

impl SpeechConfig {
    /// Return a copy with all numeric parameters clamped to their valid ranges
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            rate: self.rate.clamp(0.1, 10.0),
            pitch: self.pitch.clamp(0.0, 2.0),
            volume: self.volume.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

/// Hands-free keyword/command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandsFreeConfig {
    /// Enable the keyword-to-command handoff controller
    pub enabled: bool,

    /// Activation keywords and mis-transcription tolerance
    pub keywords: KeywordSet,

    /// Command-capture window, in milliseconds (longer than the keyword window)
    pub command_timeout_ms: u64,
}

impl Default for HandsFreeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: KeywordSet::default(),
            command_timeout_ms: 18_000,
        }
    }
}

impl HandsFreeConfig {
    /// Command-capture timeout as a [`Duration`]
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_config_clamping() {
        let config = SpeechConfig {
            rate: 50.0,
            pitch: -1.0,
            volume: 2.0,
            ..SpeechConfig::default()
        };
        let clamped = config.clamped();
        assert!((clamped.rate - 10.0).abs() < f32::EPSILON);
        assert!(clamped.pitch.abs() < f32::EPSILON);
        assert!((clamped.volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(!config.recognition.continuous);
        assert!(config.recognition.listen_timeout() >= Duration::from_secs(10));
        assert!(config.hands_free.command_timeout() > config.recognition.listen_timeout());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [recognition]
            language = "en-US"
            listen_timeout_ms = 5000

            [hands_free]
            command_timeout_ms = 15000
            "#,
        )
        .unwrap();
        assert_eq!(config.recognition.language, "en-US");
        assert_eq!(config.recognition.listen_timeout_ms, 5000);
        assert_eq!(config.hands_free.command_timeout_ms, 15_000);
        // untouched sections keep defaults
        assert!((config.synthesis.rate - 1.0).abs() < f32::EPSILON);
    }
}
