//! Platform speech engine contracts
//!
//! The coordination layer drives the platform engines through these traits
//! and consumes their event streams; real platform bindings live outside
//! this crate. A scripted pair for development and tests is in
//! [`simulated`].

pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Result;
use crate::config::RecognitionConfig;

/// Error codes reported by a platform engine
///
/// These are translated into the crate error taxonomy by the session
/// manager; consumers never see them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// The engine heard nothing before giving up
    NoSpeech,
    /// Engine-side network failure
    Network,
    /// The user or platform denied access
    NotAllowed,
    /// The platform policy forbids the service
    ServiceNotAllowed,
    /// Audio capture failed
    AudioCapture,
    /// The session was aborted (expected after an explicit stop)
    Aborted,
    /// Anything else, carrying the raw engine code
    Other(String),
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => write!(f, "no-speech"),
            Self::Network => write!(f, "network"),
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::ServiceNotAllowed => write!(f, "service-not-allowed"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::Aborted => write!(f, "aborted"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

/// One recognition result, interim or final
///
/// Produced by the engine, consumed once, not retained beyond the current
/// utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Best transcript for the utterance
    pub transcript: String,
    /// Engine confidence in [0, 1]
    pub confidence: f32,
    /// Whether this result is final
    pub is_final: bool,
    /// Lower-ranked alternative transcripts
    pub alternatives: Vec<String>,
}

impl RecognitionResult {
    /// Convenience constructor for a final result
    #[must_use]
    pub fn final_transcript(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
            is_final: true,
            alternatives: Vec::new(),
        }
    }

    /// Convenience constructor for an interim result
    #[must_use]
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            confidence: 0.0,
            is_final: false,
            alternatives: Vec::new(),
        }
    }
}

/// Events emitted by a recognition engine during one session
///
/// Per-session ordering is reliable: `Started`, zero or more `Result`s,
/// then `Ended` (possibly preceded by `Error`).
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// The engine began capturing audio
    Started,
    /// An interim or final result
    Result(RecognitionResult),
    /// The engine failed
    Error(EngineErrorCode),
    /// The session ended
    Ended,
}

/// A platform speech-recognition engine
#[async_trait]
pub trait RecognitionEngine: Send {
    /// Whether the platform provides a recognition capability at all
    fn is_available(&self) -> bool;

    /// Begin a recognition session
    ///
    /// Session events flow on `events` until `Ended`. Returns immediately;
    /// callers observe progress through the event stream.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be started
    async fn start(
        &mut self,
        config: &RecognitionConfig,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<()>;

    /// Best-effort stop request
    ///
    /// The session is over only when `Ended` is observed on the event
    /// stream; calling this twice is safe.
    async fn stop(&mut self);
}

/// A synthesis voice offered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-specific identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// BCP 47 language tag (e.g. "es-ES")
    pub language: String,
    /// Whether the engine considers this its default voice
    pub default: bool,
}

/// One fully resolved utterance handed to the synthesis engine
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Text to speak
    pub text: String,
    /// Selected voice id, if any; engine default otherwise
    pub voice: Option<String>,
    /// Speaking rate multiplier
    pub rate: f32,
    /// Pitch
    pub pitch: f32,
    /// Volume
    pub volume: f32,
    /// Language tag
    pub language: String,
}

/// Kind of boundary reported during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// A word boundary
    Word,
    /// A sentence boundary
    Sentence,
}

/// Events emitted by a synthesis engine while playing one utterance
#[derive(Debug, Clone)]
pub enum SynthesisEvent {
    /// Playback began
    Started,
    /// A word or sentence boundary was reached
    Boundary {
        /// Character offset of the boundary within the utterance text
        char_index: usize,
        /// Character length of the spoken fragment
        char_len: usize,
        /// Boundary kind
        kind: BoundaryKind,
    },
    /// Playback finished (also emitted after a cancel)
    Ended,
    /// Playback failed
    Error(EngineErrorCode),
}

/// A platform text-to-speech engine
#[async_trait]
pub trait SynthesisEngine: Send {
    /// Whether the platform provides a synthesis capability at all
    fn is_available(&self) -> bool;

    /// The currently known voice inventory
    ///
    /// May be empty early on if the platform populates voices
    /// asynchronously; callers re-read it per utterance.
    fn voices(&self) -> Vec<Voice>;

    /// Begin speaking one utterance
    ///
    /// Playback events flow on `events` until `Ended` or `Error`.
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot be started
    async fn speak(
        &mut self,
        utterance: &Utterance,
        events: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Result<()>;

    /// Pause the in-flight utterance
    async fn pause(&mut self);

    /// Resume a paused utterance
    async fn resume(&mut self);

    /// Cancel the in-flight utterance; `Ended` still follows
    async fn cancel(&mut self);
}
