//! Podium - speech capability coordination for voice interfaces
//!
//! Coordinates access to two singleton platform capabilities, a
//! speech-recognition engine and a text-to-speech engine, across
//! independent consumers that must never collide:
//! - one consumer may hold an active recognition session at a time
//! - synthesis requests are serialized through a FIFO queue
//! - keyword-triggered command capture hands off cleanly between passive
//!   keyword listening and active capture
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Consumers                         │
//! │  Dictation │ Keyword listener │ Commands │ Speech   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Coordination layer                   │
//! │  Session manager │ Hands-free │ Speech queue        │
//! │                 Access arbiter                       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Platform engines (traits)               │
//! │     Recognition engine  │  Synthesis engine          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod arbiter;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handsfree;
pub mod keyword;
pub mod recognition;
pub mod repair;
pub mod service;
pub mod synthesis;

pub use arbiter::{AccessArbiter, AccessRecord, ConsumerId, RecognitionLease, SynthesisLease};
pub use config::{Config, HandsFreeConfig, RecognitionConfig, SpeechConfig};
pub use dispatch::{ListenerId, Listeners};
pub use engine::{
    BoundaryKind, EngineErrorCode, RecognitionEngine, RecognitionEvent, RecognitionResult,
    SynthesisEngine, SynthesisEvent, Utterance, Voice,
};
pub use error::{Error, Result};
pub use handsfree::{CommandEvent, HandsFreeController, HandsFreeMode};
pub use keyword::{KeywordMatch, KeywordSet};
pub use recognition::{RecognitionManager, SessionEvent, SessionState};
pub use repair::{RepairReport, run_repair};
pub use service::{ServiceEngines, SpeechService};
pub use synthesis::{PlaybackState, SpeechCallbacks, SpeechQueue, select_voice};
