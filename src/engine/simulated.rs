//! Scripted in-process engines for development and tests
//!
//! These replay configurable event sequences over the engine event
//! channels, so the coordination layer can be exercised end to end without
//! platform bindings or audio hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc, watch};

use super::{
    BoundaryKind, EngineErrorCode, RecognitionEngine, RecognitionEvent, RecognitionResult,
    SynthesisEngine, SynthesisEvent, Utterance, Voice,
};
use crate::config::RecognitionConfig;
use crate::{Error, Result};

/// One scripted engine occurrence within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedEvent {
    /// Emit a recognition result after a delay
    Result {
        /// Delay before emitting, in milliseconds
        delay_ms: u64,
        /// Transcript text
        transcript: String,
        /// Engine confidence
        #[serde(default = "default_confidence")]
        confidence: f32,
        /// Whether this result is final
        #[serde(default = "default_final")]
        is_final: bool,
    },
    /// Fail the session after a delay; the engine ends itself afterwards
    Error {
        /// Delay before failing, in milliseconds
        delay_ms: u64,
        /// Engine error code (e.g. "no-speech", "network", "not-allowed")
        code: String,
    },
}

const fn default_confidence() -> f32 {
    0.9
}

const fn default_final() -> bool {
    true
}

impl ScriptedEvent {
    /// A final result after `delay_ms`
    #[must_use]
    pub fn final_result(delay_ms: u64, transcript: impl Into<String>) -> Self {
        Self::Result {
            delay_ms,
            transcript: transcript.into(),
            confidence: default_confidence(),
            is_final: true,
        }
    }

    /// An interim result after `delay_ms`
    #[must_use]
    pub fn interim_result(delay_ms: u64, transcript: impl Into<String>) -> Self {
        Self::Result {
            delay_ms,
            transcript: transcript.into(),
            confidence: 0.0,
            is_final: false,
        }
    }

    /// An engine failure after `delay_ms`
    #[must_use]
    pub fn error(delay_ms: u64, code: EngineErrorCode) -> Self {
        Self::Error {
            delay_ms,
            code: code.to_string(),
        }
    }
}

fn parse_code(code: &str) -> EngineErrorCode {
    match code {
        "no-speech" => EngineErrorCode::NoSpeech,
        "network" => EngineErrorCode::Network,
        "not-allowed" => EngineErrorCode::NotAllowed,
        "service-not-allowed" => EngineErrorCode::ServiceNotAllowed,
        "audio-capture" => EngineErrorCode::AudioCapture,
        "aborted" => EngineErrorCode::Aborted,
        other => EngineErrorCode::Other(other.to_string()),
    }
}

/// Shared handle for queueing sessions onto a [`SimulatedRecognitionEngine`]
///
/// Clone it before handing the engine to a manager to feed later sessions.
#[derive(Debug, Clone, Default)]
pub struct ScriptQueue {
    sessions: Arc<Mutex<VecDeque<Vec<ScriptedEvent>>>>,
}

impl ScriptQueue {
    /// Append one session script
    pub fn push(&self, script: Vec<ScriptedEvent>) {
        self.lock().push_back(script);
    }

    fn pop(&self) -> Vec<ScriptedEvent> {
        self.lock().pop_front().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<ScriptedEvent>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A scripted recognition engine
///
/// Each `start` pops the next queued session script and replays it; after
/// the script is drained the session stays open until `stop`, which emits
/// the closing `Ended` event (mirroring a real engine's end-on-stop
/// behavior). A session with no script is simply silence.
pub struct SimulatedRecognitionEngine {
    available: bool,
    scripts: ScriptQueue,
    active: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl SimulatedRecognitionEngine {
    /// An available engine with no queued sessions
    #[must_use]
    pub fn available() -> Self {
        Self {
            available: true,
            scripts: ScriptQueue::default(),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// An engine reporting no platform capability
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// An available engine with one queued session
    #[must_use]
    pub fn with_session(script: Vec<ScriptedEvent>) -> Self {
        let engine = Self::available();
        engine.scripts.push(script);
        engine
    }

    /// Handle for queueing further sessions after the engine moves away
    #[must_use]
    pub fn script_queue(&self) -> ScriptQueue {
        self.scripts.clone()
    }
}

#[async_trait]
impl RecognitionEngine for SimulatedRecognitionEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn start(
        &mut self,
        _config: &RecognitionConfig,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<()> {
        if !self.available {
            return Err(Error::EngineUnsupported(
                "simulated engine configured unavailable".to_string(),
            ));
        }

        let script = self.scripts.pop();
        let cancel = Arc::new(Notify::new());
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&cancel));

        tokio::spawn(async move {
            let _ = events.send(RecognitionEvent::Started);

            for item in script {
                let delay = match &item {
                    ScriptedEvent::Result { delay_ms, .. } | ScriptedEvent::Error { delay_ms, .. } => {
                        *delay_ms
                    }
                };
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    () = cancel.notified() => {
                        let _ = events.send(RecognitionEvent::Ended);
                        return;
                    }
                }

                match item {
                    ScriptedEvent::Result {
                        transcript,
                        confidence,
                        is_final,
                        ..
                    } => {
                        let _ = events.send(RecognitionEvent::Result(RecognitionResult {
                            transcript,
                            confidence,
                            is_final,
                            alternatives: Vec::new(),
                        }));
                    }
                    ScriptedEvent::Error { code, .. } => {
                        let _ = events.send(RecognitionEvent::Error(parse_code(&code)));
                        let _ = events.send(RecognitionEvent::Ended);
                        return;
                    }
                }
            }

            cancel.notified().await;
            let _ = events.send(RecognitionEvent::Ended);
        });

        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(cancel) = self.active.lock().unwrap_or_else(|e| e.into_inner()).take() {
            cancel.notify_one();
        }
    }
}

/// A scripted synthesis engine
///
/// "Plays" an utterance by walking its words on a timer, emitting a word
/// boundary per word, and honors pause/resume/cancel. Spoken texts are
/// recorded for inspection.
pub struct SimulatedSynthesisEngine {
    available: bool,
    voices: Vec<Voice>,
    ms_per_word: u64,
    paused_tx: watch::Sender<bool>,
    paused_rx: watch::Receiver<bool>,
    active: Arc<Mutex<Option<Arc<Notify>>>>,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl Default for SimulatedSynthesisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSynthesisEngine {
    /// An available engine with a small Spanish/English voice inventory
    #[must_use]
    pub fn new() -> Self {
        Self::with_voices(vec![
            Voice {
                id: "es-es-1".to_string(),
                name: "Conchita".to_string(),
                language: "es-ES".to_string(),
                default: false,
            },
            Voice {
                id: "es-mx-1".to_string(),
                name: "Mia".to_string(),
                language: "es-MX".to_string(),
                default: false,
            },
            Voice {
                id: "en-us-1".to_string(),
                name: "Joanna".to_string(),
                language: "en-US".to_string(),
                default: true,
            },
        ])
    }

    /// An available engine with a custom voice inventory
    #[must_use]
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let (paused_tx, paused_rx) = watch::channel(false);
        Self {
            available: true,
            voices,
            ms_per_word: 10,
            paused_tx,
            paused_rx,
            active: Arc::new(Mutex::new(None)),
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An engine reporting no platform capability
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Override the simulated per-word playback duration
    #[must_use]
    pub fn with_ms_per_word(mut self, ms_per_word: u64) -> Self {
        self.ms_per_word = ms_per_word;
        self
    }

    /// Handle to the spoken-text log, usable after the engine moves away
    #[must_use]
    pub fn spoken_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }

    /// Texts spoken so far, in playback order
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SynthesisEngine for SimulatedSynthesisEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(
        &mut self,
        utterance: &Utterance,
        events: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Result<()> {
        if !self.available {
            return Err(Error::EngineUnsupported(
                "simulated engine configured unavailable".to_string(),
            ));
        }

        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(utterance.text.clone());

        let cancel = Arc::new(Notify::new());
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&cancel));

        let text = utterance.text.clone();
        let ms_per_word = self.ms_per_word;
        let mut paused = self.paused_rx.clone();

        tokio::spawn(async move {
            let _ = events.send(SynthesisEvent::Started);

            for (char_index, char_len) in word_spans(&text) {
                // Block while paused
                while *paused.borrow() {
                    tokio::select! {
                        changed = paused.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        () = cancel.notified() => {
                            let _ = events.send(SynthesisEvent::Ended);
                            return;
                        }
                    }
                }

                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(ms_per_word)) => {}
                    () = cancel.notified() => {
                        let _ = events.send(SynthesisEvent::Ended);
                        return;
                    }
                }

                let _ = events.send(SynthesisEvent::Boundary {
                    char_index,
                    char_len,
                    kind: BoundaryKind::Word,
                });
            }

            let _ = events.send(SynthesisEvent::Ended);
        });

        Ok(())
    }

    async fn pause(&mut self) {
        let _ = self.paused_tx.send(true);
    }

    async fn resume(&mut self) {
        let _ = self.paused_tx.send(false);
    }

    async fn cancel(&mut self) {
        let _ = self.paused_tx.send(false);
        if let Some(cancel) = self.active.lock().unwrap_or_else(|e| e.into_inner()).take() {
            cancel.notify_one();
        }
    }
}

/// Word positions within `text` as (char offset, char length) pairs
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    let mut index = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, index - s));
            }
        } else if start.is_none() {
            start = Some(index);
        }
        index += 1;
    }
    if let Some(s) = start {
        spans.push((s, index - s));
    }
    spans
}
