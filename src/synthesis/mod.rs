//! Synthesis queue management
//!
//! A FIFO queue of speech requests, each independently configured, played
//! back one at a time on a dedicated task. Each item takes a synthesis
//! lease from the arbiter before playback, so synthesis never silently
//! fights an active recognition session.

mod voice;

pub use voice::select_voice;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use crate::arbiter::{AccessArbiter, ConsumerId};
use crate::config::SpeechConfig;
use crate::engine::{SynthesisEngine, SynthesisEvent, Utterance};
use crate::{Error, Result};

/// Callbacks attached to one speech request
///
/// All are optional; `on_highlight` only fires when the item's config
/// enables highlighting, carrying the character offset and length of the
/// word being spoken.
#[derive(Default)]
pub struct SpeechCallbacks {
    /// Playback began
    pub on_start: Option<Box<dyn Fn(Uuid) + Send + Sync>>,
    /// Playback finished (including after a cancel)
    pub on_end: Option<Box<dyn Fn(Uuid) + Send + Sync>>,
    /// Playback failed or was skipped
    pub on_error: Option<Box<dyn Fn(Uuid, &Error) + Send + Sync>>,
    /// A word boundary was reached: (id, char offset, char length)
    pub on_highlight: Option<Box<dyn Fn(Uuid, usize, usize) + Send + Sync>>,
}

impl std::fmt::Debug for SpeechCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_end", &self.on_end.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_highlight", &self.on_highlight.is_some())
            .finish()
    }
}

/// One queued speech request; consumed and discarded after playback
struct SpeechQueueItem {
    id: Uuid,
    text: String,
    config: SpeechConfig,
    callbacks: SpeechCallbacks,
}

/// Playback status of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing playing, queue drained
    Idle,
    /// An item is playing
    Speaking,
    /// The in-flight item is paused
    Paused,
}

/// Control messages for the playback task
enum QueueCommand {
    Pause,
    Resume,
    Stop,
    Shutdown,
}

struct QueueShared {
    pending: Mutex<VecDeque<SpeechQueueItem>>,
    playback: Mutex<PlaybackState>,
    wake: Notify,
}

impl QueueShared {
    fn pending(&self) -> MutexGuard<'_, VecDeque<SpeechQueueItem>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn playback(&self) -> PlaybackState {
        *self.playback.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_playback(&self, state: PlaybackState) {
        *self.playback.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// FIFO speech queue coordinating with the access arbiter
///
/// `speak` returns immediately; playback happens on a dedicated task, one
/// item at a time, in arrival order.
pub struct SpeechQueue {
    shared: Arc<QueueShared>,
    commands: mpsc::UnboundedSender<QueueCommand>,
}

impl SpeechQueue {
    /// Create the queue and start its playback task
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineUnsupported`] if the engine reports no
    /// synthesis capability.
    pub fn new(
        arbiter: AccessArbiter,
        engine: Box<dyn SynthesisEngine>,
        preferred_languages: Vec<String>,
    ) -> Result<Self> {
        if !engine.is_available() {
            return Err(Error::EngineUnsupported(
                "no synthesis capability".to_string(),
            ));
        }

        let shared = Arc::new(QueueShared {
            pending: Mutex::new(VecDeque::new()),
            playback: Mutex::new(PlaybackState::Idle),
            wake: Notify::new(),
        });
        let (commands, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_playback(
            engine,
            Arc::clone(&shared),
            arbiter,
            preferred_languages,
            command_rx,
        ));

        Ok(Self { shared, commands })
    }

    /// Enqueue text for playback; returns the item id immediately
    ///
    /// # Errors
    ///
    /// Rejects empty text with [`Error::Synthesis`].
    pub fn speak(&self, text: &str, config: &SpeechConfig) -> Result<Uuid> {
        self.speak_with_callbacks(text, config, SpeechCallbacks::default())
    }

    /// Enqueue text with per-item callbacks
    ///
    /// # Errors
    ///
    /// Rejects empty text with [`Error::Synthesis`].
    pub fn speak_with_callbacks(
        &self,
        text: &str,
        config: &SpeechConfig,
        callbacks: SpeechCallbacks,
    ) -> Result<Uuid> {
        if text.trim().is_empty() {
            return Err(Error::Synthesis("cannot speak empty text".to_string()));
        }

        let item = SpeechQueueItem {
            id: Uuid::new_v4(),
            text: text.to_string(),
            config: config.clamped(),
            callbacks,
        };
        let id = item.id;

        self.shared.pending().push_back(item);
        self.shared.wake.notify_one();
        tracing::debug!(%id, queued = self.queue_len(), "speech enqueued");
        Ok(id)
    }

    /// Number of queued-but-not-yet-playing items
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.pending().len()
    }

    /// Current playback state
    #[must_use]
    pub fn playback_state(&self) -> PlaybackState {
        self.shared.playback()
    }

    /// Pause the in-flight item; no-op unless something is playing
    pub fn pause(&self) {
        if self.shared.playback() == PlaybackState::Speaking {
            let _ = self.commands.send(QueueCommand::Pause);
        }
    }

    /// Resume a paused item; no-op unless paused
    pub fn resume(&self) {
        if self.shared.playback() == PlaybackState::Paused {
            let _ = self.commands.send(QueueCommand::Resume);
        }
    }

    /// Discard every pending item and cancel the in-flight one
    ///
    /// This is the only operation that drops queued-but-unplayed items;
    /// their callbacks never fire.
    pub fn stop(&self) {
        let dropped = {
            let mut pending = self.shared.pending();
            let count = pending.len();
            pending.clear();
            count
        };
        tracing::debug!(dropped, "speech queue stopped");
        let _ = self.commands.send(QueueCommand::Stop);
    }

    /// Human-readable dump, for diagnostics only
    #[must_use]
    pub fn debug_snapshot(&self) -> String {
        format!(
            "synthesis: playback={:?} queued={}",
            self.shared.playback(),
            self.queue_len(),
        )
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        let _ = self.commands.send(QueueCommand::Shutdown);
    }
}

/// Wait for the next queued item, servicing control messages meanwhile
///
/// Returns `None` on shutdown.
async fn next_item(
    shared: &QueueShared,
    command_rx: &mut mpsc::UnboundedReceiver<QueueCommand>,
) -> Option<SpeechQueueItem> {
    loop {
        if let Some(item) = shared.pending().pop_front() {
            return Some(item);
        }
        tokio::select! {
            () = shared.wake.notified() => {}
            cmd = command_rx.recv() => match cmd {
                None | Some(QueueCommand::Shutdown) => return None,
                // Pause/resume are only valid mid-playback; stop on an
                // empty queue has nothing left to do
                Some(QueueCommand::Pause | QueueCommand::Resume | QueueCommand::Stop) => {}
            },
        }
    }
}

/// Playback task: dequeue, lease, play to completion, repeat
async fn run_playback(
    mut engine: Box<dyn SynthesisEngine>,
    shared: Arc<QueueShared>,
    arbiter: AccessArbiter,
    preferred_languages: Vec<String>,
    mut command_rx: mpsc::UnboundedReceiver<QueueCommand>,
) {
    while let Some(item) = next_item(&shared, &mut command_rx).await {
        let Some(lease) = arbiter.acquire_synthesis(ConsumerId::Synthesis) else {
            tracing::warn!(id = %item.id, "synthesis access denied, skipping item");
            if let Some(on_error) = &item.callbacks.on_error {
                on_error(item.id, &Error::AccessDenied("synthesis".to_string()));
            }
            continue;
        };

        let voices = engine.voices();
        let voice = select_voice(&voices, &preferred_languages, item.config.voice.as_deref());
        let utterance = Utterance {
            text: item.text.clone(),
            voice: voice.map(|v| v.id.clone()),
            rate: item.config.rate,
            pitch: item.config.pitch,
            volume: item.config.volume,
            language: item.config.language.clone(),
        };

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        if let Err(e) = engine.speak(&utterance, event_tx).await {
            tracing::error!(id = %item.id, error = %e, "synthesis start failed");
            if let Some(on_error) = &item.callbacks.on_error {
                on_error(item.id, &e);
            }
            drop(lease);
            continue;
        }

        shared.set_playback(PlaybackState::Speaking);
        let shutdown = play_item(
            &mut engine,
            &shared,
            &item,
            &mut event_rx,
            &mut command_rx,
        )
        .await;

        shared.set_playback(PlaybackState::Idle);
        drop(lease);

        if shutdown {
            break;
        }
    }

    engine.cancel().await;
}

/// Drive one item to completion; returns true when shutdown was requested
async fn play_item(
    engine: &mut Box<dyn SynthesisEngine>,
    shared: &QueueShared,
    item: &SpeechQueueItem,
    event_rx: &mut mpsc::UnboundedReceiver<SynthesisEvent>,
    command_rx: &mut mpsc::UnboundedReceiver<QueueCommand>,
) -> bool {
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(SynthesisEvent::Started) => {
                    tracing::debug!(id = %item.id, "playback started");
                    if let Some(on_start) = &item.callbacks.on_start {
                        on_start(item.id);
                    }
                }
                Some(SynthesisEvent::Boundary { char_index, char_len, .. }) => {
                    if item.config.highlight {
                        if let Some(on_highlight) = &item.callbacks.on_highlight {
                            on_highlight(item.id, char_index, char_len);
                        }
                    }
                }
                Some(SynthesisEvent::Ended) => {
                    tracing::debug!(id = %item.id, "playback complete");
                    if let Some(on_end) = &item.callbacks.on_end {
                        on_end(item.id);
                    }
                    return false;
                }
                Some(SynthesisEvent::Error(code)) => {
                    let error = Error::Synthesis(code.to_string());
                    tracing::warn!(id = %item.id, error = %error, "playback failed");
                    if let Some(on_error) = &item.callbacks.on_error {
                        on_error(item.id, &error);
                    }
                    return false;
                }
                None => {
                    // Engine dropped the channel without an end event
                    tracing::warn!(id = %item.id, "playback channel closed early");
                    return false;
                }
            },
            cmd = command_rx.recv() => match cmd {
                Some(QueueCommand::Pause) => {
                    engine.pause().await;
                    shared.set_playback(PlaybackState::Paused);
                }
                Some(QueueCommand::Resume) => {
                    engine.resume().await;
                    shared.set_playback(PlaybackState::Speaking);
                }
                Some(QueueCommand::Stop) => {
                    // Cancel and keep draining; the engine still delivers
                    // its end event, which fires on_end above
                    engine.cancel().await;
                }
                None | Some(QueueCommand::Shutdown) => {
                    engine.cancel().await;
                    return true;
                }
            },
        }
    }
}
