//! Keyword-to-command handoff
//!
//! Runs continuous keyword listening; on an activation-keyword match it
//! stops the keyword session and either emits the trailing utterance text
//! as the command immediately, or runs a time-boxed command-capture
//! session. Keyword listening resumes after completion, timeout, or error.
//!
//! The controller never lets both sessions listen at once: it always stops
//! one before starting the other, and the shared arbiter refuses a second
//! concurrent session even if this bookkeeping were wrong.

use std::sync::{Arc, Mutex};

use crate::arbiter::{AccessArbiter, ConsumerId};
use crate::config::{HandsFreeConfig, RecognitionConfig};
use crate::dispatch::{ListenerId, Listeners};
use crate::engine::RecognitionEngine;
use crate::keyword::KeywordSet;
use crate::recognition::{RecognitionManager, SessionEvent, SessionState};

/// Operating mode of the handoff controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandsFreeMode {
    /// Hands-free is off (or terminally failed)
    Disabled,
    /// Passively listening for an activation keyword
    Keyword,
    /// Capturing the command that follows a keyword
    CommandCapture,
}

/// A captured hands-free command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    /// The command text
    pub command: String,
    /// The canonical keyword that triggered capture
    pub keyword: String,
}

struct ControllerInner {
    keyword_session: RecognitionManager,
    command_session: RecognitionManager,
    keywords: KeywordSet,
    mode: Mutex<HandsFreeMode>,
    /// Keyword that armed the pending command capture
    pending_keyword: Mutex<String>,
    listeners: Listeners<CommandEvent>,
}

impl ControllerInner {
    fn mode(&self) -> HandsFreeMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_mode(&self, mode: HandsFreeMode) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }
}

/// Coordinates passive keyword listening with command capture
///
/// Built on two [`RecognitionManager`]s sharing one injected arbiter: the
/// `keyword-listener` consumer runs continuous, the `command-capture`
/// consumer is one-shot with a longer timeout.
pub struct HandsFreeController {
    inner: Arc<ControllerInner>,
}

impl HandsFreeController {
    /// Create a controller against the shared arbiter
    ///
    /// `recognition` supplies the base engine configuration; the keyword
    /// session forces `continuous` on, and the command session gets the
    /// hands-free command timeout.
    #[must_use]
    pub fn new(
        arbiter: AccessArbiter,
        config: &HandsFreeConfig,
        recognition: &RecognitionConfig,
    ) -> Self {
        let keyword_config = RecognitionConfig {
            continuous: true,
            ..recognition.clone()
        };
        let command_config = RecognitionConfig {
            continuous: false,
            listen_timeout_ms: config.command_timeout_ms,
            ..recognition.clone()
        };

        let inner = Arc::new(ControllerInner {
            keyword_session: RecognitionManager::new(
                ConsumerId::KeywordListener,
                arbiter.clone(),
                keyword_config,
            ),
            command_session: RecognitionManager::new(
                ConsumerId::CommandCapture,
                arbiter,
                command_config,
            ),
            keywords: config.keywords.clone(),
            mode: Mutex::new(HandsFreeMode::Disabled),
            pending_keyword: Mutex::new(String::new()),
            listeners: Listeners::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner.keyword_session.subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                on_keyword_event(&inner, event);
            }
        });

        let weak = Arc::downgrade(&inner);
        inner.command_session.subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                on_command_event(&inner, event);
            }
        });

        Self { inner }
    }

    /// Initialize both sessions and begin keyword listening
    ///
    /// Returns `false` (and stays disabled) if either session cannot
    /// initialize or keyword listening cannot start.
    pub fn enable(
        &self,
        keyword_engine: Box<dyn RecognitionEngine>,
        command_engine: Box<dyn RecognitionEngine>,
    ) -> bool {
        if !self.inner.keyword_session.initialize(keyword_engine) {
            tracing::warn!("keyword session failed to initialize");
            return false;
        }
        if !self.inner.command_session.initialize(command_engine) {
            tracing::warn!("command session failed to initialize");
            return false;
        }
        self.inner.set_mode(HandsFreeMode::Keyword);
        if self.inner.keyword_session.start_listening() {
            tracing::info!(keywords = ?self.inner.keywords.keywords(), "hands-free enabled");
            true
        } else {
            self.inner.set_mode(HandsFreeMode::Disabled);
            false
        }
    }

    /// Stop both sessions and go quiet
    pub fn disable(&self) {
        self.inner.set_mode(HandsFreeMode::Disabled);
        self.inner.keyword_session.stop_listening();
        self.inner.command_session.stop_listening();
        tracing::info!("hands-free disabled");
    }

    /// Current operating mode
    #[must_use]
    pub fn mode(&self) -> HandsFreeMode {
        self.inner.mode()
    }

    /// Register a command listener; returns the id needed to unsubscribe
    pub fn subscribe(
        &self,
        listener: impl Fn(&CommandEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.subscribe(listener)
    }

    /// Remove a command listener
    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.listeners.unsubscribe(id);
    }

    /// The keyword-listener session, for diagnostics
    #[must_use]
    pub fn keyword_session(&self) -> &RecognitionManager {
        &self.inner.keyword_session
    }

    /// The command-capture session, for diagnostics
    #[must_use]
    pub fn command_session(&self) -> &RecognitionManager {
        &self.inner.command_session
    }

    /// Human-readable dump of both sessions and the mode
    #[must_use]
    pub fn debug_snapshot(&self) -> String {
        format!(
            "hands-free mode={:?}\n  {}\n  {}",
            self.inner.mode(),
            self.inner.keyword_session.debug_snapshot(),
            self.inner.command_session.debug_snapshot(),
        )
    }
}

/// React to keyword-session events
fn on_keyword_event(inner: &Arc<ControllerInner>, event: &SessionEvent) {
    match event {
        SessionEvent::Final(result) => {
            if inner.mode() != HandsFreeMode::Keyword {
                return;
            }
            let Some(found) = inner.keywords.find_match(&result.transcript) else {
                tracing::trace!(transcript = %result.transcript, "no keyword");
                return;
            };

            // Hand off: the keyword session must be fully stopped before
            // command capture may start.
            inner.keyword_session.stop_listening();

            if found.command.is_empty() {
                tracing::info!(keyword = %found.keyword, "keyword matched, capturing command");
                *inner
                    .pending_keyword
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = found.keyword;
                inner.set_mode(HandsFreeMode::CommandCapture);
            } else {
                // The command rode along in the same utterance
                tracing::info!(keyword = %found.keyword, command = %found.command, "inline command");
                inner.listeners.emit(&CommandEvent {
                    command: found.command,
                    keyword: found.keyword,
                });
            }
        }
        SessionEvent::StateChanged { to, .. } => match (*to, inner.mode()) {
            // Keyword session wound down while a capture is pending: start it
            (SessionState::Idle, HandsFreeMode::CommandCapture) => {
                if !inner.command_session.start_listening() {
                    tracing::warn!("command capture failed to start, resuming keyword listening");
                    inner.set_mode(HandsFreeMode::Keyword);
                    let _ = inner.keyword_session.start_listening();
                }
            }
            // Keyword session ended (stop, timeout, soft-error cooldown):
            // re-arm while hands-free stays on
            (SessionState::Idle, HandsFreeMode::Keyword) => {
                let _ = inner.keyword_session.start_listening();
            }
            (SessionState::Disabled, _) => {
                tracing::warn!("keyword session disabled, hands-free off");
                inner.set_mode(HandsFreeMode::Disabled);
            }
            _ => {}
        },
        _ => {}
    }
}

/// React to command-session events
fn on_command_event(inner: &Arc<ControllerInner>, event: &SessionEvent) {
    match event {
        SessionEvent::Final(result) => {
            if inner.mode() != HandsFreeMode::CommandCapture {
                return;
            }
            let keyword = inner
                .pending_keyword
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            let command = result.transcript.trim().to_string();
            if command.is_empty() {
                tracing::debug!("empty command capture");
            } else {
                tracing::info!(command = %command, "command captured");
                inner.listeners.emit(&CommandEvent { command, keyword });
            }
            inner.set_mode(HandsFreeMode::Keyword);
        }
        SessionEvent::StateChanged { to, .. } => match (*to, inner.mode()) {
            // Timeout or error with no final result: abandon silently
            (SessionState::Idle, HandsFreeMode::CommandCapture) => {
                tracing::debug!("command capture abandoned");
                inner.set_mode(HandsFreeMode::Keyword);
                let _ = inner.keyword_session.start_listening();
            }
            // Normal completion: resume keyword listening
            (SessionState::Idle, HandsFreeMode::Keyword) => {
                let _ = inner.keyword_session.start_listening();
            }
            (SessionState::Disabled, _) => {
                tracing::warn!("command session disabled, hands-free off");
                inner.set_mode(HandsFreeMode::Disabled);
            }
            _ => {}
        },
        _ => {}
    }
}
