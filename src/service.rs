//! Consumer-facing speech service
//!
//! Bundles one explicitly constructed [`AccessArbiter`] with a dictation
//! session manager, the hands-free controller, and the synthesis queue.
//! There is no ambient global instance: construct the service once and
//! share it.

use uuid::Uuid;

use crate::arbiter::{AccessArbiter, ConsumerId};
use crate::config::{Config, SpeechConfig};
use crate::dispatch::ListenerId;
use crate::engine::{RecognitionEngine, SynthesisEngine};
use crate::handsfree::{CommandEvent, HandsFreeController};
use crate::recognition::{RecognitionManager, SessionEvent};
use crate::repair::{RepairReport, run_repair};
use crate::synthesis::{SpeechCallbacks, SpeechQueue};
use crate::{Error, Result};

/// The platform engines the service drives
///
/// Each recognition consumer gets its own engine instance; the arbiter is
/// what keeps the underlying singleton resource exclusive.
pub struct ServiceEngines {
    /// Engine for the dictation consumer
    pub dictation: Box<dyn RecognitionEngine>,
    /// Engine for the keyword-listener consumer
    pub keyword: Box<dyn RecognitionEngine>,
    /// Engine for the command-capture consumer
    pub command: Box<dyn RecognitionEngine>,
    /// The synthesis engine
    pub synthesis: Box<dyn SynthesisEngine>,
}

/// One coordinated speech stack
pub struct SpeechService {
    arbiter: AccessArbiter,
    config: Config,
    dictation: RecognitionManager,
    hands_free: HandsFreeController,
    queue: Option<SpeechQueue>,
}

impl SpeechService {
    /// Create an uninitialized service from configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        let arbiter = AccessArbiter::new();
        let dictation = RecognitionManager::new(
            ConsumerId::Dictation,
            arbiter.clone(),
            config.recognition.clone(),
        );
        let hands_free =
            HandsFreeController::new(arbiter.clone(), &config.hands_free, &config.recognition);
        Self {
            arbiter,
            config,
            dictation,
            hands_free,
            queue: None,
        }
    }

    /// Initialize every component against the platform engines
    ///
    /// Returns `true` when dictation and synthesis are up (and hands-free,
    /// when enabled). A dictation initialization failure triggers one
    /// automatic repair pass before giving up.
    pub fn initialize(&mut self, engines: ServiceEngines) -> bool {
        let mut dictation_ok = self.dictation.initialize(engines.dictation);
        if !dictation_ok && self.dictation.capability_available() {
            // Initialization failure with the capability present: run the
            // repair flow once before reporting failure
            let report = run_repair(&self.arbiter, &self.dictation);
            dictation_ok = report.fully_repaired();
        }

        let hands_free_ok = if self.config.hands_free.enabled {
            self.hands_free.enable(engines.keyword, engines.command)
        } else {
            true
        };

        let queue_ok = match SpeechQueue::new(
            self.arbiter.clone(),
            engines.synthesis,
            self.config.preferred_languages.clone(),
        ) {
            Ok(queue) => {
                self.queue = Some(queue);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "synthesis queue unavailable");
                false
            }
        };

        let ok = dictation_ok && hands_free_ok && queue_ok;
        tracing::info!(
            dictation = dictation_ok,
            hands_free = hands_free_ok,
            synthesis = queue_ok,
            "speech service initialized"
        );
        ok
    }

    /// The shared arbiter, for diagnostics and advanced callers
    #[must_use]
    pub const fn arbiter(&self) -> &AccessArbiter {
        &self.arbiter
    }

    /// The dictation session manager
    #[must_use]
    pub const fn dictation(&self) -> &RecognitionManager {
        &self.dictation
    }

    /// The hands-free controller
    #[must_use]
    pub const fn hands_free(&self) -> &HandsFreeController {
        &self.hands_free
    }

    /// Start a dictation listening session
    pub fn start_listening(&self) -> bool {
        self.dictation.start_listening()
    }

    /// Stop the dictation session; the engine's end event completes it
    pub fn stop_listening(&self) {
        self.dictation.stop_listening();
    }

    /// Forget the dictation transcript
    pub fn reset_transcript(&self) {
        self.dictation.reset_transcript();
    }

    /// Subscribe to dictation session events
    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) -> ListenerId {
        self.dictation.subscribe(listener)
    }

    /// Subscribe to hands-free command events
    pub fn subscribe_commands(
        &self,
        listener: impl Fn(&CommandEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.hands_free.subscribe(listener)
    }

    /// Enqueue text for synthesis
    ///
    /// # Errors
    ///
    /// Returns error if the queue is not initialized or the text is empty.
    pub fn speak(&self, text: &str, config: &SpeechConfig) -> Result<Uuid> {
        self.queue()?.speak(text, config)
    }

    /// Enqueue text for synthesis with per-item callbacks
    ///
    /// # Errors
    ///
    /// Returns error if the queue is not initialized or the text is empty.
    pub fn speak_with_callbacks(
        &self,
        text: &str,
        config: &SpeechConfig,
        callbacks: SpeechCallbacks,
    ) -> Result<Uuid> {
        self.queue()?.speak_with_callbacks(text, config, callbacks)
    }

    /// Pause the in-flight utterance; no-op unless something is playing
    pub fn pause(&self) {
        if let Some(queue) = &self.queue {
            queue.pause();
        }
    }

    /// Resume a paused utterance; no-op unless paused
    pub fn resume(&self) {
        if let Some(queue) = &self.queue {
            queue.resume();
        }
    }

    /// Clear the synthesis queue and cancel the in-flight utterance
    pub fn stop(&self) {
        if let Some(queue) = &self.queue {
            queue.stop();
        }
    }

    /// Run the repair flow against the dictation manager
    pub fn repair(&self) -> RepairReport {
        run_repair(&self.arbiter, &self.dictation)
    }

    /// Human-readable dump of all access records and session states
    ///
    /// For diagnostics only; not a stable machine-readable contract.
    #[must_use]
    pub fn debug_snapshot(&self) -> String {
        let queue_line = self
            .queue
            .as_ref()
            .map_or_else(|| "synthesis: uninitialized".to_string(), SpeechQueue::debug_snapshot);
        format!(
            "{}\n{}\n{}\n{}",
            self.arbiter.debug_snapshot(),
            self.dictation.debug_snapshot(),
            self.hands_free.debug_snapshot(),
            queue_line,
        )
    }

    fn queue(&self) -> Result<&SpeechQueue> {
        self.queue
            .as_ref()
            .ok_or_else(|| Error::Synthesis("queue not initialized".to_string()))
    }
}
