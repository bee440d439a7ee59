//! Recognition session manager
//!
//! Wraps one logical recognition engine instance behind the pure state
//! machine in [`super::state`]. A spawned runner task owns the engine and
//! selects over engine events, the listening timeout, and caller requests;
//! every observation is fed through `transition` and the returned effects
//! are executed here.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::Error;
use crate::arbiter::{AccessArbiter, ConsumerId, RecognitionLease};
use crate::config::RecognitionConfig;
use crate::dispatch::{ListenerId, Listeners};
use crate::engine::{EngineErrorCode, RecognitionEngine, RecognitionEvent, RecognitionResult};

use super::state::{self, Effect, SessionInput, SessionState, TransitionOptions};

/// Notifications delivered to session subscribers, in subscription order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session state changed
    StateChanged {
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },
    /// An interim transcript arrived; never terminates the session
    Interim(RecognitionResult),
    /// A final transcript arrived
    Final(RecognitionResult),
    /// A structured error (engine errors already translated)
    Failed(Error),
}

/// Messages from the manager to its runner task
enum Control {
    /// Execute engine/timer effects produced by a caller-side transition
    Effects(Vec<Effect>),
    /// Stop the engine and exit
    Shutdown,
}

/// Shared state between the manager handle and its runner task
struct SessionCore {
    consumer: ConsumerId,
    arbiter: AccessArbiter,
    config: RecognitionConfig,
    state: Mutex<SessionState>,
    transcript: Mutex<String>,
    lease: Mutex<Option<RecognitionLease>>,
    listeners: Listeners<SessionEvent>,
}

impl SessionCore {
    fn opts(&self) -> TransitionOptions {
        TransitionOptions {
            continuous: self.config.continuous,
            listen_timeout: self.config.listen_timeout(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feed one input through the state machine
    ///
    /// Bookkeeping effects (transcript, lease, notifications) are handled
    /// here; the engine/timer effects are returned for the caller to route.
    fn apply(&self, input: SessionInput) -> Vec<Effect> {
        let (from, to, effects) = {
            let mut state = self.lock_state();
            let from = *state;
            let t = state::transition(*state, input, self.opts());
            *state = t.next;
            (from, t.next, t.effects)
        };
        self.finish(from, to, effects)
    }

    /// Execute bookkeeping effects and announce the state change
    ///
    /// Runs without any lock held, so listeners may call back into the
    /// manager.
    fn finish(&self, from: SessionState, to: SessionState, effects: Vec<Effect>) -> Vec<Effect> {
        let mut routable = Vec::new();
        for effect in effects {
            match effect {
                Effect::ClearTranscript => {
                    self.transcript.lock().unwrap_or_else(|e| e.into_inner()).clear();
                }
                Effect::EmitInterim(result) => {
                    *self.transcript.lock().unwrap_or_else(|e| e.into_inner()) =
                        result.transcript.clone();
                    self.listeners.emit(&SessionEvent::Interim(result));
                }
                Effect::EmitFinal(result) => {
                    *self.transcript.lock().unwrap_or_else(|e| e.into_inner()) =
                        result.transcript.clone();
                    self.listeners.emit(&SessionEvent::Final(result));
                }
                Effect::EmitError(error) => {
                    self.listeners.emit(&SessionEvent::Failed(error));
                }
                Effect::DropLease => {
                    self.lease.lock().unwrap_or_else(|e| e.into_inner()).take();
                }
                Effect::ReleaseAccess => {
                    let lease = self.lease.lock().unwrap_or_else(|e| e.into_inner()).take();
                    if let Some(lease) = lease {
                        lease.revoke();
                    } else {
                        self.arbiter.release_access(self.consumer);
                    }
                }
                other => routable.push(other),
            }
        }
        if from != to {
            tracing::debug!(consumer = %self.consumer, from = %from, to = %to, "session state");
            self.listeners.emit(&SessionEvent::StateChanged { from, to });
        }
        routable
    }

    /// Atomically check state, acquire the recognition lease, and transition
    /// to `Listening`
    fn begin_listening(&self) -> Option<Vec<Effect>> {
        let (from, to, effects) = {
            let mut state = self.lock_state();
            if !matches!(*state, SessionState::Idle | SessionState::Ready) {
                tracing::debug!(consumer = %self.consumer, state = %*state, "not ready to listen");
                return None;
            }
            // acquire_recognition re-requests the grant idempotently, so a
            // grant released by a timeout does not wedge this consumer; it
            // still refuses when a sibling is actively recognizing.
            let lease = self.arbiter.acquire_recognition(self.consumer)?;
            *self.lease.lock().unwrap_or_else(|e| e.into_inner()) = Some(lease);
            let from = *state;
            let t = state::transition(*state, SessionInput::StartRequested, self.opts());
            *state = t.next;
            (from, t.next, t.effects)
        };
        Some(self.finish(from, to, effects))
    }
}

/// Manages the lifecycle of one recognition engine instance
///
/// Constructed against an injected [`AccessArbiter`]; all state mutation is
/// funneled through the pure state machine. Calls return immediately; the
/// actual waiting is expressed through subscribed [`SessionEvent`]s.
pub struct RecognitionManager {
    core: Arc<SessionCore>,
    control: Mutex<Option<mpsc::UnboundedSender<Control>>>,
    parked_engine: Mutex<Option<Box<dyn RecognitionEngine>>>,
}

impl RecognitionManager {
    /// Create an uninitialized manager for `consumer`
    #[must_use]
    pub fn new(consumer: ConsumerId, arbiter: AccessArbiter, config: RecognitionConfig) -> Self {
        Self {
            core: Arc::new(SessionCore {
                consumer,
                arbiter,
                config,
                state: Mutex::new(SessionState::Idle),
                transcript: Mutex::new(String::new()),
                lease: Mutex::new(None),
                listeners: Listeners::new(),
            }),
            control: Mutex::new(None),
            parked_engine: Mutex::new(None),
        }
    }

    /// The consumer lane this manager occupies
    #[must_use]
    pub fn consumer(&self) -> ConsumerId {
        self.core.consumer
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.core.lock_state()
    }

    /// Latest transcript observed in the current session
    #[must_use]
    pub fn transcript(&self) -> String {
        self.core
            .transcript
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Forget any accumulated transcript
    pub fn reset_transcript(&self) {
        self.core
            .transcript
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Whether the runner task is up and owns an engine
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Register a session listener; returns the id needed to unsubscribe
    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) -> ListenerId {
        self.core.listeners.subscribe(listener)
    }

    /// Remove a session listener
    pub fn unsubscribe(&self, id: ListenerId) {
        self.core.listeners.unsubscribe(id);
    }

    /// Initialize against a platform engine
    ///
    /// Fails fast (returning `false`) if the engine reports no capability,
    /// leaving the manager `Disabled`; fails with state `Error` if the
    /// access grant is denied. Idempotent once initialized.
    pub fn initialize(&self, engine: Box<dyn RecognitionEngine>) -> bool {
        *self
            .parked_engine
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(engine);
        self.reinitialize()
    }

    /// Re-run initialization, e.g. as step three of the repair flow
    ///
    /// Uses the engine from a previous [`initialize`](Self::initialize)
    /// attempt. Returns `true` when the manager ends up ready (or already
    /// was).
    pub fn reinitialize(&self) -> bool {
        match self.state() {
            SessionState::Ready
            | SessionState::Listening
            | SessionState::Processing
            | SessionState::Initializing => return true,
            SessionState::Idle if self.is_initialized() => return true,
            SessionState::Idle | SessionState::Error | SessionState::Disabled => {}
        }

        // Leave Error/Disabled for a fresh attempt (no-op from Idle)
        let _ = self.core.apply(SessionInput::RepairReset);

        if self.is_initialized() {
            // The runner and engine are live; only the state needs rebuilding
            let _ = self.core.apply(SessionInput::InitializeRequested);
            let _ = self.core.apply(SessionInput::EngineReady);
            return self.state() == SessionState::Ready;
        }

        let Some(engine) = self
            .parked_engine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            tracing::debug!(consumer = %self.core.consumer, "no engine to initialize with");
            return false;
        };

        if !engine.is_available() {
            tracing::warn!(consumer = %self.core.consumer, "recognition capability unavailable");
            *self
                .parked_engine
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(engine);
            let _ = self.core.apply(SessionInput::CapabilityLost);
            return false;
        }

        if !self.core.arbiter.request_access(self.core.consumer) {
            *self
                .parked_engine
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(engine);
            let _ = self.core.apply(SessionInput::GrantDenied);
            return false;
        }

        let _ = self.core.apply(SessionInput::InitializeRequested);

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        *self.control.lock().unwrap_or_else(|e| e.into_inner()) = Some(control_tx);
        tokio::spawn(run_session(engine, Arc::clone(&self.core), control_rx));

        let _ = self.core.apply(SessionInput::EngineReady);
        tracing::info!(consumer = %self.core.consumer, "recognition session manager ready");
        self.state() == SessionState::Ready
    }

    /// Whether the platform capability looks present
    ///
    /// Probes the parked engine when initialization has not happened yet; a
    /// live runner implies the capability was present when it started.
    #[must_use]
    pub fn capability_available(&self) -> bool {
        if self.is_initialized() {
            return true;
        }
        self.parked_engine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|engine| engine.is_available())
    }

    /// Start a listening session
    ///
    /// Returns `false` without side effects unless the manager is
    /// `Ready`/`Idle`, initialized, and the arbiter allows recognition for
    /// this consumer. On success the session is `Listening` with the
    /// timeout armed and any prior transcript cleared.
    pub fn start_listening(&self) -> bool {
        if !self.is_initialized() {
            tracing::debug!(consumer = %self.core.consumer, "start before initialize");
            return false;
        }
        let Some(effects) = self.core.begin_listening() else {
            return false;
        };
        self.send_effects(effects);
        true
    }

    /// Request a stop; the engine's end event finishes the session
    ///
    /// Double-stop is safe.
    pub fn stop_listening(&self) {
        let effects = self.core.apply(SessionInput::StopRequested);
        self.send_effects(effects);
    }

    /// Human-readable state dump, for diagnostics only
    #[must_use]
    pub fn debug_snapshot(&self) -> String {
        format!(
            "{}: state={} transcript={:?}",
            self.core.consumer,
            self.state(),
            self.transcript(),
        )
    }

    fn send_effects(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        if let Some(tx) = self
            .control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            let _ = tx.send(Control::Effects(effects));
        }
    }
}

impl Drop for RecognitionManager {
    fn drop(&mut self) {
        if let Some(tx) = self
            .control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = tx.send(Control::Shutdown);
        }
        self.core.arbiter.release_access(self.core.consumer);
    }
}

/// A deadline far enough away to stand in for "no timer armed"
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

/// Receive the next engine event, or park forever if no session is running
async fn next_engine_event(
    events: &mut Option<mpsc::UnboundedReceiver<RecognitionEvent>>,
) -> Option<RecognitionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Runner task: owns the engine, routes events and timers through the core
async fn run_session(
    mut engine: Box<dyn RecognitionEngine>,
    core: Arc<SessionCore>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
) {
    let mut engine_events: Option<mpsc::UnboundedReceiver<RecognitionEvent>> = None;
    let mut timeout_at: Option<Instant> = None;
    let mut cooldown_at: Option<Instant> = None;

    loop {
        tokio::select! {
            cmd = control_rx.recv() => match cmd {
                None | Some(Control::Shutdown) => {
                    engine.stop().await;
                    break;
                }
                Some(Control::Effects(effects)) => {
                    execute_effects(
                        &mut engine,
                        &core,
                        &mut engine_events,
                        &mut timeout_at,
                        &mut cooldown_at,
                        effects,
                    )
                    .await;
                }
            },
            event = next_engine_event(&mut engine_events) => match event {
                Some(event) => {
                    let input = match event {
                        RecognitionEvent::Started => Some(SessionInput::EngineStarted),
                        RecognitionEvent::Result(result) => {
                            if result.is_final {
                                Some(SessionInput::FinalResult(result))
                            } else if core.config.interim_results {
                                Some(SessionInput::InterimResult(result))
                            } else {
                                None
                            }
                        }
                        RecognitionEvent::Error(code) => Some(SessionInput::EngineError(code)),
                        RecognitionEvent::Ended => Some(SessionInput::EngineEnded),
                    };
                    if let Some(input) = input {
                        let effects = core.apply(input);
                        execute_effects(
                            &mut engine,
                            &core,
                            &mut engine_events,
                            &mut timeout_at,
                            &mut cooldown_at,
                            effects,
                        )
                        .await;
                    }
                }
                None => engine_events = None,
            },
            () = tokio::time::sleep_until(timeout_at.unwrap_or_else(far_future)),
                if timeout_at.is_some() =>
            {
                timeout_at = None;
                tracing::warn!(consumer = %core.consumer, "listening timeout fired");
                let effects = core.apply(SessionInput::TimeoutFired);
                execute_effects(
                    &mut engine,
                    &core,
                    &mut engine_events,
                    &mut timeout_at,
                    &mut cooldown_at,
                    effects,
                )
                .await;
            },
            () = tokio::time::sleep_until(cooldown_at.unwrap_or_else(far_future)),
                if cooldown_at.is_some() =>
            {
                cooldown_at = None;
                let effects = core.apply(SessionInput::CooldownElapsed);
                execute_effects(
                    &mut engine,
                    &core,
                    &mut engine_events,
                    &mut timeout_at,
                    &mut cooldown_at,
                    effects,
                )
                .await;
            },
        }
    }
}

/// Execute engine/timer effects; a failing engine start feeds back into the
/// state machine as an engine error
async fn execute_effects(
    engine: &mut Box<dyn RecognitionEngine>,
    core: &Arc<SessionCore>,
    engine_events: &mut Option<mpsc::UnboundedReceiver<RecognitionEvent>>,
    timeout_at: &mut Option<Instant>,
    cooldown_at: &mut Option<Instant>,
    effects: Vec<Effect>,
) {
    let mut queue: VecDeque<Effect> = effects.into();
    while let Some(effect) = queue.pop_front() {
        match effect {
            Effect::StartEngine => {
                let (tx, rx) = mpsc::unbounded_channel();
                match engine.start(&core.config, tx).await {
                    Ok(()) => *engine_events = Some(rx),
                    Err(e) => {
                        tracing::error!(consumer = %core.consumer, error = %e, "engine start failed");
                        let followup = core.apply(SessionInput::EngineError(
                            EngineErrorCode::Other(e.to_string()),
                        ));
                        queue.extend(followup);
                    }
                }
            }
            Effect::StopEngine => engine.stop().await,
            Effect::ArmTimeout => {
                *timeout_at = Some(Instant::now() + core.config.listen_timeout());
            }
            Effect::CancelTimeout => *timeout_at = None,
            Effect::ScheduleCooldown => {
                *cooldown_at = Some(Instant::now() + core.config.error_cooldown());
            }
            // Bookkeeping effects are consumed inside SessionCore::finish
            other => {
                tracing::debug!(effect = ?other, "unroutable effect ignored");
            }
        }
    }
}
