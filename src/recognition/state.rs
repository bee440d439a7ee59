//! Recognition session state machine
//!
//! A pure transition function over `(state, input)`. The async manager
//! feeds engine events, timer firings, and caller requests in here and
//! executes the returned effects; no engine access happens in this module,
//! so every edge is testable without one.
//!
//! ```text
//! Idle --initialize--> Initializing --engine ready--> Ready
//! Ready/Idle --start--> Listening
//! Listening --final/stop--> Processing --engine end--> Idle
//! Listening --timeout--> Idle
//! Listening --soft error--> Error --cooldown--> Idle
//! any --terminal error--> Disabled
//! ```

use crate::Error;
use crate::engine::{EngineErrorCode, RecognitionResult};

/// Lifecycle state of one recognition session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing running; ready to initialize or start
    Idle,
    /// Waiting for the engine to confirm readiness
    Initializing,
    /// Engine confirmed; a session can start
    Ready,
    /// A recognition session is active
    Listening,
    /// Final result or stop issued; waiting for the engine's end event
    Processing,
    /// Soft failure; auto-resets to idle after a cooldown
    Error,
    /// Terminal failure; will not self-retry
    Disabled,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Error => "error",
            Self::Disabled => "disabled",
        };
        write!(f, "{name}")
    }
}

/// Everything that can drive the state machine forward
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// Caller asked to initialize; capability and grant already verified
    InitializeRequested,
    /// Grant request during initialization was denied
    GrantDenied,
    /// Engine confirmed readiness
    EngineReady,
    /// Caller asked to listen; grant and state checks already passed
    StartRequested,
    /// Engine confirmed audio capture began
    EngineStarted,
    /// Interim result from the engine
    InterimResult(RecognitionResult),
    /// Final result from the engine
    FinalResult(RecognitionResult),
    /// Engine reported an error
    EngineError(EngineErrorCode),
    /// Engine session ended
    EngineEnded,
    /// The listening timeout fired
    TimeoutFired,
    /// Caller asked to stop listening
    StopRequested,
    /// The soft-error cooldown elapsed
    CooldownElapsed,
    /// The platform capability disappeared
    CapabilityLost,
    /// Repair flow re-entry: leave `Error`/`Disabled` for a fresh init
    RepairReset,
}

/// Side effects the manager must execute after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the engine session
    StartEngine,
    /// Request the engine to stop (best effort)
    StopEngine,
    /// Arm the listening timeout
    ArmTimeout,
    /// Disarm the listening timeout
    CancelTimeout,
    /// Forget any accumulated transcript
    ClearTranscript,
    /// Forward an interim transcript to subscribers
    EmitInterim(RecognitionResult),
    /// Forward a final transcript to subscribers
    EmitFinal(RecognitionResult),
    /// Surface a structured error to subscribers
    EmitError(Error),
    /// Drop the recognition lease (active flag off, grant kept)
    DropLease,
    /// Release the consumer's access entirely
    ReleaseAccess,
    /// Arm the soft-error cooldown timer
    ScheduleCooldown,
}

/// Session-level flags the transition function needs
#[derive(Debug, Clone, Copy)]
pub struct TransitionOptions {
    /// Final results do not end the session
    pub continuous: bool,
    /// Configured listening window, reported with timeout errors
    pub listen_timeout: std::time::Duration,
}

/// Result of one transition
#[derive(Debug, Clone)]
pub struct Transition {
    /// The state after the input
    pub next: SessionState,
    /// Effects to execute, in order
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: SessionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: SessionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// How an engine error code affects the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    /// Cooldown then auto-reset to idle
    Soft,
    /// Disable until external repair
    Terminal,
    /// Expected noise (e.g. abort after an explicit stop); drop it
    Ignored,
}

const fn severity(code: &EngineErrorCode) -> Severity {
    match code {
        EngineErrorCode::NotAllowed | EngineErrorCode::ServiceNotAllowed => Severity::Terminal,
        EngineErrorCode::Aborted => Severity::Ignored,
        EngineErrorCode::NoSpeech
        | EngineErrorCode::Network
        | EngineErrorCode::AudioCapture
        | EngineErrorCode::Other(_) => Severity::Soft,
    }
}

/// Translate an engine error code into the crate taxonomy
pub fn classify_engine_error(code: &EngineErrorCode) -> Error {
    match code {
        EngineErrorCode::NoSpeech => Error::NoSpeech,
        EngineErrorCode::Network => Error::Network("recognition engine".to_string()),
        EngineErrorCode::NotAllowed => Error::PermissionDenied("microphone access".to_string()),
        EngineErrorCode::ServiceNotAllowed => {
            Error::PermissionDenied("recognition service not allowed".to_string())
        }
        EngineErrorCode::AudioCapture => Error::Engine("audio capture failed".to_string()),
        EngineErrorCode::Aborted => Error::Engine("session aborted".to_string()),
        EngineErrorCode::Other(raw) => Error::Engine(raw.clone()),
    }
}

/// Compute the next state and effects for one input
///
/// Inputs that make no sense in the current state (late engine events after
/// the session already moved on) leave the state unchanged with no effects.
#[allow(clippy::too_many_lines)]
#[must_use]
pub fn transition(state: SessionState, input: SessionInput, opts: TransitionOptions) -> Transition {
    use SessionState::{Disabled, Error as ErrorState, Idle, Initializing, Listening, Processing, Ready};

    match (state, input) {
        // --- initialization ---
        (Idle, SessionInput::InitializeRequested) => Transition::stay(Initializing),
        (Initializing, SessionInput::EngineReady) => Transition::stay(Ready),
        (Idle, SessionInput::GrantDenied) => Transition::to(
            ErrorState,
            vec![Effect::EmitError(Error::InitializationFailure(
                "access grant denied".to_string(),
            ))],
        ),
        (Idle | Initializing | Ready, SessionInput::CapabilityLost) => Transition::to(
            Disabled,
            vec![
                Effect::ReleaseAccess,
                Effect::EmitError(Error::EngineUnsupported(
                    "recognition capability lost".to_string(),
                )),
            ],
        ),

        // --- session start ---
        (Idle | Ready, SessionInput::StartRequested) => Transition::to(
            Listening,
            vec![Effect::ClearTranscript, Effect::StartEngine, Effect::ArmTimeout],
        ),
        (Listening, SessionInput::EngineStarted) => Transition::stay(Listening),

        // --- results ---
        (Listening, SessionInput::InterimResult(result)) => {
            Transition::to(Listening, vec![Effect::EmitInterim(result)])
        }
        (Listening, SessionInput::FinalResult(result)) => {
            if opts.continuous {
                // The session keeps running; re-arm the silence window
                Transition::to(
                    Listening,
                    vec![Effect::EmitFinal(result), Effect::ArmTimeout],
                )
            } else {
                // Graceful stop: the engine's end event finishes the session.
                // The timeout stays armed as a fallback.
                Transition::to(
                    Processing,
                    vec![Effect::EmitFinal(result), Effect::StopEngine],
                )
            }
        }

        // --- stopping ---
        (Listening, SessionInput::StopRequested) => {
            Transition::to(Processing, vec![Effect::StopEngine])
        }
        // Double-stop is safe
        (Processing, SessionInput::StopRequested) => Transition::stay(Processing),
        (Listening | Processing, SessionInput::EngineEnded) => Transition::to(
            Idle,
            vec![Effect::DropLease, Effect::CancelTimeout],
        ),

        // --- timeout ---
        (Listening, SessionInput::TimeoutFired) => Transition::to(
            Idle,
            vec![
                Effect::StopEngine,
                Effect::ReleaseAccess,
                Effect::EmitError(Error::Timeout(opts.listen_timeout)),
            ],
        ),
        // Fallback when the engine never delivers its end event
        (Processing, SessionInput::TimeoutFired) => {
            Transition::to(Idle, vec![Effect::StopEngine, Effect::DropLease])
        }

        // --- engine errors ---
        (Listening | Processing, SessionInput::EngineError(code)) => match severity(&code) {
            Severity::Ignored => Transition::stay(state),
            Severity::Soft => Transition::to(
                ErrorState,
                vec![
                    Effect::StopEngine,
                    Effect::DropLease,
                    Effect::CancelTimeout,
                    Effect::ScheduleCooldown,
                    Effect::EmitError(classify_engine_error(&code)),
                ],
            ),
            Severity::Terminal => Transition::to(
                Disabled,
                vec![
                    Effect::StopEngine,
                    Effect::ReleaseAccess,
                    Effect::CancelTimeout,
                    Effect::EmitError(classify_engine_error(&code)),
                ],
            ),
        },

        // --- soft-error recovery ---
        (ErrorState, SessionInput::CooldownElapsed) => Transition::stay(Idle),

        // --- repair flow ---
        (ErrorState | Disabled, SessionInput::RepairReset) => Transition::to(Idle, Vec::new()),

        // Late or out-of-place inputs are dropped
        (state, _) => Transition::stay(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str, is_final: bool) -> RecognitionResult {
        RecognitionResult {
            transcript: text.to_string(),
            confidence: 0.9,
            is_final,
            alternatives: Vec::new(),
        }
    }

    fn opts(continuous: bool) -> TransitionOptions {
        TransitionOptions {
            continuous,
            listen_timeout: std::time::Duration::from_secs(5),
        }
    }

    #[test]
    fn initialization_path() {
        let t = transition(SessionState::Idle, SessionInput::InitializeRequested, opts(false));
        assert_eq!(t.next, SessionState::Initializing);
        let t = transition(SessionState::Initializing, SessionInput::EngineReady, opts(false));
        assert_eq!(t.next, SessionState::Ready);
    }

    #[test]
    fn grant_denied_fails_initialization() {
        let t = transition(SessionState::Idle, SessionInput::GrantDenied, opts(false));
        assert_eq!(t.next, SessionState::Error);
        assert!(matches!(
            t.effects.as_slice(),
            [Effect::EmitError(Error::InitializationFailure(_))]
        ));
    }

    #[test]
    fn start_arms_timeout_and_clears_transcript() {
        let t = transition(SessionState::Ready, SessionInput::StartRequested, opts(false));
        assert_eq!(t.next, SessionState::Listening);
        assert_eq!(
            t.effects,
            vec![Effect::ClearTranscript, Effect::StartEngine, Effect::ArmTimeout]
        );
    }

    #[test]
    fn interim_results_never_terminate() {
        let t = transition(
            SessionState::Listening,
            SessionInput::InterimResult(result("hola", false)),
            opts(false),
        );
        assert_eq!(t.next, SessionState::Listening);
        assert!(matches!(t.effects.as_slice(), [Effect::EmitInterim(_)]));
    }

    #[test]
    fn final_result_stops_gracefully_when_not_continuous() {
        let t = transition(
            SessionState::Listening,
            SessionInput::FinalResult(result("hola", true)),
            opts(false),
        );
        assert_eq!(t.next, SessionState::Processing);
        assert!(t.effects.contains(&Effect::StopEngine));
        let t = transition(SessionState::Processing, SessionInput::EngineEnded, opts(false));
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.effects.contains(&Effect::DropLease));
    }

    #[test]
    fn final_result_keeps_listening_when_continuous() {
        let t = transition(
            SessionState::Listening,
            SessionInput::FinalResult(result("hola", true)),
            opts(true),
        );
        assert_eq!(t.next, SessionState::Listening);
        assert!(t.effects.contains(&Effect::ArmTimeout));
        assert!(!t.effects.contains(&Effect::StopEngine));
    }

    #[test]
    fn explicit_stop_waits_for_engine_end() {
        let t = transition(SessionState::Listening, SessionInput::StopRequested, opts(false));
        assert_eq!(t.next, SessionState::Processing);
        // Second stop is a no-op
        let t = transition(SessionState::Processing, SessionInput::StopRequested, opts(false));
        assert_eq!(t.next, SessionState::Processing);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn timeout_force_stops_and_releases() {
        let t = transition(SessionState::Listening, SessionInput::TimeoutFired, opts(false));
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.effects.contains(&Effect::StopEngine));
        assert!(t.effects.contains(&Effect::ReleaseAccess));
    }

    #[test]
    fn soft_error_schedules_cooldown_then_resets() {
        let t = transition(
            SessionState::Listening,
            SessionInput::EngineError(EngineErrorCode::NoSpeech),
            opts(false),
        );
        assert_eq!(t.next, SessionState::Error);
        assert!(t.effects.contains(&Effect::ScheduleCooldown));
        assert!(t.effects.contains(&Effect::EmitError(Error::NoSpeech)));

        let t = transition(SessionState::Error, SessionInput::CooldownElapsed, opts(false));
        assert_eq!(t.next, SessionState::Idle);
    }

    #[test]
    fn terminal_error_disables() {
        for code in [EngineErrorCode::NotAllowed, EngineErrorCode::ServiceNotAllowed] {
            let t = transition(
                SessionState::Listening,
                SessionInput::EngineError(code),
                opts(false),
            );
            assert_eq!(t.next, SessionState::Disabled);
            assert!(t.effects.contains(&Effect::ReleaseAccess));
        }
    }

    #[test]
    fn abort_after_stop_is_ignored() {
        let t = transition(
            SessionState::Processing,
            SessionInput::EngineError(EngineErrorCode::Aborted),
            opts(false),
        );
        assert_eq!(t.next, SessionState::Processing);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn late_events_are_dropped() {
        for input in [
            SessionInput::InterimResult(result("late", false)),
            SessionInput::FinalResult(result("late", true)),
            SessionInput::EngineEnded,
            SessionInput::TimeoutFired,
            SessionInput::EngineError(EngineErrorCode::Network),
        ] {
            let t = transition(SessionState::Idle, input, opts(false));
            assert_eq!(t.next, SessionState::Idle);
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn disabled_is_sticky() {
        for input in [
            SessionInput::StartRequested,
            SessionInput::EngineEnded,
            SessionInput::CooldownElapsed,
        ] {
            let t = transition(SessionState::Disabled, input, opts(false));
            assert_eq!(t.next, SessionState::Disabled);
        }
    }

    #[test]
    fn capability_loss_disables_from_quiet_states() {
        for state in [SessionState::Idle, SessionState::Initializing, SessionState::Ready] {
            let t = transition(state, SessionInput::CapabilityLost, opts(false));
            assert_eq!(t.next, SessionState::Disabled);
        }
    }

    #[test]
    fn engine_error_translation() {
        assert_eq!(
            classify_engine_error(&EngineErrorCode::NoSpeech),
            Error::NoSpeech
        );
        assert!(classify_engine_error(&EngineErrorCode::NotAllowed).is_terminal());
        assert!(!classify_engine_error(&EngineErrorCode::Network).is_terminal());
    }
}
