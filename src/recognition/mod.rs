//! Recognition session management
//!
//! `state` is the pure session state machine; `session` is the async
//! manager that owns an engine and executes the machine's effects.

mod session;
mod state;

pub use session::{RecognitionManager, SessionEvent};
pub use state::{
    Effect, SessionInput, SessionState, Transition, TransitionOptions, classify_engine_error,
    transition,
};
