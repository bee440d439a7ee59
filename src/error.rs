//! Error types for the speech coordination layer

use std::time::Duration;

use thiserror::Error;

/// Result type alias for podium operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the speech coordination layer
///
/// Engine-reported error codes are translated into this taxonomy inside the
/// recognition session manager and surfaced to subscribers as structured
/// errors, never as raw engine codes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The platform provides no usable engine for this capability (fatal)
    #[error("speech engine unsupported: {0}")]
    EngineUnsupported(String),

    /// The platform or user denied engine access (fatal, user must act)
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Another consumer currently holds the resource (soft)
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The engine gave up without hearing any speech (soft)
    #[error("no speech detected")]
    NoSpeech,

    /// Engine-side network failure (soft)
    #[error("network error: {0}")]
    Network(String),

    /// No final result arrived before the session timer fired (soft)
    #[error("session timed out after {0:?}")]
    Timeout(Duration),

    /// Initialization failed; eligible for the repair flow (soft)
    #[error("initialization failure: {0}")]
    InitializationFailure(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Unclassified engine failure (soft)
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Whether this error leaves the capability disabled until external action
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::EngineUnsupported(_) | Self::PermissionDenied(_))
    }
}
