//! Shared test utilities
//!
//! Scripted-engine builders and event collectors so the coordination layer
//! can be exercised without platform engines.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use podium::engine::simulated::{ScriptedEvent, SimulatedRecognitionEngine};
use podium::{HandsFreeConfig, RecognitionConfig};

/// An available engine that hears nothing until stopped
#[must_use]
pub fn silent_recognition() -> SimulatedRecognitionEngine {
    SimulatedRecognitionEngine::available()
}

/// An engine whose first session delivers one final transcript
#[must_use]
pub fn recognition_saying(delay_ms: u64, transcript: &str) -> SimulatedRecognitionEngine {
    SimulatedRecognitionEngine::with_session(vec![ScriptedEvent::final_result(
        delay_ms, transcript,
    )])
}

/// Recognition config with short timeouts so tests settle quickly
#[must_use]
pub fn fast_recognition_config() -> RecognitionConfig {
    RecognitionConfig {
        listen_timeout_ms: 500,
        error_cooldown_ms: 50,
        ..RecognitionConfig::default()
    }
}

/// Hands-free config with a short command window
#[must_use]
pub fn fast_hands_free_config() -> HandsFreeConfig {
    HandsFreeConfig {
        command_timeout_ms: 800,
        ..HandsFreeConfig::default()
    }
}

/// Thread-safe event collector for subscriber closures
#[derive(Debug, Clone, Default)]
pub struct EventLog<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> EventLog<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, entry: T) {
        self.entries.lock().unwrap().push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().unwrap().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

/// Let queued events and timers drain (auto-advanced under a paused clock)
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
