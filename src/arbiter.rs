//! Access arbitration for the shared speech engines
//!
//! The platform recognition and synthesis engines are each a single
//! exclusive resource. The arbiter tracks, per named consumer, whether it
//! holds an access grant and whether its recognition/synthesis is currently
//! active, and refuses a second concurrent recognition session. It is pure
//! in-memory bookkeeping: it never talks to an engine itself.
//!
//! Invariants: at most one record has `recognition_active` set at any
//! instant, and a record can only be active while it holds a grant.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// A named consumer of the coordination layer
///
/// Identifies a lane in the arbiter, not a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerId {
    /// Passive keyword listening (hands-free mode)
    KeywordListener,
    /// Time-boxed command capture after a keyword match
    CommandCapture,
    /// User-initiated dictation
    Dictation,
    /// Text-to-speech playback
    Synthesis,
}

impl ConsumerId {
    /// Whether this consumer drives the recognition engine
    #[must_use]
    pub const fn is_recognition(self) -> bool {
        !matches!(self, Self::Synthesis)
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::KeywordListener => "keyword-listener",
            Self::CommandCapture => "command-capture",
            Self::Dictation => "dictation",
            Self::Synthesis => "synthesis",
        };
        write!(f, "{name}")
    }
}

/// Per-consumer access bookkeeping
#[derive(Debug, Clone)]
pub struct AccessRecord {
    /// Consumer holds an access grant
    pub has_grant: bool,
    /// Consumer is driving the recognition engine right now
    pub recognition_active: bool,
    /// Consumer is driving the synthesis engine right now
    pub synthesis_active: bool,
    /// Last time any flag on this record changed
    pub last_activity: Instant,
}

impl AccessRecord {
    fn new() -> Self {
        Self {
            has_grant: false,
            recognition_active: false,
            synthesis_active: false,
            last_activity: Instant::now(),
        }
    }
}

#[derive(Debug)]
struct ArbiterState {
    records: HashMap<ConsumerId, AccessRecord>,
    /// The consumer currently driving the recognition engine, if any
    current_recognition: Option<ConsumerId>,
}

/// Process-wide mutual-exclusion arbiter for the speech engines
///
/// Explicitly constructed and injected (cloned) into the session managers
/// and the synthesis queue; cloning shares the same underlying state.
#[derive(Debug, Clone)]
pub struct AccessArbiter {
    state: Arc<Mutex<ArbiterState>>,
}

impl Default for AccessArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessArbiter {
    /// Create a new arbiter with no records
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ArbiterState {
                records: HashMap::new(),
                current_recognition: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Grant access to `consumer` unless a sibling recognition consumer is
    /// actively recognizing
    ///
    /// Synthesis requests are granted more permissively but log a warning
    /// when recognition is active. Idempotent for a consumer that already
    /// holds a grant.
    pub fn request_access(&self, consumer: ConsumerId) -> bool {
        let mut state = self.lock();

        if let Some(active) = state.current_recognition {
            if consumer.is_recognition() && active != consumer {
                tracing::debug!(consumer = %consumer, active = %active, "access denied");
                return false;
            }
            if !consumer.is_recognition() {
                tracing::warn!(
                    active = %active,
                    "granting synthesis access while recognition is active"
                );
            }
        }

        let record = state.records.entry(consumer).or_insert_with(AccessRecord::new);
        record.has_grant = true;
        record.last_activity = Instant::now();
        tracing::debug!(consumer = %consumer, "access granted");
        true
    }

    /// Clear every flag on the consumer's record
    ///
    /// Safe to call repeatedly; the record is identical after the second
    /// call. Clears the current-recognition pointer if it pointed here.
    pub fn release_access(&self, consumer: ConsumerId) {
        let mut state = self.lock();
        if let Some(record) = state.records.get_mut(&consumer) {
            record.has_grant = false;
            record.recognition_active = false;
            record.synthesis_active = false;
            record.last_activity = Instant::now();
        }
        if state.current_recognition == Some(consumer) {
            state.current_recognition = None;
        }
        tracing::debug!(consumer = %consumer, "access released");
    }

    /// Whether `consumer` holds a grant and no sibling is actively recognizing
    #[must_use]
    pub fn can_use_recognition(&self, consumer: ConsumerId) -> bool {
        let state = self.lock();
        let holds_grant = state.records.get(&consumer).is_some_and(|r| r.has_grant);
        holds_grant && state.current_recognition.is_none_or(|active| active == consumer)
    }

    /// Flag `consumer` as actively recognizing
    ///
    /// Fails without mutating anything if the consumer lacks a grant or a
    /// sibling is already active.
    pub fn mark_recognition_active(&self, consumer: ConsumerId) -> bool {
        let mut state = self.lock();
        if state
            .current_recognition
            .is_some_and(|active| active != consumer)
        {
            tracing::debug!(consumer = %consumer, "recognition already active elsewhere");
            return false;
        }
        let Some(record) = state.records.get_mut(&consumer) else {
            return false;
        };
        if !record.has_grant {
            return false;
        }
        record.recognition_active = true;
        record.last_activity = Instant::now();
        state.current_recognition = Some(consumer);
        true
    }

    /// Clear the recognition-active flag; no-op if already clear
    pub fn mark_recognition_inactive(&self, consumer: ConsumerId) {
        let mut state = self.lock();
        if let Some(record) = state.records.get_mut(&consumer) {
            record.recognition_active = false;
            record.last_activity = Instant::now();
        }
        if state.current_recognition == Some(consumer) {
            state.current_recognition = None;
        }
    }

    /// Flag `consumer` as actively synthesizing; requires a grant
    pub fn mark_synthesis_active(&self, consumer: ConsumerId) -> bool {
        let mut state = self.lock();
        let Some(record) = state.records.get_mut(&consumer) else {
            return false;
        };
        if !record.has_grant {
            return false;
        }
        record.synthesis_active = true;
        record.last_activity = Instant::now();
        true
    }

    /// Clear the synthesis-active flag; no-op if already clear
    pub fn mark_synthesis_inactive(&self, consumer: ConsumerId) {
        let mut state = self.lock();
        if let Some(record) = state.records.get_mut(&consumer) {
            record.synthesis_active = false;
            record.last_activity = Instant::now();
        }
    }

    /// Emergency reset: clear every record and the current-recognition pointer
    ///
    /// Used only by the repair flow.
    pub fn force_release_all(&self) {
        let mut state = self.lock();
        for record in state.records.values_mut() {
            record.has_grant = false;
            record.recognition_active = false;
            record.synthesis_active = false;
            record.last_activity = Instant::now();
        }
        state.current_recognition = None;
        tracing::warn!("force-released all access records");
    }

    /// Snapshot of one consumer's record, if it exists
    #[must_use]
    pub fn record(&self, consumer: ConsumerId) -> Option<AccessRecord> {
        self.lock().records.get(&consumer).cloned()
    }

    /// Acquire a recognition lease: grant plus recognition-active in one step
    ///
    /// The returned token is the proof of the active flag; dropping it marks
    /// recognition inactive again. Returns `None` if a sibling is active.
    #[must_use]
    pub fn acquire_recognition(&self, consumer: ConsumerId) -> Option<RecognitionLease> {
        if !self.request_access(consumer) {
            return None;
        }
        if !self.mark_recognition_active(consumer) {
            return None;
        }
        Some(RecognitionLease {
            arbiter: self.clone(),
            consumer,
        })
    }

    /// Acquire a synthesis lease; dropping it marks synthesis inactive
    #[must_use]
    pub fn acquire_synthesis(&self, consumer: ConsumerId) -> Option<SynthesisLease> {
        if !self.request_access(consumer) {
            return None;
        }
        if !self.mark_synthesis_active(consumer) {
            return None;
        }
        Some(SynthesisLease {
            arbiter: self.clone(),
            consumer,
        })
    }

    /// Human-readable dump of all records, for diagnostics only
    #[must_use]
    pub fn debug_snapshot(&self) -> String {
        let state = self.lock();
        let mut out = String::from("access records:\n");
        let mut consumers: Vec<_> = state.records.keys().copied().collect();
        consumers.sort_by_key(|c| c.to_string());
        for consumer in consumers {
            let record = &state.records[&consumer];
            let _ = writeln!(
                out,
                "  {consumer}: grant={} recognition={} synthesis={} idle_for={:?}",
                record.has_grant,
                record.recognition_active,
                record.synthesis_active,
                record.last_activity.elapsed(),
            );
        }
        let _ = match state.current_recognition {
            Some(active) => writeln!(out, "current recognition: {active}"),
            None => writeln!(out, "current recognition: none"),
        };
        out
    }
}

/// Owned proof that a consumer is actively recognizing
///
/// Dropping the lease clears the active flag; `revoke` additionally drops
/// the grant itself.
#[derive(Debug)]
pub struct RecognitionLease {
    arbiter: AccessArbiter,
    consumer: ConsumerId,
}

impl RecognitionLease {
    /// The consumer this lease belongs to
    #[must_use]
    pub const fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    /// Drop the active flag and the grant in one step
    pub fn revoke(self) {
        self.arbiter.release_access(self.consumer);
        // Drop then marks inactive on an already-clear record, which is a no-op.
    }
}

impl Drop for RecognitionLease {
    fn drop(&mut self) {
        self.arbiter.mark_recognition_inactive(self.consumer);
    }
}

/// Owned proof that a consumer is actively synthesizing
#[derive(Debug)]
pub struct SynthesisLease {
    arbiter: AccessArbiter,
    consumer: ConsumerId,
}

impl SynthesisLease {
    /// The consumer this lease belongs to
    #[must_use]
    pub const fn consumer(&self) -> ConsumerId {
        self.consumer
    }
}

impl Drop for SynthesisLease {
    fn drop(&mut self) {
        self.arbiter.mark_synthesis_inactive(self.consumer);
    }
}
