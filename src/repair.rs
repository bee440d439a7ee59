//! Multi-step repair flow
//!
//! Invoked by the caller after an initialization failure (the service
//! facade runs it automatically in that one case): force-release every
//! arbiter record, re-check the platform capability, then re-run
//! initialization. Each step reports independently.

use crate::arbiter::AccessArbiter;
use crate::recognition::RecognitionManager;

/// Outcome of one repair attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    /// Step 1: every arbiter record was force-released
    pub records_released: bool,
    /// Step 2: the platform capability re-check passed
    pub capability_ok: bool,
    /// Step 3: re-initialization succeeded
    pub reinitialized: bool,
}

impl RepairReport {
    /// Whether all three steps succeeded
    #[must_use]
    pub const fn fully_repaired(&self) -> bool {
        self.records_released && self.capability_ok && self.reinitialized
    }
}

impl std::fmt::Display for RepairReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "released={} capability={} reinitialized={} -> {}",
            self.records_released,
            self.capability_ok,
            self.reinitialized,
            if self.fully_repaired() {
                "fully repaired"
            } else {
                "not repaired"
            },
        )
    }
}

/// Run the three-step repair flow against one recognition manager
///
/// Later steps run even when an earlier one fails, so the report shows
/// exactly which parts of the stack are healthy.
pub fn run_repair(arbiter: &AccessArbiter, manager: &RecognitionManager) -> RepairReport {
    tracing::info!(consumer = %manager.consumer(), "repair flow started");

    arbiter.force_release_all();
    let records_released = true;

    let capability_ok = manager.capability_available();
    if !capability_ok {
        tracing::warn!("repair: platform capability still missing");
    }

    let reinitialized = manager.reinitialize();
    if !reinitialized {
        tracing::warn!("repair: re-initialization failed");
    }

    let report = RepairReport {
        records_released,
        capability_ok,
        reinitialized,
    };
    tracing::info!(consumer = %manager.consumer(), report = %report, "repair flow finished");
    report
}
