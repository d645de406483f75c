// crates/edge-sentry-core/src/cache.rs
// ============================================================================
// Module: Edge Sentry Status Cache
// Description: Latest-per-function health report cache.
// Purpose: Single source of truth for the control API's fleet health view.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The status cache maps each `functionId` to the most recent
//! [`HealthReport`] received for it. Router workers are the only writers;
//! control API handlers read point-in-time snapshots. Writes are
//! last-write-wins ordered by arrival, not by embedded report timestamps.
//! Invariants:
//! - At most one entry per `functionId`.
//! - Snapshot reads never observe a partially-updated entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::status::HealthReport;

// ============================================================================
// SECTION: Status Cache
// ============================================================================

/// Shared latest-per-function status cache.
///
/// # Invariants
/// - Cheap to clone; all clones observe the same entries.
/// - `update` replaces any existing entry for the report's function.
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    /// Entries keyed by `functionId`, guarded for concurrent read/write.
    entries: Arc<Mutex<BTreeMap<String, HealthReport>>>,
}

impl StatusCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entry for the report's function. Never fails.
    pub fn update(&self, report: HealthReport) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(report.function_id.clone(), report);
    }

    /// Returns a consistent point-in-time copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, HealthReport> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the number of tracked functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no function has reported yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
