//! Process-local delivery and qualification counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the engine's observable outcomes. Cheap to bump from any
/// thread; aggregation/export is left to the embedding process.
#[derive(Debug, Default)]
pub struct Metrics {
    sent_ok: AtomicU64,
    failed: AtomicU64,
    skip_duplicate: AtomicU64,
    qualifications_completed: AtomicU64,
    qualifications_approved: AtomicU64,
    meetings_scheduled: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sent_ok: u64,
    pub failed: u64,
    pub skip_duplicate: u64,
    pub qualifications_completed: u64,
    pub qualifications_approved: u64,
    pub meetings_scheduled: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.sent_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.skip_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_qualification_completed(&self, approved: bool) {
        self.qualifications_completed.fetch_add(1, Ordering::Relaxed);
        if approved {
            self.qualifications_approved.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_meeting_scheduled(&self) {
        self.meetings_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent_ok: self.sent_ok.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skip_duplicate: self.skip_duplicate.load(Ordering::Relaxed),
            qualifications_completed: self.qualifications_completed.load(Ordering::Relaxed),
            qualifications_approved: self.qualifications_approved.load(Ordering::Relaxed),
            meetings_scheduled: self.meetings_scheduled.load(Ordering::Relaxed),
        }
    }
}
