use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Request counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub recognitions: Arc<AtomicU64>,
    pub matches: Arc<AtomicU64>,
    pub no_matches: Arc<AtomicU64>,
    pub recognition_failures: Arc<AtomicU64>,
    pub registrations: Arc<AtomicU64>,
    pub renames: Arc<AtomicU64>,
    pub deletions: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            recognitions: Arc::new(AtomicU64::new(0)),
            matches: Arc::new(AtomicU64::new(0)),
            no_matches: Arc::new(AtomicU64::new(0)),
            recognition_failures: Arc::new(AtomicU64::new(0)),
            registrations: Arc::new(AtomicU64::new(0)),
            renames: Arc::new(AtomicU64::new(0)),
            deletions: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_recognitions(&self) {
        self.recognitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_matches(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_no_matches(&self) {
        self.no_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recognition_failures(&self) {
        self.recognition_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_renames(&self) {
        self.renames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_deletions(&self, count: u64) {
        self.deletions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            recognitions: self.recognitions.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            no_matches: self.no_matches.load(Ordering::Relaxed),
            recognition_failures: self.recognition_failures.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            renames: self.renames.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub recognitions: u64,
    pub matches: u64,
    pub no_matches: u64,
    pub recognition_failures: u64,
    pub registrations: u64,
    pub renames: u64,
    pub deletions: u64,
    pub uptime_seconds: u64,
}
