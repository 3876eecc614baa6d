// SpikeTag — Pipeline Counters
//
// Updated lock-free from the producer and detector; observers only ever see
// a copied snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    samples_produced: AtomicU64,
    read_errors: AtomicU64,
    triggers_accepted: AtomicU64,
    records_stored: AtomicU64,
    records_dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub samples_produced: u64,
    pub read_errors: u64,
    pub triggers_accepted: u64,
    pub records_stored: u64,
    pub records_dropped: u64,
}

impl PipelineStats {
    pub fn add_samples(&self, n: u64) {
        self.samples_produced.fetch_add(n, Ordering::Relaxed);
    }

    pub fn read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trigger_accepted(&self) {
        self.triggers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.records_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_produced: self.samples_produced.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            triggers_accepted: self.triggers_accepted.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}
