// SpikeTag — Acquisition Producer
//
// Paces conversions against a monotonic epoch: every tick it works out how
// many samples are due at the current rate and reads that many.  Reads happen
// outside the ring lock; each batch is pushed under one short lock.  A failed
// conversion is counted and skipped, never fatal.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::adc::ring_buffer::{lock_ring, SharedRing};
use crate::adc::stats::PipelineStats;
use crate::config::*;
use crate::drivers::SampleSource;
use crate::events::Sample;

pub struct Producer {
    ring: SharedRing,
    stats: Arc<PipelineStats>,
    rate_hz: Arc<AtomicU32>,
}

impl Producer {
    pub fn new(ring: SharedRing, stats: Arc<PipelineStats>, rate_hz: Arc<AtomicU32>) -> Self {
        Self { ring, stats, rate_hz }
    }

    /// Sample until `stop` is raised.
    pub fn run(&self, source: &mut dyn SampleSource, stop: &AtomicBool) {
        let tick = Duration::from_micros(PRODUCER_TICK_US);
        let mut rate = current_rate(&self.rate_hz);
        let mut epoch = Instant::now();
        let mut produced: u64 = 0;
        let mut batch = [0 as Sample; PRODUCER_BATCH];

        log::info!("Producer sampling at {} Hz", rate);

        while !stop.load(Ordering::Acquire) {
            let latest = current_rate(&self.rate_hz);
            if latest != rate {
                log::info!("Producer rate {} Hz -> {} Hz", rate, latest);
                rate = latest;
                epoch = Instant::now();
                produced = 0;
            }

            let due = epoch.elapsed().as_micros() as u64 * u64::from(rate) / 1_000_000;
            let mut backlog = due.saturating_sub(produced);
            if backlog > RING_CAPACITY as u64 {
                // anything older would be overwritten before it is read
                log::debug!("Producer behind by {} samples", backlog);
                produced += backlog - RING_CAPACITY as u64;
                backlog = RING_CAPACITY as u64;
            }

            while backlog > 0 && !stop.load(Ordering::Acquire) {
                let n = backlog.min(PRODUCER_BATCH as u64) as usize;
                let filled = self.read_batch(source, &mut batch[..n]);
                if filled > 0 {
                    lock_ring(&self.ring).extend_from_slice(&batch[..filled]);
                    self.stats.add_samples(filled as u64);
                }
                produced += n as u64;
                backlog -= n as u64;
            }

            thread::sleep(tick);
        }

        log::info!("Producer stopped");
    }

    /// Fill `out` from the front with successful conversions; returns how
    /// many landed.
    fn read_batch(&self, source: &mut dyn SampleSource, out: &mut [Sample]) -> usize {
        let mut filled = 0;
        for _ in 0..out.len() {
            match source.read_mv() {
                Ok(mv) => {
                    out[filled] = mv;
                    filled += 1;
                }
                Err(e) => {
                    self.stats.read_error();
                    log::debug!("ADC read failed: {}", e);
                }
            }
        }
        filled
    }
}

fn current_rate(rate_hz: &AtomicU32) -> u32 {
    rate_hz.load(Ordering::Relaxed).max(1)
}
