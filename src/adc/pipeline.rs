// SpikeTag — ADC Pipeline Lifecycle
//
//   Stopped ──start──▶ Starting ──producer active──▶ Running
//      ▲                                               │
//      └──────────────── Stopping ◀──────stop──────────┘
//
// `start` spawns two threads: the producer (high priority, drives the
// `SampleSource`) and the detector (feeds the `EventSink`).  Source and sink
// are parked in slots between runs; each thread takes its resource on entry
// and puts it back on exit, so neither a stop nor a failed spawn loses them.
// If the converter is not ready the producer keeps retrying and the pipeline
// stays in `Starting`.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::adc::detector::TriggerDetector;
use crate::adc::producer::Producer;
use crate::adc::ring_buffer::{lock_ring, shared_ring, SharedRing};
use crate::adc::stats::{PipelineStats, StatsSnapshot};
use crate::clock::Clock;
use crate::config::*;
use crate::drivers::channel::{AdcArbiter, AdcLease, AdcOwner};
use crate::drivers::{with_producer_priority, SampleSource};
use crate::error::PipelineError;
use crate::events::Sample;
use crate::settings::{AdcConfig, ConfigProvider};
use crate::storage::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Flags shared by the lifecycle owner and both worker threads.
#[derive(Debug, Default)]
struct Control {
    state: AtomicU8,
    stop: AtomicBool,
    producing: AtomicBool,
}

impl Control {
    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

type Slot<T> = Arc<Mutex<Option<T>>>;

fn lock_slot<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AdcPipeline {
    ring: SharedRing,
    stats: Arc<PipelineStats>,
    control: Arc<Control>,
    rate_hz: Arc<AtomicU32>,
    arbiter: AdcArbiter,
    config: Arc<dyn ConfigProvider>,
    clock: Arc<dyn Clock>,
    source: Slot<Box<dyn SampleSource>>,
    sink: Slot<Box<dyn EventSink>>,
    producer: Option<JoinHandle<()>>,
    detector: Option<JoinHandle<()>>,
    #[cfg(test)]
    spawn_fault: Option<&'static str>,
}

impl AdcPipeline {
    pub fn new(
        source: Box<dyn SampleSource>,
        sink: Box<dyn EventSink>,
        config: Arc<dyn ConfigProvider>,
        clock: Arc<dyn Clock>,
        arbiter: AdcArbiter,
    ) -> Self {
        Self {
            ring: shared_ring(),
            stats: Arc::new(PipelineStats::default()),
            control: Arc::new(Control::default()),
            rate_hz: Arc::new(AtomicU32::new(SAMPLING_RATE_DEFAULT_HZ)),
            arbiter,
            config,
            clock,
            source: Arc::new(Mutex::new(Some(source))),
            sink: Arc::new(Mutex::new(Some(sink))),
            producer: None,
            detector: None,
            #[cfg(test)]
            spawn_fault: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Rate the producer is currently pacing to.
    pub fn sampling_rate_hz(&self) -> u32 {
        self.rate_hz.load(Ordering::Relaxed)
    }

    /// Chronological copy of the samples currently held.
    pub fn ring_snapshot(&self) -> Vec<Sample> {
        lock_ring(&self.ring).snapshot()
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state() != PipelineState::Stopped {
            return Err(PipelineError::AlreadyRunning);
        }
        if lock_slot(&self.source).is_none() {
            return Err(PipelineError::SourceUnavailable);
        }
        if lock_slot(&self.sink).is_none() {
            return Err(PipelineError::SinkUnavailable);
        }

        self.control.set_state(PipelineState::Starting);
        log::info!("ADC pipeline starting");

        lock_ring(&self.ring).reset();
        self.control.stop.store(false, Ordering::Release);
        self.control.producing.store(false, Ordering::Release);

        let initial = match self.config.snapshot() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Config unavailable at start, using defaults: {}", e);
                AdcConfig::default()
            }
        };
        self.rate_hz
            .store(initial.sanitized().sampling_rate_hz, Ordering::Relaxed);
        self.arbiter.request_exclusive();

        // ---- Producer ----
        let producer = Producer::new(
            Arc::clone(&self.ring),
            Arc::clone(&self.stats),
            Arc::clone(&self.rate_hz),
        );
        let source = Arc::clone(&self.source);
        let control = Arc::clone(&self.control);
        let arbiter = self.arbiter.clone();
        let spawned = with_producer_priority(|| {
            self.spawn_task("adc-producer", STACK_PRODUCER, move || {
                let Some(mut owned) = lock_slot(&source).take() else {
                    return;
                };
                if let Some(_lease) = acquire_hardware(&mut *owned, &arbiter, &control) {
                    control.producing.store(true, Ordering::Release);
                    producer.run(&mut *owned, &control.stop);
                    control.producing.store(false, Ordering::Release);
                    owned.release();
                }
                *lock_slot(&source) = Some(owned);
            })
        });
        match spawned {
            Ok(handle) => self.producer = Some(handle),
            Err(e) => {
                self.abort_start();
                return Err(e);
            }
        }

        // ---- Detector ----
        let sink = Arc::clone(&self.sink);
        let ring = Arc::clone(&self.ring);
        let stats = Arc::clone(&self.stats);
        let control = Arc::clone(&self.control);
        let rate_hz = Arc::clone(&self.rate_hz);
        let config = Arc::clone(&self.config);
        let clock = Arc::clone(&self.clock);
        let spawned = self.spawn_task("adc-detector", STACK_DETECTOR, move || {
            let Some(mut owned) = lock_slot(&sink).take() else {
                return;
            };
            let mut detector = TriggerDetector::new();
            let mut last_good = initial;
            let interval = Duration::from_millis(SCAN_INTERVAL_MS);

            while !control.stopping() {
                if control.producing.load(Ordering::Acquire) {
                    if control
                        .state
                        .compare_exchange(
                            PipelineState::Starting as u8,
                            PipelineState::Running as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        log::info!("ADC pipeline running");
                    }

                    let raw = next_config(&*config, &mut last_good);
                    detector.run_cycle(&ring, &raw, &*clock, &mut *owned, &stats);
                    rate_hz.store(detector.effective().sampling_rate_hz, Ordering::Relaxed);
                }
                thread::sleep(interval);
            }
            *lock_slot(&sink) = Some(owned);
        });
        match spawned {
            Ok(handle) => self.detector = Some(handle),
            Err(e) => {
                self.control.stop.store(true, Ordering::Release);
                self.join_workers();
                self.abort_start();
                return Err(e);
            }
        }

        Ok(())
    }

    /// Stop both threads and wait for them. Safe to call in any state.
    pub fn stop(&mut self) {
        if self.state() == PipelineState::Stopped {
            return;
        }
        self.control.set_state(PipelineState::Stopping);
        log::info!("ADC pipeline stopping");

        self.control.stop.store(true, Ordering::Release);
        self.join_workers();

        lock_ring(&self.ring).reset();
        self.arbiter.cancel_exclusive();
        self.control.producing.store(false, Ordering::Release);
        self.control.stop.store(false, Ordering::Release);
        self.control.set_state(PipelineState::Stopped);
        log::info!("ADC pipeline stopped");
    }

    fn spawn_task(
        &self,
        name: &'static str,
        stack_size: usize,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<JoinHandle<()>, PipelineError> {
        let spawned = match self.injected_spawn_fault(name) {
            Some(e) => Err(e),
            None => thread::Builder::new()
                .name(name.into())
                .stack_size(stack_size)
                .spawn(body),
        };
        spawned.map_err(|source| {
            log::warn!("Failed to spawn {} task: {}", name, source);
            PipelineError::Spawn { task: name, source }
        })
    }

    #[cfg(test)]
    fn injected_spawn_fault(&self, name: &str) -> Option<io::Error> {
        (self.spawn_fault == Some(name))
            .then(|| io::Error::new(io::ErrorKind::OutOfMemory, "task stack allocation failed"))
    }

    #[cfg(not(test))]
    fn injected_spawn_fault(&self, _name: &str) -> Option<io::Error> {
        None
    }

    fn join_workers(&mut self) {
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                log::error!("ADC producer panicked; sample source lost");
            }
        }
        if let Some(handle) = self.detector.take() {
            if handle.join().is_err() {
                log::error!("ADC detector panicked; event sink lost");
            }
        }
    }

    fn abort_start(&mut self) {
        self.arbiter.cancel_exclusive();
        self.control.stop.store(false, Ordering::Release);
        self.control.set_state(PipelineState::Stopped);
    }
}

impl Drop for AdcPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fresh configuration snapshot, or the last good one when the provider
/// cannot be read.
fn next_config(provider: &dyn ConfigProvider, last_good: &mut AdcConfig) -> AdcConfig {
    match provider.snapshot() {
        Ok(config) => {
            *last_good = config;
            config
        }
        Err(e) => {
            log::warn!("Config read failed, keeping last known good: {}", e);
            *last_good
        }
    }
}

/// Take the converter and bring the source up, retrying until it answers or
/// the pipeline is stopped.  The lease is released between attempts.
fn acquire_hardware(
    source: &mut dyn SampleSource,
    arbiter: &AdcArbiter,
    control: &Control,
) -> Option<AdcLease> {
    let retry = Duration::from_millis(SOURCE_RETRY_MS);
    let mut attempts: u32 = 0;

    while !control.stopping() {
        attempts += 1;
        match arbiter.try_acquire(AdcOwner::Pipeline) {
            Some(lease) => match source.init() {
                Ok(()) => {
                    log::info!("ADC source ready after {} attempt(s)", attempts);
                    return Some(lease);
                }
                Err(e) if attempts == 1 => log::warn!("ADC source not ready, retrying: {}", e),
                Err(e) => log::debug!("ADC source not ready (attempt {}): {}", attempts, e),
            },
            None => log::debug!("ADC channel held by {:?}, retrying", arbiter.owner()),
        }
        thread::sleep(retry);
    }
    None
}
