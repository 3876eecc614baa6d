// SpikeTag — Trigger Detector
//
// One call to `run_cycle` is one consumer pass over the ring:
//
//   1. take the configuration snapshot (sanitized once per change)
//   2. skip if the ring holds fewer than `window_length` samples
//   3. skip if the debounce gate is still closed
//   4. find a trigger: the newest full window (Timer) or the first
//      |sample| > threshold whose whole window is already in the ring
//      (ThresholdEvent)
//   5. close the gate, stamp the time, then extract → encode → store
//
// The gate is closed before any extraction or storage work so a slow sink
// cannot shorten the spacing between accepted triggers.  Spacing is measured
// from acceptance to acceptance using the *current* debounce, so a new
// debounce (timer period) applies on the very next cycle.

use crate::adc::encoder::{EventEncoder, Payload};
use crate::adc::ring_buffer::{lock_ring, SampleRing, SharedRing};
use crate::adc::stats::PipelineStats;
use crate::adc::window::WindowExtractor;
use crate::clock::Clock;
use crate::config::RING_CAPACITY;
use crate::error::SinkError;
use crate::events::{EventKind, TriggerEvent};
use crate::settings::{AdcConfig, AdcMode};
use crate::storage::EventSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fewer than `window_length` samples held.
    Insufficient,
    /// Debounce gate still closed.
    Debounced,
    /// Threshold mode found no crossing.
    NoTrigger,
    /// Trigger accepted but the window could not be read.
    Aborted,
    /// Record handed to the sink.
    Stored(EventKind),
    /// Sink refused the record; capture continues.
    Dropped(SinkError),
}

pub struct TriggerDetector {
    /// Monotonic time of the last accepted trigger; `None` = gate open.
    last_accept_ms: Option<u64>,
    /// First ring sequence number not yet searched for a crossing.
    scan_seq: u64,
    last_raw: Option<AdcConfig>,
    effective: AdcConfig,
    extractor: WindowExtractor,
    encoder: EventEncoder,
}

impl TriggerDetector {
    pub fn new() -> Self {
        Self {
            last_accept_ms: None,
            scan_seq: 0,
            last_raw: None,
            effective: AdcConfig::default(),
            extractor: WindowExtractor::new(RING_CAPACITY),
            encoder: EventEncoder::new(),
        }
    }

    /// Open the gate and rewind the scan cursor. Call whenever the ring is
    /// reset so no half-elapsed gate survives a restart.
    pub fn reset(&mut self) {
        self.last_accept_ms = None;
        self.scan_seq = 0;
    }

    /// Sanitized copy of the configuration most recently seen.
    pub fn effective(&self) -> AdcConfig {
        self.effective
    }

    /// Earliest monotonic time the next trigger may be accepted.
    pub fn next_allowed_ms(&self) -> Option<u64> {
        self.last_accept_ms
            .map(|t| t + u64::from(self.effective.debounce_ms))
    }

    fn refresh_config(&mut self, raw: &AdcConfig) -> AdcConfig {
        if self.last_raw.as_ref() != Some(raw) {
            self.effective = raw.sanitized();
            self.last_raw = Some(*raw);
            log::debug!("Detector using {:?}", self.effective);
        }
        self.effective
    }

    pub fn run_cycle(
        &mut self,
        ring: &SharedRing,
        raw_config: &AdcConfig,
        clock: &dyn Clock,
        sink: &mut dyn EventSink,
        stats: &PipelineStats,
    ) -> CycleOutcome {
        let config = self.refresh_config(raw_config);
        let length = usize::from(config.window_length);
        let now = clock.now_ms();

        let ring = lock_ring(ring);
        let written = ring.written();

        if ring.len() < length {
            log::debug!("Waiting for samples: {}/{}", ring.len(), length);
            return CycleOutcome::Insufficient;
        }

        if self.next_allowed_ms().is_some_and(|t| now < t) {
            // crossings during the dead time are discarded, not deferred
            self.scan_seq = written;
            return CycleOutcome::Debounced;
        }

        let position = match config.mode {
            AdcMode::Timer => {
                let centre = written - length as u64 + (length / 2) as u64;
                SampleRing::slot_of(centre)
            }
            AdcMode::ThresholdEvent => match self.scan_for_crossing(&*ring, &config) {
                Some(slot) => slot,
                None => return CycleOutcome::NoTrigger,
            },
        };

        // Gate first, then everything that depends on the trigger.
        self.last_accept_ms = Some(now);
        stats.trigger_accepted();
        let event = TriggerEvent {
            position,
            timestamp: clock.timestamp(),
            config,
        };
        self.scan_seq = written;

        let Some(window) = self.extractor.extract(&*ring, &event) else {
            log::debug!("Window extraction aborted at slot {}", position);
            return CycleOutcome::Aborted;
        };
        drop(ring);

        let encoded = self.encoder.encode(&event, window);
        match sink.append_event(&encoded) {
            Ok(()) => {
                stats.record_stored();
                match encoded.payload {
                    Payload::Peaks { positive, negative } => log::info!(
                        "ADC event stored: {:?} @ {}.{:06}, peaks max {} / min {}",
                        encoded.kind,
                        encoded.timestamp.unix_seconds,
                        encoded.timestamp.micros,
                        positive,
                        negative
                    ),
                    Payload::Waveform(_) => log::info!(
                        "ADC event stored: {:?} @ {}.{:06}, {} samples over {} µs",
                        encoded.kind,
                        encoded.timestamp.unix_seconds,
                        encoded.timestamp.micros,
                        encoded.sample_count,
                        encoded.duration_us
                    ),
                }
                CycleOutcome::Stored(encoded.kind)
            }
            Err(e) => {
                stats.record_dropped();
                log::warn!("ADC event dropped: {}", e);
                CycleOutcome::Dropped(e)
            }
        }
    }

    /// First crossing whose full window is already held, searching from the
    /// scan cursor.  Advances the cursor past everything searched when
    /// nothing is found; the newest `window_length / 2` samples stay
    /// unsearched until their post-trigger half has arrived.
    fn scan_for_crossing(&mut self, ring: &SampleRing, config: &AdcConfig) -> Option<usize> {
        let length = u64::from(config.window_length);
        let half = length / 2;
        let written = ring.written();

        let from = self.scan_seq.max(ring.oldest_seq() + half);
        let until = written + half + 1 - length;
        if from >= until {
            return None;
        }

        let found = ring.find_trigger(SampleRing::slot_of(from), (until - from) as usize, config.threshold_mv);
        if found.is_none() {
            self.scan_seq = until;
        }
        found
    }
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new()
    }
}
