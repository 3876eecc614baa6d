// SpikeTag — Runtime Capture Settings
//
// The capture parameters can be rewritten by the configuration channel at any
// moment.  Readers always take a full copy under a short lock so they never
// observe a half-written update.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::config::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcMode {
    /// Trigger every debounce period regardless of signal.
    Timer,
    /// Trigger when |sample| exceeds the threshold.
    ThresholdEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    PeaksOnly,
    FullWaveform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcConfig {
    pub mode: AdcMode,
    pub threshold_mv: u16,
    pub window_length: u16,
    pub debounce_ms: u32,
    pub output_format: OutputFormat,
    pub sampling_rate_hz: u32,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            mode: AdcMode::Timer,
            threshold_mv: 0,
            window_length: WINDOW_LENGTH_DEFAULT,
            debounce_ms: DEBOUNCE_DEFAULT_MS,
            output_format: OutputFormat::FullWaveform,
            sampling_rate_hz: SAMPLING_RATE_DEFAULT_HZ,
        }
    }
}

impl AdcConfig {
    /// Copy of `self` with every field forced into its supported range.
    /// Each correction is logged; nothing is rejected.
    pub fn sanitized(&self) -> Self {
        let mut out = *self;

        if out.threshold_mv > THRESHOLD_MAX_MV {
            log::warn!("threshold {} mV out of range, clamped to {} mV", out.threshold_mv, THRESHOLD_MAX_MV);
            out.threshold_mv = THRESHOLD_MAX_MV;
        }

        if out.window_length == 0 {
            log::warn!("window length 0, using default {}", WINDOW_LENGTH_DEFAULT);
            out.window_length = WINDOW_LENGTH_DEFAULT;
        } else if !(WINDOW_LENGTH_MIN..=WINDOW_LENGTH_MAX).contains(&out.window_length) {
            let clamped = out.window_length.clamp(WINDOW_LENGTH_MIN, WINDOW_LENGTH_MAX);
            log::warn!("window length {} out of range, clamped to {}", out.window_length, clamped);
            out.window_length = clamped;
        }

        if out.debounce_ms < DEBOUNCE_MIN_MS {
            log::warn!("debounce {} ms too short, clamped to {} ms", out.debounce_ms, DEBOUNCE_MIN_MS);
            out.debounce_ms = DEBOUNCE_MIN_MS;
        }

        if !(SAMPLING_RATE_MIN_HZ..=SAMPLING_RATE_MAX_HZ).contains(&out.sampling_rate_hz) {
            let clamped = out.sampling_rate_hz.clamp(SAMPLING_RATE_MIN_HZ, SAMPLING_RATE_MAX_HZ);
            log::warn!("sampling rate {} Hz out of range, clamped to {} Hz", out.sampling_rate_hz, clamped);
            out.sampling_rate_hz = clamped;
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Configuration Provider
// ---------------------------------------------------------------------------

/// Source of configuration snapshots, polled once per detector cycle.
pub trait ConfigProvider: Send + Sync {
    fn snapshot(&self) -> anyhow::Result<AdcConfig>;
}

/// Copy-on-read configuration cell shared between the configuration channel
/// and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<Mutex<AdcConfig>>,
}

impl SharedConfig {
    pub fn new(config: AdcConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(config)) }
    }

    /// Replace the whole configuration in one step.
    pub fn update(&self, config: AdcConfig) -> anyhow::Result<()> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("configuration lock poisoned"))?;
        *guard = config;
        log::info!(
            "ADC config updated: mode={:?}, threshold={} mV, window={}, debounce={} ms, format={:?}, rate={} Hz",
            config.mode,
            config.threshold_mv,
            config.window_length,
            config.debounce_ms,
            config.output_format,
            config.sampling_rate_hz
        );
        Ok(())
    }
}

impl ConfigProvider for SharedConfig {
    fn snapshot(&self) -> anyhow::Result<AdcConfig> {
        self.inner
            .lock()
            .map(|guard| *guard)
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_through_unchanged() {
        let cfg = AdcConfig::default();
        assert_eq!(cfg.sanitized(), cfg);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = AdcConfig {
            mode: AdcMode::ThresholdEvent,
            threshold_mv: 5000,
            window_length: 4000,
            debounce_ms: 0,
            output_format: OutputFormat::PeaksOnly,
            sampling_rate_hz: 10,
        }
        .sanitized();

        assert_eq!(cfg.threshold_mv, THRESHOLD_MAX_MV);
        assert_eq!(cfg.window_length, WINDOW_LENGTH_MAX);
        assert_eq!(cfg.debounce_ms, 1);
        assert_eq!(cfg.sampling_rate_hz, SAMPLING_RATE_MIN_HZ);
    }

    #[test]
    fn short_and_zero_windows() {
        let mut cfg = AdcConfig::default();
        cfg.window_length = 10;
        assert_eq!(cfg.sanitized().window_length, WINDOW_LENGTH_MIN);
        cfg.window_length = 0;
        assert_eq!(cfg.sanitized().window_length, WINDOW_LENGTH_DEFAULT);
    }

    #[test]
    fn window_never_exceeds_ring_capacity() {
        let mut cfg = AdcConfig::default();
        cfg.window_length = u16::MAX;
        assert!(usize::from(cfg.sanitized().window_length) <= RING_CAPACITY);
    }

    #[test]
    fn shared_config_swaps_whole_snapshot() {
        let shared = SharedConfig::default();
        let reader = shared.clone();

        let next = AdcConfig {
            mode: AdcMode::ThresholdEvent,
            threshold_mv: 100,
            window_length: 300,
            debounce_ms: 250,
            output_format: OutputFormat::PeaksOnly,
            sampling_rate_hz: 20_000,
        };
        shared.update(next).unwrap();
        assert_eq!(reader.snapshot().unwrap(), next);
    }
}
