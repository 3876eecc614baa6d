// SpikeTag — Event Encoder
//
// Turns an extracted window into an `EncodedEvent`: millivolts are quantized
// to one byte each and either kept whole (full waveform) or reduced to the
// max/min pair (peaks only).
//
// Quantization: byte = round((mv + 2000) * 255 / 4000), clamped to 0..=255.
// One step is 4000 / 255 ≈ 15.7 mV, so a decoded byte is within ±7.9 mV of
// the original sample for any input in ±2000 mV.  Inputs outside that range
// saturate.

use crate::config::*;
use crate::events::{EventKind, Sample, Timestamp, TriggerEvent};
use crate::settings::OutputFormat;

/// Scale one millivolt sample into the 8-bit record domain.
pub fn scale_mv(mv: Sample) -> u8 {
    let shifted = i64::from(mv.clamp(SAMPLE_MIN_MV, SAMPLE_MAX_MV) - SAMPLE_MIN_MV);
    let span = i64::from(SAMPLE_SPAN_MV);
    // round half up
    let scaled = (shifted * i64::from(SCALED_MAX) + span / 2) / span;
    scaled.clamp(0, i64::from(SCALED_MAX)) as u8
}

/// Inverse of [`scale_mv`], for downstream readers.
pub fn unscale(byte: u8) -> f32 {
    f32::from(byte) * SAMPLE_SPAN_MV as f32 / SCALED_MAX as f32 + SAMPLE_MIN_MV as f32
}

/// `(peak_positive, peak_negative)` of a scaled window.
pub fn peaks(scaled: &[u8]) -> Option<(u8, u8)> {
    let (&first, rest) = scaled.split_first()?;
    Some(rest.iter().fold((first, first), |(hi, lo), &b| (hi.max(b), lo.min(b))))
}

/// Window duration in µs, capped at [`DURATION_CAP_US`].
pub fn duration_us(sample_count: u16, sampling_rate_hz: u32) -> u32 {
    if sampling_rate_hz == 0 {
        return DURATION_CAP_US;
    }
    let us = u64::from(sample_count) * 1_000_000 / u64::from(sampling_rate_hz);
    us.min(u64::from(DURATION_CAP_US)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Peaks { positive: u8, negative: u8 },
    Waveform(&'a [u8]),
}

impl Payload<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Peaks { .. } => 2,
            Self::Waveform(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record ready for the persistence sink. Borrows the encoder's scratch
/// buffer, so it must be handed off before the next encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedEvent<'a> {
    pub timestamp: Timestamp,
    pub kind: EventKind,
    pub sample_count: u16,
    /// Full-precision duration; the wire header saturates it to 16 bits.
    pub duration_us: u32,
    pub payload: Payload<'a>,
}

pub struct EventEncoder {
    scaled: Vec<u8>,
}

impl EventEncoder {
    pub fn new() -> Self {
        Self {
            scaled: Vec::with_capacity(RING_CAPACITY),
        }
    }

    pub fn encode(&mut self, event: &TriggerEvent, window: &[Sample]) -> EncodedEvent<'_> {
        self.scaled.clear();
        self.scaled.extend(window.iter().map(|&mv| scale_mv(mv)));

        let config = &event.config;
        let sample_count = u16::try_from(window.len()).unwrap_or(u16::MAX);

        let payload = match config.output_format {
            OutputFormat::FullWaveform => Payload::Waveform(&self.scaled[..]),
            OutputFormat::PeaksOnly => {
                let (positive, negative) = peaks(&self.scaled).unwrap_or((0, 0));
                Payload::Peaks { positive, negative }
            }
        };

        EncodedEvent {
            timestamp: event.timestamp,
            kind: EventKind::for_config(config),
            sample_count,
            duration_us: duration_us(sample_count, config.sampling_rate_hz),
            payload,
        }
    }
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AdcConfig, AdcMode};

    fn trigger(format: OutputFormat) -> TriggerEvent {
        TriggerEvent {
            position: 0,
            timestamp: Timestamp { unix_seconds: 10, micros: 20 },
            config: AdcConfig {
                mode: AdcMode::ThresholdEvent,
                output_format: format,
                sampling_rate_hz: 10_000,
                ..AdcConfig::default()
            },
        }
    }

    #[test]
    fn scaling_endpoints_and_midpoint() {
        assert_eq!(scale_mv(-2000), 0);
        assert_eq!(scale_mv(2000), 255);
        assert_eq!(scale_mv(0), 128);
        assert_eq!(scale_mv(150), 137);
    }

    #[test]
    fn scaling_saturates_outside_range() {
        assert_eq!(scale_mv(-5000), 0);
        assert_eq!(scale_mv(9000), 255);
        assert_eq!(scale_mv(Sample::MIN), 0);
        assert_eq!(scale_mv(Sample::MAX), 255);
    }

    #[test]
    fn quantization_round_trip_within_half_step() {
        for mv in SAMPLE_MIN_MV..=SAMPLE_MAX_MV {
            let err = (unscale(scale_mv(mv)) - mv as f32).abs();
            assert!(err <= 7.9, "{} mV decoded with error {}", mv, err);
        }
    }

    #[test]
    fn peaks_of_empty_window() {
        assert_eq!(peaks(&[]), None);
        assert_eq!(peaks(&[42]), Some((42, 42)));
    }

    #[test]
    fn duration_is_capped() {
        assert_eq!(duration_us(1000, 10_000), 100_000);
        assert_eq!(duration_us(200, 1_000), 200_000);
        assert_eq!(duration_us(u16::MAX, 1), DURATION_CAP_US);
        assert_eq!(duration_us(100, 0), DURATION_CAP_US);
    }

    #[test]
    fn peaks_mode_matches_full_waveform_extremes() {
        let window: Vec<Sample> = (0..200).map(|i| ((i * 37) % 900) - 450).collect();

        let mut encoder = EventEncoder::new();
        let full = encoder.encode(&trigger(OutputFormat::FullWaveform), &window);
        let bytes = match full.payload {
            Payload::Waveform(b) => b.to_vec(),
            other => panic!("unexpected payload {:?}", other),
        };
        assert_eq!(full.kind, EventKind::PeriEvent);
        assert_eq!(bytes.len(), 200);

        let summary = encoder.encode(&trigger(OutputFormat::PeaksOnly), &window);
        assert_eq!(summary.kind, EventKind::SingleEvent);
        assert_eq!(
            summary.payload,
            Payload::Peaks {
                positive: *bytes.iter().max().unwrap(),
                negative: *bytes.iter().min().unwrap(),
            }
        );
        assert_eq!(summary.sample_count, 200);
        assert_eq!(summary.duration_us, 20_000);
        assert_eq!(summary.timestamp, Timestamp { unix_seconds: 10, micros: 20 });
    }
}
