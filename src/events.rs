// SpikeTag — System Events & Data Types

use crate::settings::{AdcConfig, AdcMode, OutputFormat};

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One differential ADC reading in millivolts, nominally within ±2000 mV.
pub type Sample = i32;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Absolute capture time: whole unix seconds plus the offset into that second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub unix_seconds: u32,
    /// Always within `0..=999_999`.
    pub micros: u32,
}

impl Timestamp {
    pub fn from_unix_micros(us: u64) -> Self {
        Self {
            unix_seconds: (us / 1_000_000) as u32,
            micros: (us % 1_000_000) as u32,
        }
    }

    pub fn as_unix_micros(&self) -> u64 {
        u64::from(self.unix_seconds) * 1_000_000 + u64::from(self.micros)
    }
}

// ---------------------------------------------------------------------------
// Event kinds: the tag byte that follows every record header
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Timer mode, full waveform payload.
    TimerBurst,
    /// Peaks-only payload (either trigger mode).
    SingleEvent,
    /// Threshold mode, full waveform payload centred on the crossing.
    PeriEvent,
}

impl EventKind {
    pub const fn tag(self) -> u8 {
        match self {
            Self::TimerBurst => 0x00,
            Self::SingleEvent => 0x01,
            Self::PeriEvent => 0x02,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::TimerBurst),
            0x01 => Some(Self::SingleEvent),
            0x02 => Some(Self::PeriEvent),
            _ => None,
        }
    }

    /// Kind of record produced for a given configuration snapshot.
    pub fn for_config(config: &AdcConfig) -> Self {
        match (config.output_format, config.mode) {
            (OutputFormat::PeaksOnly, _) => Self::SingleEvent,
            (OutputFormat::FullWaveform, AdcMode::Timer) => Self::TimerBurst,
            (OutputFormat::FullWaveform, AdcMode::ThresholdEvent) => Self::PeriEvent,
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger Event: created by the detector, consumed by the extractor
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent {
    /// Ring slot the window is centred on.
    pub position: usize,
    /// Captured at acceptance, before extraction or encoding.
    pub timestamp: Timestamp,
    /// Sanitized configuration active when the trigger was accepted.
    pub config: AdcConfig,
}

// ---------------------------------------------------------------------------
// Operating Mode
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    /// Radio duty-cycling for proximity logging; the ADC pipeline is idle.
    #[default]
    Social,
    /// Continuous bioelectric capture through the ADC pipeline.
    Bioelectric,
}

// ---------------------------------------------------------------------------
// Device Events: sent to the supervisor task via channel
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub enum DeviceEvent {
    /// Operating mode selected by the phone app.
    SetMode(OperatingMode),
    /// A central connected; the radio needs the shared analog hardware.
    RadioConnected,
    /// The central went away.
    RadioDisconnected,
    /// New capture parameters pushed over the configuration channel.
    UpdateConfig(AdcConfig),
    /// Wall-clock time pushed by the phone app (unix seconds).
    SetTime(u32),
    /// Battery level sampled by the power task (0–100 %).
    BatteryLevel(u8),
    /// Stop everything and exit the supervisor loop.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_follows_format_then_mode() {
        let mut cfg = AdcConfig::default();
        cfg.output_format = OutputFormat::PeaksOnly;
        assert_eq!(EventKind::for_config(&cfg), EventKind::SingleEvent);

        cfg.output_format = OutputFormat::FullWaveform;
        cfg.mode = AdcMode::Timer;
        assert_eq!(EventKind::for_config(&cfg), EventKind::TimerBurst);

        cfg.mode = AdcMode::ThresholdEvent;
        assert_eq!(EventKind::for_config(&cfg), EventKind::PeriEvent);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        for kind in [EventKind::TimerBurst, EventKind::SingleEvent, EventKind::PeriEvent] {
            assert_eq!(EventKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EventKind::from_tag(0x7F), None);
    }

    #[test]
    fn timestamp_splits_micros() {
        let ts = Timestamp::from_unix_micros(1_700_000_000_250_000);
        assert_eq!(ts.unix_seconds, 1_700_000_000);
        assert_eq!(ts.micros, 250_000);
        assert_eq!(ts.as_unix_micros(), 1_700_000_000_250_000);
    }
}
