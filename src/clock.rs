// SpikeTag — Time Sources
//
// The detector needs two things from a clock: a monotonic millisecond counter
// for the debounce gate, and an absolute (unix seconds + µs) stamp for records.
// Until the phone app pushes the wall-clock time, absolute stamps count from
// boot so records are still ordered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::events::Timestamp;

pub trait Clock: Send + Sync {
    /// Milliseconds since boot. Never goes backwards.
    fn now_ms(&self) -> u64;
    /// Absolute time of "now".
    fn timestamp(&self) -> Timestamp;
}

// ---------------------------------------------------------------------------
// System clock (device and host)
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct SystemClock {
    boot: Instant,
    /// unix µs minus boot-relative µs at the moment the time was set; 0 = unset.
    unix_offset_us: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
            unix_offset_us: AtomicU64::new(0),
        }
    }

    fn uptime_us(&self) -> u64 {
        self.boot.elapsed().as_micros() as u64
    }

    /// Anchor absolute timestamps to `unix_seconds` as of now.
    pub fn set_unix_time(&self, unix_seconds: u32) {
        let offset = (u64::from(unix_seconds) * 1_000_000).saturating_sub(self.uptime_us());
        self.unix_offset_us.store(offset, Ordering::Release);
        log::info!("Timestamp set to {} (uptime: {} ms)", unix_seconds, self.now_ms());
    }

    pub fn is_time_set(&self) -> bool {
        self.unix_offset_us.load(Ordering::Acquire) != 0
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn timestamp(&self) -> Timestamp {
        let offset = self.unix_offset_us.load(Ordering::Acquire);
        Timestamp::from_unix_micros(offset + self.uptime_us())
    }
}

// ---------------------------------------------------------------------------
// Simulated clock: advanced by hand, shared by clones
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ms: Arc<AtomicU64>,
    unix_base: u32,
}

impl SimClock {
    pub fn new(unix_base: u32) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(0)),
            unix_base,
        }
    }

    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::Release);
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as u64, Ordering::AcqRel);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn timestamp(&self) -> Timestamp {
        let ms = self.now_ms();
        Timestamp::from_unix_micros(u64::from(self.unix_base) * 1_000_000 + ms * 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_clock_is_shared_between_clones() {
        let clock = SimClock::new(1_700_000_000);
        let view = clock.clone();
        clock.advance(Duration::from_millis(1_500));

        assert_eq!(view.now_ms(), 1_500);
        let ts = view.timestamp();
        assert_eq!(ts.unix_seconds, 1_700_000_001);
        assert_eq!(ts.micros, 500_000);
    }

    #[test]
    fn system_clock_anchors_to_pushed_time() {
        let clock = SystemClock::new();
        assert!(!clock.is_time_set());
        assert!(clock.timestamp().unix_seconds < 1_000);

        clock.set_unix_time(1_700_000_000);
        assert!(clock.is_time_set());
        let ts = clock.timestamp();
        assert!(ts.unix_seconds >= 1_700_000_000);
        assert!(ts.micros < 1_000_000);
    }
}
