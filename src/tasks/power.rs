// SpikeTag — Power Management Task
//
// Periodically reads battery voltage and reports it to the supervisor.  The
// reading borrows the shared ADC through the arbiter and skips the cycle if
// the capture pipeline holds (or is about to take) the converter.

use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use crate::config::*;
use crate::drivers::channel::{AdcArbiter, AdcOwner};
use crate::events::DeviceEvent;

/// Map LiPo range: 3.3 V = 0%, 4.2 V = 100%.
pub fn battery_percent(mv: u32) -> u8 {
    let span = BATTERY_FULL_MV - BATTERY_EMPTY_MV;
    let above = mv.clamp(BATTERY_EMPTY_MV, BATTERY_FULL_MV) - BATTERY_EMPTY_MV;
    (above * 100 / span) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Reported(u8),
    /// Converter busy; try again next interval.
    Skipped,
    ReadFailed,
    /// Supervisor gone.
    Closed,
}

pub struct BatteryMonitor<F> {
    arbiter: AdcArbiter,
    read_mv: F,
    events: Sender<DeviceEvent>,
}

impl<F> BatteryMonitor<F>
where
    F: FnMut() -> anyhow::Result<u32>,
{
    pub fn new(arbiter: AdcArbiter, read_mv: F, events: Sender<DeviceEvent>) -> Self {
        Self { arbiter, read_mv, events }
    }

    pub fn poll(&mut self) -> Poll {
        let Some(lease) = self.arbiter.try_acquire(AdcOwner::Battery) else {
            log::debug!("Battery read skipped, ADC busy");
            return Poll::Skipped;
        };
        let reading = (self.read_mv)();
        drop(lease);

        let mv = match reading {
            Ok(mv) => mv,
            Err(e) => {
                log::warn!("Battery read failed: {}", e);
                return Poll::ReadFailed;
            }
        };
        let level = battery_percent(mv);
        log::debug!("Battery {} mV ({}%)", mv, level);
        match self.events.send(DeviceEvent::BatteryLevel(level)) {
            Ok(()) => Poll::Reported(level),
            Err(_) => Poll::Closed,
        }
    }
}

pub fn power_task<F>(mut monitor: BatteryMonitor<F>)
where
    F: FnMut() -> anyhow::Result<u32>,
{
    log::info!("Power task started");

    let check_interval = Duration::from_millis(BATTERY_CHECK_INTERVAL_MS);

    loop {
        if monitor.poll() == Poll::Closed {
            log::warn!("Device event channel closed — exiting power task");
            return;
        }
        thread::sleep(check_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn lipo_mapping_is_clamped() {
        assert_eq!(battery_percent(3_000), 0);
        assert_eq!(battery_percent(3_300), 0);
        assert_eq!(battery_percent(3_750), 50);
        assert_eq!(battery_percent(4_200), 100);
        assert_eq!(battery_percent(4_500), 100);
    }

    #[test]
    fn poll_reports_and_releases_channel() {
        let arbiter = AdcArbiter::new();
        let (tx, rx) = mpsc::channel();
        let mut monitor = BatteryMonitor::new(arbiter.clone(), || Ok(3_975), tx);

        assert_eq!(monitor.poll(), Poll::Reported(75));
        assert!(matches!(rx.try_recv(), Ok(DeviceEvent::BatteryLevel(75))));
        assert_eq!(arbiter.owner(), None);
    }

    #[test]
    fn poll_backs_off_while_pipeline_owns_adc() {
        let arbiter = AdcArbiter::new();
        let (tx, rx) = mpsc::channel();
        let mut calls = 0;
        let mut monitor = BatteryMonitor::new(
            arbiter.clone(),
            || {
                calls += 1;
                Ok(4_000)
            },
            tx,
        );

        let lease = arbiter.try_acquire(AdcOwner::Pipeline).unwrap();
        assert_eq!(monitor.poll(), Poll::Skipped);
        drop(lease);

        arbiter.request_exclusive();
        assert_eq!(monitor.poll(), Poll::Skipped);
        arbiter.cancel_exclusive();

        assert_eq!(monitor.poll(), Poll::Reported(77));
        drop(monitor);
        assert_eq!(calls, 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn read_failure_and_closed_channel() {
        let (tx, rx) = mpsc::channel();
        let mut failing = BatteryMonitor::new(AdcArbiter::new(), || anyhow::bail!("timeout"), tx.clone());
        assert_eq!(failing.poll(), Poll::ReadFailed);

        drop(rx);
        let mut orphan = BatteryMonitor::new(AdcArbiter::new(), || Ok(3_800), tx);
        assert_eq!(orphan.poll(), Poll::Closed);
    }
}
