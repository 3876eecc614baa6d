// SpikeTag — ADC Channel Arbiter
//
// The SAADC-style converter is shared between the capture pipeline and the
// coarse battery reading.  Whoever holds an `AdcLease` owns the converter;
// dropping the lease frees it.  While the pipeline is starting it raises an
// exclusive request so the battery task backs off instead of racing it.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

const FREE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcOwner {
    Pipeline = 1,
    Battery = 2,
}

impl AdcOwner {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Pipeline),
            2 => Some(Self::Battery),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct ArbiterState {
    owner: AtomicU8,
    exclusive_pending: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct AdcArbiter {
    state: Arc<ArbiterState>,
}

impl AdcArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<AdcOwner> {
        AdcOwner::from_u8(self.state.owner.load(Ordering::Acquire))
    }

    /// Keep other users off the channel until `cancel_exclusive`.
    pub fn request_exclusive(&self) {
        self.state.exclusive_pending.store(true, Ordering::Release);
    }

    pub fn cancel_exclusive(&self) {
        self.state.exclusive_pending.store(false, Ordering::Release);
    }

    pub fn try_acquire(&self, who: AdcOwner) -> Option<AdcLease> {
        if who != AdcOwner::Pipeline && self.state.exclusive_pending.load(Ordering::Acquire) {
            return None;
        }
        self.state
            .owner
            .compare_exchange(FREE, who as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(AdcLease {
            state: Arc::clone(&self.state),
            owner: who,
        })
    }
}

#[derive(Debug)]
pub struct AdcLease {
    state: Arc<ArbiterState>,
    owner: AdcOwner,
}

impl AdcLease {
    pub fn owner(&self) -> AdcOwner {
        self.owner
    }
}

impl Drop for AdcLease {
    fn drop(&mut self) {
        let _ = self
            .state
            .owner
            .compare_exchange(self.owner as u8, FREE, Ordering::AcqRel, Ordering::Acquire);
    }
}
