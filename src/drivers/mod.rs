// SpikeTag — Hardware Drivers

pub mod channel;
pub mod synthetic;

#[cfg(target_os = "espidf")]
pub mod adc;

use crate::events::Sample;

/// One analog conversion per call, in millivolts.
pub trait SampleSource: Send {
    /// Bring the converter up. An error means "not ready yet"; the caller
    /// retries.
    fn init(&mut self) -> anyhow::Result<()>;

    fn read_mv(&mut self) -> anyhow::Result<Sample>;

    /// Give the hardware channel back. Called once the producer has stopped.
    fn release(&mut self) {}
}

/// Spawn the producer with elevated task priority where the platform has one.
#[cfg(target_os = "espidf")]
pub use adc::with_producer_priority;

#[cfg(not(target_os = "espidf"))]
pub fn with_producer_priority<T>(spawn: impl FnOnce() -> T) -> T {
    spawn()
}
