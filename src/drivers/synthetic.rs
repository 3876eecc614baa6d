// SpikeTag — Synthetic Sample Source
//
// Stands in for the electrode ADC on the host: the simulator binary and the
// pipeline tests drive the full capture path with it.

use anyhow::bail;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::SampleSource;
use crate::events::Sample;

pub struct SyntheticSource {
    generator: Box<dyn FnMut(u64) -> Sample + Send>,
    index: u64,
    init_failures: u32,
    initialized: bool,
}

impl SyntheticSource {
    /// `generator` maps the sample index to a millivolt value.
    pub fn new(generator: impl FnMut(u64) -> Sample + Send + 'static) -> Self {
        Self {
            generator: Box::new(generator),
            index: 0,
            init_failures: 0,
            initialized: false,
        }
    }

    pub fn flat(mv: Sample) -> Self {
        Self::new(move |_| mv)
    }

    /// Uniform noise of ±`noise_mv` with a biphasic discharge of `spike_mv`
    /// every `spike_every` samples.
    pub fn spiking(seed: u64, noise_mv: i32, spike_every: u64, spike_mv: Sample) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = noise_mv.abs();
        let every = spike_every.max(10);
        Self::new(move |i| {
            let base = rng.gen_range(-noise..=noise);
            match i % every {
                0..=4 => base + spike_mv,
                5..=9 => base - spike_mv / 2,
                _ => base,
            }
        })
    }

    /// Fail the first `attempts` calls to `init`, like a converter that is
    /// still powering up.
    pub fn failing_init(mut self, attempts: u32) -> Self {
        self.init_failures = attempts;
        self
    }
}

impl SampleSource for SyntheticSource {
    fn init(&mut self) -> anyhow::Result<()> {
        if self.init_failures > 0 {
            self.init_failures -= 1;
            bail!("synthetic ADC not ready");
        }
        self.initialized = true;
        Ok(())
    }

    fn read_mv(&mut self) -> anyhow::Result<Sample> {
        if !self.initialized {
            bail!("synthetic ADC not initialized");
        }
        let mv = (self.generator)(self.index);
        self.index += 1;
        Ok(mv)
    }

    fn release(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_require_init() {
        let mut source = SyntheticSource::flat(42).failing_init(1);
        assert!(source.read_mv().is_err());
        assert!(source.init().is_err());
        source.init().unwrap();
        assert_eq!(source.read_mv().unwrap(), 42);

        source.release();
        assert!(source.read_mv().is_err());
    }

    #[test]
    fn spiking_source_is_deterministic() {
        let mut a = SyntheticSource::spiking(7, 20, 1_000, 800);
        let mut b = SyntheticSource::spiking(7, 20, 1_000, 800);
        a.init().unwrap();
        b.init().unwrap();

        let xs: Vec<Sample> = (0..2_000).map(|_| a.read_mv().unwrap()).collect();
        let ys: Vec<Sample> = (0..2_000).map(|_| b.read_mv().unwrap()).collect();
        assert_eq!(xs, ys);
        assert!(xs[0] >= 780);
        assert!(xs[500].abs() <= 20);
        assert!(xs[1_007] <= -380);
    }
}
