// SpikeTag — Long-running Tasks

pub mod power;
pub mod supervisor;
