// SpikeTag — Bioelectric Capture Pipeline

pub mod detector;
pub mod encoder;
pub mod pipeline;
pub mod producer;
pub mod ring_buffer;
pub mod stats;
pub mod window;
pub mod wire;
