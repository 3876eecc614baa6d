// SpikeTag — Wearable Bioelectric Capture Firmware
//
// Library half of the firmware: the ADC capture pipeline, its record format
// and the tasks that drive it.  `main.rs` wires it to the ESP32-C3 hardware,
// or to a synthetic source when built for the host.

pub mod adc;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod settings;
pub mod storage;
pub mod tasks;
