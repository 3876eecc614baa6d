// SpikeTag — Supervisor Task
//
// Owns the ADC pipeline and reacts to device events from the radio and power
// tasks.  Capture runs only in Bioelectric mode and only while no central is
// connected (the radio needs the shared analog front end during transfers).

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::adc::pipeline::AdcPipeline;
use crate::clock::SystemClock;
use crate::events::{DeviceEvent, OperatingMode};
use crate::settings::SharedConfig;

pub struct Supervisor {
    pipeline: AdcPipeline,
    config: SharedConfig,
    clock: Arc<SystemClock>,
    mode: OperatingMode,
    radio_connected: bool,
    battery_percent: Option<u8>,
}

impl Supervisor {
    pub fn new(pipeline: AdcPipeline, config: SharedConfig, clock: Arc<SystemClock>) -> Self {
        Self {
            pipeline,
            config,
            clock,
            mode: OperatingMode::default(),
            radio_connected: false,
            battery_percent: None,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn pipeline(&self) -> &AdcPipeline {
        &self.pipeline
    }

    pub fn battery_percent(&self) -> Option<u8> {
        self.battery_percent
    }

    /// Apply one event. Returns `false` once the supervisor should exit.
    pub fn handle(&mut self, event: DeviceEvent) -> bool {
        match event {
            DeviceEvent::SetMode(mode) => {
                if mode != self.mode {
                    log::info!("Operating mode {:?} -> {:?}", self.mode, mode);
                    self.mode = mode;
                }
            }
            DeviceEvent::RadioConnected => self.radio_connected = true,
            DeviceEvent::RadioDisconnected => self.radio_connected = false,
            DeviceEvent::UpdateConfig(config) => {
                if let Err(e) = self.config.update(config) {
                    log::warn!("Config update rejected: {}", e);
                }
            }
            DeviceEvent::SetTime(unix_seconds) => {
                let first = !self.clock.is_time_set();
                self.clock.set_unix_time(unix_seconds);
                if first {
                    log::info!("Wall clock anchored; records now carry unix time");
                }
            }
            DeviceEvent::BatteryLevel(percent) => {
                log::info!("Battery: {}%", percent);
                self.battery_percent = Some(percent);
            }
            DeviceEvent::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        self.reconcile();
        true
    }

    pub fn shutdown(&mut self) {
        log::info!("Supervisor shutting down");
        self.pipeline.stop();
    }

    fn wants_capture(&self) -> bool {
        self.mode == OperatingMode::Bioelectric && !self.radio_connected
    }

    fn reconcile(&mut self) {
        use crate::adc::pipeline::PipelineState::*;

        match (self.wants_capture(), self.pipeline.state()) {
            (true, Stopped) => {
                if let Err(e) = self.pipeline.start() {
                    log::warn!("ADC pipeline start failed: {}", e);
                }
            }
            (false, Starting | Running) => self.pipeline.stop(),
            _ => {}
        }
    }
}

pub fn supervisor_task(mut supervisor: Supervisor, events: Receiver<DeviceEvent>) {
    log::info!("Supervisor task started");

    for event in events.iter() {
        log::debug!("Device event: {:?}", event);
        if !supervisor.handle(event) {
            return;
        }
    }

    // every sender is gone
    log::warn!("Device event channel closed — stopping capture");
    supervisor.shutdown();
}
