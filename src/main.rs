// SpikeTag — Firmware Entry Point
//
// Boot sequence (device):
//   1. Bring up ADC1 (electrode pair + battery divider).
//   2. Format the event store.
//   3. Build the capture pipeline and hand it to the supervisor task.
//   4. Spawn the supervisor and power tasks.
//   5. Select Bioelectric mode; the supervisor starts capturing.
//
// On the host the same wiring runs against a synthetic spiking source for a
// few seconds and then prints what landed in the store.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use spiketag::adc::pipeline::AdcPipeline;
use spiketag::clock::SystemClock;
use spiketag::config::*;
use spiketag::drivers::channel::AdcArbiter;
use spiketag::events::{DeviceEvent, OperatingMode};
use spiketag::settings::SharedConfig;
use spiketag::storage::MemoryStore;
use spiketag::tasks::supervisor::{supervisor_task, Supervisor};

// ---------------------------------------------------------------------------
// Main (device)
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use spiketag::drivers::adc::{AdcUnit, EspDifferentialSource};
    use spiketag::tasks::power::{power_task, BatteryMonitor};

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("SpikeTag firmware starting…");

    // ---- Shared hardware & state -------------------------------------------
    let unit = Arc::new(AdcUnit::new()?);
    let arbiter = AdcArbiter::new();
    let config = SharedConfig::default();
    let clock = Arc::new(SystemClock::new());
    let store = Arc::new(Mutex::new(MemoryStore::formatted(STORE_CAPACITY_BYTES)));

    let pipeline = AdcPipeline::new(
        Box::new(EspDifferentialSource::new(Arc::clone(&unit))),
        Box::new(Arc::clone(&store)),
        Arc::new(config.clone()),
        clock.clone(),
        arbiter.clone(),
    );
    let supervisor = Supervisor::new(pipeline, config, clock);

    // ---- Spawn tasks (map to FreeRTOS tasks via std::thread) ---------------
    let (event_tx, event_rx) = mpsc::channel();

    thread::Builder::new()
        .name("supervisor".into())
        .stack_size(STACK_SUPERVISOR)
        .spawn(move || supervisor_task(supervisor, event_rx))?;

    let battery_unit = Arc::clone(&unit);
    let monitor = BatteryMonitor::new(arbiter, move || battery_unit.read_battery_mv(), event_tx.clone());
    thread::Builder::new()
        .name("power".into())
        .stack_size(STACK_POWER)
        .spawn(move || power_task(monitor))?;

    // No radio stack on this board yet, so nothing will ever pick the mode.
    event_tx.send(DeviceEvent::SetMode(OperatingMode::Bioelectric))?;
    log::info!("Boot complete — capturing");

    // Main thread keeps the event sender alive and reports store usage.
    loop {
        thread::sleep(Duration::from_secs(60));
        if let Ok(store) = store.lock() {
            log::info!("Store: {} records, {} bytes free", store.record_count(), store.remaining());
        }
    }
}

// ---------------------------------------------------------------------------
// Main (host simulation)
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
const SIMULATION_SECS: u64 = 2;

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::anyhow;
    use spiketag::drivers::synthetic::SyntheticSource;
    use spiketag::settings::{AdcConfig, AdcMode};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
    log::info!("SpikeTag host simulation starting…");

    let config = SharedConfig::new(AdcConfig {
        mode: AdcMode::ThresholdEvent,
        threshold_mv: 400,
        debounce_ms: 50,
        ..AdcConfig::default()
    });
    let clock = Arc::new(SystemClock::new());
    let store = Arc::new(Mutex::new(MemoryStore::formatted(STORE_CAPACITY_BYTES)));

    // 25 mV noise floor, a 900 mV discharge every 250 ms at 10 kHz
    let source = SyntheticSource::spiking(0x5EED, 25, 2_500, 900);
    let pipeline = AdcPipeline::new(
        Box::new(source),
        Box::new(Arc::clone(&store)),
        Arc::new(config.clone()),
        clock.clone(),
        AdcArbiter::new(),
    );
    let supervisor = Supervisor::new(pipeline, config, clock);

    let (event_tx, event_rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("supervisor".into())
        .stack_size(STACK_SUPERVISOR)
        .spawn(move || supervisor_task(supervisor, event_rx))?;

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as u32;
    event_tx.send(DeviceEvent::SetTime(now))?;
    event_tx.send(DeviceEvent::SetMode(OperatingMode::Bioelectric))?;

    thread::sleep(Duration::from_secs(SIMULATION_SECS));

    event_tx.send(DeviceEvent::Shutdown)?;
    handle
        .join()
        .map_err(|_| anyhow!("supervisor task panicked"))?;

    let store = store
        .lock()
        .map_err(|_| anyhow!("event store lock poisoned"))?;
    log::info!("Captured {} records ({} bytes)", store.record_count(), store.len());
    for record in store.records() {
        let record = record?;
        log::info!(
            "  {:?} @ {}.{:06}: {} samples, {} µs, {} payload bytes",
            record.kind,
            record.header.unix_timestamp,
            record.header.microsecond_offset,
            record.header.sample_count,
            record.header.duration_us,
            record.payload.len()
        );
    }

    Ok(())
}
