// SpikeTag — ESP32-C3 Oneshot ADC Driver
//
// ADC1 via raw ESP-IDF oneshot calls.  Channels 0 and 1 form the electrode
// pair (signal = A1 - A0), channel 2 sits behind the battery divider.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_sys::esp;

use crate::config::*;
use crate::drivers::SampleSource;
use crate::events::Sample;

struct UnitHandle(esp_idf_sys::adc_oneshot_unit_handle_t);

// SAFETY: the oneshot driver handle is only ever used behind `AdcUnit`'s
// mutex, so no two threads touch it at once.
unsafe impl Send for UnitHandle {}

pub struct AdcUnit {
    handle: Mutex<UnitHandle>,
}

impl AdcUnit {
    /// Open ADC1 and configure all three channels with 11 dB attenuation.
    pub fn new() -> anyhow::Result<Self> {
        let mut handle: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        unsafe {
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp!(esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle))?;

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            for channel in [ADC_CHANNEL_SIGNAL_NEG, ADC_CHANNEL_SIGNAL_POS, ADC_CHANNEL_BATTERY] {
                esp!(esp_idf_sys::adc_oneshot_config_channel(
                    handle,
                    channel as esp_idf_sys::adc_channel_t,
                    &chan_cfg
                ))?;
            }
        }
        log::info!("ADC1 ready (channels {}, {}, {})", ADC_CHANNEL_SIGNAL_NEG, ADC_CHANNEL_SIGNAL_POS, ADC_CHANNEL_BATTERY);
        Ok(Self {
            handle: Mutex::new(UnitHandle(handle)),
        })
    }

    pub fn read_raw(&self, channel: u32) -> anyhow::Result<i32> {
        let guard = self.handle.lock().map_err(|_| anyhow!("ADC unit lock poisoned"))?;
        let mut raw: i32 = 0;
        esp!(unsafe {
            esp_idf_sys::adc_oneshot_read(guard.0, channel as esp_idf_sys::adc_channel_t, &mut raw)
        })?;
        Ok(raw)
    }

    /// Battery voltage in millivolts, before the divider.
    pub fn read_battery_mv(&self) -> anyhow::Result<u32> {
        let raw = self.read_raw(ADC_CHANNEL_BATTERY)?.clamp(0, ADC_RAW_FULL_SCALE) as u32;
        Ok(raw * BATTERY_ADC_REF_MV * BATTERY_DIVIDER / ADC_RAW_FULL_SCALE as u32)
    }
}

/// Differential electrode reading, A1 minus A0.
pub struct EspDifferentialSource {
    unit: Arc<AdcUnit>,
}

impl EspDifferentialSource {
    pub fn new(unit: Arc<AdcUnit>) -> Self {
        Self { unit }
    }
}

impl SampleSource for EspDifferentialSource {
    fn init(&mut self) -> anyhow::Result<()> {
        // one throwaway conversion proves the channels answer
        self.unit.read_raw(ADC_CHANNEL_SIGNAL_POS)?;
        self.unit.read_raw(ADC_CHANNEL_SIGNAL_NEG)?;
        Ok(())
    }

    fn read_mv(&mut self) -> anyhow::Result<Sample> {
        let pos = self.unit.read_raw(ADC_CHANNEL_SIGNAL_POS)?;
        let neg = self.unit.read_raw(ADC_CHANNEL_SIGNAL_NEG)?;
        let mv = (pos - neg) * ADC_FULL_SCALE_MV / ADC_RAW_FULL_SCALE;
        Ok(mv.clamp(SAMPLE_MIN_MV, SAMPLE_MAX_MV))
    }
}

/// Run `spawn` with the FreeRTOS thread configuration raised to the producer
/// priority, then restore the default for everyone else.
pub fn with_producer_priority<T>(spawn: impl FnOnce() -> T) -> T {
    let raised = ThreadSpawnConfiguration {
        stack_size: STACK_PRODUCER,
        priority: PRIORITY_PRODUCER,
        ..Default::default()
    };
    if let Err(e) = raised.set() {
        log::warn!("Producer priority not applied: {}", e);
    }
    let result = spawn();
    if let Err(e) = ThreadSpawnConfiguration::default().set() {
        log::warn!("Thread configuration reset failed: {}", e);
    }
    result
}
