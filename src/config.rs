// SpikeTag — Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

// ---------------------------------------------------------------------------
// ADC Pin / Channel Definitions (Xiao ESP32-C3 pinout, ADC1)
// ---------------------------------------------------------------------------
pub const ADC_CHANNEL_SIGNAL_NEG: u32 = 0;  // D0/A0, electrode reference
pub const ADC_CHANNEL_SIGNAL_POS: u32 = 1;  // D1/A1, electrode signal
pub const ADC_CHANNEL_BATTERY: u32 = 2;     // D2/A2, battery divider
pub const ADC_RAW_FULL_SCALE: i32 = 4095;   // 12-bit
pub const ADC_FULL_SCALE_MV: i32 = 2500;    // 11 dB attenuation, usable range

// ---------------------------------------------------------------------------
// Signal Range & Quantization
// ---------------------------------------------------------------------------
pub const SAMPLE_MIN_MV: i32 = -2000;
pub const SAMPLE_MAX_MV: i32 = 2000;
pub const SAMPLE_SPAN_MV: i32 = SAMPLE_MAX_MV - SAMPLE_MIN_MV; // 4000
pub const SCALED_MAX: i32 = 255;

// ---------------------------------------------------------------------------
// Ring Buffer & Windowing
// ---------------------------------------------------------------------------
pub const RING_CAPACITY: usize = 1000;
pub const WINDOW_LENGTH_MIN: u16 = 100;
pub const WINDOW_LENGTH_DEFAULT: u16 = 200;
pub const WINDOW_LENGTH_MAX: u16 = RING_CAPACITY as u16;

// ---------------------------------------------------------------------------
// Trigger & Timing
// ---------------------------------------------------------------------------
pub const THRESHOLD_MAX_MV: u16 = 2000;
pub const DEBOUNCE_MIN_MS: u32 = 1;
pub const DEBOUNCE_DEFAULT_MS: u32 = 5000;
pub const SAMPLING_RATE_MIN_HZ: u32 = 1_000;
pub const SAMPLING_RATE_DEFAULT_HZ: u32 = 10_000;
pub const SAMPLING_RATE_MAX_HZ: u32 = 100_000;
pub const SCAN_INTERVAL_MS: u64 = 10;                  // detector cycle
pub const PRODUCER_TICK_US: u64 = 1_000;               // producer catch-up period
pub const PRODUCER_BATCH: usize = 64;                  // samples read per ring lock
pub const SOURCE_RETRY_MS: u64 = 100;                  // ADC not ready → retry
pub const DURATION_CAP_US: u32 = 10_000_000;
pub const BATTERY_CHECK_INTERVAL_MS: u64 = 10_000;     // 10 seconds
pub const BATTERY_EMPTY_MV: u32 = 3300;               // LiPo 0%
pub const BATTERY_FULL_MV: u32 = 4200;                // LiPo 100%
pub const BATTERY_DIVIDER: u32 = 2;                   // 1:2 resistor divider
pub const BATTERY_ADC_REF_MV: u32 = 3300;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_PRODUCER: usize = 4096;
pub const STACK_DETECTOR: usize = 8192;
pub const STACK_SUPERVISOR: usize = 8192;
pub const STACK_POWER: usize = 4096;

// ---------------------------------------------------------------------------
// Task Priorities (FreeRTOS, device only)
// ---------------------------------------------------------------------------
pub const PRIORITY_PRODUCER: u8 = 20;

// ---------------------------------------------------------------------------
// Event Store
// ---------------------------------------------------------------------------
pub const STORE_CAPACITY_BYTES: usize = 128 * 1024; // 1 Mbit FRAM
