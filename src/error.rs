// SpikeTag — Error Types
//
// Library seams return these typed errors; tasks and `main` wrap them in
// `anyhow` like the rest of the firmware.

use thiserror::Error;

/// Failures reported by a persistence sink. All of them are non-fatal for
/// the capture pipeline: the record is dropped and capture continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("event store full ({needed} bytes needed, {available} available)")]
    Full { needed: usize, available: usize },

    #[error("event store not initialized")]
    NotInitialized,

    #[error("invalid record: {0}")]
    InvalidRecord(&'static str),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline already running")]
    AlreadyRunning,

    #[error("sample source unavailable")]
    SourceUnavailable,

    #[error("event sink unavailable")]
    SinkUnavailable,

    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated record: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown event tag 0x{0:02X}")]
    UnknownTag(u8),

    #[error("microsecond offset {0} out of range")]
    MicrosOutOfRange(u32),
}
