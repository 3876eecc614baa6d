// SpikeTag — Event Store Interface
//
// The capture pipeline hands each finished record to an `EventSink` and keeps
// no reference afterwards.  `MemoryStore` is a bounded append-only log with
// the same failure modes as the FRAM file system it stands in for: it refuses
// writes until formatted, and refuses any record that would not fit.

use std::sync::{Arc, Mutex};

use crate::adc::encoder::{EncodedEvent, Payload};
use crate::adc::wire::{self, RecordReader, MICROS_MAX};
use crate::error::SinkError;

pub trait EventSink: Send {
    fn append_event(&mut self, event: &EncodedEvent<'_>) -> Result<(), SinkError>;
}

/// Lets the pipeline write into a store that other tasks (the radio file
/// transfer, tests) also read.
impl<S: EventSink> EventSink for Arc<Mutex<S>> {
    fn append_event(&mut self, event: &EncodedEvent<'_>) -> Result<(), SinkError> {
        match self.lock() {
            Ok(mut sink) => sink.append_event(event),
            Err(_) => Err(SinkError::NotInitialized),
        }
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    data: Vec<u8>,
    capacity: usize,
    formatted: bool,
    records: usize,
}

impl MemoryStore {
    /// An unformatted store; appends fail until [`MemoryStore::format`].
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            formatted: false,
            records: 0,
        }
    }

    pub fn formatted(capacity: usize) -> Self {
        let mut store = Self::new(capacity);
        store.format();
        store
    }

    /// Erase everything and accept writes.
    pub fn format(&mut self) {
        self.data = Vec::with_capacity(self.capacity);
        self.records = 0;
        self.formatted = true;
        log::info!("Event store formatted ({} bytes)", self.capacity);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn records(&self) -> RecordReader<'_> {
        RecordReader::new(&self.data)
    }
}

impl EventSink for MemoryStore {
    fn append_event(&mut self, event: &EncodedEvent<'_>) -> Result<(), SinkError> {
        if !self.formatted {
            return Err(SinkError::NotInitialized);
        }
        if event.timestamp.micros > MICROS_MAX {
            return Err(SinkError::InvalidRecord("microsecond offset out of range"));
        }
        if let Payload::Waveform(bytes) = event.payload {
            if bytes.is_empty() || bytes.len() != usize::from(event.sample_count) {
                return Err(SinkError::InvalidRecord("waveform length does not match sample count"));
            }
        }

        let needed = wire::record_len(event);
        if needed > self.remaining() {
            return Err(SinkError::Full {
                needed,
                available: self.remaining(),
            });
        }

        wire::encode_record(event, &mut self.data);
        self.records += 1;
        log::debug!(
            "Appended {:?} record: {} bytes (total: {} bytes)",
            event.kind,
            needed,
            self.data.len()
        );
        Ok(())
    }
}
