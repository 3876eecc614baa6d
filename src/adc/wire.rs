// SpikeTag — Record Wire Format
//
// Every record is a fixed 12-byte big-endian header, a one-byte event tag,
// then the payload:
//
//   offset 0..4   unix_timestamp      u32
//   offset 4..8   microsecond_offset  u32 (0..=999_999)
//   offset 8..10  sample_count        u16
//   offset 10..12 duration_us         u16 (saturates at 65 535)
//   offset 12     event tag           u8  (EventKind)
//   offset 13..   payload             2 peak bytes (SingleEvent)
//                                     or sample_count scaled bytes
//
// Records are written back to back in an append-only log; the tag and
// sample_count are enough to find the next record.

use crate::adc::encoder::{EncodedEvent, Payload};
use crate::error::DecodeError;
use crate::events::EventKind;

pub const HEADER_LEN: usize = 12;
pub const TAG_LEN: usize = 1;
pub const PEAKS_LEN: usize = 2;
pub const MICROS_MAX: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub unix_timestamp: u32,
    pub microsecond_offset: u32,
    pub sample_count: u16,
    pub duration_us: u16,
}

impl RecordHeader {
    pub fn for_event(event: &EncodedEvent<'_>) -> Self {
        let duration_us = u16::try_from(event.duration_us).unwrap_or(u16::MAX);
        if u32::from(duration_us) != event.duration_us {
            log::debug!("Duration {} µs saturated to {} µs in record header", event.duration_us, duration_us);
        }
        Self {
            unix_timestamp: event.timestamp.unix_seconds,
            microsecond_offset: event.timestamp.micros,
            sample_count: event.sample_count,
            duration_us,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.unix_timestamp.to_be_bytes());
        out[4..8].copy_from_slice(&self.microsecond_offset.to_be_bytes());
        out[8..10].copy_from_slice(&self.sample_count.to_be_bytes());
        out[10..12].copy_from_slice(&self.duration_us.to_be_bytes());
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::Truncated { needed: HEADER_LEN, available: bytes.len() });
        }
        let header = Self {
            unix_timestamp: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            microsecond_offset: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            sample_count: u16::from_be_bytes([bytes[8], bytes[9]]),
            duration_us: u16::from_be_bytes([bytes[10], bytes[11]]),
        };
        if header.microsecond_offset > MICROS_MAX {
            return Err(DecodeError::MicrosOutOfRange(header.microsecond_offset));
        }
        Ok(header)
    }
}

/// Payload length implied by a tag and sample count.
pub fn payload_len(kind: EventKind, sample_count: u16) -> usize {
    match kind {
        EventKind::SingleEvent => PEAKS_LEN,
        EventKind::TimerBurst | EventKind::PeriEvent => usize::from(sample_count),
    }
}

/// Bytes `event` occupies on the wire.
pub fn record_len(event: &EncodedEvent<'_>) -> usize {
    HEADER_LEN + TAG_LEN + event.payload.len()
}

/// Append the wire form of `event` to `out`.
pub fn encode_record(event: &EncodedEvent<'_>, out: &mut Vec<u8>) {
    out.reserve(record_len(event));
    out.extend_from_slice(&RecordHeader::for_event(event).to_bytes());
    out.push(event.kind.tag());
    match event.payload {
        Payload::Peaks { positive, negative } => out.extend_from_slice(&[positive, negative]),
        Payload::Waveform(bytes) => out.extend_from_slice(bytes),
    }
}

/// A record read back from the log, borrowing its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub header: RecordHeader,
    pub kind: EventKind,
    pub payload: Payload<'a>,
}

impl Record<'_> {
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + TAG_LEN + self.payload.len()
    }
}

/// Decode the record at the start of `bytes`.
pub fn decode_record(bytes: &[u8]) -> Result<Record<'_>, DecodeError> {
    let header = RecordHeader::parse(bytes)?;
    let tag = *bytes
        .get(HEADER_LEN)
        .ok_or(DecodeError::Truncated { needed: HEADER_LEN + TAG_LEN, available: bytes.len() })?;
    let kind = EventKind::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;

    let start = HEADER_LEN + TAG_LEN;
    let end = start + payload_len(kind, header.sample_count);
    let body = bytes
        .get(start..end)
        .ok_or(DecodeError::Truncated { needed: end, available: bytes.len() })?;

    let payload = match kind {
        EventKind::SingleEvent => Payload::Peaks { positive: body[0], negative: body[1] },
        EventKind::TimerBurst | EventKind::PeriEvent => Payload::Waveform(body),
    };

    Ok(Record { header, kind, payload })
}

/// Iterates records in a concatenated log. Stops after the first error.
pub struct RecordReader<'a> {
    bytes: &'a [u8],
    failed: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, failed: false }
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.bytes.is_empty() {
            return None;
        }
        match decode_record(self.bytes) {
            Ok(record) => {
                self.bytes = &self.bytes[record.wire_len()..];
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
