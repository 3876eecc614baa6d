// SpikeTag — Window Extractor
//
// Maps an accepted trigger onto a ring read.  The scratch buffer is sized
// once to the ring capacity so extraction never allocates.

use crate::adc::ring_buffer::RingBuffer;
use crate::events::{Sample, TriggerEvent};

pub struct WindowExtractor {
    scratch: Vec<Sample>,
}

impl WindowExtractor {
    pub fn new(capacity: usize) -> Self {
        Self {
            scratch: vec![0; capacity],
        }
    }

    /// Window of `event.config.window_length` samples centred on
    /// `event.position`, or `None` if the ring cannot supply it yet.
    /// A `None` aborts the trigger; the next cycle re-evaluates.
    pub fn extract<const N: usize>(&mut self, ring: &RingBuffer<N>, event: &TriggerEvent) -> Option<&[Sample]> {
        let length = usize::from(event.config.window_length);
        ring.read_window(event.position, length, &mut self.scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Timestamp;
    use crate::settings::AdcConfig;

    fn event(position: usize, window_length: u16) -> TriggerEvent {
        TriggerEvent {
            position,
            timestamp: Timestamp::default(),
            config: AdcConfig { window_length, ..AdcConfig::default() },
        }
    }

    #[test]
    fn extracts_centred_window() {
        let mut ring = RingBuffer::<300>::new();
        for v in 0..300 {
            ring.push(v);
        }
        let mut extractor = WindowExtractor::new(300);

        let window = extractor.extract(&ring, &event(150, 100)).unwrap();
        assert_eq!(window.len(), 100);
        assert_eq!(window.first(), Some(&100));
        assert_eq!(window.last(), Some(&199));
    }

    #[test]
    fn aborts_when_ring_is_short() {
        let mut ring = RingBuffer::<300>::new();
        for v in 0..99 {
            ring.push(v);
        }
        let mut extractor = WindowExtractor::new(300);
        assert!(extractor.extract(&ring, &event(50, 100)).is_none());
    }
}
