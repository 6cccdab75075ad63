//! Tick-sorted queue of pending MIDI events.
//!
//! `add_events` inserts each event in front of the first existing event
//! whose tick is strictly greater, so among same-tick events insertion
//! order is preserved (stable, FIFO on ties) rather than the original
//! engine's scan, which lands same-tick ties in reverse. `drain_up_to`
//! removes and returns every event with `tick <= cutoff`.

use crate::buffer::SampleTick;
use crate::midi::MidiMessage;

#[derive(Clone, Debug)]
pub struct MidiEventAt {
    pub track_id: i64,
    pub message: MidiMessage,
    pub tick: SampleTick,
}

#[derive(Default)]
pub struct MidiStack {
    events: Vec<MidiEventAt>,
}

impl MidiStack {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn add_events(&mut self, new_events: impl IntoIterator<Item = MidiEventAt>) {
        for event in new_events {
            let insert_at = self
                .events
                .iter()
                .position(|e| e.tick > event.tick)
                .unwrap_or(self.events.len());
            self.events.insert(insert_at, event);
        }
    }

    /// Removes and returns all events with `tick <= cutoff`, in order.
    pub fn drain_up_to(&mut self, cutoff: SampleTick) -> Vec<MidiEventAt> {
        let split = self
            .events
            .iter()
            .position(|e| e.tick > cutoff)
            .unwrap_or(self.events.len());
        self.events.drain(..split).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
