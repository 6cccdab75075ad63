//! `MonoSampler`: a MIDI-driven sample player. One voice per triggered
//! note, summed into the render buffer.

use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::midi::MidiMessage;
use crate::midi_stack::MidiEventAt;
use crate::sample::{Sample, SamplePack};

/// Release fade length, chosen to avoid a click without implementing a
/// full envelope generator (spec Open Question (c)).
const RELEASE_FADE_SAMPLES: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum VoiceState {
    Playing,
    Releasing,
    Done,
}

struct Voice {
    sample: Arc<Sample>,
    position: usize,
    gain: f32,
    note: u8,
    state: VoiceState,
    release_start: usize,
}

impl Voice {
    fn new(sample: Arc<Sample>, gain: f32, note: u8) -> Self {
        Self {
            sample,
            position: 0,
            gain,
            note,
            state: VoiceState::Playing,
            release_start: 0,
        }
    }

    fn release(&mut self) {
        if self.state == VoiceState::Playing {
            self.state = VoiceState::Releasing;
            self.release_start = self.position;
        }
    }

    fn render_into(&mut self, buffer: &mut AudioBuffer) {
        let (left, right) = buffer.left_right_mut();
        for i in 0..left.len() {
            if self.position >= self.sample.duration_samples() {
                self.state = VoiceState::Done;
                break;
            }
            let mut gain = self.gain;
            if self.state == VoiceState::Releasing {
                let elapsed = self.position - self.release_start;
                if elapsed >= RELEASE_FADE_SAMPLES {
                    self.state = VoiceState::Done;
                    break;
                }
                gain *= 1.0 - (elapsed as f32 / RELEASE_FADE_SAMPLES as f32);
            }
            left[i] += self.sample.left[self.position] * gain;
            right[i] += self.sample.right[self.position] * gain;
            self.position += 1;
        }
    }

    fn is_done(&self) -> bool {
        self.state == VoiceState::Done
    }
}

pub struct MonoSampler {
    pack: Arc<SamplePack>,
    voices: Vec<Voice>,
}

impl MonoSampler {
    pub fn new(pack: Arc<SamplePack>) -> Self {
        Self {
            pack,
            voices: Vec::new(),
        }
    }

    pub fn set_pack(&mut self, pack: Arc<SamplePack>) {
        self.pack = pack;
    }

    fn handle_message(&mut self, message: &MidiMessage) {
        match message {
            MidiMessage::NoteOn { note, velocity } => {
                if let Some(sample) = self.pack.get_by_midi_note(*note) {
                    let gain = *velocity as f32 / 127.0;
                    self.voices.push(Voice::new(sample.clone(), gain, *note));
                }
            }
            MidiMessage::NoteOff { note, .. } => {
                for voice in self.voices.iter_mut().filter(|v| v.note == *note) {
                    voice.release();
                }
            }
            _ => {}
        }
    }

    /// Renders `events` into `buffer`, which must already be zeroed. Spent
    /// voices are evicted after rendering.
    pub fn render(&mut self, events: &[MidiEventAt], buffer: &mut AudioBuffer) {
        for event in events {
            self.handle_message(&event.message);
        }
        for voice in self.voices.iter_mut() {
            voice.render_into(buffer);
        }
        self.voices.retain(|v| !v.is_done());
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }
}
