//! A track owns one instrument and one effect chain, and applies
//! per-track mute/volume/pan driven by MIDI control-change messages.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::buffer::{AudioBuffer, SampleTick};
use crate::control::Controls;
use crate::error::Result;
use crate::fx::FxSettings;
use crate::fx_stack::FxStack;
use crate::instrument::MonoSampler;
use crate::midi::{MidiMessage, CC_MUTE, CC_PAN, CC_VOLUME};
use crate::midi_stack::MidiEventAt;
use crate::sample::SamplePack;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum InstrumentKind {
    MonoSampler,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackSettings {
    pub id: i64,
    pub instrument: InstrumentKind,
    pub channel: u8,
    pub muted: bool,
    pub volume: u8,
    pub pan: u8,
    pub fxs: Vec<FxSettings>,
}

pub struct Track {
    settings: TrackSettings,
    instrument: MonoSampler,
    fx_stack: FxStack,
    scratch: AudioBuffer,
}

impl Track {
    pub fn new(
        settings: TrackSettings,
        pack: Arc<SamplePack>,
        controls: &Controls,
        block_size: usize,
    ) -> Result<Self> {
        match settings.instrument {
            InstrumentKind::MonoSampler => {}
        }
        let fx_stack = FxStack::new(&settings.fxs, controls);
        Ok(Self {
            instrument: MonoSampler::new(pack),
            fx_stack,
            scratch: AudioBuffer::new(block_size),
            settings,
        })
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    pub fn channel(&self) -> u8 {
        self.settings.channel
    }

    pub fn can_fast_update(&self, new: &TrackSettings) -> bool {
        new.instrument == self.settings.instrument && self.fx_stack.can_fast_update(&new.fxs)
    }

    pub fn fast_update(&mut self, new: TrackSettings, controls: &Controls) {
        self.fx_stack.fast_update(&new.fxs, controls);
        self.settings = new;
    }

    fn handle_cc(&mut self, controller: u8, value: u8) {
        match controller {
            CC_MUTE => {
                if value != 0 {
                    self.settings.muted = !self.settings.muted;
                }
            }
            CC_VOLUME => self.settings.volume = value,
            CC_PAN => self.settings.pan = value,
            _ => {}
        }
    }

    /// Routes control changes, renders the instrument, then applies
    /// volume, pan, and the effect chain, in that order.
    pub fn render(&mut self, tick: SampleTick, events: &[MidiEventAt]) -> &AudioBuffer {
        let mut instrument_events = Vec::with_capacity(events.len());
        for event in events {
            if let MidiMessage::ControlChange { controller, value } = event.message {
                self.handle_cc(controller, value);
            } else {
                instrument_events.push(event.clone());
            }
        }

        self.scratch.reset();
        if self.settings.muted {
            return &self.scratch;
        }

        self.instrument.render(&instrument_events, &mut self.scratch);
        self.scratch.apply_gain(self.settings.volume as f32 / 127.0);
        self.scratch.apply_pan(self.settings.pan as f32 / 127.0);
        self.fx_stack.render(tick, &mut self.scratch);
        &self.scratch
    }
}

impl Default for InstrumentKind {
    fn default() -> Self {
        InstrumentKind::MonoSampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn pack() -> Arc<SamplePack> {
        let sample = Arc::new(crate::sample::Sample {
            name: "s".into(),
            left: vec![1.0; 4096],
            right: vec![1.0; 4096],
        });
        let mut by_name = HashMap::new();
        let mut by_midi_note = HashMap::new();
        by_midi_note.insert(60u8, sample.clone());
        by_name.insert("s".into(), sample);
        Arc::new(SamplePack::from_parts("t", by_name, by_midi_note))
    }

    fn settings(volume: u8, pan: u8, muted: bool) -> TrackSettings {
        TrackSettings {
            id: 1,
            instrument: InstrumentKind::MonoSampler,
            channel: 0,
            muted,
            volume,
            pan,
            fxs: vec![],
        }
    }

    fn note_on(tick: SampleTick) -> MidiEventAt {
        MidiEventAt {
            track_id: 1,
            message: MidiMessage::NoteOn {
                note: 60,
                velocity: 127,
            },
            tick,
        }
    }

    #[test]
    fn muted_track_is_silent() {
        let controls = Controls::new();
        let mut track = Track::new(settings(127, 64, true), pack(), &controls, 512).unwrap();
        let buf = track.render(0, &[note_on(0)]);
        assert!(buf.left().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn volume_cc_scales_output() {
        let controls = Controls::new();
        let mut full = Track::new(settings(127, 64, false), pack(), &controls, 512).unwrap();
        let full_buf = full.render(0, &[note_on(0)]).clone();

        let mut half = Track::new(settings(64, 64, false), pack(), &controls, 512).unwrap();
        let half_buf = half.render(0, &[note_on(0)]).clone();

        let ratio = half_buf.left()[0] / full_buf.left()[0];
        assert!((ratio - 64.0 / 127.0).abs() < 1e-4);
    }

    #[test]
    fn mute_cc_toggles_mid_stream() {
        let controls = Controls::new();
        let mut track = Track::new(settings(127, 64, false), pack(), &controls, 512).unwrap();
        let first = track.render(0, &[note_on(0)]).clone();
        assert!(first.left().iter().any(|&s| s != 0.0));

        let mute_event = || MidiEventAt {
            track_id: 1,
            message: MidiMessage::ControlChange {
                controller: CC_MUTE,
                value: 127,
            },
            tick: 512,
        };
        let second = track.render(512, &[mute_event()]).clone();
        assert!(second.left().iter().all(|&s| s == 0.0));

        // A second mute toggle with the same nonzero value restores sound,
        // it does not leave the track muted forever.
        let third = track.render(1024, &[mute_event(), note_on(1024)]);
        assert!(third.left().iter().any(|&s| s != 0.0));
    }

    #[test]
    fn fast_update_requires_matching_instrument() {
        let controls = Controls::new();
        let track = Track::new(settings(127, 64, false), pack(), &controls, 512).unwrap();
        assert!(track.can_fast_update(&settings(64, 64, false)));
    }
}
