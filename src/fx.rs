//! Effect nodes with the hot-reload contract: `can_fast_update` decides
//! whether `fast_update` may mutate settings in place (preserving DSP
//! state, avoiding a click) or whether the caller must rebuild the node.
//!
//! `fast_update` only rebuilds the underlying `fundsp` unit when a
//! parameter actually baked into its construction changed; mix parameters
//! (`dry`/`wet`) are read fresh every sample and never force a rebuild, so
//! a reverb's tail or a chorus's delay line survives settings updates that
//! don't touch them.

use fundsp::hacker32::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::buffer::{AudioBuffer, SampleTick};
use crate::control::Controls;
use crate::parameter::Parameter;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FxSettings {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mix: f32,
    #[serde(default)]
    pub extra: Value,
}

pub trait Fx: Send {
    fn can_fast_update(&self, settings: &FxSettings) -> bool;
    fn fast_update(&mut self, settings: &FxSettings, controls: &Controls);
    fn render(&mut self, tick: SampleTick, buffer: &mut AudioBuffer);
}

fn param(extra: &Value, key: &str, default: f32, controls: &Controls) -> Parameter {
    match extra.get(key) {
        Some(v) => Parameter::from_json(v, controls),
        None => Parameter::constant(default),
    }
}

fn changed(a: f32, b: f32) -> bool {
    (a - b).abs() > f32::EPSILON
}

pub struct Reverb {
    time: Parameter,
    dry: Parameter,
    wet: Parameter,
    baked_time: f32,
    unit: Box<dyn AudioUnit>,
}

impl Reverb {
    pub fn new(settings: &FxSettings, controls: &Controls) -> Self {
        let mut node = Self {
            time: Parameter::constant(0.5),
            dry: Parameter::constant(0.5),
            wet: Parameter::constant(0.5),
            baked_time: 0.5,
            unit: Box::new(reverb_stereo(10.0, 0.5, 1.0)),
        };
        node.fast_update(settings, controls);
        node
    }

    fn rebuild_unit(&mut self, time: f32) {
        self.unit = Box::new(reverb_stereo(10.0, time.max(0.05), 1.0));
    }
}

impl Fx for Reverb {
    fn can_fast_update(&self, settings: &FxSettings) -> bool {
        settings.kind == "reverb"
    }

    fn fast_update(&mut self, settings: &FxSettings, controls: &Controls) {
        self.time = param(&settings.extra, "time", 0.5, controls);
        self.dry = param(&settings.extra, "dry", 0.5, controls);
        self.wet = param(&settings.extra, "wet", 0.5, controls);

        let time = self.time.current_value();
        if changed(time, self.baked_time) {
            self.rebuild_unit(time);
            self.baked_time = time;
        }
    }

    fn render(&mut self, tick: SampleTick, buffer: &mut AudioBuffer) {
        let (left, right) = buffer.left_right_mut();
        for i in 0..left.len() {
            let t = tick + i as SampleTick;
            let dry = self.dry.value_at(t);
            let wet = self.wet.value_at(t);
            let mut out = [0.0f32; 2];
            self.unit.tick(&[left[i], right[i]], &mut out);
            left[i] = dry * left[i] + wet * out[0];
            right[i] = dry * right[i] + wet * out[1];
        }
    }
}

pub struct Chorus {
    time: Parameter,
    depth: Parameter,
    rate: Parameter,
    baked_time: f32,
    baked_rate: f32,
    baked_depth: f32,
    unit: Box<dyn AudioUnit>,
}

impl Chorus {
    pub fn new(settings: &FxSettings, controls: &Controls) -> Self {
        let mut node = Self {
            time: Parameter::constant(0.0),
            depth: Parameter::constant(0.5),
            rate: Parameter::constant(0.5),
            baked_time: 0.0,
            baked_rate: 0.5,
            baked_depth: 0.5,
            unit: Box::new(chorus(0, 0.0, 0.015, 0.5 * 0.5) | chorus(1, 0.0, 0.015, 0.5 * 0.5)),
        };
        node.fast_update(settings, controls);
        node
    }

    /// `time` feeds the chorus's base delay separation; `rate`/`depth`
    /// scale the modulation amount.
    fn rebuild_unit(&mut self, time: f32, rate: f32, depth: f32) {
        let separation = time.max(0.0);
        let modulation = rate.max(0.01) * depth.max(0.01);
        self.unit = Box::new(
            chorus(0, separation, 0.015, modulation) | chorus(1, separation, 0.015, modulation),
        );
    }
}

impl Fx for Chorus {
    fn can_fast_update(&self, settings: &FxSettings) -> bool {
        settings.kind == "chorus"
    }

    fn fast_update(&mut self, settings: &FxSettings, controls: &Controls) {
        self.time = param(&settings.extra, "time", 0.0, controls);
        self.depth = param(&settings.extra, "depth", 0.5, controls);
        self.rate = param(&settings.extra, "rate", 0.5, controls);

        let time = self.time.current_value();
        let rate = self.rate.current_value();
        let depth = self.depth.current_value();
        if changed(time, self.baked_time) || changed(rate, self.baked_rate) || changed(depth, self.baked_depth) {
            self.rebuild_unit(time, rate, depth);
            self.baked_time = time;
            self.baked_rate = rate;
            self.baked_depth = depth;
        }
    }

    fn render(&mut self, tick: SampleTick, buffer: &mut AudioBuffer) {
        let (left, right) = buffer.left_right_mut();
        for i in 0..left.len() {
            let mut out = [0.0f32; 2];
            self.unit.tick(&[left[i], right[i]], &mut out);
            left[i] = out[0];
            right[i] = out[1];
        }
        let _ = tick;
    }
}

pub fn build(settings: &FxSettings, controls: &Controls) -> Box<dyn Fx> {
    match settings.kind.as_str() {
        "chorus" => Box::new(Chorus::new(settings, controls)),
        _ => Box::new(Reverb::new(settings, controls)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: &str, extra: Value) -> FxSettings {
        FxSettings {
            name: "fx".into(),
            kind: kind.into(),
            mix: 1.0,
            extra,
        }
    }

    #[test]
    fn reverb_rejects_type_change() {
        let controls = Controls::new();
        let reverb = Reverb::new(&settings("reverb", serde_json::json!({})), &controls);
        assert!(!reverb.can_fast_update(&settings("chorus", serde_json::json!({}))));
        assert!(reverb.can_fast_update(&settings("reverb", serde_json::json!({"time": 0.8}))));
    }

    #[test]
    fn reverb_render_stays_bounded() {
        let controls = Controls::new();
        let mut reverb = Reverb::new(
            &settings("reverb", serde_json::json!({"time": 0.3, "dry": 0.5, "wet": 0.5})),
            &controls,
        );
        let mut buf = AudioBuffer::new(512);
        buf.left_mut()[0] = 1.0;
        reverb.render(0, &mut buf);
        assert!(buf.left().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn reverb_fast_update_without_time_change_does_not_rebuild() {
        let controls = Controls::new();
        let mut reverb = Reverb::new(
            &settings("reverb", serde_json::json!({"time": 0.4, "dry": 0.5, "wet": 0.5})),
            &controls,
        );
        let before = reverb.baked_time;
        reverb.fast_update(
            &settings("reverb", serde_json::json!({"time": 0.4, "dry": 0.1, "wet": 0.9})),
            &controls,
        );
        assert_eq!(reverb.baked_time, before);
    }

    #[test]
    fn reverb_fast_update_with_time_change_rebuilds() {
        let controls = Controls::new();
        let mut reverb = Reverb::new(
            &settings("reverb", serde_json::json!({"time": 0.4})),
            &controls,
        );
        reverb.fast_update(&settings("reverb", serde_json::json!({"time": 0.9})), &controls);
        assert!((reverb.baked_time - 0.9).abs() < 1e-6);
    }

    #[test]
    fn chorus_render_stays_bounded() {
        let controls = Controls::new();
        let mut chorus = Chorus::new(
            &settings("chorus", serde_json::json!({"time": 0.2, "rate": 0.4, "depth": 0.6})),
            &controls,
        );
        let mut buf = AudioBuffer::new(512);
        buf.left_mut()[0] = 1.0;
        chorus.render(0, &mut buf);
        assert!(buf.left().iter().all(|s| s.is_finite()));
    }
}
