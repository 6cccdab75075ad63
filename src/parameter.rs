//! `Parameter`: a field binding that resolves at render time to either a
//! constant or a named control knob, mirroring the original engine's
//! `Parameter::Type::{CONSTANT,KNOB}` split.

use serde_json::Value;

use crate::buffer::SampleTick;
use crate::control::Controls;

#[derive(Clone, Debug)]
pub enum Parameter {
    Constant(f32),
    Knob { name: String, controls: Controls },
}

impl Parameter {
    pub fn constant(value: f32) -> Self {
        Parameter::Constant(value)
    }

    pub fn knob(name: impl Into<String>, controls: Controls) -> Self {
        Parameter::Knob {
            name: name.into(),
            controls,
        }
    }

    /// Parses a JSON field that is either a bare number (constant) or a
    /// string naming a knob. A knob name with no matching control at parse
    /// time degrades to a zero constant rather than failing the whole
    /// fx/track reload.
    pub fn from_json(value: &Value, controls: &Controls) -> Self {
        match value {
            Value::Number(n) => Parameter::Constant(n.as_f64().unwrap_or(0.0) as f32),
            Value::String(name) => {
                if controls.has(name) {
                    Parameter::knob(name.clone(), controls.clone())
                } else {
                    Parameter::Constant(0.0)
                }
            }
            _ => Parameter::Constant(0.0),
        }
    }

    pub fn value_at(&self, tick: SampleTick) -> f32 {
        match self {
            Parameter::Constant(v) => *v,
            Parameter::Knob { name, controls } => controls.value_at(name, tick).unwrap_or(0.0),
        }
    }

    /// The parameter's current value without advancing any knob's
    /// interpolation. Used when settings update, not render, needs a value
    /// (e.g. deciding whether to rebuild a DSP unit).
    pub fn current_value(&self) -> f32 {
        match self {
            Parameter::Constant(v) => *v,
            Parameter::Knob { name, controls } => controls.peek(name).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_never_changes() {
        let p = Parameter::constant(0.25);
        assert_eq!(p.value_at(0), 0.25);
        assert_eq!(p.value_at(10_000), 0.25);
    }

    #[test]
    fn unknown_knob_name_degrades_to_zero() {
        let controls = Controls::new();
        let p = Parameter::from_json(&Value::String("missing".into()), &controls);
        assert!(matches!(p, Parameter::Constant(v) if v == 0.0));
    }

    #[test]
    fn known_knob_tracks_registry() {
        let controls = Controls::new();
        controls.set_target("depth", 0.8, 1.0);
        let p = Parameter::from_json(&Value::String("depth".into()), &controls);
        let v = p.value_at(1);
        assert!(v > 0.0);
    }
}
