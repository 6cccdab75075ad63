//! Pure numeric helpers and the phase-accumulator LFO.

use serde::{Deserialize, Serialize};

use crate::buffer::SAMPLE_RATE;

pub fn bipolar(u: f32) -> f32 {
    2.0 * u - 1.0
}

pub fn unipolar(b: f32) -> f32 {
    (b + 1.0) / 2.0
}

pub fn clip(x: f32, lo: f32, hi: f32) -> f32 {
    x.max(lo).min(hi)
}

/// A cheap sine approximation is not required here: `fast_sin` is just
/// `f32::sin`, named to match the original engine's helper so call sites
/// read the same way.
pub fn fast_sin(x: f32) -> f32 {
    x.sin()
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LfoType {
    Saw,
    Tri,
    Sine,
}

#[derive(Clone, Debug)]
pub struct Lfo {
    kind: LfoType,
    inc: f32,
    phase: f32,
}

impl Lfo {
    pub fn new(kind: LfoType, frequency_hz: f32) -> Self {
        Self {
            kind,
            inc: frequency_hz / SAMPLE_RATE as f32,
            phase: 0.0,
        }
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.inc = frequency_hz / SAMPLE_RATE as f32;
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Advances the phase accumulator by one sample and returns the next
    /// output, bounded to `[-1, 1]`.
    pub fn render(&mut self) -> f32 {
        let v = bipolar(self.phase);
        let out = match self.kind {
            LfoType::Saw => v,
            LfoType::Tri => 2.0 * v.abs() - 1.0,
            LfoType::Sine => fast_sin(v * std::f32::consts::PI),
        };
        self.phase += self.inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        clip(out, -1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bipolar_unipolar_round_trip() {
        for i in 0..=10 {
            let u = i as f32 / 10.0;
            let back = unipolar(bipolar(u));
            assert_relative_eq!(back, u, epsilon = 1e-6);
        }
    }

    #[test]
    fn lfo_is_bounded() {
        for kind in [LfoType::Saw, LfoType::Tri, LfoType::Sine] {
            let mut lfo = Lfo::new(kind, 440.0);
            for _ in 0..10_000 {
                let v = lfo.render();
                assert!((-1.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn lfo_wraps_phase() {
        let mut lfo = Lfo::new(LfoType::Saw, SAMPLE_RATE as f32 / 4.0);
        for _ in 0..4 {
            lfo.render();
        }
        assert!(lfo.phase < 1.0);
    }
}
