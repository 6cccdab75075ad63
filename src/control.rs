//! Process-wide registry of named, interpolating control knobs.
//!
//! Updates arrive from the reserved `soir_internal_controls` sysex channel
//! on an ingress thread; reads happen once per sample per parameter on the
//! DSP thread. Each knob lives behind its own `Mutex` inside an
//! [`arc_swap::ArcSwap`]-published map: a steady-state read or write to an
//! existing knob only locks that one knob, with no cloning of the map and
//! no new `Arc` allocation. The map itself is only rebuilt the first time a
//! given knob name is set, which never happens on the audio thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::buffer::SampleTick;

/// An interpolating knob. `value_at` advances linear interpolation toward
/// `target` at `rate` units per tick and returns the current value.
#[derive(Clone, Copy, Debug)]
pub struct Control {
    current: f32,
    target: f32,
    rate: f32,
    last_tick: SampleTick,
    initialized: bool,
}

impl Control {
    pub fn new(initial: f32, rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            rate,
            last_tick: 0,
            initialized: false,
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// The current interpolated value without advancing time. Used when a
    /// caller needs to bake a knob's value into something at update time
    /// (e.g. rebuilding a DSP unit) without perturbing render-time ticking.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Advances interpolation to `tick` and returns the resulting value.
    /// Ticks are expected to be non-decreasing; a tick at or before the
    /// last one observed is a no-op that leaves `last_tick` untouched, so an
    /// out-of-order peek can never corrupt the next real render step.
    pub fn value_at(&mut self, tick: SampleTick) -> f32 {
        if !self.initialized {
            self.last_tick = tick;
            self.initialized = true;
        }
        if tick > self.last_tick {
            let steps = (tick - self.last_tick) as f32;
            self.last_tick = tick;
            let delta = self.target - self.current;
            let max_step = self.rate * steps;
            if delta.abs() <= max_step {
                self.current = self.target;
            } else {
                self.current += max_step * delta.signum();
            }
        }
        self.current
    }
}

#[derive(Default, Debug)]
struct Snapshot {
    knobs: HashMap<String, Arc<Mutex<Control>>>,
}

/// Shared handle to the knob registry. Cloning is cheap ([`Arc`] bump).
#[derive(Clone, Debug)]
pub struct Controls {
    snapshot: Arc<ArcSwap<Snapshot>>,
}

impl Controls {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(ArcSwap::from_pointee(Snapshot::default())),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.snapshot.load().knobs.contains_key(name)
    }

    /// Sets (creating if absent) the target value for a named knob. Only
    /// the first call for a given name rebuilds the published map; every
    /// later call for that name locks just its own knob.
    pub fn set_target(&self, name: &str, target: f32, default_rate: f32) {
        let existing = self.snapshot.load().knobs.get(name).cloned();
        if let Some(control) = existing {
            control.lock().unwrap().set_target(target);
            return;
        }

        let current = self.snapshot.load();
        let mut knobs = current.knobs.clone();
        knobs
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Control::new(target, default_rate))))
            .lock()
            .unwrap()
            .set_target(target);
        self.snapshot.store(Arc::new(Snapshot { knobs }));
    }

    /// Reads and advances a knob's interpolation to `tick`. Returns `None`
    /// if no knob with that name has ever been set.
    pub fn value_at(&self, name: &str, tick: SampleTick) -> Option<f32> {
        let control = self.snapshot.load().knobs.get(name)?.clone();
        let mut control = control.lock().unwrap();
        Some(control.value_at(tick))
    }

    /// Reads a knob's current value without advancing its interpolation.
    pub fn peek(&self, name: &str) -> Option<f32> {
        let control = self.snapshot.load().knobs.get(name)?.clone();
        let value = control.lock().unwrap().current();
        Some(value)
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}
