//! Ordered chain of effect nodes with chain-level hot-reload.

use crate::buffer::{AudioBuffer, SampleTick};
use crate::control::Controls;
use crate::fx::{self, Fx, FxSettings};

pub struct FxStack {
    names: Vec<String>,
    nodes: Vec<Box<dyn Fx>>,
}

impl FxStack {
    pub fn new(settings: &[FxSettings], controls: &Controls) -> Self {
        let names = settings.iter().map(|s| s.name.clone()).collect();
        let nodes = settings.iter().map(|s| fx::build(s, controls)).collect();
        Self { names, nodes }
    }

    /// True iff `settings` names/types line up one-to-one, in order, with
    /// the current chain — a chain-shape change (added/removed/reordered
    /// fx, or a type change within a slot) requires a full rebuild.
    pub fn can_fast_update(&self, settings: &[FxSettings]) -> bool {
        if settings.len() != self.nodes.len() {
            return false;
        }
        settings
            .iter()
            .zip(self.names.iter())
            .zip(self.nodes.iter())
            .all(|((s, name), node)| &s.name == name && node.can_fast_update(s))
    }

    pub fn fast_update(&mut self, settings: &[FxSettings], controls: &Controls) {
        for (node, s) in self.nodes.iter_mut().zip(settings.iter()) {
            node.fast_update(s, controls);
        }
    }

    pub fn render(&mut self, tick: SampleTick, buffer: &mut AudioBuffer) {
        for node in self.nodes.iter_mut() {
            node.render(tick, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(name: &str, kind: &str) -> FxSettings {
        FxSettings {
            name: name.into(),
            kind: kind.into(),
            mix: 1.0,
            extra: json!({}),
        }
    }

    #[test]
    fn same_shape_allows_fast_update() {
        let controls = Controls::new();
        let stack = FxStack::new(&[settings("verb", "reverb")], &controls);
        assert!(stack.can_fast_update(&[settings("verb", "reverb")]));
    }

    #[test]
    fn type_change_requires_rebuild() {
        let controls = Controls::new();
        let stack = FxStack::new(&[settings("verb", "reverb")], &controls);
        assert!(!stack.can_fast_update(&[settings("verb", "chorus")]));
    }

    #[test]
    fn added_fx_requires_rebuild() {
        let controls = Controls::new();
        let stack = FxStack::new(&[settings("verb", "reverb")], &controls);
        assert!(!stack.can_fast_update(&[
            settings("verb", "reverb"),
            settings("chor", "chorus")
        ]));
    }

    #[test]
    fn render_leaves_buffer_finite() {
        let controls = Controls::new();
        let mut stack = FxStack::new(&[settings("verb", "reverb")], &controls);
        let mut buf = AudioBuffer::new(64);
        buf.left_mut()[0] = 1.0;
        stack.render(0, &mut buf);
        assert!(buf.left().iter().all(|s| s.is_finite()));
    }
}
