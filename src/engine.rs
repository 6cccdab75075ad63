//! The DSP loop: owns tracks and the pending-MIDI queue, renders blocks on
//! a fixed cadence, and fans each block out to registered consumers.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::buffer::{AudioBuffer, SampleTick, BLOCK_SIZE, SAMPLE_RATE};
use crate::control::Controls;
use crate::error::{EngineError, Result};
use crate::midi::{MidiMessage, SOIR_INTERNAL_CONTROLS};
use crate::midi_stack::{MidiEventAt, MidiStack};
use crate::sample::SampleManager;
use crate::track::{Track, TrackSettings};

/// Number of blocks of lead time added to every scheduled MIDI event, to
/// absorb jitter from whatever produced the event (a live-coding frontend,
/// a hardware controller). ~70ms at the engine's block cadence.
pub const SCHEDULING_DELAY_BLOCKS: u64 = 7;

pub trait Consumer: Send + Sync {
    fn push_audio_buffer(&self, block: &AudioBuffer);
}

struct LoopState {
    stop: bool,
}

struct PendingEvent {
    track_id: i64,
    message: MidiMessage,
    wall_time_at: Instant,
}

struct Shared {
    tracks: Mutex<HashMap<i64, Track>>,
    setup_tracks_mutex: Mutex<()>,
    pending: Mutex<Vec<PendingEvent>>,
    consumers: Mutex<Vec<Arc<dyn Consumer>>>,
    controls: Controls,
    sample_manager: SampleManager,
    loop_state: Mutex<LoopState>,
    cond: Condvar,
    current_tick: Mutex<SampleTick>,
}

pub struct Engine {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(sample_manager: SampleManager) -> Self {
        let shared = Arc::new(Shared {
            tracks: Mutex::new(HashMap::new()),
            setup_tracks_mutex: Mutex::new(()),
            pending: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
            controls: Controls::new(),
            sample_manager,
            loop_state: Mutex::new(LoopState { stop: false }),
            cond: Condvar::new(),
            current_tick: Mutex::new(0),
        });
        Self {
            shared,
            thread: Mutex::new(None),
        }
    }

    pub fn controls(&self) -> &Controls {
        &self.shared.controls
    }

    pub fn start(&self) -> Result<()> {
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("soir-dsp-loop".into())
            .spawn(move || run_loop(shared))
            .map_err(|e| EngineError::Internal(format!("spawn dsp loop: {e}")))?;
        *self.thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        {
            let mut state = self.shared.loop_state.lock().unwrap();
            state.stop = true;
        }
        self.shared.cond.notify_all();
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn register_consumer(&self, consumer: Arc<dyn Consumer>) {
        self.shared.consumers.lock().unwrap().push(consumer);
    }

    pub fn remove_consumer(&self, consumer: &Arc<dyn Consumer>) {
        let mut consumers = self.shared.consumers.lock().unwrap();
        consumers.retain(|c| !Arc::ptr_eq(c, consumer));
    }

    /// Declaratively reconciles the track set to match `specs`, creating,
    /// fast-updating, or rebuilding tracks as needed. Returns the resulting
    /// canonical state, making repeated calls with the same input
    /// idempotent.
    pub fn setup_tracks(&self, specs: Vec<TrackSettings>) -> Result<Vec<TrackSettings>> {
        let _serialize = self.shared.setup_tracks_mutex.lock().unwrap();
        let block_size = BLOCK_SIZE;
        let sample_manager = &self.shared.sample_manager;

        let wanted_ids: std::collections::HashSet<i64> = specs.iter().map(|s| s.id).collect();
        let mut built: HashMap<i64, Track> = HashMap::new();
        {
            let mut current = self.shared.tracks.lock().unwrap();
            for spec in specs {
                if let Some(existing) = current.get_mut(&spec.id) {
                    if existing.can_fast_update(&spec) {
                        existing.fast_update(spec, &self.shared.controls);
                        continue;
                    }
                }
                // Every mono_sampler instrument currently draws from the
                // single "default" pack; per-track pack selection would
                // need a field the spec's TracksSpec doesn't carry.
                let pack = sample_manager.get_pack("default")?;
                let track = Track::new(spec.clone(), pack, &self.shared.controls, block_size)?;
                built.insert(spec.id, track);
            }

            for (id, track) in built {
                current.insert(id, track);
            }
            current.retain(|id, _| wanted_ids.contains(id));
        }

        self.get_tracks()
    }

    pub fn get_tracks(&self) -> Result<Vec<TrackSettings>> {
        let tracks = self.shared.tracks.lock().unwrap();
        Ok(tracks.values().map(|t| t.settings().clone()).collect())
    }

    /// Decodes and enqueues raw MIDI bytes. SysEx on the reserved control
    /// channel is dispatched by its instruction byte (0:unknown,
    /// 1:update_controls, 2:sampler_play, 3:sampler_stop) rather than being
    /// routed to any track; only `update_controls` is implemented today.
    pub fn push_midi_events(&self, track_id: i64, bytes: &[u8], wall_time_at: Instant) {
        let message = MidiMessage::from_bytes(bytes);
        if let MidiMessage::SysEx {
            instruction,
            payload,
        } = &message
        {
            match instruction {
                1 => self.handle_control_sysex(payload),
                0 => tracing::debug!("ignoring sysex with unknown instruction"),
                2 | 3 => tracing::debug!(instruction, "sysex instruction not yet implemented"),
                other => tracing::warn!(instruction = other, "unrecognized sysex instruction"),
            }
            return;
        }
        self.shared.pending.lock().unwrap().push(PendingEvent {
            track_id,
            message,
            wall_time_at,
        });
        self.shared.cond.notify_all();
    }

    fn handle_control_sysex(&self, payload: &[u8]) {
        let Ok(text) = std::str::from_utf8(payload) else {
            tracing::warn!("{SOIR_INTERNAL_CONTROLS} payload is not valid UTF-8");
            return;
        };
        let Ok(updates) = serde_json::from_str::<HashMap<String, f32>>(text) else {
            tracing::warn!("{SOIR_INTERNAL_CONTROLS} payload is not a name->value JSON object");
            return;
        };
        for (name, target) in updates {
            self.shared.controls.set_target(&name, target, 1.0 / SAMPLE_RATE as f32);
        }
    }

    pub fn current_tick(&self) -> SampleTick {
        *self.shared.current_tick.lock().unwrap()
    }
}

fn run_loop(shared: Arc<Shared>) {
    let block_duration = Duration::from_secs_f64(BLOCK_SIZE as f64 / SAMPLE_RATE as f64);
    let mut next_block_at = Instant::now();
    let mut midi_by_track: HashMap<i64, MidiStack> = HashMap::new();

    loop {
        {
            let state = shared.loop_state.lock().unwrap();
            let now = Instant::now();
            if now < next_block_at {
                let (guard, _timeout) = shared
                    .cond
                    .wait_timeout(state, next_block_at - now)
                    .unwrap();
                if guard.stop {
                    return;
                }
            } else if state.stop {
                return;
            }
        }

        let current_tick = *shared.current_tick.lock().unwrap();
        let now = Instant::now();
        let mut pending = shared.pending.lock().unwrap();
        for event in pending.drain(..) {
            let delay_samples = if event.wall_time_at > now {
                ((event.wall_time_at - now).as_secs_f64() * SAMPLE_RATE as f64).round() as u64
            } else {
                0
            };
            let tick =
                current_tick + delay_samples + SCHEDULING_DELAY_BLOCKS * BLOCK_SIZE as u64;
            midi_by_track
                .entry(event.track_id)
                .or_default()
                .add_events([MidiEventAt {
                    track_id: event.track_id,
                    message: event.message,
                    tick,
                }]);
        }
        drop(pending);

        let block_end = current_tick + BLOCK_SIZE as u64 - 1;
        let mut mix = AudioBuffer::zeroed_block();
        {
            let mut tracks = shared.tracks.lock().unwrap();
            for track in tracks.values_mut() {
                let stack = midi_by_track.entry(track.settings().id).or_default();
                let events = stack.drain_up_to(block_end);
                let rendered = track.render(current_tick, &events);
                mix.mix_from(rendered);
            }
        }

        {
            let consumers = shared.consumers.lock().unwrap();
            for consumer in consumers.iter() {
                consumer.push_audio_buffer(&mix);
            }
        }

        *shared.current_tick.lock().unwrap() = current_tick + BLOCK_SIZE as u64;
        next_block_at += block_duration;
        if current_tick % (SAMPLE_RATE as u64 * 4) == 0 {
            tracing::debug!(current_tick, "dsp loop heartbeat");
        }
    }
}
