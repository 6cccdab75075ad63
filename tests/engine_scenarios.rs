//! End-to-end scenarios against the public `Engine` API.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Instant;

use soir_engine::engine::Engine;
use soir_engine::fx::FxSettings;
use soir_engine::midi::{CC_MUTE, CC_VOLUME};
use soir_engine::sample::SampleManager;
use soir_engine::track::{InstrumentKind, TrackSettings};

fn sample_dir_with_default_pack() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_path = dir.path().join("kick.wav");
    let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
    for _ in 0..48_000 {
        writer.write_sample(20_000i16).unwrap();
    }
    writer.finalize().unwrap();

    let manifest_path = dir.path().join("default.pack.yaml");
    let mut f = std::fs::File::create(&manifest_path).unwrap();
    writeln!(
        f,
        "samples:\n  - name: kick\n    midi_note: 60\n    path: kick.wav\n"
    )
    .unwrap();

    dir
}

fn mono_sampler_track(id: i64, volume: u8, pan: u8, muted: bool, fxs: Vec<FxSettings>) -> TrackSettings {
    TrackSettings {
        id,
        instrument: InstrumentKind::MonoSampler,
        channel: 0,
        muted,
        volume,
        pan,
        fxs,
    }
}

#[test]
fn empty_engine_runs_without_error() {
    let dir = sample_dir_with_default_pack();
    let manager = SampleManager::init(dir.path()).unwrap();
    let engine = Engine::new(manager);
    engine.start().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(60));
    assert!(engine.current_tick() > 0);
    engine.stop();
}

#[test]
fn setup_tracks_reconcile_is_idempotent() {
    let dir = sample_dir_with_default_pack();
    let manager = SampleManager::init(dir.path()).unwrap();
    let engine = Engine::new(manager);

    let spec = vec![mono_sampler_track(1, 127, 64, false, vec![])];
    let first = engine.setup_tracks(spec.clone()).unwrap();
    let second = engine.setup_tracks(spec).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].volume, second[0].volume);
}

#[test]
fn setup_tracks_removes_dropped_tracks() {
    let dir = sample_dir_with_default_pack();
    let manager = SampleManager::init(dir.path()).unwrap();
    let engine = Engine::new(manager);

    engine
        .setup_tracks(vec![
            mono_sampler_track(1, 127, 64, false, vec![]),
            mono_sampler_track(2, 127, 64, false, vec![]),
        ])
        .unwrap();
    let after = engine
        .setup_tracks(vec![mono_sampler_track(1, 127, 64, false, vec![])])
        .unwrap();

    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, 1);
}

#[test]
fn push_midi_events_does_not_block_caller() {
    let dir = sample_dir_with_default_pack();
    let manager = SampleManager::init(dir.path()).unwrap();
    let engine = Arc::new(Engine::new(manager));
    engine
        .setup_tracks(vec![mono_sampler_track(1, 127, 64, false, vec![])])
        .unwrap();
    engine.start().unwrap();

    let start = Instant::now();
    engine.push_midi_events(1, &[0x90, 60, 127], Instant::now());
    engine.push_midi_events(1, &[0xB0, CC_VOLUME, 64], Instant::now());
    engine.push_midi_events(1, &[0xB0, CC_MUTE, 127], Instant::now());
    assert!(start.elapsed() < std::time::Duration::from_millis(50));

    engine.stop();
}

#[test]
fn control_sysex_updates_registry_without_touching_tracks() {
    let dir = sample_dir_with_default_pack();
    let manager = SampleManager::init(dir.path()).unwrap();
    let engine = Engine::new(manager);
    let mut bytes = vec![0xF0u8, 1];
    bytes.extend_from_slice(br#"{"reverb_mix":0.75}"#);
    engine.push_midi_events(0, &bytes, Instant::now());
    assert!(engine.controls().has("reverb_mix"));
    assert!(engine.get_tracks().unwrap().is_empty());
}
