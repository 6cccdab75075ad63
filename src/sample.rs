//! Immutable sample storage, pack manifests, and the pack registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::buffer::SAMPLE_RATE;
use crate::error::{EngineError, Result};

#[derive(Debug)]
pub struct Sample {
    pub name: String,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl Sample {
    pub fn duration_samples(&self) -> usize {
        self.left.len()
    }

    pub fn duration_ms(samples: usize) -> f64 {
        samples as f64 / SAMPLE_RATE as f64 * 1000.0
    }

    pub fn duration_ms_self(&self) -> f64 {
        Self::duration_ms(self.duration_samples())
    }

    /// Loads a WAV file, requiring the engine sample rate. Mono files are
    /// mirrored to stereo; stereo files are passed through.
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_rate != SAMPLE_RATE {
            return Err(EngineError::InvalidArgument(format!(
                "sample `{}` has sample rate {} (expected {})",
                name, spec.sample_rate, SAMPLE_RATE
            )));
        }
        let channels = spec.channels as usize;
        if channels != 1 && channels != 2 {
            return Err(EngineError::InvalidArgument(format!(
                "sample `{name}` has {channels} channels (expected mono or stereo)"
            )));
        }

        let floats: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let (left, right) = if channels == 1 {
            (floats.clone(), floats)
        } else {
            let mut left = Vec::with_capacity(floats.len() / 2);
            let mut right = Vec::with_capacity(floats.len() / 2);
            for chunk in floats.chunks_exact(2) {
                left.push(chunk[0]);
                right.push(chunk[1]);
            }
            (left, right)
        };

        Ok(Self {
            name: name.to_string(),
            left,
            right,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    midi_note: u8,
    path: String,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    samples: Vec<ManifestEntry>,
}

pub struct SamplePack {
    pub name: String,
    by_name: HashMap<String, Arc<Sample>>,
    by_midi_note: HashMap<u8, Arc<Sample>>,
}

impl SamplePack {
    /// Loads every sample named in `manifest_path`'s YAML manifest. Any
    /// failure (missing file, wrong sample rate, bad channel count) fails
    /// the entire pack.
    pub fn load(pack_name: &str, pack_dir: &Path, manifest_path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(manifest_path)?;
        let manifest: Manifest = serde_yaml::from_str(&text)?;

        let mut by_name = HashMap::new();
        let mut by_midi_note = HashMap::new();
        for entry in manifest.samples {
            let full_path: PathBuf = pack_dir.join(&entry.path);
            let sample = Arc::new(Sample::load(&full_path, &entry.name)?);
            by_midi_note.insert(entry.midi_note, sample.clone());
            by_name.insert(entry.name, sample);
        }

        Ok(Self {
            name: pack_name.to_string(),
            by_name,
            by_midi_note,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        name: &str,
        by_name: HashMap<String, Arc<Sample>>,
        by_midi_note: HashMap<u8, Arc<Sample>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            by_name,
            by_midi_note,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Sample>> {
        self.by_name.get(name)
    }

    pub fn get_by_midi_note(&self, note: u8) -> Option<&Arc<Sample>> {
        self.by_midi_note.get(&note)
    }

    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|s| s.as_str())
    }
}

/// Registry of loaded packs. Scans `sample_directory` once at startup for
/// `*.pack.yaml` manifests; packs are never evicted after loading.
pub struct SampleManager {
    packs: HashMap<String, Arc<SamplePack>>,
}

impl SampleManager {
    pub fn init(sample_directory: &Path) -> Result<Self> {
        let mut packs = HashMap::new();
        let entries = std::fs::read_dir(sample_directory)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.ends_with(".pack.yaml") {
                continue;
            }
            let pack_name = file_name.trim_end_matches(".pack.yaml").to_string();
            let pack_dir = path.parent().unwrap_or(sample_directory);
            let pack = SamplePack::load(&pack_name, pack_dir, &path)?;
            packs.insert(pack_name, Arc::new(pack));
        }
        Ok(Self { packs })
    }

    pub fn get_pack(&self, name: &str) -> Result<Arc<SamplePack>> {
        self.packs
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("sample pack `{name}`")))
    }
}
