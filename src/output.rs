//! Cross-platform audio device output: a [`Consumer`] that pushes rendered
//! blocks into a lock-free ring buffer, drained by the `cpal` callback on
//! its own OS-driven thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer as _, Producer as _, Split};
use ringbuf::HeapRb;
use std::sync::Mutex;

use crate::buffer::{AudioBuffer, CHANNELS};
use crate::engine::Consumer;
use crate::error::{EngineError, Result};

/// A few blocks of headroom between the DSP loop and the audio callback
/// absorbs scheduling jitter without growing unbounded.
const RING_CAPACITY_BLOCKS: usize = 8;

pub struct AudioOutput {
    producer: Mutex<ringbuf::HeapProd<f32>>,
    _stream: cpal::Stream,
}

impl AudioOutput {
    pub fn start(block_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::Internal("no default audio output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| EngineError::Internal(format!("query output config: {e}")))?;

        let ring = HeapRb::<f32>::new(block_size * CHANNELS * RING_CAPACITY_BLOCKS);
        let (producer, mut consumer) = ring.split();

        let stream_config: cpal::StreamConfig = config.into();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().unwrap_or(0.0);
                    }
                },
                |err| tracing::error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| EngineError::Internal(format!("build output stream: {e}")))?;
        stream
            .play()
            .map_err(|e| EngineError::Internal(format!("start output stream: {e}")))?;

        Ok(Self {
            producer: Mutex::new(producer),
            _stream: stream,
        })
    }
}

impl Consumer for AudioOutput {
    fn push_audio_buffer(&self, block: &AudioBuffer) {
        let mut producer = self.producer.lock().unwrap();
        for (&l, &r) in block.left().iter().zip(block.right().iter()) {
            let _ = producer.try_push(l);
            let _ = producer.try_push(r);
        }
    }
}
