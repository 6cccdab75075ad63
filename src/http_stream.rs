//! HTTP streaming fan-out: each connection gets an `HttpStream` consumer
//! that buffers pushed blocks under a mutex+condvar and encodes them to
//! Ogg/Vorbis on its own thread, independent of the DSP loop.

use std::io::Write;
use std::sync::{Arc, Condvar, Mutex};

use vorbis_rs::{VorbisBitrateManagementStrategy, VorbisEncoderBuilder};

use crate::buffer::{AudioBuffer, CHANNELS, SAMPLE_RATE};
use crate::engine::{Consumer, Engine};
use crate::error::{EngineError, Result};

const VORBIS_QUALITY: f32 = 1.0;

pub struct HttpStream {
    queue: Mutex<Vec<AudioBuffer>>,
    cond: Condvar,
    closed: Mutex<bool>,
}

impl HttpStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(Vec::new()),
            cond: Condvar::new(),
            closed: Mutex::new(false),
        })
    }

    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.cond.notify_all();
    }

    /// Drives the encode loop against `sink` until the stream is closed or
    /// the sink returns an error (client disconnect). Runs on the HTTP
    /// handler's own thread.
    pub fn encode(self: &Arc<Self>, mut sink: impl Write) -> Result<()> {
        let mut encoder = VorbisEncoderBuilder::new(
            std::num::NonZeroU32::new(SAMPLE_RATE).unwrap(),
            std::num::NonZeroU8::new(CHANNELS as u8).unwrap(),
            &mut sink,
        )
        .map_err(|e| EngineError::Internal(format!("vorbis encoder init: {e}")))?
        .bitrate_management_strategy(VorbisBitrateManagementStrategy::QualityVbr {
            target_quality: VORBIS_QUALITY,
        })
        .build()
        .map_err(|e| EngineError::Internal(format!("vorbis encoder build: {e}")))?;

        loop {
            let mut guard = self.queue.lock().unwrap();
            while guard.is_empty() && !*self.closed.lock().unwrap() {
                guard = self.cond.wait(guard).unwrap();
            }
            let pending: Vec<AudioBuffer> = guard.drain(..).collect();
            let should_stop = *self.closed.lock().unwrap() && pending.is_empty();
            drop(guard);

            for block in &pending {
                let channels = [block.left().to_vec(), block.right().to_vec()];
                encoder
                    .encode_audio_block(&channels)
                    .map_err(|_| EngineError::Cancelled)?;
            }

            if should_stop {
                break;
            }
        }

        encoder
            .finish()
            .map_err(|e| EngineError::Internal(format!("vorbis encoder finish: {e}")))?;
        Ok(())
    }
}

impl Consumer for HttpStream {
    fn push_audio_buffer(&self, block: &AudioBuffer) {
        self.queue.lock().unwrap().push(block.clone());
        self.cond.notify_one();
    }
}

/// Binds a `tiny_http` server and drives one `HttpStream` per connection,
/// each on its own thread, until `stop` is called.
pub struct HttpServer {
    server: Arc<tiny_http::Server>,
    accept_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    stopping: Arc<std::sync::atomic::AtomicBool>,
}

impl HttpServer {
    pub fn start(host: &str, port: u16, engine: Arc<Engine>) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let server = Arc::new(
            tiny_http::Server::http(&addr)
                .map_err(|e| EngineError::Internal(format!("http bind {addr}: {e}")))?,
        );
        let stopping = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let accept_server = server.clone();
        let accept_stopping = stopping.clone();
        let accept_thread = std::thread::Builder::new()
            .name("soir-http-accept".into())
            .spawn(move || {
                for request in accept_server.incoming_requests() {
                    if accept_stopping.load(std::sync::atomic::Ordering::Relaxed) {
                        break;
                    }
                    let engine = engine.clone();
                    std::thread::spawn(move || serve_stream(request, engine));
                }
            })
            .expect("spawn http accept thread");

        Ok(Self {
            server,
            accept_thread: Mutex::new(Some(accept_thread)),
            stopping,
        })
    }

    pub fn stop(&self) {
        self.stopping
            .store(true, std::sync::atomic::Ordering::Relaxed);
        self.server.unblock();
        if let Some(handle) = self.accept_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn serve_stream(request: tiny_http::Request, engine: Arc<Engine>) {
    let stream = HttpStream::new();
    engine.register_consumer(stream.clone() as Arc<dyn Consumer>);

    let mut writer = request.into_writer();
    let _ = write!(
        writer,
        "HTTP/1.1 200 OK\r\nContent-Type: audio/ogg\r\nTransfer-Encoding: identity\r\nConnection: close\r\n\r\n"
    );

    let _ = stream.encode(writer);
    engine.remove_consumer(&(stream as Arc<dyn Consumer>));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_close_drains_queue_without_blocking_forever() {
        let stream = HttpStream::new();
        stream.push_audio_buffer(&AudioBuffer::zeroed_block());
        stream.close();
        let mut sink: Vec<u8> = Vec::new();
        // We don't assert on encoded bytes (that would require a real
        // Vorbis decoder), only that encode() terminates once closed.
        let _ = stream.encode(&mut sink);
    }
}
