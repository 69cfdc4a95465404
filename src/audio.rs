//! Audio decode and output
//!
//! Uses a channel-based architecture to handle rodio's non-Send stream: a
//! dedicated audio thread owns the playback infrastructure and reports
//! completion back over a oneshot, which is how `play` resolves exactly once
//! per clip.

use crate::error::{CueError, CueResult};
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// An immutable decoded clip. Cache entries hand out the same `Arc` for the
/// lifetime of the process, so two playbacks of one URL share this buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl DecodedClip {
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as u64 / u64::from(self.channels.max(1));
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate.max(1)))
    }
}

/// Raw bytes to a playable buffer
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> CueResult<DecodedClip>;
}

/// rodio-backed decoder
#[derive(Debug, Default)]
pub struct RodioDecoder;

impl AudioDecoder for RodioDecoder {
    fn decode(&self, bytes: &[u8]) -> CueResult<DecodedClip> {
        use rodio::Source;

        let decoder = rodio::Decoder::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| CueError::Decode(e.to_string()))?;

        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.convert_samples().collect();

        if samples.is_empty() {
            return Err(CueError::Decode("clip decoded to zero samples".to_string()));
        }

        Ok(DecodedClip {
            channels,
            sample_rate,
            samples,
        })
    }
}

/// Plays a decoded clip; resolves when playback naturally ends
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn play(&self, clip: Arc<DecodedClip>) -> CueResult<()>;
}

/// Commands sent to the audio thread
enum OutputCommand {
    PlayWait(Arc<DecodedClip>, oneshot::Sender<Result<(), String>>),
}

/// Thread-safe handle to the rodio output thread
#[derive(Clone)]
pub struct RodioOutput {
    sender: mpsc::Sender<OutputCommand>,
}

impl std::fmt::Debug for RodioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioOutput").finish()
    }
}

impl RodioOutput {
    pub fn new() -> CueResult<Self> {
        let (sender, receiver) = mpsc::channel::<OutputCommand>();

        // Spawn dedicated audio thread
        thread::spawn(move || {
            Self::audio_thread(receiver);
        });

        Ok(Self { sender })
    }

    fn audio_thread(receiver: mpsc::Receiver<OutputCommand>) {
        use rodio::buffer::SamplesBuffer;
        use rodio::OutputStream;

        // Initialize audio output on this thread
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok(s) => s,
            Err(e) => {
                warn!("🔇 Failed to initialize audio output: {}", e);
                return;
            }
        };

        // Keep stream alive
        let _stream = stream;

        info!("🔊 Audio thread started");

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                OutputCommand::PlayWait(clip, resp) => {
                    debug!(
                        "🔊 Playing clip ({:.2}s, {} Hz)",
                        clip.duration().as_secs_f64(),
                        clip.sample_rate
                    );
                    let result = match rodio::Sink::try_new(&stream_handle) {
                        Ok(sink) => {
                            let source = SamplesBuffer::new(
                                clip.channels,
                                clip.sample_rate,
                                clip.samples.clone(),
                            );
                            sink.append(source);
                            sink.sleep_until_end();
                            Ok(())
                        }
                        Err(e) => Err(e.to_string()),
                    };
                    let _ = resp.send(result);
                }
            }
        }

        info!("🔇 Audio thread stopped");
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    async fn play(&self, clip: Arc<DecodedClip>) -> CueResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OutputCommand::PlayWait(clip, tx))
            .map_err(|e| CueError::PlaybackFailed(format!("audio thread disconnected: {e}")))?;

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CueError::PlaybackFailed(e)),
            Err(_) => Err(CueError::PlaybackFailed(
                "audio thread dropped the completion signal".to_string(),
            )),
        }
    }
}
