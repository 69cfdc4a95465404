//! Vosk recognition backend
//!
//! Runs local offline recognition on a dedicated capture thread: a cpal
//! input stream feeds 16 kHz mono chunks to a Vosk recognizer, and results
//! come back as [`EngineEvent`]s on the shared channel.

use super::{EngineError, EngineEvent, EngineSettings, RecognitionEngine};
use crate::config::Config;
use crate::error::CueResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use vosk::{DecodingState, Model, Recognizer};

const SAMPLE_RATE: u32 = 16000;
const CHUNK_SIZE: usize = 1024;

/// Vosk-based recognition engine
pub struct VoskEngine {
    model: Arc<Model>,
    settings: EngineSettings,
    device_index: Option<usize>,
    events: UnboundedSender<EngineEvent>,
    running: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
}

impl VoskEngine {
    /// Load the model and prepare an engine; capture starts on `start()`.
    pub fn new(config: &Config, events: UnboundedSender<EngineEvent>) -> CueResult<Self> {
        let model_path = std::path::PathBuf::from(&config.vosk_model_path);

        if !model_path.exists() {
            return Err(anyhow::anyhow!(
                "Vosk model not found at {}",
                model_path.display()
            )
            .into());
        }

        info!("Loading Vosk model from: {}", model_path.display());

        let model_str = model_path.to_str().ok_or_else(|| {
            anyhow::anyhow!(
                "Vosk model path is not valid UTF-8: {}",
                model_path.display()
            )
        })?;

        let model = Model::new(model_str).context("Failed to load Vosk model")?;

        let settings = config.engine_settings();
        debug!(
            "Engine settings: continuous={} interim={} locale={} (language comes from the model)",
            settings.continuous, settings.interim_results, settings.locale
        );

        Ok(Self {
            model: Arc::new(model),
            settings,
            device_index: config.device_index,
            events,
            running: Arc::new(AtomicBool::new(false)),
            halt: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl RecognitionEngine for VoskEngine {
    async fn start(&self) -> CueResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("engine already running, start ignored");
            return Ok(());
        }
        self.halt.store(false, Ordering::SeqCst);

        let model = Arc::clone(&self.model);
        let settings = self.settings.clone();
        let device_index = self.device_index;
        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let halt = Arc::clone(&self.halt);

        // cpal streams are not Send, so the whole capture session lives on
        // its own thread and talks back through the event channel.
        std::thread::spawn(move || {
            if let Err(e) = capture_session(&model, &settings, device_index, &events, &halt) {
                warn!("capture session failed: {e:#}");
                let _ = events.send(EngineEvent::Error(EngineError::Other(e.to_string())));
            }
            let _ = events.send(EngineEvent::Ended);
            running.store(false, Ordering::SeqCst);
        });

        Ok(())
    }

    async fn stop(&self) -> CueResult<()> {
        self.halt.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Capture loop: owns the input stream and the recognizer until halted.
fn capture_session(
    model: &Model,
    settings: &EngineSettings,
    device_index: Option<usize>,
    events: &UnboundedSender<EngineEvent>,
    halt: &Arc<AtomicBool>,
) -> Result<()> {
    let host = cpal::default_host();

    let device = if let Some(idx) = device_index {
        host.input_devices()?
            .nth(idx)
            .context("Device index out of range")?
    } else {
        host.default_input_device()
            .context("No default input device")?
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    debug!("Using audio device: {}", device_name);

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Fixed(CHUNK_SIZE as u32),
    };

    let (tx, rx) = std::sync::mpsc::channel::<Vec<i16>>();

    let err_events = events.clone();
    let err_halt = Arc::clone(halt);
    let stream = device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            let _ = tx.send(data.to_vec());
        },
        move |err| {
            warn!("Audio stream error: {}", err);
            let _ = err_events.send(EngineEvent::Error(EngineError::CaptureFailed));
            err_halt.store(true, Ordering::SeqCst);
        },
        None,
    )?;

    stream.play()?;

    let mut recognizer = Recognizer::new(model, SAMPLE_RATE as f32)
        .context("Failed to create Vosk recognizer")?;

    let _ = events.send(EngineEvent::Started);
    let mut last_partial = String::new();

    while !halt.load(Ordering::SeqCst) {
        let samples = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(samples) => samples,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match recognizer.accept_waveform(&samples) {
            DecodingState::Finalized => {
                if let Some(single) = recognizer.final_result().single() {
                    if let Some(text) = final_text(single.text) {
                        last_partial.clear();
                        let _ = events.send(EngineEvent::Result {
                            text,
                            is_final: true,
                        });
                        if !settings.continuous {
                            break;
                        }
                    }
                }
            }
            DecodingState::Running => {
                if settings.interim_results {
                    let partial = recognizer.partial_result().partial.to_string();
                    if !partial.is_empty() && partial != last_partial {
                        last_partial.clone_from(&partial);
                        let _ = events.send(EngineEvent::Result {
                            text: partial,
                            is_final: false,
                        });
                    }
                }
            }
            DecodingState::Failed => {
                debug!("Decoding failed for this chunk");
            }
        }
    }

    Ok(())
}

/// Extract text from a Vosk result, filtering empty results
fn final_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
