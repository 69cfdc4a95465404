//! Voice trigger entry points
//!
//! Wires the session, queue, dispatcher and playback together and routes
//! engine events: interim results become status flashes, finals go to the
//! queue, lifecycle events drive the session state machine.

use crate::audio::{AudioDecoder, AudioOutput, RodioDecoder, RodioOutput};
use crate::capture::{CaptureProbe, CpalProbe};
use crate::config::Config;
use crate::dispatch::CommandDispatcher;
use crate::engine::{self, EngineEvent};
use crate::error::CueResult;
use crate::matcher::{HttpMatcher, Matcher};
use crate::notify::{LogNotifier, NoticeKind, Notifier, NOTICE_FLASH_MS};
use crate::playback::{AssetSource, HttpAssetSource, PlaybackCoordinator};
use crate::queue::TranscriptQueue;
use crate::session::{SessionController, SessionState};
use crate::waveform::{LogWaveform, WaveformRenderer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The assembled voice-command trigger
pub struct VoiceTrigger {
    session: Arc<SessionController>,
    queue: Arc<TranscriptQueue>,
    playback: Arc<PlaybackCoordinator>,
}

impl VoiceTrigger {
    /// Assemble a trigger from its parts and start routing engine events.
    pub fn new(
        session: Arc<SessionController>,
        queue: Arc<TranscriptQueue>,
        playback: Arc<PlaybackCoordinator>,
        notifier: Arc<dyn Notifier>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> Arc<Self> {
        {
            let session = Arc::clone(&session);
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        EngineEvent::Result { text, is_final: false } => {
                            session.note_activity();
                            let text = text.trim();
                            if !text.is_empty() {
                                notifier.notify(text, NoticeKind::Info, NOTICE_FLASH_MS);
                            }
                        }
                        EngineEvent::Result { text, is_final: true } => {
                            session.note_activity();
                            match session.state() {
                                SessionState::Idle | SessionState::Error => {
                                    debug!("discarding final from a stopped session: '{}'", text);
                                }
                                _ => {
                                    queue.enqueue(&text);
                                }
                            }
                        }
                        other => session.handle_event(other).await,
                    }
                }
                debug!("engine event channel closed");
            });
        }

        Arc::new(Self {
            session,
            queue,
            playback,
        })
    }

    /// Build the default stack from configuration: vosk engine, cpal probe,
    /// HTTP matcher, rodio output, logging waveform and notifier.
    pub fn from_config(config: &Config) -> CueResult<Arc<Self>> {
        info!("🛠️ Building voice trigger (engine: {})", config.engine);

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let engine = engine::create_engine(config, events_tx)?;
        let probe: Arc<dyn CaptureProbe> = Arc::new(CpalProbe::new(config.device_index));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let matcher: Arc<dyn Matcher> = Arc::new(HttpMatcher::new(&config.matcher_url));

        let playback = Arc::new(PlaybackCoordinator::new(
            Arc::new(HttpAssetSource::new()) as Arc<dyn AssetSource>,
            Arc::new(RodioDecoder) as Arc<dyn AudioDecoder>,
            Arc::new(RodioOutput::new()?) as Arc<dyn AudioOutput>,
            Arc::new(LogWaveform) as Arc<dyn WaveformRenderer>,
        ));

        let session = Arc::new(SessionController::new(
            engine,
            probe,
            Arc::clone(&notifier),
            config.session_config(),
        ));

        let dispatcher = Arc::new(CommandDispatcher::new(
            matcher,
            Arc::clone(&playback),
            Arc::clone(&session),
            Arc::clone(&notifier),
            config.asset_base_url(),
        ));

        let queue = Arc::new(TranscriptQueue::new(dispatcher, config.min_command_len));

        Ok(Self::new(session, queue, playback, notifier, events_rx))
    }

    /// Begin a listening session
    pub async fn start_listening(&self) -> CueResult<()> {
        self.queue.clear();
        self.session.start().await
    }

    /// Stop listening and drop any queued utterances. An in-flight playback
    /// is not aborted, but nothing resumes afterwards.
    pub async fn stop_listening(&self) {
        self.queue.clear();
        self.session.stop().await;
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_listening()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Direct access to clip playback, for callers that want to audition a
    /// clip outside the dispatch path
    pub fn playback(&self) -> &Arc<PlaybackCoordinator> {
        &self.playback
    }
}
