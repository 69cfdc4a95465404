//! Mock collaborators for end-to-end trigger tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use voicecue::audio::{AudioDecoder, AudioOutput, DecodedClip};
use voicecue::capture::CaptureProbe;
use voicecue::dispatch::{CommandDispatcher, Dispatch};
use voicecue::engine::{EngineEvent, RecognitionEngine};
use voicecue::error::{CueError, CueResult};
use voicecue::matcher::{CommandMatch, Matcher};
use voicecue::notify::{NoticeKind, Notifier};
use voicecue::playback::{AssetSource, PlaybackCoordinator};
use voicecue::queue::TranscriptQueue;
use voicecue::session::{SessionConfig, SessionController};
use voicecue::trigger::VoiceTrigger;
use voicecue::waveform::WaveformRenderer;

/// Shared ordered record of the observable side effects
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn log_event(log: &EventLog, entry: &str) {
    log.lock().unwrap().push(entry.to_string());
}

/// Engine the tests drive by hand. `start()` confirms with `Started` (or
/// dies with `Ended` when `fail_start` is set), `stop()` confirms with
/// `Ended`, matching the real engine contract.
pub struct ScriptedEngine {
    events: mpsc::UnboundedSender<EngineEvent>,
    log: EventLog,
    pub fail_start: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>, log: EventLog) -> Self {
        Self {
            events,
            log,
            fail_start: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Emit a finalized recognition result
    pub fn say(&self, text: &str) {
        let _ = self.events.send(EngineEvent::Result {
            text: text.to_string(),
            is_final: true,
        });
    }

    /// Emit an interim recognition result
    pub fn interim(&self, text: &str) {
        let _ = self.events.send(EngineEvent::Result {
            text: text.to_string(),
            is_final: false,
        });
    }

    /// Emit a bare session-ended notification
    pub fn end(&self) {
        let _ = self.events.send(EngineEvent::Ended);
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    async fn start(&self) -> CueResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        log_event(&self.log, "engine-start");
        if self.fail_start.load(Ordering::SeqCst) {
            let _ = self.events.send(EngineEvent::Ended);
        } else {
            let _ = self.events.send(EngineEvent::Started);
        }
        Ok(())
    }

    async fn stop(&self) -> CueResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        log_event(&self.log, "engine-stop");
        let _ = self.events.send(EngineEvent::Ended);
        Ok(())
    }
}

pub struct AlwaysOkProbe;

#[async_trait]
impl CaptureProbe for AlwaysOkProbe {
    async fn acquire(&self) -> CueResult<()> {
        Ok(())
    }
}

/// Matcher backed by an in-memory command table
pub struct TableMatcher {
    table: HashMap<String, String>,
    pub lookups: AtomicUsize,
    pub fail: AtomicBool,
}

impl TableMatcher {
    pub fn new(table: &[(&str, &str)]) -> Self {
        Self {
            table: table
                .iter()
                .map(|(text, audio)| (text.to_string(), audio.to_string()))
                .collect(),
            lookups: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Matcher for TableMatcher {
    async fn lookup(&self, text: &str) -> CueResult<CommandMatch> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CueError::Matcher("backend unreachable".to_string()));
        }
        match self.table.get(text) {
            Some(audio) => Ok(CommandMatch {
                matched: true,
                command: Some(text.to_string()),
                audio: Some(audio.clone()),
            }),
            None => Ok(CommandMatch {
                matched: false,
                command: None,
                audio: None,
            }),
        }
    }
}

pub struct StaticSource;

#[async_trait]
impl AssetSource for StaticSource {
    async fn fetch(&self, _url: &str) -> CueResult<Vec<u8>> {
        Ok(vec![0u8; 8])
    }
}

#[derive(Default)]
pub struct CountingDecoder {
    pub decodes: AtomicUsize,
}

impl AudioDecoder for CountingDecoder {
    fn decode(&self, _bytes: &[u8]) -> CueResult<DecodedClip> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        Ok(DecodedClip {
            channels: 1,
            sample_rate: 16000,
            samples: vec![0.0; 160],
        })
    }
}

/// Output that records play boundaries and can be told to fail
pub struct RecordingOutput {
    log: EventLog,
    delay: Duration,
    pub fail: AtomicBool,
    active: AtomicUsize,
    pub overlapped: AtomicUsize,
}

impl RecordingOutput {
    pub fn new(log: EventLog, delay: Duration) -> Self {
        Self {
            log,
            delay,
            fail: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            overlapped: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&self, _clip: Arc<DecodedClip>) -> CueResult<()> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.fetch_add(1, Ordering::SeqCst);
        }
        log_event(&self.log, "play-start");
        tokio::time::sleep(self.delay).await;
        let result = if self.fail.load(Ordering::SeqCst) {
            log_event(&self.log, "play-fail");
            Err(CueError::PlaybackFailed("sink exploded".to_string()))
        } else {
            log_event(&self.log, "play-finish");
            Ok(())
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct NullWaveform;

impl WaveformRenderer for NullWaveform {
    fn load(&self, _clip: &DecodedClip) {}
    fn play(&self) {}
    fn pause(&self) {}
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, NoticeKind)>>,
}

impl RecordingNotifier {
    pub fn contains(&self, needle: &str, kind: NoticeKind) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|(message, k)| *k == kind && message.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind, _duration_ms: u64) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), kind));
    }
}

/// Fully assembled trigger over mock collaborators
pub struct Harness {
    pub trigger: Arc<VoiceTrigger>,
    pub engine: Arc<ScriptedEngine>,
    pub matcher: Arc<TableMatcher>,
    pub decoder: Arc<CountingDecoder>,
    pub output: Arc<RecordingOutput>,
    pub notifier: Arc<RecordingNotifier>,
    pub log: EventLog,
}

impl Harness {
    pub fn new(table: &[(&str, &str)], output_delay: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));

        let engine = Arc::new(ScriptedEngine::new(events_tx, Arc::clone(&log)));
        let matcher = Arc::new(TableMatcher::new(table));
        let decoder = Arc::new(CountingDecoder::default());
        let output = Arc::new(RecordingOutput::new(Arc::clone(&log), output_delay));
        let notifier = Arc::new(RecordingNotifier::default());

        let playback = Arc::new(PlaybackCoordinator::new(
            Arc::new(StaticSource) as Arc<dyn AssetSource>,
            Arc::clone(&decoder) as Arc<dyn AudioDecoder>,
            Arc::clone(&output) as Arc<dyn AudioOutput>,
            Arc::new(NullWaveform) as Arc<dyn WaveformRenderer>,
        ));

        let session = Arc::new(SessionController::new(
            Arc::clone(&engine) as Arc<dyn RecognitionEngine>,
            Arc::new(AlwaysOkProbe),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            SessionConfig {
                max_restart_attempts: 3,
                restart_delay: Duration::ZERO,
                watchdog_window: Duration::ZERO,
            },
        ));

        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&matcher) as Arc<dyn Matcher>,
            Arc::clone(&playback),
            Arc::clone(&session),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            "http://test.local/uploads".to_string(),
        ));

        let queue = Arc::new(TranscriptQueue::new(
            dispatcher as Arc<dyn Dispatch>,
            2,
        ));

        let trigger = VoiceTrigger::new(
            session,
            queue,
            playback,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            events_rx,
        );

        Self {
            trigger,
            engine,
            matcher,
            decoder,
            output,
            notifier,
            log,
        }
    }

    /// Snapshot of the event log
    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// Poll until `cond` holds or the timeout runs out
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
