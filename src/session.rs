//! Recognition session controller
//!
//! Owns the engine handle and keeps one listening session alive: explicit
//! tagged states, bounded delayed auto-restart, a no-activity watchdog, and
//! the suspend/resume dance around command playback so the assistant never
//! hears its own clips.

use crate::capture::CaptureProbe;
use crate::classify::{classify, ErrorSeverity};
use crate::engine::{EngineError, EngineEvent, RecognitionEngine};
use crate::error::CueResult;
use crate::notify::{NoticeKind, Notifier, NOTICE_BRIEF_MS, NOTICE_DEFAULT_MS};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not listening; `start()` is the only way out
    Idle,
    /// Engine start requested, waiting for its `Started` event
    Starting,
    /// Receiving engine results
    Listening,
    /// Halted around an in-flight command; `resume()` decides what's next
    Suspended,
    /// Dead after a fatal error; requires an explicit `start()`
    Error,
}

/// Restart/watchdog tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Consecutive engine deaths tolerated before giving up
    pub max_restart_attempts: u32,
    /// Pause before each automatic restart
    pub restart_delay: Duration,
    /// Recycle the engine when no result arrives for this long while
    /// listening; zero disables the watchdog
    pub watchdog_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_restart_attempts: 3,
            restart_delay: Duration::from_millis(10),
            watchdog_window: Duration::from_secs(30),
        }
    }
}

/// A single scheduled task with cancellation. Scheduling again replaces the
/// pending task, so `stop()` deterministically kills any pending restart.
struct TaskTimer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskTimer {
    fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.handle.lock().unwrap();
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    fn cancel(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    restart_attempts: u32,
    /// Whether the state right before `suspend()` was `Listening`
    resume_after_suspend: bool,
}

/// Drives the recognition engine lifecycle
pub struct SessionController {
    engine: Arc<dyn RecognitionEngine>,
    probe: Arc<dyn CaptureProbe>,
    notifier: Arc<dyn Notifier>,
    cfg: SessionConfig,
    inner: Arc<Mutex<SessionInner>>,
    restart: TaskTimer,
    watchdog: TaskTimer,
}

impl SessionController {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        probe: Arc<dyn CaptureProbe>,
        notifier: Arc<dyn Notifier>,
        cfg: SessionConfig,
    ) -> Self {
        Self {
            engine,
            probe,
            notifier,
            cfg,
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                restart_attempts: 0,
                resume_after_suspend: false,
            })),
            restart: TaskTimer::new(),
            watchdog: TaskTimer::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// Begin listening. No-op while a session is already active; a probe
    /// failure is fatal and leaves the session in `Error`.
    pub async fn start(&self) -> CueResult<()> {
        {
            let guard = self.inner.lock().unwrap();
            match guard.state {
                SessionState::Starting | SessionState::Listening | SessionState::Suspended => {
                    debug!("start requested while already active, ignoring");
                    return Ok(());
                }
                SessionState::Idle | SessionState::Error => {}
            }
        }

        if let Err(e) = self.probe.acquire().await {
            self.inner.lock().unwrap().state = SessionState::Error;
            self.notifier.notify(
                &format!("microphone unavailable: {e}"),
                NoticeKind::Error,
                NOTICE_DEFAULT_MS,
            );
            return Err(e);
        }

        {
            let mut guard = self.inner.lock().unwrap();
            guard.state = SessionState::Starting;
            guard.restart_attempts = 0;
            guard.resume_after_suspend = false;
        }

        if let Err(e) = self.engine.start().await {
            self.inner.lock().unwrap().state = SessionState::Error;
            self.notifier.notify(
                &format!("voice recognition failed to start: {e}"),
                NoticeKind::Error,
                NOTICE_DEFAULT_MS,
            );
            return Err(e);
        }

        Ok(())
    }

    /// Stop listening unconditionally. Idempotent; cancels any pending
    /// restart so nothing comes back to life later.
    pub async fn stop(&self) {
        self.restart.cancel();
        self.watchdog.cancel();

        {
            let mut guard = self.inner.lock().unwrap();
            guard.state = SessionState::Idle;
            guard.restart_attempts = 0;
            guard.resume_after_suspend = false;
        }

        if let Err(e) = self.engine.stop().await {
            debug!("engine stop: {e}");
        }
    }

    /// Halt listening around command processing so playback is not captured
    /// as new input. Remembers whether there is anything to resume.
    pub async fn suspend(&self) {
        let was_listening = {
            let mut guard = self.inner.lock().unwrap();
            if guard.state == SessionState::Listening {
                guard.state = SessionState::Suspended;
                guard.resume_after_suspend = true;
                true
            } else {
                guard.resume_after_suspend = false;
                false
            }
        };

        if was_listening {
            self.watchdog.cancel();
            if let Err(e) = self.engine.stop().await {
                debug!("engine stop for suspend: {e}");
            }
        }
    }

    /// Undo `suspend()`. Only re-enters listening if the session was
    /// listening immediately before the suspension; a session stopped in
    /// the meantime stays stopped.
    pub async fn resume(&self) {
        let restart = {
            let mut guard = self.inner.lock().unwrap();
            if guard.state != SessionState::Suspended {
                false
            } else if guard.resume_after_suspend {
                guard.state = SessionState::Starting;
                guard.resume_after_suspend = false;
                true
            } else {
                guard.state = SessionState::Idle;
                false
            }
        };

        if restart {
            if let Err(e) = self.engine.start().await {
                warn!("engine restart after command failed: {e}");
                self.inner.lock().unwrap().state = SessionState::Idle;
            }
        }
    }

    /// React to an engine lifecycle notification
    pub async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Started => self.on_started(),
            EngineEvent::Ended => self.on_ended().await,
            EngineEvent::Error(code) => self.on_error(code),
            EngineEvent::Result { .. } => {
                // Results are routed by the owner; only liveness matters here
                self.note_activity();
            }
        }
    }

    /// Re-arm the watchdog; called for every result the engine produces
    pub fn note_activity(&self) {
        if self.state() == SessionState::Listening {
            self.arm_watchdog();
        }
    }

    fn on_started(&self) {
        let became_listening = {
            let mut guard = self.inner.lock().unwrap();
            if guard.state == SessionState::Starting {
                guard.state = SessionState::Listening;
                guard.restart_attempts = 0;
                true
            } else {
                false
            }
        };

        if became_listening {
            self.notifier
                .notify("Listening...", NoticeKind::Info, NOTICE_BRIEF_MS);
            self.arm_watchdog();
        } else {
            debug!("engine started in state {:?}, ignoring", self.state());
        }
    }

    async fn on_ended(&self) {
        enum Next {
            Ignore,
            Restart,
            GiveUp,
        }

        let next = {
            let mut guard = self.inner.lock().unwrap();
            match guard.state {
                // An engine that dies while Starting never reached
                // Listening, which is exactly what the cap must bound.
                SessionState::Listening | SessionState::Starting => {
                    guard.restart_attempts += 1;
                    if guard.restart_attempts >= self.cfg.max_restart_attempts {
                        guard.state = SessionState::Idle;
                        Next::GiveUp
                    } else {
                        guard.state = SessionState::Starting;
                        Next::Restart
                    }
                }
                SessionState::Suspended | SessionState::Idle | SessionState::Error => Next::Ignore,
            }
        };

        match next {
            Next::Ignore => debug!("engine ended in state {:?}, ignoring", self.state()),
            Next::GiveUp => {
                self.watchdog.cancel();
                self.notifier.notify(
                    "voice recognition keeps stopping; start listening again manually",
                    NoticeKind::Warning,
                    NOTICE_DEFAULT_MS,
                );
            }
            Next::Restart => {
                self.watchdog.cancel();
                self.schedule_restart();
            }
        }
    }

    fn on_error(&self, code: EngineError) {
        match classify(&code) {
            ErrorSeverity::Transient => {
                debug!("transient engine error: {code}");
            }
            ErrorSeverity::Recoverable => {
                // The engine's trailing `Ended` drives the restart; counting
                // it here as well would burn the cap twice per failure.
                self.notifier
                    .notify(&code.to_string(), NoticeKind::Warning, NOTICE_DEFAULT_MS);
            }
            ErrorSeverity::Fatal => {
                self.restart.cancel();
                self.watchdog.cancel();
                {
                    let mut guard = self.inner.lock().unwrap();
                    guard.state = SessionState::Error;
                    guard.restart_attempts = self.cfg.max_restart_attempts;
                    guard.resume_after_suspend = false;
                }
                self.notifier
                    .notify(&code.to_string(), NoticeKind::Error, NOTICE_DEFAULT_MS);
            }
        }
    }

    fn schedule_restart(&self) {
        let engine = Arc::clone(&self.engine);
        let inner = Arc::clone(&self.inner);
        let notifier = Arc::clone(&self.notifier);

        self.restart.schedule(self.cfg.restart_delay, async move {
            let still_starting = { inner.lock().unwrap().state == SessionState::Starting };
            if !still_starting {
                return;
            }
            if let Err(e) = engine.start().await {
                warn!("scheduled restart failed: {e}");
                inner.lock().unwrap().state = SessionState::Idle;
                notifier.notify(
                    "voice recognition could not restart",
                    NoticeKind::Error,
                    NOTICE_DEFAULT_MS,
                );
            }
        });
    }

    fn arm_watchdog(&self) {
        if self.cfg.watchdog_window.is_zero() {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let inner = Arc::clone(&self.inner);

        self.watchdog.schedule(self.cfg.watchdog_window, async move {
            let listening = { inner.lock().unwrap().state == SessionState::Listening };
            if listening {
                debug!("no recognition activity within the watchdog window, recycling engine");
                // The Ended this provokes rides the ordinary restart path
                if let Err(e) = engine.stop().await {
                    debug!("watchdog engine stop: {e}");
                }
            }
        });
    }
}
