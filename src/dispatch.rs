//! Command dispatch
//!
//! Takes one utterance at a time from the queue, asks the matcher about it,
//! and on a hit plays the clip with the session suspended around playback.

use crate::error::CueResult;
use crate::matcher::Matcher;
use crate::notify::{NoticeKind, Notifier, NOTICE_DEFAULT_MS, NOTICE_SHORT_MS};
use crate::playback::PlaybackCoordinator;
use crate::queue::Utterance;
use crate::session::SessionController;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Consumer of queued utterances
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, utterance: &Utterance) -> CueResult<()>;
}

/// Matches utterances and orchestrates suspend → play → resume
pub struct CommandDispatcher {
    matcher: Arc<dyn Matcher>,
    playback: Arc<PlaybackCoordinator>,
    session: Arc<SessionController>,
    notifier: Arc<dyn Notifier>,
    asset_base: String,
}

impl CommandDispatcher {
    pub fn new(
        matcher: Arc<dyn Matcher>,
        playback: Arc<PlaybackCoordinator>,
        session: Arc<SessionController>,
        notifier: Arc<dyn Notifier>,
        asset_base: String,
    ) -> Self {
        Self {
            matcher,
            playback,
            session,
            notifier,
            asset_base,
        }
    }
}

/// Resolve a matcher audio ref (usually a bare file name) against the
/// configured asset base
fn resolve_clip_url(asset_base: &str, audio_ref: &str) -> String {
    if audio_ref.starts_with("http://") || audio_ref.starts_with("https://") {
        audio_ref.to_string()
    } else {
        format!(
            "{}/{}",
            asset_base.trim_end_matches('/'),
            audio_ref.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Dispatch for CommandDispatcher {
    async fn dispatch(&self, utterance: &Utterance) -> CueResult<()> {
        let outcome = match self.matcher.lookup(&utterance.text).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Lookup failures leave the session listening untouched
                warn!("matcher lookup failed: {e}");
                self.notifier.notify(
                    "command lookup failed",
                    NoticeKind::Error,
                    NOTICE_DEFAULT_MS,
                );
                return Err(e);
            }
        };

        if !outcome.matched {
            debug!("no command matched for: '{}'", utterance.text);
            self.notifier
                .notify("no matching command", NoticeKind::Info, NOTICE_SHORT_MS);
            return Ok(());
        }

        let command = outcome.command.as_deref().unwrap_or(&utterance.text);
        self.notifier.notify(
            &format!("Executing: {command}"),
            NoticeKind::Success,
            NOTICE_SHORT_MS,
        );

        // Halt capture so the clip is not recognized as new input
        self.session.suspend().await;

        let mut result = Ok(());
        if let Some(audio_ref) = outcome.audio.as_deref() {
            let url = resolve_clip_url(&self.asset_base, audio_ref);
            if let Err(e) = self.playback.play(&url).await {
                warn!("playback failed for {url}: {e}");
                self.notifier
                    .notify("playback failed", NoticeKind::Error, NOTICE_DEFAULT_MS);
                result = Err(e);
            }
        }

        // Resume regardless of how playback went
        self.session.resume().await;
        result
    }
}
