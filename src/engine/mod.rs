//! Recognition engine contract
//!
//! The engine is an opaque external capability: the session only starts and
//! stops it and reacts to the events it emits. One concrete backend ships
//! here (Vosk, local offline recognition); anything that can push
//! [`EngineEvent`]s into the channel can stand in for it.

pub mod vosk;

use crate::config::Config;
use crate::error::CueResult;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

// Re-export main types
pub use self::vosk::VoskEngine;

/// Engine configuration mirroring the recognizer knobs
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Keep recognizing after the first final result
    pub continuous: bool,
    /// Emit non-final (interim) results
    pub interim_results: bool,
    /// BCP-47 language tag; backends that infer the language from their
    /// model use this for logging only
    pub locale: String,
    /// Upper bound on alternatives per result
    pub max_alternatives: u32,
}

/// Error codes an engine can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no speech detected")]
    NoSpeech,

    #[error("recognition aborted")]
    Aborted,

    #[error("network connection unstable")]
    Network,

    #[error("cannot access the microphone")]
    CaptureFailed,

    #[error("microphone permission refused")]
    NotAllowed,

    #[error("speech service refused the request")]
    ServiceNotAllowed,

    #[error("{0}")]
    Other(String),
}

/// Notifications emitted by a running engine.
///
/// Contract: every `Error` is eventually followed by an `Ended`, and a
/// session that was started emits exactly one `Ended` when it dies, however
/// it dies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine is capturing and recognizing
    Started,
    /// A recognition result; `is_final` distinguishes interim transcripts
    Result { text: String, is_final: bool },
    /// Something went wrong; see [`crate::classify`] for what to do about it
    Error(EngineError),
    /// The engine stopped capturing
    Ended,
}

/// Trait for recognition engines
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Begin a recognition session. Calling this on an engine that is
    /// already running is a no-op.
    async fn start(&self) -> CueResult<()>;

    /// Request the engine to halt. The `Ended` event confirms it did.
    async fn stop(&self) -> CueResult<()>;
}

/// Factory to create the configured recognition engine
pub fn create_engine(
    config: &Config,
    events: UnboundedSender<EngineEvent>,
) -> CueResult<Arc<dyn RecognitionEngine>> {
    match config.engine.as_str() {
        "vosk" => Ok(Arc::new(VoskEngine::new(config, events)?)),
        other => {
            warn!("unknown engine '{}', falling back to vosk", other);
            Ok(Arc::new(VoskEngine::new(config, events)?))
        }
    }
}
