//! VoiceCue Error Types
//!
//! Centralized error handling for the recognition and playback pipeline.

use thiserror::Error;

/// Central error type for VoiceCue
#[derive(Error, Debug)]
pub enum CueError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("command matcher error: {0}")]
    Matcher(String),

    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for VoiceCue operations
pub type CueResult<T> = Result<T, CueError>;
