//! Engine error classification
//!
//! Pure mapping from a recognition-engine error code to the recovery action
//! the session should take. Keeping this a free function makes the table
//! exhaustively testable.

use crate::engine::EngineError;

/// What the session does about an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Ignore; at most a low-priority status line
    Transient,
    /// Worth a warning; the bounded auto-restart path recovers it
    Recoverable,
    /// Capture cannot continue; session stops and restart is disabled
    Fatal,
}

/// Classify an engine error code.
///
/// Unknown codes are treated as recoverable: a bounded restart is the safe
/// default, and fatality is reserved for codes that provably mean the
/// microphone is gone.
pub fn classify(error: &EngineError) -> ErrorSeverity {
    match error {
        EngineError::NoSpeech | EngineError::Aborted => ErrorSeverity::Transient,
        EngineError::Network => ErrorSeverity::Recoverable,
        EngineError::CaptureFailed
        | EngineError::NotAllowed
        | EngineError::ServiceNotAllowed => ErrorSeverity::Fatal,
        EngineError::Other(_) => ErrorSeverity::Recoverable,
    }
}
