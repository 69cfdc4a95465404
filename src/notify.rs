//! Status notification seam
//!
//! The core never renders UI. Everything user-visible goes through an
//! injected [`Notifier`]; embedders plug in toasts, status bars, whatever.

use tracing::{debug, error, info, warn};

/// How long an interim transcript flash stays visible
pub const NOTICE_FLASH_MS: u64 = 300;
/// Listening / short status hints
pub const NOTICE_BRIEF_MS: u64 = 500;
/// Matched-command confirmations
pub const NOTICE_SHORT_MS: u64 = 1000;
/// Everything else
pub const NOTICE_DEFAULT_MS: u64 = 2000;

/// Severity of a status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Receiver for status/error/success events
pub trait Notifier: Send + Sync {
    /// Deliver a notification. `duration_ms` is a display hint only.
    fn notify(&self, message: &str, kind: NoticeKind, duration_ms: u64);
}

/// Notifier that forwards everything to the tracing log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, kind: NoticeKind, _duration_ms: u64) {
        match kind {
            NoticeKind::Info => debug!("💬 {}", message),
            NoticeKind::Success => info!("✅ {}", message),
            NoticeKind::Warning => warn!("⚠️ {}", message),
            NoticeKind::Error => error!("❌ {}", message),
        }
    }
}
