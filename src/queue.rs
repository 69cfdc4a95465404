//! Transcript queue
//!
//! Serializes finalized utterances: drops empties, too-short text and
//! immediate repeats, then feeds the survivors to the dispatcher one at a
//! time. A single drain task guarantees at most one in-flight dispatch
//! system-wide.

use crate::dispatch::Dispatch;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One finalized speech result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub heard_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(text: String) -> Self {
        Self {
            text,
            heard_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<Utterance>,
    draining: bool,
    /// Text of the most recently accepted utterance, for consecutive dedup
    last_text: Option<String>,
}

/// Deduplicating, strictly-ordered utterance queue
pub struct TranscriptQueue {
    dispatcher: Arc<dyn Dispatch>,
    min_len: usize,
    inner: Arc<Mutex<QueueInner>>,
}

impl TranscriptQueue {
    pub fn new(dispatcher: Arc<dyn Dispatch>, min_len: usize) -> Self {
        Self {
            dispatcher,
            min_len,
            inner: Arc::new(Mutex::new(QueueInner::default())),
        }
    }

    /// Accept a finalized transcript. Starts the drain task if none is
    /// active; returns whether the text was actually queued.
    pub fn enqueue(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() || text.chars().count() < self.min_len {
            debug!("dropping too-short transcript: '{}'", text);
            return false;
        }

        {
            let mut guard = self.inner.lock().unwrap();
            if guard.last_text.as_deref() == Some(text.as_str()) {
                debug!("dropping repeated transcript: '{}'", text);
                return false;
            }
            guard.last_text = Some(text.clone());
            guard.pending.push_back(Utterance::new(text));

            if guard.draining {
                return true;
            }
            guard.draining = true;
        }

        let inner = Arc::clone(&self.inner);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            Self::drain(inner, dispatcher).await;
        });
        true
    }

    /// Drop everything pending and forget the last processed text, so a
    /// fresh session can repeat the previous command. An in-flight dispatch
    /// finishes on its own.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.pending.clear();
        guard.last_text = None;
    }

    async fn drain(inner: Arc<Mutex<QueueInner>>, dispatcher: Arc<dyn Dispatch>) {
        loop {
            let next = {
                let mut guard = inner.lock().unwrap();
                match guard.pending.pop_front() {
                    Some(utterance) => utterance,
                    None => {
                        guard.draining = false;
                        break;
                    }
                }
            };

            debug!("dispatching '{}' (heard {})", next.text, next.heard_at);
            if let Err(e) = dispatcher.dispatch(&next).await {
                warn!("dispatch failed for '{}': {e}", next.text);
            }
        }
    }
}
