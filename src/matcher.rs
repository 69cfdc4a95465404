//! Command matcher client
//!
//! The command table lives server-side. We post the utterance and get back
//! whether it matched and which clip to play.

use crate::error::{CueError, CueResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of a matcher lookup
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommandMatch {
    /// Whether the utterance matched a known command
    #[serde(rename = "match")]
    pub matched: bool,
    /// Canonical text of the matched command
    #[serde(default)]
    pub command: Option<String>,
    /// File name of the clip to play, relative to the asset base
    #[serde(default)]
    pub audio: Option<String>,
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    command: &'a str,
}

/// The external service mapping utterances to commands
#[async_trait]
pub trait Matcher: Send + Sync {
    async fn lookup(&self, text: &str) -> CueResult<CommandMatch>;
}

/// HTTP matcher speaking the backend's `/process-command` endpoint
pub struct HttpMatcher {
    client: Client,
    endpoint: String,
}

impl HttpMatcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/process-command", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Matcher for HttpMatcher {
    async fn lookup(&self, text: &str) -> CueResult<CommandMatch> {
        debug!("matcher lookup: '{}'", text);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&MatchRequest { command: text })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CueError::Matcher(format!(
                        "could not reach matcher at {}. Is the backend running?",
                        self.endpoint
                    ))
                } else {
                    CueError::from(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(CueError::Matcher(format!(
                "matcher returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_response_parsing() {
        let hit: CommandMatch =
            serde_json::from_str(r#"{"match": true, "command": "開燈", "audio": "lights-on.wav"}"#)
                .expect("parse");
        assert!(hit.matched);
        assert_eq!(hit.command.as_deref(), Some("開燈"));
        assert_eq!(hit.audio.as_deref(), Some("lights-on.wav"));

        let miss: CommandMatch = serde_json::from_str(r#"{"match": false}"#).expect("parse");
        assert!(!miss.matched);
        assert_eq!(miss.command, None);
        assert_eq!(miss.audio, None);
    }
}
