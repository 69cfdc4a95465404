use crate::engine::EngineSettings;
use crate::session::SessionConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Recognition
    pub engine: String,
    pub vosk_model_path: String,
    pub device_index: Option<usize>,
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,

    // Session
    pub max_restart_attempts: u32,
    pub restart_delay_ms: u64,
    /// Recycle the engine if no result arrives for this long while
    /// listening; 0 disables the watchdog
    pub watchdog_secs: u64,

    // Dispatch
    pub min_command_len: usize,
    pub matcher_url: String,
    pub asset_path: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: "vosk".to_string(),
            vosk_model_path: dirs::data_dir()
                .unwrap_or_default()
                .join("voicecue/models/vosk-model-small-cn")
                .to_string_lossy()
                .to_string(),
            device_index: None,
            locale: "zh-TW".to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
            max_restart_attempts: 3,
            restart_delay_ms: 10,
            watchdog_secs: 30,
            min_command_len: 2,
            matcher_url: "http://127.0.0.1:5000".to_string(),
            asset_path: "uploads".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from file or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match serde_json::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    // Graceful degradation: log warning and use defaults
                    tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                    // Backup corrupt file for debugging
                    let backup_path = path.with_extension("json.corrupt");
                    let _ = std::fs::rename(path, &backup_path);
                    Ok(Self::default())
                }
            }
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Recognizer knobs for the engine factory
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            continuous: self.continuous,
            interim_results: self.interim_results,
            locale: self.locale.clone(),
            max_alternatives: self.max_alternatives,
        }
    }

    /// Session restart/watchdog tuning
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_restart_attempts: self.max_restart_attempts,
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            watchdog_window: Duration::from_secs(self.watchdog_secs),
        }
    }

    /// Base URL command audio refs are resolved against
    pub fn asset_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.matcher_url.trim_end_matches('/'),
            self.asset_path.trim_matches('/')
        )
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voicecue")
        .join("config.json")
}
