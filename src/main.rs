//! VoiceCue - Voice-Triggered Audio Cue Playback
//!
//! Listens continuously, matches what you say against the backend's command
//! table, and plays the matched clip.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use voicecue::config::Config;
use voicecue::trigger::VoiceTrigger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Audio input device index
    #[arg(short, long)]
    device: Option<usize>,

    /// Matcher backend base URL (overrides config)
    #[arg(long)]
    matcher_url: Option<String>,

    /// Vosk model path (overrides config)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🎙️ VoiceCue v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    if let Some(device) = args.device {
        config.device_index = Some(device);
    }
    if let Some(url) = args.matcher_url {
        config.matcher_url = url;
    }
    if let Some(model) = args.model {
        config.vosk_model_path = model;
    }

    let trigger = VoiceTrigger::from_config(&config)?;
    trigger.start_listening().await?;

    info!("✅ VoiceCue ready - speak a command");
    info!("   Matcher: {}", config.matcher_url);
    info!("   Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;

    info!("👋 Stopping...");
    trigger.stop_listening().await;

    Ok(())
}
