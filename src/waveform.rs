//! Waveform renderer seam
//!
//! Visual progress lives outside the core: the coordinator loads the same
//! decoded buffer it plays into whatever renderer the embedder injects, so
//! the display and the audio cannot drift apart.

use crate::audio::DecodedClip;
use tracing::debug;

/// Contract for a waveform display
pub trait WaveformRenderer: Send + Sync {
    /// Load a decoded buffer for display
    fn load(&self, clip: &DecodedClip);

    /// Start the progress cursor alongside playback
    fn play(&self);

    /// Halt the cursor (used when playback fails mid-clip)
    fn pause(&self);
}

/// Renderer that just logs; the default for headless use
#[derive(Debug, Default)]
pub struct LogWaveform;

impl WaveformRenderer for LogWaveform {
    fn load(&self, clip: &DecodedClip) {
        debug!(
            "waveform: loaded clip ({:.2}s, {} ch)",
            clip.duration().as_secs_f64(),
            clip.channels
        );
    }

    fn play(&self) {
        debug!("waveform: play");
    }

    fn pause(&self) {
        debug!("waveform: pause");
    }
}
