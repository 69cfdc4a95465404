//! Microphone availability probe
//!
//! `start()` confirms we can actually open a capture stream before the
//! engine spins up, so permission problems surface as one clear fatal error
//! instead of a restart loop.

use crate::error::{CueError, CueResult};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use tracing::debug;

/// Probe for capture permission / device availability
#[async_trait]
pub trait CaptureProbe: Send + Sync {
    /// Try to acquire the microphone. Resolves if capture is possible,
    /// fails with `PermissionDenied` or `CaptureUnavailable` otherwise.
    async fn acquire(&self) -> CueResult<()>;
}

/// cpal-backed probe: opens and immediately drops an input stream
pub struct CpalProbe {
    device_index: Option<usize>,
}

impl CpalProbe {
    pub fn new(device_index: Option<usize>) -> Self {
        Self { device_index }
    }
}

#[async_trait]
impl CaptureProbe for CpalProbe {
    async fn acquire(&self) -> CueResult<()> {
        let host = cpal::default_host();

        let device = if let Some(idx) = self.device_index {
            host.input_devices()
                .map_err(|e| CueError::CaptureUnavailable(e.to_string()))?
                .nth(idx)
                .ok_or_else(|| {
                    CueError::CaptureUnavailable(format!("device index {idx} out of range"))
                })?
        } else {
            host.default_input_device()
                .ok_or_else(|| CueError::CaptureUnavailable("no input device".to_string()))?
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device
            .default_input_config()
            .map_err(|e| CueError::CaptureUnavailable(e.to_string()))?;

        // Build a throwaway stream; this is where the OS says no if the
        // user never granted microphone access.
        let stream = device
            .build_input_stream(
                &config.into(),
                |_data: &[f32], _: &cpal::InputCallbackInfo| {},
                |err| debug!("probe stream error: {err}"),
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => {
                    CueError::CaptureUnavailable("device not available".to_string())
                }
                other => {
                    let text = other.to_string();
                    if text.to_lowercase().contains("permission") {
                        CueError::PermissionDenied
                    } else {
                        CueError::CaptureUnavailable(text)
                    }
                }
            })?;
        drop(stream);

        debug!("capture probe ok on '{}'", device_name);
        Ok(())
    }
}
