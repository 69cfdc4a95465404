//! Playback coordination
//!
//! Fetches, decodes and caches clips, then plays them with the waveform
//! display tracking the same buffer. Each URL is decoded at most once per
//! process: concurrent requests for an uncached URL all await the decode
//! already in flight instead of racing it.

use crate::audio::{AudioDecoder, AudioOutput, DecodedClip};
use crate::error::{CueError, CueResult};
use crate::waveform::WaveformRenderer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

/// Where clip bytes come from
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> CueResult<Vec<u8>>;
}

/// HTTP asset source
pub struct HttpAssetSource {
    client: reqwest::Client,
}

impl HttpAssetSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAssetSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, url: &str) -> CueResult<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Lifecycle of one playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Loading,
    Playing,
    Finished,
}

/// Bookkeeping for a single playback; created per `play` call and dropped
/// when the call resolves
#[derive(Debug)]
pub struct PlaybackHandle {
    state: PlaybackState,
}

impl PlaybackHandle {
    fn new() -> Self {
        Self {
            state: PlaybackState::Loading,
        }
    }

    fn advance(&mut self, state: PlaybackState) {
        debug!("playback {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }
}

type CacheSlot = Arc<OnceCell<Arc<DecodedClip>>>;

/// Caches decoded clips and drives output + waveform together
pub struct PlaybackCoordinator {
    source: Arc<dyn AssetSource>,
    decoder: Arc<dyn AudioDecoder>,
    output: Arc<dyn AudioOutput>,
    waveform: Arc<dyn WaveformRenderer>,
    cache: Mutex<HashMap<String, CacheSlot>>,
}

impl PlaybackCoordinator {
    pub fn new(
        source: Arc<dyn AssetSource>,
        decoder: Arc<dyn AudioDecoder>,
        output: Arc<dyn AudioOutput>,
        waveform: Arc<dyn WaveformRenderer>,
    ) -> Self {
        Self {
            source,
            decoder,
            output,
            waveform,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Play the clip at `url`, resolving when playback naturally ends.
    ///
    /// Any fetch, decode or output failure resolves to `PlaybackFailed`;
    /// either way the caller hears back exactly once.
    pub async fn play(&self, url: &str) -> CueResult<()> {
        let clip = self.clip_for(url).await.map_err(playback_failed)?;

        let mut handle = PlaybackHandle::new();

        // The display tracks the very buffer the output plays
        self.waveform.load(&clip);
        handle.advance(PlaybackState::Playing);
        self.waveform.play();

        match self.output.play(Arc::clone(&clip)).await {
            Ok(()) => {
                handle.advance(PlaybackState::Finished);
                Ok(())
            }
            Err(e) => {
                self.waveform.pause();
                Err(playback_failed(e))
            }
        }
    }

    /// Cached decode: one fetch+decode per URL for the process lifetime.
    async fn clip_for(&self, url: &str) -> CueResult<Arc<DecodedClip>> {
        let slot = {
            let mut cache = self.cache.lock().unwrap();
            Arc::clone(
                cache
                    .entry(url.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        // A failed init leaves the cell empty, so a later request retries.
        let clip = slot
            .get_or_try_init(|| async {
                debug!("decoding clip: {}", url);
                let bytes = self.source.fetch(url).await?;
                let clip = self.decoder.decode(&bytes)?;
                Ok::<_, CueError>(Arc::new(clip))
            })
            .await?;

        Ok(Arc::clone(clip))
    }
}

/// Collapse whatever went wrong into the one condition callers handle
fn playback_failed(e: CueError) -> CueError {
    match e {
        CueError::PlaybackFailed(_) => e,
        other => CueError::PlaybackFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StaticSource {
        delay: Duration,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl AssetSource for StaticSource {
        async fn fetch(&self, _url: &str) -> CueResult<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(vec![0u8; 4])
        }
    }

    struct CountingDecoder {
        decodes: AtomicUsize,
    }

    impl AudioDecoder for CountingDecoder {
        fn decode(&self, _bytes: &[u8]) -> CueResult<DecodedClip> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            Ok(DecodedClip {
                channels: 1,
                sample_rate: 16000,
                samples: vec![0.0; 16],
            })
        }
    }

    struct SilentOutput {
        fail: bool,
    }

    #[async_trait]
    impl AudioOutput for SilentOutput {
        async fn play(&self, _clip: Arc<DecodedClip>) -> CueResult<()> {
            if self.fail {
                Err(CueError::PlaybackFailed("sink gone".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct RecordingWaveform {
        paused: AtomicUsize,
    }

    impl WaveformRenderer for RecordingWaveform {
        fn load(&self, _clip: &DecodedClip) {}
        fn play(&self) {}
        fn pause(&self) {
            self.paused.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn coordinator(
        delay: Duration,
        fail_output: bool,
    ) -> (
        Arc<PlaybackCoordinator>,
        Arc<StaticSource>,
        Arc<CountingDecoder>,
        Arc<RecordingWaveform>,
    ) {
        let source = Arc::new(StaticSource {
            delay,
            fetches: AtomicUsize::new(0),
        });
        let decoder = Arc::new(CountingDecoder {
            decodes: AtomicUsize::new(0),
        });
        let waveform = Arc::new(RecordingWaveform {
            paused: AtomicUsize::new(0),
        });
        let coordinator = Arc::new(PlaybackCoordinator::new(
            Arc::clone(&source) as Arc<dyn AssetSource>,
            Arc::clone(&decoder) as Arc<dyn AudioDecoder>,
            Arc::new(SilentOutput { fail: fail_output }),
            Arc::clone(&waveform) as Arc<dyn WaveformRenderer>,
        ));
        (coordinator, source, decoder, waveform)
    }

    #[tokio::test]
    async fn test_cache_identity_single_decode() {
        let (coordinator, source, decoder, _) = coordinator(Duration::ZERO, false);

        let a = coordinator.clip_for("clip.wav").await.expect("first");
        let b = coordinator.clip_for("clip.wav").await.expect("second");

        assert!(Arc::ptr_eq(&a, &b), "cache hit must return the same buffer");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_decode() {
        let (coordinator, source, decoder, _) =
            coordinator(Duration::from_millis(30), false);

        let (a, b) = tokio::join!(
            coordinator.play("clip.wav"),
            coordinator.play("clip.wav")
        );
        a.expect("first play");
        b.expect("second play");

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_output_failure_pauses_waveform() {
        let (coordinator, _, _, waveform) = coordinator(Duration::ZERO, true);

        let result = coordinator.play("clip.wav").await;
        assert!(matches!(result, Err(CueError::PlaybackFailed(_))));
        assert_eq!(waveform.paused.load(Ordering::SeqCst), 1);
    }
}
