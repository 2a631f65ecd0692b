use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::LocateError;
use crate::sampler::RegionSampler;
use vidextract_decoder::DynFrameSource;
use vidextract_ocr::{OcrEngine, OcrError};
use vidextract_timestamp::{OverlayInstant, parse_overlay};
use vidextract_types::{CancelToken, FrameError, Region};

/// The outcome of reading one frame's overlay. `instant` is `None` when
/// the frame is a failure marker: empty or low-confidence recognition, or
/// text no grammar accepts.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub frame_index: u64,
    pub text: Option<String>,
    pub confidence: f32,
    pub instant: Option<OverlayInstant>,
}

impl FrameSample {
    fn unreadable(frame_index: u64, text: Option<String>, confidence: f32) -> Self {
        Self {
            frame_index,
            text,
            confidence,
            instant: None,
        }
    }

    pub fn is_readable(&self) -> bool {
        self.instant.is_some()
    }
}

/// Memoizes overlay reads per frame index within one session.
///
/// Each miss decodes the frame, crops the region, recognizes it on the
/// blocking pool, and parses the text. Failure markers are cached like
/// successes so the locator never re-reads a frame it has given up on.
/// Concurrent requests for the same index share a single computation.
pub struct FrameTimestampCache {
    source: DynFrameSource,
    engine: Arc<dyn OcrEngine>,
    sampler: RegionSampler,
    region: Region,
    confidence_floor: f32,
    frame_count: u64,
    cancel: CancelToken,
    entries: Mutex<HashMap<u64, Arc<OnceCell<FrameSample>>>>,
    computed: AtomicU64,
}

impl FrameTimestampCache {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: DynFrameSource,
        engine: Arc<dyn OcrEngine>,
        sampler: RegionSampler,
        region: Region,
        confidence_floor: f32,
        frame_count: u64,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source,
            engine,
            sampler,
            region,
            confidence_floor,
            frame_count,
            cancel,
            entries: Mutex::new(HashMap::new()),
            computed: AtomicU64::new(0),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of samples actually computed (misses), for idempotence and
    /// single-flight checks.
    pub fn computed(&self) -> u64 {
        self.computed.load(Ordering::SeqCst)
    }

    pub async fn get_or_compute(&self, index: u64) -> Result<FrameSample, LocateError> {
        if index >= self.frame_count {
            return Err(LocateError::Frame(FrameError::OutOfRange {
                index,
                total: self.frame_count,
            }));
        }
        let cell = {
            let mut entries = self.entries.lock().map_err(|_| LocateError::TaskAborted {
                message: "cache index lock poisoned".into(),
            })?;
            Arc::clone(entries.entry(index).or_default())
        };
        cell.get_or_try_init(|| self.compute(index)).await.cloned()
    }

    async fn compute(&self, index: u64) -> Result<FrameSample, LocateError> {
        if self.cancel.is_cancelled() {
            return Err(LocateError::Cancelled);
        }
        let frame = self.source.frame_at(index).await?;
        if self.cancel.is_cancelled() {
            return Err(LocateError::Cancelled);
        }

        let prepared = match self.sampler.sample(&frame, &self.region) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(frame = index, error = %err, "region sampling failed, marking frame unreadable");
                self.computed.fetch_add(1, Ordering::SeqCst);
                return Ok(FrameSample::unreadable(index, None, 0.0));
            }
        };

        let engine = Arc::clone(&self.engine);
        let recognized = tokio::task::spawn_blocking(move || engine.recognize(&prepared))
            .await
            .map_err(|err| LocateError::TaskAborted {
                message: err.to_string(),
            })?;
        let result = match recognized {
            Ok(result) => result,
            Err(err @ OcrError::EngineUnavailable { .. }) => return Err(LocateError::Ocr(err)),
            Err(err) => {
                warn!(frame = index, error = %err, "recognizer rejected the sample");
                self.computed.fetch_add(1, Ordering::SeqCst);
                return Ok(FrameSample::unreadable(index, None, 0.0));
            }
        };
        self.computed.fetch_add(1, Ordering::SeqCst);

        if result.is_empty() || result.confidence < self.confidence_floor {
            debug!(
                frame = index,
                confidence = result.confidence,
                "overlay unreadable"
            );
            let text = Some(result.text).filter(|t| !t.trim().is_empty());
            return Ok(FrameSample::unreadable(index, text, result.confidence));
        }

        let text = result.text.trim().to_string();
        match parse_overlay(&text, self.region.format_hint) {
            Ok(instant) => Ok(FrameSample {
                frame_index: index,
                text: Some(text),
                confidence: result.confidence,
                instant: Some(instant),
            }),
            Err(err) => {
                debug!(frame = index, text = %text, error = %err, "overlay text did not parse");
                Ok(FrameSample {
                    frame_index: index,
                    text: Some(text),
                    confidence: result.confidence,
                    instant: None,
                })
            }
        }
    }
}
