use std::sync::Arc;

use crate::cache::FrameTimestampCache;
use crate::error::LocateError;
use crate::locator::{FrameLocator, FrameRange, LocatorConfig};
use crate::sampler::{RegionSampler, SamplerConfig};
use vidextract_decoder::DynFrameSource;
use vidextract_ocr::OcrEngine;
use vidextract_timestamp::OverlayInstant;
use vidextract_types::{CancelToken, Region, VideoMetadata};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub region: Region,
    pub sampler: SamplerConfig,
    pub locator: LocatorConfig,
    /// Recognitions below this confidence become failure markers.
    pub confidence_floor: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            sampler: SamplerConfig::default(),
            locator: LocatorConfig::default(),
            confidence_floor: 0.6,
        }
    }
}

/// One video, one region, one OCR engine, one cache.
///
/// The session owns the cache for its lifetime; `&mut self` on `locate`
/// keeps it to one search at a time. Batch callers build a fresh session
/// per segment.
pub struct ExtractionSession {
    cache: FrameTimestampCache,
    locator: LocatorConfig,
    frame_step: chrono::Duration,
    metadata: VideoMetadata,
    cancel: CancelToken,
}

impl ExtractionSession {
    pub fn new(
        source: DynFrameSource,
        engine: Arc<dyn OcrEngine>,
        config: SessionConfig,
    ) -> Result<Self, LocateError> {
        let metadata = source.metadata();
        let frame_count = metadata
            .calculate_total_frames()
            .filter(|count| *count > 0)
            .ok_or(LocateError::UnknownTimeline)?;
        let step = metadata.frame_step().ok_or(LocateError::UnknownTimeline)?;
        let frame_step =
            chrono::Duration::from_std(step).map_err(|_| LocateError::UnknownTimeline)?;

        let cancel = CancelToken::new();
        let cache = FrameTimestampCache::new(
            source,
            engine,
            RegionSampler::new(config.sampler),
            config.region,
            config.confidence_floor,
            frame_count,
            cancel.clone(),
        );
        Ok(Self {
            cache,
            locator: config.locator,
            frame_step,
            metadata,
            cancel,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Shareable handle; cancelling it stops in-flight work within one
    /// sampling step.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &FrameTimestampCache {
        &self.cache
    }

    pub async fn locate(
        &mut self,
        start: OverlayInstant,
        end: OverlayInstant,
    ) -> Result<FrameRange, LocateError> {
        FrameLocator::new(&self.cache, self.locator, self.frame_step)
            .locate(start, end)
            .await
    }
}
