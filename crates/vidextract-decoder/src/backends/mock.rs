use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::FrameSource;
use vidextract_timestamp::{OverlayInstant, TimestampFormat};
use vidextract_types::{FrameError, FrameResult, LumaFrame, VideoMetadata};

/// Pixel span reserved for the stamped overlay, matching the conventional
/// top-right 300x50 region.
const OVERLAY_SPAN: usize = 300;

/// Synthetic video whose overlay timestamps are stamped into the luma
/// plane as raw printable-ASCII bytes, readable by the mock OCR engine
/// through a passthrough sampler pipeline.
pub struct MockSource {
    spec: MockSpec,
    decode_calls: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct MockSpec {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub fps: f64,
    pub overlay: Option<OverlayScript>,
}

impl Default for MockSpec {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            frame_count: 300,
            fps: 25.0,
            overlay: Some(OverlayScript::default()),
        }
    }
}

/// Controls what the overlay shows per frame: a monotonically advancing
/// clock by default, with optional garbled frames (OCR reads junk), blank
/// frames (OCR reads nothing), and out-of-order instants.
#[derive(Debug, Clone)]
pub struct OverlayScript {
    pub format: TimestampFormat,
    pub start: OverlayInstant,
    garbled: HashSet<u64>,
    blank: HashSet<u64>,
    overrides: HashMap<u64, OverlayInstant>,
}

impl Default for OverlayScript {
    fn default() -> Self {
        let start = TimestampFormat::DayFirst
            .parse("01/02/2023 12:00:00:000")
            .expect("literal is valid");
        Self::new(TimestampFormat::DayFirst, start)
    }
}

impl OverlayScript {
    pub fn new(format: TimestampFormat, start: OverlayInstant) -> Self {
        Self {
            format,
            start,
            garbled: HashSet::new(),
            blank: HashSet::new(),
            overrides: HashMap::new(),
        }
    }

    pub fn garbled(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.garbled.extend(frames);
        self
    }

    pub fn blank(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.blank.extend(frames);
        self
    }

    pub fn with_override(mut self, frame: u64, instant: OverlayInstant) -> Self {
        self.overrides.insert(frame, instant);
        self
    }

    fn text_for(&self, index: u64, fps: f64) -> Option<String> {
        if self.blank.contains(&index) {
            return None;
        }
        if self.garbled.contains(&index) {
            return Some("##:##:##:###".into());
        }
        let instant = match self.overrides.get(&index) {
            Some(instant) => *instant,
            None => {
                let elapsed_ms = (index as f64 * 1000.0 / fps).round() as i64;
                self.start.advanced_by(chrono::Duration::milliseconds(elapsed_ms))
            }
        };
        self.format.render(&instant)
    }
}

impl MockSource {
    pub fn new(spec: MockSpec) -> Self {
        Self {
            spec,
            decode_calls: AtomicU64::new(0),
        }
    }

    /// Number of frames actually decoded; the single-flight tests compare
    /// this against the cache's computed counter.
    pub fn decode_calls(&self) -> u64 {
        self.decode_calls.load(Ordering::SeqCst)
    }

    fn render_frame(&self, index: u64) -> FrameResult<LumaFrame> {
        let spec = &self.spec;
        let stride = spec.width as usize;
        let mut data = vec![16u8; stride * spec.height as usize];

        if let Some(overlay) = &spec.overlay {
            if let Some(text) = overlay.text_for(index, spec.fps) {
                let x0 = stride.saturating_sub(OVERLAY_SPAN);
                let row = &mut data[x0..stride.min(x0 + OVERLAY_SPAN)];
                for (slot, byte) in row.iter_mut().zip(text.bytes()) {
                    *slot = byte;
                }
            }
        }

        let timestamp = Duration::from_secs_f64(index as f64 / spec.fps);
        LumaFrame::from_owned(
            spec.width,
            spec.height,
            stride,
            index,
            Some(timestamp),
            data,
        )
    }
}

#[async_trait]
impl FrameSource for MockSource {
    fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            duration: Some(Duration::from_secs_f64(
                self.spec.frame_count as f64 / self.spec.fps,
            )),
            fps: Some(self.spec.fps),
            width: Some(self.spec.width),
            height: Some(self.spec.height),
            total_frames: Some(self.spec.frame_count),
        }
    }

    async fn frame_at(&self, index: u64) -> FrameResult<LumaFrame> {
        if index >= self.spec.frame_count {
            return Err(FrameError::OutOfRange {
                index,
                total: self.spec.frame_count,
            });
        }
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        self.render_frame(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn overlay_text_lands_in_the_top_right_region() {
        let source = MockSource::new(MockSpec::default());
        let frame = source.frame_at(25).await.unwrap();
        let x0 = frame.width() as usize - OVERLAY_SPAN;
        let row = &frame.data()[x0..x0 + OVERLAY_SPAN];
        let text: Vec<u8> = row
            .iter()
            .copied()
            .take_while(|byte| (0x20..=0x7e).contains(byte))
            .collect();
        // Frame 25 at 25fps is one second past the scripted start.
        assert_eq!(String::from_utf8(text).unwrap(), "01/02/2023 12:00:01:000");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_range_index_is_rejected_without_decoding() {
        let source = MockSource::new(MockSpec {
            frame_count: 10,
            ..MockSpec::default()
        });
        let err = source.frame_at(10).await.unwrap_err();
        assert!(matches!(err, FrameError::OutOfRange { index: 10, total: 10 }));
        assert_eq!(source.decode_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn garbled_and_blank_frames_alter_the_overlay() {
        let overlay = OverlayScript::default().garbled([1]).blank([2]);
        let source = MockSource::new(MockSpec {
            overlay: Some(overlay),
            ..MockSpec::default()
        });

        let garbled = source.frame_at(1).await.unwrap();
        let x0 = garbled.width() as usize - OVERLAY_SPAN;
        assert_eq!(garbled.data()[x0], b'#');

        let blank = source.frame_at(2).await.unwrap();
        assert_eq!(blank.data()[x0], 16);
    }
}
