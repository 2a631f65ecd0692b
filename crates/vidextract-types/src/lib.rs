//! Shared domain models for the vidextract workspace.
//!
//! This crate centralizes the lightweight structures used across the
//! decoder, OCR, locator, and CLI crates. Keep it backend-agnostic so every
//! crate can depend on it without pulling native SDKs or heavy features.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vidextract_timestamp::TimestampFormat;

pub type FrameResult<T> = Result<T, FrameError>;

/// A decoded grayscale (luminance) frame.
///
/// Overlay recognition only needs the luma plane, so backends convert to
/// grayscale at decode time and the rest of the pipeline never sees chroma.
#[derive(Clone)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    stride: usize,
    frame_index: u64,
    timestamp: Option<Duration>,
    data: Arc<[u8]>,
}

impl fmt::Debug for LumaFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LumaFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("frame_index", &self.frame_index)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl LumaFrame {
    pub fn from_owned(
        width: u32,
        height: u32,
        stride: usize,
        frame_index: u64,
        timestamp: Option<Duration>,
        data: Vec<u8>,
    ) -> FrameResult<Self> {
        if (width as usize) > stride {
            return Err(FrameError::InvalidFrame {
                reason: format!("width {width} exceeds row stride {stride}"),
            });
        }
        let required = stride
            .checked_mul(height as usize)
            .ok_or_else(|| FrameError::InvalidFrame {
                reason: "calculated luma plane length overflowed".into(),
            })?;
        if data.len() < required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient luma plane bytes: got {} expected at least {}",
                    data.len(),
                    required
                ),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            frame_index,
            timestamp,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("{backend} backend failed: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("frame index {index} is outside the video range [0, {total})")]
    OutOfRange { index: u64, total: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn backend_failure(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoMetadata {
    pub duration: Option<Duration>,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub total_frames: Option<u64>,
}

impl VideoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calculate_total_frames(&self) -> Option<u64> {
        if let Some(total) = self.total_frames {
            return Some(total);
        }
        if let (Some(duration), Some(fps)) = (self.duration, self.fps) {
            let total = (duration.as_secs_f64() * fps).round();
            if total.is_finite() && total >= 0.0 {
                return Some(total as u64);
            }
        }
        None
    }

    /// Nominal interval between consecutive frames.
    pub fn frame_step(&self) -> Option<Duration> {
        match self.fps {
            Some(fps) if fps > 0.0 => Some(Duration::from_secs_f64(1.0 / fps)),
            _ => None,
        }
    }
}

/// Where on the frame the overlay text is expected, plus an optional
/// grammar hint. Immutable for the duration of one extraction session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub rect: RegionRect,
    pub format_hint: Option<TimestampFormat>,
}

impl Region {
    pub fn new(rect: RegionRect) -> Self {
        Self {
            rect,
            format_hint: None,
        }
    }

    pub fn with_format_hint(mut self, hint: TimestampFormat) -> Self {
        self.format_hint = Some(hint);
        self
    }
}

impl Default for Region {
    fn default() -> Self {
        // Device overlays conventionally sit in the top-right corner in a
        // roughly 300x50 pixel box.
        Self::new(RegionRect::Anchored {
            corner: Corner::TopRight,
            width: 300,
            height: 50,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionRect {
    /// Fixed-size box pinned to a frame corner; position is resolved
    /// against the actual frame dimensions.
    Anchored {
        corner: Corner,
        width: u32,
        height: u32,
    },
    /// Absolute pixel rectangle.
    Pixels { x: u32, y: u32, width: u32, height: u32 },
    /// Rectangle in fractions of the frame dimensions (0.0..=1.0).
    Fractional { x: f32, y: f32, width: f32, height: f32 },
}

impl RegionRect {
    /// Resolves the rectangle against a concrete frame size, clamping to
    /// the frame bounds. `None` when the result would be empty.
    pub fn resolve(&self, frame_w: u32, frame_h: u32) -> Option<PixelRect> {
        if frame_w == 0 || frame_h == 0 {
            return None;
        }
        let (fw, fh) = (frame_w as usize, frame_h as usize);
        let (x0, y0, x1, y1) = match *self {
            RegionRect::Anchored {
                corner,
                width,
                height,
            } => {
                let w = (width as usize).min(fw);
                let h = (height as usize).min(fh);
                let (x0, y0) = match corner {
                    Corner::TopLeft => (0, 0),
                    Corner::TopRight => (fw - w, 0),
                    Corner::BottomLeft => (0, fh - h),
                    Corner::BottomRight => (fw - w, fh - h),
                };
                (x0, y0, x0 + w, y0 + h)
            }
            RegionRect::Pixels {
                x,
                y,
                width,
                height,
            } => {
                let x0 = (x as usize).min(fw);
                let y0 = (y as usize).min(fh);
                let x1 = (x as usize).saturating_add(width as usize).min(fw);
                let y1 = (y as usize).saturating_add(height as usize).min(fh);
                (x0, y0, x1, y1)
            }
            RegionRect::Fractional {
                x,
                y,
                width,
                height,
            } => {
                let x0 = (x.clamp(0.0, 1.0) * fw as f32).floor() as usize;
                let y0 = (y.clamp(0.0, 1.0) * fh as f32).floor() as usize;
                let x1 = (((x + width).clamp(0.0, 1.0)) * fw as f32).ceil() as usize;
                let y1 = (((y + height).clamp(0.0, 1.0)) * fh as f32).ceil() as usize;
                (x0, y0, x1.min(fw), y1.min(fh))
            }
        };
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top-left" => Ok(Corner::TopLeft),
            "top-right" => Ok(Corner::TopRight),
            "bottom-left" => Ok(Corner::BottomLeft),
            "bottom-right" => Ok(Corner::BottomRight),
            other => Err(format!("unknown corner '{other}'")),
        }
    }
}

/// Cooperative cancellation flag shared between a session and its caller.
///
/// Cancellation is checked before each decode and each recognition step, so
/// a request takes effect within one sampling step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
