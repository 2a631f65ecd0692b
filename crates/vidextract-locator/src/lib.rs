//! Frame-locating core: turn two overlay timestamps into a frame range.
//!
//! An [`ExtractionSession`] binds one frame source, one OCR engine, and one
//! overlay region together. Inside it, the [`FrameTimestampCache`] memoizes
//! per-frame overlay reads (single-flight, failure markers included) and the
//! [`FrameLocator`] runs a bracketed search over frame indices, leaning on
//! the overlay clock being monotonic almost everywhere.

mod cache;
mod error;
mod locator;
mod sampler;
mod session;

pub use cache::{FrameSample, FrameTimestampCache};
pub use error::LocateError;
pub use locator::{BoundKind, Bracket, FrameLocator, FrameRange, LocatorConfig};
pub use sampler::{RegionSampler, SampleError, SamplerConfig, Threshold};
pub use session::{ExtractionSession, SessionConfig};
