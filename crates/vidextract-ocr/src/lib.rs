//! OCR boundary for the vidextract workspace.
//!
//! The external recognizer is modeled as a capability trait so the locator
//! can be driven by a deterministic fake in tests and by a real engine in
//! production without changing any search logic.

mod engine;
mod error;
mod mock;
mod prepared;
#[cfg(feature = "engine-tesseract")]
mod tesseract;

pub use engine::{OcrEngine, RecognitionResult};
pub use error::OcrError;
pub use mock::MockOcrEngine;
pub use prepared::PreparedImage;
#[cfg(feature = "engine-tesseract")]
pub use tesseract::{TesseractConfig, TesseractOcrEngine};
