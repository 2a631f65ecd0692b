use crate::error::OcrError;
use crate::prepared::PreparedImage;

/// Common interface for all OCR engines.
///
/// An engine that runs but finds no text returns an empty
/// [`RecognitionResult`]; only a recognizer that cannot run at all reports
/// [`OcrError::EngineUnavailable`].
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn warm_up(&self) -> Result<(), OcrError> {
        Ok(())
    }

    fn recognize(&self, image: &PreparedImage) -> Result<RecognitionResult, OcrError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub text: String,
    /// Recognizer confidence in `0.0..=1.0`.
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
