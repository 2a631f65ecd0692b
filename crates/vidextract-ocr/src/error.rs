use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The recognizer cannot run at all. Fatal for the session; never
    /// retried silently.
    #[error("ocr engine '{engine}' is unavailable: {message}")]
    EngineUnavailable {
        engine: &'static str,
        message: String,
    },

    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },
}

impl OcrError {
    pub fn unavailable(engine: &'static str, message: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine,
            message: message.into(),
        }
    }
}
