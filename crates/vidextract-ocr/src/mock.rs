use crate::engine::{OcrEngine, RecognitionResult};
use crate::error::OcrError;
use crate::prepared::PreparedImage;

/// Deterministic engine for tests and CI.
///
/// The mock frame source stamps overlay text into the luma plane as raw
/// printable-ASCII bytes; this engine reads the longest printable run back
/// out. Paired with a passthrough sampler pipeline it exercises the whole
/// crop → recognize → parse path without a real recognizer.
#[derive(Debug, Default)]
pub struct MockOcrEngine;

impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn recognize(&self, image: &PreparedImage) -> Result<RecognitionResult, OcrError> {
        let text = longest_printable_run(image.data());
        if text.trim().is_empty() {
            return Ok(RecognitionResult::empty());
        }
        Ok(RecognitionResult::new(text, 1.0))
    }
}

fn longest_printable_run(data: &[u8]) -> String {
    let mut best: &[u8] = &[];
    let mut start = None;
    for (i, byte) in data.iter().enumerate() {
        let printable = (0x20..=0x7e).contains(byte);
        match (printable, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s > best.len() {
                    best = &data[s..i];
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if data.len() - s > best.len() {
            best = &data[s..];
        }
    }
    String::from_utf8_lossy(best).into_owned()
}
