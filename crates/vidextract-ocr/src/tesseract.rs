#![cfg(feature = "engine-tesseract")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::engine::{OcrEngine, RecognitionResult};
use crate::error::OcrError;
use crate::prepared::PreparedImage;

const ENGINE_NAME: &str = "tesseract";

/// Explicit, session-scoped recognizer configuration. The executable path
/// is threaded in by the caller rather than read from process-wide state.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub executable: PathBuf,
    pub language: String,
    /// Page segmentation mode; 7 treats the image as a single text line,
    /// which is what a one-line overlay needs.
    pub psm: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tesseract"),
            language: "eng".into(),
            psm: 7,
        }
    }
}

/// Drives an external `tesseract` executable, feeding prepared images as
/// PGM over stdin and reading TSV output for per-word confidences.
pub struct TesseractOcrEngine {
    config: TesseractConfig,
}

impl TesseractOcrEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

impl OcrEngine for TesseractOcrEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn warm_up(&self) -> Result<(), OcrError> {
        let output = Command::new(&self.config.executable)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                OcrError::unavailable(
                    ENGINE_NAME,
                    format!(
                        "failed to run '{} --version': {err}",
                        self.config.executable.display()
                    ),
                )
            })?;
        if !output.status.success() {
            return Err(OcrError::unavailable(
                ENGINE_NAME,
                format!("'--version' exited with {}", output.status),
            ));
        }
        Ok(())
    }

    fn recognize(&self, image: &PreparedImage) -> Result<RecognitionResult, OcrError> {
        let mut child = Command::new(&self.config.executable)
            .args(["stdin", "stdout", "--psm"])
            .arg(self.config.psm.to_string())
            .args(["-l", &self.config.language, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                OcrError::unavailable(
                    ENGINE_NAME,
                    format!(
                        "failed to spawn '{}': {err}",
                        self.config.executable.display()
                    ),
                )
            })?;

        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            // A closed pipe here means the engine died; the exit status
            // below reports the real cause.
            let _ = stdin.write_all(&image.to_pgm());
        }

        let output = child.wait_with_output().map_err(|err| {
            OcrError::unavailable(ENGINE_NAME, format!("failed to collect output: {err}"))
        })?;

        if !output.status.success() {
            // A recognizer that runs but rejects one image is a per-frame
            // miss, not a session failure.
            debug!(status = %output.status, "tesseract rejected frame image");
            return Ok(RecognitionResult::empty());
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extracts recognized words and their mean confidence from tesseract's TSV
/// output. Rows with negative confidence are structural (page/block/line
/// records) and carry no text.
fn parse_tsv(tsv: &str) -> RecognitionResult {
    let mut words = Vec::new();
    let mut confidence_sum = 0.0f32;
    for line in tsv.lines().skip(1) {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        let Ok(conf) = columns[10].parse::<f32>() else {
            continue;
        };
        let text = columns[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }
        words.push(text.to_string());
        confidence_sum += conf;
    }
    if words.is_empty() {
        return RecognitionResult::empty();
    }
    let confidence = confidence_sum / words.len() as f32 / 100.0;
    RecognitionResult::new(words.join(" "), confidence.clamp(0.0, 1.0))
}
