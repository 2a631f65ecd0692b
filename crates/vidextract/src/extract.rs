use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::cli::CodecPolicy;
use vidextract_locator::FrameRange;

/// One extraction job; consumed by [`extract`] exactly once.
#[derive(Debug)]
pub struct ExtractionRequest {
    pub input: PathBuf,
    pub range: FrameRange,
    pub fps: f64,
    pub output: PathBuf,
    pub codec: CodecPolicy,
}

#[derive(Debug)]
pub struct ExtractionReport {
    pub output: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub bytes: u64,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not launch ffmpeg: {0}")]
    Launch(#[from] std::io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    FfmpegFailed { status: String, stderr: String },

    #[error("ffmpeg produced no output at {}", path.display())]
    EmptyOutput { path: PathBuf },
}

/// Runs `ffmpeg` over the located range.
///
/// Stream copy cuts on keyframes and is near-instant; re-encode is
/// frame-accurate. Audio rides along in both modes.
pub async fn extract(request: ExtractionRequest) -> Result<ExtractionReport, ExtractionError> {
    let start_secs = start_offset_secs(&request);
    let duration_secs = duration_secs(&request);
    let args = ffmpeg_args(&request);
    debug!(args = ?args, "running ffmpeg");

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(ExtractionError::FfmpegFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let bytes = tokio::fs::metadata(&request.output)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);
    if bytes == 0 {
        return Err(ExtractionError::EmptyOutput {
            path: request.output,
        });
    }

    info!(
        output = %request.output.display(),
        start_secs,
        duration_secs,
        bytes,
        "extraction complete"
    );
    Ok(ExtractionReport {
        output: request.output,
        start_secs,
        duration_secs,
        bytes,
    })
}

fn start_offset_secs(request: &ExtractionRequest) -> f64 {
    request.range.start as f64 / request.fps
}

fn duration_secs(request: &ExtractionRequest) -> f64 {
    request.range.frame_count() as f64 / request.fps
}

/// `-ss` before `-i` seeks on the demuxer, which is what makes stream
/// copy fast; `-avoid_negative_ts` keeps remuxed timestamps sane.
fn ffmpeg_args(request: &ExtractionRequest) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        format!("{:.3}", start_offset_secs(request)),
        "-i".into(),
        request.input.display().to_string(),
        "-t".into(),
        format!("{:.3}", duration_secs(request)),
    ];
    match request.codec {
        CodecPolicy::Copy => {
            args.extend(["-c".into(), "copy".into()]);
        }
        CodecPolicy::Reencode => {
            args.extend([
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "fast".into(),
                "-crf".into(),
                "18".into(),
                "-c:a".into(),
                "aac".into(),
            ]);
        }
    }
    args.extend([
        "-avoid_negative_ts".into(),
        "make_zero".into(),
        "-y".into(),
        request.output.display().to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(codec: CodecPolicy) -> ExtractionRequest {
        ExtractionRequest {
            input: PathBuf::from("in.mp4"),
            range: FrameRange {
                start: 50,
                end: 125,
            },
            fps: 25.0,
            output: PathBuf::from("out.mkv"),
            codec,
        }
    }

    #[test]
    fn copy_args_seek_then_stream_copy() {
        let args = ffmpeg_args(&request(CodecPolicy::Copy));
        let joined = args.join(" ");
        assert_eq!(
            joined,
            "-hide_banner -loglevel error -ss 2.000 -i in.mp4 -t 3.040 \
             -c copy -avoid_negative_ts make_zero -y out.mkv"
        );
    }

    #[test]
    fn reencode_args_pick_x264_and_aac() {
        let args = ffmpeg_args(&request(CodecPolicy::Reencode));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        // Seek offsets are codec-independent.
        assert!(args.windows(2).any(|w| w == ["-ss", "2.000"]));
    }
}
