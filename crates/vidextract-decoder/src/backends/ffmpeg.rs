#![cfg(feature = "backend-ffmpeg")]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ffmpeg::util::error::{EAGAIN, EWOULDBLOCK};
use ffmpeg_next as ffmpeg;

use crate::core::FrameSource;
use vidextract_types::{FrameError, FrameResult, LumaFrame, VideoMetadata};

const BACKEND_NAME: &str = "ffmpeg";

/// Random-access decoder backed by libav via `ffmpeg-next`.
///
/// Frame indices map to presentation times through the container frame
/// rate. `frame_at` seeks to the nearest preceding keyframe and decodes
/// forward until it reaches the requested index; sequential probes close
/// to the current position skip the seek and just keep decoding.
pub struct FfmpegSource {
    inner: Arc<Mutex<Inner>>,
    metadata: VideoMetadata,
}

struct Inner {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::context::Context,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    fps: f64,
    /// Index of the next frame the decoder would emit without seeking,
    /// or `None` right after opening or an overshoot.
    position: Option<u64>,
}

/// Decoding forward is cheaper than a seek for short hops.
const SEQUENTIAL_WINDOW: u64 = 64;

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> FrameResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file {} does not exist", path.display()),
            )));
        }
        ffmpeg::init().map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;

        let input = ffmpeg::format::input(&PathBuf::from(path))
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| FrameError::backend_failure(BACKEND_NAME, "no video stream found"))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            f64::from(rate)
        } else {
            0.0
        };
        if fps <= 0.0 {
            return Err(FrameError::backend_failure(
                BACKEND_NAME,
                "video stream reports no frame rate",
            ));
        }

        let stream_frames = stream.frames();
        let duration = if input.duration() > 0 {
            Some(Duration::from_secs_f64(
                input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE),
            ))
        } else {
            None
        };

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::pixel::Pixel::GRAY8,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::FAST_BILINEAR,
        )
        .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;

        let mut metadata = VideoMetadata {
            duration,
            fps: Some(fps),
            width: Some(decoder.width()),
            height: Some(decoder.height()),
            total_frames: if stream_frames > 0 {
                Some(stream_frames as u64)
            } else {
                None
            },
        };
        metadata.total_frames = metadata.calculate_total_frames();

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                input,
                decoder,
                scaler,
                stream_index,
                time_base,
                fps,
                position: None,
            })),
            metadata,
        })
    }
}

impl Inner {
    fn seek_to(&mut self, index: u64) -> FrameResult<()> {
        let seconds = index as f64 / self.fps;
        let position = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(position, ..position)
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
        self.decoder.flush();
        self.position = None;
        Ok(())
    }

    fn decode_until(&mut self, index: u64) -> FrameResult<LumaFrame> {
        let Inner {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            fps,
            position,
        } = self;

        let mut decoded = ffmpeg::util::frame::Video::empty();
        let mut converted = ffmpeg::util::frame::Video::empty();
        let mut flushed = false;

        loop {
            loop {
                match decoder.receive_frame(&mut decoded) {
                    Ok(()) => {
                        let current = decoded
                            .pts()
                            .map(|pts| {
                                let seconds = pts as f64 * f64::from(*time_base);
                                (seconds * *fps).round().max(0.0) as u64
                            })
                            .or(*position)
                            .unwrap_or(0);
                        *position = Some(current + 1);
                        if current < index {
                            continue;
                        }
                        scaler.run(&decoded, &mut converted).map_err(|err| {
                            FrameError::backend_failure(BACKEND_NAME, err.to_string())
                        })?;
                        return frame_from_gray(&converted, current, *time_base, decoded.pts());
                    }
                    Err(err) if is_retryable_error(&err) => break,
                    Err(ffmpeg::Error::Eof) => {
                        return Err(FrameError::OutOfRange {
                            index,
                            total: position.unwrap_or(0),
                        });
                    }
                    Err(err) => {
                        return Err(FrameError::backend_failure(BACKEND_NAME, err.to_string()));
                    }
                }
            }

            if flushed {
                return Err(FrameError::OutOfRange {
                    index,
                    total: position.unwrap_or(0),
                });
            }

            match input.packets().find(|(stream, _)| stream.index() == *stream_index) {
                Some((_, packet)) => {
                    if let Err(err) = decoder.send_packet(&packet) {
                        if !is_retryable_error(&err) {
                            return Err(FrameError::backend_failure(
                                BACKEND_NAME,
                                err.to_string(),
                            ));
                        }
                    }
                }
                None => {
                    decoder.send_eof().map_err(|err| {
                        FrameError::backend_failure(BACKEND_NAME, err.to_string())
                    })?;
                    flushed = true;
                }
            }
        }
    }

    fn fetch(&mut self, index: u64) -> FrameResult<LumaFrame> {
        let needs_seek = match self.position {
            Some(position) => index < position || index > position + SEQUENTIAL_WINDOW,
            None => true,
        };
        if needs_seek {
            self.seek_to(index)?;
        }
        self.decode_until(index)
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    async fn frame_at(&self, index: u64) -> FrameResult<LumaFrame> {
        if let Some(total) = self.metadata.total_frames {
            if index >= total {
                return Err(FrameError::OutOfRange { index, total });
            }
        }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut inner = inner.lock().map_err(|_| {
                FrameError::backend_failure(BACKEND_NAME, "decoder state poisoned")
            })?;
            inner.fetch(index)
        })
        .await
        .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?
    }
}

fn frame_from_gray(
    frame: &ffmpeg::util::frame::Video,
    index: u64,
    time_base: ffmpeg::Rational,
    pts: Option<i64>,
) -> FrameResult<LumaFrame> {
    let plane = frame.data(0);
    let stride = frame.stride(0) as usize;
    let width = frame.width();
    let height = frame.height();
    let mut buffer = Vec::with_capacity(stride * height as usize);
    for row in 0..height as usize {
        let offset = row * stride;
        buffer.extend_from_slice(&plane[offset..offset + stride]);
    }
    let timestamp = pts.map(|pts| {
        let seconds = (pts as f64 * f64::from(time_base)).max(0.0);
        Duration::from_secs_f64(seconds)
    });
    LumaFrame::from_owned(width, height, stride, index, timestamp, buffer)
}

fn is_retryable_error(error: &ffmpeg::Error) -> bool {
    matches!(
        error,
        ffmpeg::Error::Other { errno }
            if *errno == EAGAIN || *errno == EWOULDBLOCK
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_error() {
        let result = FfmpegSource::open("/tmp/nonexistent-file.mp4");
        assert!(result.is_err());
    }
}
