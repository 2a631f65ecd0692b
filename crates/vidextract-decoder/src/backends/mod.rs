#[cfg(feature = "backend-ffmpeg")]
pub mod ffmpeg;
pub mod mock;
