use std::sync::Arc;

use async_trait::async_trait;

use vidextract_types::{FrameResult, LumaFrame, VideoMetadata};

pub type DynFrameSource = Arc<dyn FrameSource>;

/// Random-access view over a decoded video.
///
/// `frame_at` may block on I/O or CPU inside the backend; implementations
/// run that work on the blocking pool so locator tasks stay responsive.
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn metadata(&self) -> VideoMetadata;

    async fn frame_at(&self, index: u64) -> FrameResult<LumaFrame>;
}
