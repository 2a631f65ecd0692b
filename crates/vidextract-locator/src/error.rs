use thiserror::Error;

use crate::locator::{BoundKind, Bracket};
use vidextract_ocr::OcrError;
use vidextract_timestamp::OverlayInstant;
use vidextract_types::FrameError;

#[derive(Debug, Error)]
pub enum LocateError {
    /// No frame satisfies the bound. Recoverable; the bracket names the
    /// nearest overlay readings found on either side of the target.
    #[error("no frame satisfies the {bound} bound ({bracket})")]
    RangeNotFound { bound: BoundKind, bracket: Bracket },

    #[error("resolved range is empty: start frame {start} is after end frame {end}")]
    EmptyRange { start: u64, end: u64 },

    #[error("start and end timestamps mix dated and time-of-day values")]
    IncomparableTargets,

    #[error("start timestamp {start} is after end timestamp {end}")]
    TargetOrder {
        start: OverlayInstant,
        end: OverlayInstant,
    },

    #[error("video metadata does not expose a usable frame count and frame rate")]
    UnknownTimeline,

    /// Cooperative cancellation; a normal terminal outcome, not a failure.
    #[error("locate cancelled")]
    Cancelled,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("recognition task aborted: {message}")]
    TaskAborted { message: String },
}
