use std::cmp::Ordering;
use std::fmt;

use tracing::{debug, warn};

use crate::cache::FrameTimestampCache;
use crate::error::LocateError;
use vidextract_timestamp::OverlayInstant;

/// Inclusive frame range; `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: u64,
    pub end: u64,
}

impl FrameRange {
    pub fn frame_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Start,
    End,
}

impl fmt::Display for BoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundKind::Start => f.write_str("start"),
            BoundKind::End => f.write_str("end"),
        }
    }
}

/// Nearest readable overlay instants found on either side of a target,
/// reported when a bound cannot be satisfied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bracket {
    pub below: Option<(u64, OverlayInstant)>,
    pub above: Option<(u64, OverlayInstant)>,
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.below {
            Some((index, instant)) => write!(f, "below: frame {index} at {instant}")?,
            None => f.write_str("below: none")?,
        }
        match &self.above {
            Some((index, instant)) => write!(f, ", above: frame {index} at {instant}"),
            None => f.write_str(", above: none"),
        }
    }
}

/// Search tunables. Defaults suit overlays that update every frame on
/// typical 24-60 fps footage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    /// Window width below which binary probing stops and the dense
    /// resolve pass takes over.
    pub tolerance_frames: u64,
    /// How far a failed probe widens to neighbors (`mid ± 1..=cap`).
    pub widen_cap: u64,
    /// Initial stride of the adaptive scan.
    pub scan_stride_start: u64,
    /// Stride ceiling while skipping unreadable stretches.
    pub scan_stride_max: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            tolerance_frames: 4,
            widen_cap: 3,
            scan_stride_start: 8,
            scan_stride_max: 64,
        }
    }
}

/// Bracketed search for the frame whose overlay instant crosses a target.
///
/// Each bound runs three phases over the cache: binary probing while
/// readable frames keep narrowing the window, an adaptive stride scan
/// across unreadable stretches, and a dense resolve pass that picks the
/// exact frame (or reports the nearest bracket on failure).
pub struct FrameLocator<'a> {
    cache: &'a FrameTimestampCache,
    config: LocatorConfig,
    frame_step: chrono::Duration,
}

struct BoundSearch {
    kind: BoundKind,
    target: OverlayInstant,
    low: u64,
    high: u64,
    /// Confirmed instants at `low`/`high`, once a probe lands there.
    low_instant: Option<OverlayInstant>,
    high_instant: Option<OverlayInstant>,
}

impl BoundSearch {
    fn width(&self) -> u64 {
        self.high - self.low
    }

    /// Whether a readable instant narrows the lower half of the window.
    /// The start bound keeps equality on the high side (first frame at or
    /// after the target); the end bound keeps it on the low side.
    fn belongs_low(&self, instant: &OverlayInstant) -> bool {
        match self.kind {
            BoundKind::Start => {
                matches!(instant.partial_cmp(&self.target), Some(Ordering::Less))
            }
            BoundKind::End => matches!(
                instant.partial_cmp(&self.target),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }

    fn narrow(&mut self, index: u64, instant: OverlayInstant) {
        if self.belongs_low(&instant) {
            self.low = index;
            self.low_instant = Some(instant);
        } else {
            self.high = index;
            self.high_instant = Some(instant);
        }
    }

    /// Rejects samples that cannot order against the target or that break
    /// monotonicity against an already-confirmed bracket edge.
    fn is_usable(&self, index: u64, instant: &OverlayInstant) -> bool {
        if instant.partial_cmp(&self.target).is_none() {
            warn!(
                frame = index,
                instant = %instant,
                "overlay instant kind differs from the target, ignoring frame"
            );
            return false;
        }
        if let Some(low) = &self.low_instant {
            if instant < low {
                warn!(
                    frame = index,
                    instant = %instant,
                    "non-monotonic overlay instant below the confirmed bracket, ignoring frame"
                );
                return false;
            }
        }
        if let Some(high) = &self.high_instant {
            if instant > high {
                warn!(
                    frame = index,
                    instant = %instant,
                    "non-monotonic overlay instant above the confirmed bracket, ignoring frame"
                );
                return false;
            }
        }
        true
    }
}

impl<'a> FrameLocator<'a> {
    pub fn new(
        cache: &'a FrameTimestampCache,
        config: LocatorConfig,
        frame_step: chrono::Duration,
    ) -> Self {
        Self {
            cache,
            config,
            frame_step,
        }
    }

    pub async fn locate(
        &self,
        start: OverlayInstant,
        end: OverlayInstant,
    ) -> Result<FrameRange, LocateError> {
        if !start.same_kind(&end) {
            return Err(LocateError::IncomparableTargets);
        }
        if start > end {
            return Err(LocateError::TargetOrder { start, end });
        }

        let start_frame = self.locate_bound(BoundKind::Start, start).await?;
        let end_frame = self.locate_bound(BoundKind::End, end).await?;
        if start_frame > end_frame {
            return Err(LocateError::EmptyRange {
                start: start_frame,
                end: end_frame,
            });
        }
        Ok(FrameRange {
            start: start_frame,
            end: end_frame,
        })
    }

    async fn locate_bound(
        &self,
        kind: BoundKind,
        target: OverlayInstant,
    ) -> Result<u64, LocateError> {
        let total = self.cache.frame_count();
        if total == 0 {
            return Err(LocateError::RangeNotFound {
                bound: kind,
                bracket: Bracket::default(),
            });
        }
        let mut search = BoundSearch {
            kind,
            target,
            low: 0,
            high: total - 1,
            low_instant: None,
            high_instant: None,
        };

        self.binary_phase(&mut search).await?;
        if search.width() > self.config.tolerance_frames {
            debug!(
                bound = %kind,
                low = search.low,
                high = search.high,
                "binary probes stalled on unreadable frames, switching to adaptive scan"
            );
            self.adaptive_scan(&mut search).await?;
        }
        self.resolve(&search).await
    }

    async fn binary_phase(&self, search: &mut BoundSearch) -> Result<(), LocateError> {
        while search.width() > self.config.tolerance_frames {
            let mid = search.low + search.width() / 2;
            match self.usable_near(search, mid).await? {
                Some((index, instant)) => search.narrow(index, instant),
                None => break,
            }
        }
        Ok(())
    }

    /// Probes `mid`, then widens to neighbors up to `widen_cap` away.
    /// Candidates stay strictly inside the window so a usable hit always
    /// shrinks it.
    async fn usable_near(
        &self,
        search: &BoundSearch,
        mid: u64,
    ) -> Result<Option<(u64, OverlayInstant)>, LocateError> {
        let interior_low = search.low + 1;
        let interior_high = search.high.saturating_sub(1);
        if interior_low > interior_high {
            return Ok(None);
        }
        let mut candidates = vec![mid.clamp(interior_low, interior_high)];
        for delta in 1..=self.config.widen_cap {
            if mid + delta <= interior_high {
                candidates.push(mid + delta);
            }
            if mid >= interior_low + delta {
                candidates.push(mid - delta);
            }
        }
        for index in candidates {
            let sample = self.cache.get_or_compute(index).await?;
            if let Some(instant) = sample.instant {
                if search.is_usable(index, &instant) {
                    return Ok(Some((index, instant)));
                }
            }
        }
        Ok(None)
    }

    /// Stride walk across the window. The stride doubles over unreadable
    /// stretches and halves once a usable instant lands within a stride
    /// of the target; overshooting the target re-brackets the window and
    /// restarts the walk inside it.
    async fn adaptive_scan(&self, search: &mut BoundSearch) -> Result<(), LocateError> {
        let stride_start = self.config.scan_stride_start.max(1);
        let stride_max = self.config.scan_stride_max.max(1);
        let mut stride = stride_start;
        let mut pos = search.low + 1;

        while pos < search.high && search.width() > self.config.tolerance_frames {
            let sample = self.cache.get_or_compute(pos).await?;
            match sample.instant {
                Some(instant) if search.is_usable(pos, &instant) => {
                    if search.belongs_low(&instant) {
                        search.low = pos;
                        search.low_instant = Some(instant);
                        if let Some(remaining) = search.target.since(&instant) {
                            if estimated_frames(remaining, self.frame_step) <= stride {
                                stride = (stride / 2).max(1);
                            }
                        }
                    } else {
                        search.high = pos;
                        search.high_instant = Some(instant);
                        pos = search.low + 1;
                        stride = stride_start;
                        continue;
                    }
                }
                _ => {
                    stride = (stride * 2).min(stride_max);
                }
            }
            pos += stride;
        }
        Ok(())
    }

    /// Dense pass over the final window. Start bound: first frame with an
    /// instant at or after the target. End bound: last frame with an
    /// instant at or before the target. Equality is inclusive on both.
    async fn resolve(&self, search: &BoundSearch) -> Result<u64, LocateError> {
        let mut bracket = Bracket::default();
        if let Some(instant) = search.low_instant {
            bracket.below = Some((search.low, instant));
        }
        if let Some(instant) = search.high_instant {
            bracket.above = Some((search.high, instant));
        }

        match search.kind {
            BoundKind::Start => {
                for index in search.low..=search.high {
                    let sample = self.cache.get_or_compute(index).await?;
                    let Some(instant) = sample.instant else {
                        continue;
                    };
                    match instant.partial_cmp(&search.target) {
                        Some(Ordering::Less) => bracket.below = Some((index, instant)),
                        Some(_) => return Ok(index),
                        None => continue,
                    }
                }
            }
            BoundKind::End => {
                for index in (search.low..=search.high).rev() {
                    let sample = self.cache.get_or_compute(index).await?;
                    let Some(instant) = sample.instant else {
                        continue;
                    };
                    match instant.partial_cmp(&search.target) {
                        Some(Ordering::Greater) => bracket.above = Some((index, instant)),
                        Some(_) => return Ok(index),
                        None => continue,
                    }
                }
            }
        }
        Err(LocateError::RangeNotFound {
            bound: search.kind,
            bracket,
        })
    }
}

fn estimated_frames(remaining: chrono::Duration, step: chrono::Duration) -> u64 {
    let step_ms = step.num_milliseconds().max(1);
    let remaining_ms = remaining.num_milliseconds().max(0);
    (remaining_ms / step_ms) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_display_reads_naturally() {
        let bracket = Bracket::default();
        assert_eq!(bracket.to_string(), "below: none, above: none");
    }

    #[test]
    fn estimated_frames_rounds_down() {
        let step = chrono::Duration::milliseconds(40);
        assert_eq!(estimated_frames(chrono::Duration::milliseconds(100), step), 2);
        assert_eq!(estimated_frames(chrono::Duration::milliseconds(-50), step), 0);
    }
}
