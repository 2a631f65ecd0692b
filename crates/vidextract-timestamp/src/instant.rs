use std::cmp::Ordering;
use std::fmt;

use chrono::{Duration, NaiveDateTime, NaiveTime};

/// Canonical, comparable time value produced by parsing an overlay literal.
///
/// Two instants are ordered only when both carry a date or both are
/// time-of-day values (treated as falling on the same day); comparing a
/// dated instant against an undated one yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayInstant {
    Dated(NaiveDateTime),
    TimeOfDay(NaiveTime),
}

impl OverlayInstant {
    pub fn is_dated(&self) -> bool {
        matches!(self, Self::Dated(_))
    }

    pub fn same_kind(&self, other: &Self) -> bool {
        self.is_dated() == other.is_dated()
    }

    /// Signed duration `self - earlier`, or `None` for mixed kinds.
    pub fn since(&self, earlier: &Self) -> Option<Duration> {
        match (self, earlier) {
            (Self::Dated(a), Self::Dated(b)) => Some(a.signed_duration_since(*b)),
            (Self::TimeOfDay(a), Self::TimeOfDay(b)) => Some(a.signed_duration_since(*b)),
            _ => None,
        }
    }

    /// The instant shifted by `delta`. Time-of-day values wrap at midnight,
    /// matching how an overlay clock without a date behaves.
    pub fn advanced_by(&self, delta: Duration) -> Self {
        match self {
            Self::Dated(dt) => Self::Dated(*dt + delta),
            Self::TimeOfDay(t) => Self::TimeOfDay(t.overflowing_add_signed(delta).0),
        }
    }
}

impl PartialOrd for OverlayInstant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Dated(a), Self::Dated(b)) => Some(a.cmp(b)),
            (Self::TimeOfDay(a), Self::TimeOfDay(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for OverlayInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dated(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            Self::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S%.3f")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> OverlayInstant {
        OverlayInstant::TimeOfDay(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
    }

    fn dated_noon() -> OverlayInstant {
        OverlayInstant::Dated(
            NaiveDate::from_ymd_opt(2023, 2, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn mixed_kinds_are_incomparable() {
        assert_eq!(noon().partial_cmp(&dated_noon()), None);
        assert_eq!(noon().since(&dated_noon()), None);
    }

    #[test]
    fn same_kind_orders_and_subtracts() {
        let later = noon().advanced_by(Duration::milliseconds(250));
        assert!(later > noon());
        assert_eq!(later.since(&noon()).unwrap().num_milliseconds(), 250);
    }

    #[test]
    fn time_of_day_wraps_at_midnight() {
        let just_before = OverlayInstant::TimeOfDay(
            NaiveTime::from_hms_milli_opt(23, 59, 59, 900).unwrap(),
        );
        let wrapped = just_before.advanced_by(Duration::milliseconds(200));
        assert_eq!(
            wrapped,
            OverlayInstant::TimeOfDay(NaiveTime::from_hms_milli_opt(0, 0, 0, 100).unwrap())
        );
    }
}
