//! Overlay timestamp grammars for the vidextract workspace.
//!
//! Recording devices burn wall-clock timestamps into the video image in a
//! handful of literal formats. This crate turns raw (and usually noisy) OCR
//! text into a canonical [`OverlayInstant`] and renders instants back into
//! literals for diagnostics and synthetic test videos.

mod format;
mod instant;

use thiserror::Error;

pub use format::TimestampFormat;
pub use instant::OverlayInstant;

/// How much surrounding OCR text to keep in error messages.
const ERROR_TEXT_LIMIT: usize = 48;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no supported timestamp grammar matched '{text}'")]
    NoGrammarMatched { text: String },

    #[error("'{literal}' matches the {format} grammar but a field is out of range")]
    FieldOutOfRange {
        format: TimestampFormat,
        literal: String,
    },
}

/// Parses overlay text into an instant.
///
/// With a `hint` only that grammar is tried. Without one, every overlay
/// grammar is tried in a fixed priority order (day-first, month-first, ISO,
/// time-only colon, time-only dot) and the first success wins. Day-first and
/// month-first literals are ambiguous whenever the day value is 12 or less;
/// the tie is broken by grammar order, never by inspecting the values.
pub fn parse_overlay(
    text: &str,
    hint: Option<TimestampFormat>,
) -> Result<OverlayInstant, ParseError> {
    if let Some(format) = hint {
        return format.parse(text);
    }

    let mut shape_failure: Option<ParseError> = None;
    for format in TimestampFormat::OVERLAY_PRIORITY {
        match format.parse(text) {
            Ok(instant) => return Ok(instant),
            Err(err @ ParseError::FieldOutOfRange { .. }) => {
                shape_failure.get_or_insert(err);
            }
            Err(ParseError::NoGrammarMatched { .. }) => {}
        }
    }

    Err(shape_failure.unwrap_or_else(|| ParseError::NoGrammarMatched {
        text: truncate_for_error(text),
    }))
}

pub(crate) fn truncate_for_error(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= ERROR_TEXT_LIMIT {
        return trimmed.to_string();
    }
    let mut cut = ERROR_TEXT_LIMIT;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn dated(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> OverlayInstant {
        OverlayInstant::Dated(
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_milli_opt(h, mi, s, ms)
                .unwrap(),
        )
    }

    fn time_of_day(h: u32, mi: u32, s: u32, ms: u32) -> OverlayInstant {
        OverlayInstant::TimeOfDay(NaiveTime::from_hms_milli_opt(h, mi, s, ms).unwrap())
    }

    #[test]
    fn day_first_wins_over_month_first() {
        let instant = parse_overlay("01/02/2023 12:34:56:789", None).unwrap();
        assert_eq!(instant, dated(2023, 2, 1, 12, 34, 56, 789));
    }

    #[test]
    fn month_first_parses_under_explicit_hint() {
        let instant =
            parse_overlay("01/02/2023 12:34:56:789", Some(TimestampFormat::MonthFirst)).unwrap();
        assert_eq!(instant, dated(2023, 1, 2, 12, 34, 56, 789));
    }

    #[test]
    fn month_first_rescues_day_out_of_range() {
        // Day-first reads this as month 13 and fails; month-first succeeds.
        let instant = parse_overlay("12/13/2023 08:00:00:000", None).unwrap();
        assert_eq!(instant, dated(2023, 12, 13, 8, 0, 0, 0));
    }

    #[test]
    fn iso_and_time_only_grammars_parse() {
        assert_eq!(
            parse_overlay("2023-02-01 12:34:56.789", None).unwrap(),
            dated(2023, 2, 1, 12, 34, 56, 789)
        );
        assert_eq!(
            parse_overlay("12:34:56:789", None).unwrap(),
            time_of_day(12, 34, 56, 789)
        );
        assert_eq!(
            parse_overlay("12:34:56.789", None).unwrap(),
            time_of_day(12, 34, 56, 789)
        );
    }

    #[test]
    fn surrounding_ocr_noise_is_tolerated() {
        let instant = parse_overlay("CAM1 | 01/02/2023 12:00:00:000 REC", None).unwrap();
        assert_eq!(instant, dated(2023, 2, 1, 12, 0, 0, 0));
    }

    #[test]
    fn no_grammar_matched_is_distinguished_from_out_of_range() {
        let err = parse_overlay("hello world", None).unwrap_err();
        assert!(matches!(err, ParseError::NoGrammarMatched { .. }));

        // Shape matches both slash grammars, but month 13 / day 33 are
        // invalid either way round, and the time-only grammars cannot save
        // an hour of 25.
        let err = parse_overlay("13/33/2023 25:00:00:000", None).unwrap_err();
        assert!(matches!(err, ParseError::FieldOutOfRange { .. }));
    }

    #[test]
    fn round_trip_every_grammar() {
        let dated_instant = dated(2023, 2, 1, 12, 34, 56, 789);
        let time_instant = time_of_day(12, 34, 56, 789);
        for format in [
            TimestampFormat::DayFirst,
            TimestampFormat::MonthFirst,
            TimestampFormat::IsoDateTime,
            TimestampFormat::Compact,
        ] {
            let literal = format.render(&dated_instant).unwrap();
            assert_eq!(format.parse(&literal).unwrap(), dated_instant, "{format}");
        }
        for format in [TimestampFormat::TimeColon, TimestampFormat::TimeDot] {
            let literal = format.render(&time_instant).unwrap();
            assert_eq!(format.parse(&literal).unwrap(), time_instant, "{format}");
        }
    }

    #[test]
    fn render_refuses_mismatched_kind() {
        assert!(
            TimestampFormat::DayFirst
                .render(&time_of_day(1, 2, 3, 4))
                .is_none()
        );
        assert!(
            TimestampFormat::TimeColon
                .render(&dated(2023, 1, 1, 0, 0, 0, 0))
                .is_none()
        );
    }

    #[test]
    fn compact_grammar_parses_range_file_rows() {
        let start = parse_overlay("20250613_132726.332", Some(TimestampFormat::Compact)).unwrap();
        let end = parse_overlay("20250613_132730.850", Some(TimestampFormat::Compact)).unwrap();
        let delta = end.since(&start).unwrap();
        assert_eq!(delta.num_milliseconds(), 4518);
    }
}
