use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::instant::OverlayInstant;
use crate::{ParseError, truncate_for_error};

static SLASH_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}:\d{3}").unwrap());
static ISO_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}").unwrap());
static TIME_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}:\d{3}").unwrap());
static TIME_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}\.\d{3}").unwrap());
static COMPACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{8}_\d{6}\.\d{3}").unwrap());

/// A recognized overlay literal grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    /// `DD/MM/YYYY HH:MM:SS:mmm`
    DayFirst,
    /// `MM/DD/YYYY HH:MM:SS:mmm`
    MonthFirst,
    /// `YYYY-MM-DD HH:MM:SS.mmm`
    IsoDateTime,
    /// `HH:MM:SS:mmm`
    TimeColon,
    /// `HH:MM:SS.mmm`
    TimeDot,
    /// `YYYYMMDD_HHMMSS.mmm`, the batch range-file grammar. Not part of the
    /// overlay priority order; it is only selected explicitly.
    Compact,
}

impl TimestampFormat {
    /// Grammars tried, in order, when no hint is given. The order is the
    /// tie-break for ambiguous day/month literals.
    pub const OVERLAY_PRIORITY: [TimestampFormat; 5] = [
        TimestampFormat::DayFirst,
        TimestampFormat::MonthFirst,
        TimestampFormat::IsoDateTime,
        TimestampFormat::TimeColon,
        TimestampFormat::TimeDot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampFormat::DayFirst => "day-first",
            TimestampFormat::MonthFirst => "month-first",
            TimestampFormat::IsoDateTime => "iso",
            TimestampFormat::TimeColon => "time-colon",
            TimestampFormat::TimeDot => "time-dot",
            TimestampFormat::Compact => "compact",
        }
    }

    pub fn is_dated(&self) -> bool {
        !matches!(self, TimestampFormat::TimeColon | TimestampFormat::TimeDot)
    }

    fn shape(&self) -> &'static Regex {
        match self {
            TimestampFormat::DayFirst | TimestampFormat::MonthFirst => &SLASH_DATETIME,
            TimestampFormat::IsoDateTime => &ISO_DATETIME,
            TimestampFormat::TimeColon => &TIME_COLON,
            TimestampFormat::TimeDot => &TIME_DOT,
            TimestampFormat::Compact => &COMPACT,
        }
    }

    fn chrono_format(&self) -> &'static str {
        match self {
            TimestampFormat::DayFirst => "%d/%m/%Y %H:%M:%S:%3f",
            TimestampFormat::MonthFirst => "%m/%d/%Y %H:%M:%S:%3f",
            TimestampFormat::IsoDateTime => "%Y-%m-%d %H:%M:%S%.3f",
            TimestampFormat::TimeColon => "%H:%M:%S:%3f",
            TimestampFormat::TimeDot => "%H:%M:%S%.3f",
            TimestampFormat::Compact => "%Y%m%d_%H%M%S%.3f",
        }
    }

    /// Parses the first literal of this grammar found inside `text`.
    ///
    /// OCR output routinely carries noise around the timestamp, so the
    /// grammar is searched as a substring rather than matched exactly.
    pub fn parse(&self, text: &str) -> Result<OverlayInstant, ParseError> {
        let matched = self
            .shape()
            .find(text)
            .ok_or_else(|| ParseError::NoGrammarMatched {
                text: truncate_for_error(text),
            })?;
        let literal = matched.as_str();
        let out_of_range = || ParseError::FieldOutOfRange {
            format: *self,
            literal: literal.to_string(),
        };
        if self.is_dated() {
            NaiveDateTime::parse_from_str(literal, self.chrono_format())
                .map(OverlayInstant::Dated)
                .map_err(|_| out_of_range())
        } else {
            NaiveTime::parse_from_str(literal, self.chrono_format())
                .map(OverlayInstant::TimeOfDay)
                .map_err(|_| out_of_range())
        }
    }

    /// Renders an instant as a literal of this grammar, or `None` when the
    /// instant kind does not fit (a time-of-day cannot carry a date).
    pub fn render(&self, instant: &OverlayInstant) -> Option<String> {
        match (self.is_dated(), instant) {
            (true, OverlayInstant::Dated(dt)) => {
                Some(dt.format(self.chrono_format()).to_string())
            }
            (false, OverlayInstant::TimeOfDay(t)) => {
                Some(t.format(self.chrono_format()).to_string())
            }
            _ => None,
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day-first" => Ok(TimestampFormat::DayFirst),
            "month-first" => Ok(TimestampFormat::MonthFirst),
            "iso" => Ok(TimestampFormat::IsoDateTime),
            "time-colon" => Ok(TimestampFormat::TimeColon),
            "time-dot" => Ok(TimestampFormat::TimeDot),
            "compact" => Ok(TimestampFormat::Compact),
            other => Err(format!("unknown timestamp format '{other}'")),
        }
    }
}
