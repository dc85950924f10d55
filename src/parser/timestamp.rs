//! Timestamp normalization for the supported source layouts.
//!
//! Each raw timestamp is routed to exactly one layout by an ordered list of
//! `(predicate, layout)` rules. The first rule whose predicate accepts the
//! input decides the layout; there is no fallthrough to later layouts, so a
//! bracketed timestamp is never tried against the UTC layout or vice versa.

use crate::domain::NormalizedTimestamp;
use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimestampError {
    #[error("Empty timestamp")]
    Empty,

    #[error("Timestamp '{input}' does not match the {layout} layout: {reason}")]
    LayoutMismatch {
        input: String,
        layout: &'static str,
        reason: String,
    },
}

/// How a layout's format string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutKind {
    /// Carries a numeric `±hhmm` offset; the wall-clock time is kept as written
    WithOffset,
    /// No offset component
    Naive,
}

#[derive(Debug, Clone, Copy)]
pub struct TimestampLayout {
    pub name: &'static str,
    pub format: &'static str,
    kind: LayoutKind,
}

/// Bracketed access-log layout, e.g. `10/Oct/2024:13:55:36 +0200`.
pub const BRACKETED_LAYOUT: TimestampLayout = TimestampLayout {
    name: "bracketed",
    format: "%d/%b/%Y:%H:%M:%S %z",
    kind: LayoutKind::WithOffset,
};

/// Tabular layout, e.g. `2024-10-10 13:55:36 UTC`.
pub const UTC_LAYOUT: TimestampLayout = TimestampLayout {
    name: "utc",
    format: "%Y-%m-%d %H:%M:%S UTC",
    kind: LayoutKind::Naive,
};

struct LayoutRule {
    applies: fn(&str) -> bool,
    layout: TimestampLayout,
}

fn is_utc_suffixed(raw: &str) -> bool {
    raw.ends_with("UTC")
}

fn is_offset_style(raw: &str) -> bool {
    !is_utc_suffixed(raw)
}

static LAYOUT_RULES: &[LayoutRule] = &[
    LayoutRule {
        applies: is_utc_suffixed,
        layout: UTC_LAYOUT,
    },
    LayoutRule {
        applies: is_offset_style,
        layout: BRACKETED_LAYOUT,
    },
];

impl TimestampLayout {
    fn parse(&self, raw: &str) -> Result<NaiveDateTime, TimestampError> {
        let parsed = match self.kind {
            LayoutKind::WithOffset => {
                DateTime::parse_from_str(raw, self.format).map(|dt| dt.naive_local())
            }
            LayoutKind::Naive => NaiveDateTime::parse_from_str(raw, self.format),
        };

        parsed.map_err(|e| TimestampError::LayoutMismatch {
            input: raw.to_string(),
            layout: self.name,
            reason: e.to_string(),
        })
    }
}

/// Resolve the layout for `raw` and parse it.
pub fn normalize(raw: &str) -> Result<NormalizedTimestamp, TimestampError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TimestampError::Empty);
    }

    // The rule table is exhaustive; the fallback only keeps this total.
    let layout = LAYOUT_RULES
        .iter()
        .find(|rule| (rule.applies)(raw))
        .map_or(BRACKETED_LAYOUT, |rule| rule.layout);

    layout.parse(raw).map(NormalizedTimestamp::new)
}

/// Hour, minute and second of `raw`.
pub fn normalize_to_hms(raw: &str) -> Result<(u32, u32, u32), TimestampError> {
    normalize(raw).map(|ts| ts.hms())
}

/// `raw` in the tracker's `YYYY-MM-DD HH:MM:SS` layout.
pub fn normalize_to_wire_format(raw: &str) -> Result<String, TimestampError> {
    normalize(raw).map(|ts| ts.wire_format())
}
