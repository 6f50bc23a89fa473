// SPDX-License-Identifier: BUSL-1.1
//! # Duration Expressions
//!
//! Parses human-entered sanction durations such as `"3mo 1d 2h 4m 5s"`
//! into a [`SanctionWindow`]. The grammar is a left-to-right scan of
//! `<integer><unit>` tokens; anything between or after tokens is silently
//! skipped. An input that yields no tokens — empty, absent, or entirely
//! malformed — produces the permanent marker. This is the documented
//! "null means infinite" contract: the parser has no error path.
//!
//! Units are calendar-naive fixed lengths (a month is 30 days, a year
//! 365).

use chrono::{DateTime, Utc};

use crate::sanction::SanctionWindow;

/// Recognized units, in match order. `mo` must be tried before `m` so
/// `"1mo"` is not read as one minute followed by a stray `o`.
const UNITS: &[(&str, u64)] = &[
    ("mo", 30 * 86400),
    ("y", 365 * 86400),
    ("w", 7 * 86400),
    ("d", 86400),
    ("h", 3600),
    ("m", 60),
    ("s", 1),
];

/// Parse a duration expression into a sanction window starting at `now`.
///
/// Absent, empty, or token-free input produces [`SanctionWindow::permanent`].
pub fn parse_duration(input: Option<&str>, now: DateTime<Utc>) -> SanctionWindow {
    let Some(raw) = input else {
        return SanctionWindow::permanent(now);
    };
    let raw = raw.trim();
    let bytes = raw.as_bytes();

    let mut total: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let Ok(value) = raw[start..i].parse::<u64>() else {
            // Digit run too large for u64; skip it like any other junk.
            continue;
        };
        let rest = &raw[i..];
        if let Some((unit, secs)) = UNITS.iter().find(|(unit, _)| rest.starts_with(unit)) {
            total = total.saturating_add(value.saturating_mul(*secs));
            i += unit.len();
        }
    }

    if total == 0 {
        return SanctionWindow::permanent(now);
    }
    SanctionWindow::bounded(total, now)
}

/// Render a second count as a human-readable length using the largest
/// whole unit: `"3 days"`, `"1 hour"`, `"45 seconds"`.
pub fn format_duration(seconds: u64) -> String {
    let (value, unit) = if seconds >= 86400 {
        (seconds / 86400, "day")
    } else if seconds >= 3600 {
        (seconds / 3600, "hour")
    } else if seconds >= 60 {
        (seconds / 60, "minute")
    } else {
        (seconds, "second")
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural}")
}
