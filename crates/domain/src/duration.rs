//! Human time strings such as `30s`, `5m`, `2h`, `7d` and `1mo`.
//!
//! A month is a fixed 30-day span. Formatting is lossy and meant for display
//! only: it renders the largest non-zero unit plus at most one subordinate
//! unit.

use std::fmt::{Display, Formatter};

use temprank_core::{AppError, AppResult};

/// Milliseconds in one second.
pub const MILLIS_PER_SECOND: i64 = 1_000;
/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
/// Milliseconds in one hour.
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
/// Milliseconds in one 30-day month.
pub const MILLIS_PER_MONTH: i64 = 30 * MILLIS_PER_DAY;

/// Rendering of a non-positive duration.
pub const EXPIRED_LABEL: &str = "Expired";

/// Parses `<integer><unit>` into milliseconds.
///
/// Units are `s`, `m`, `h`, `d` and `mo`, matched case-insensitively. Signs,
/// whitespace and fractional amounts are rejected. `0s` parses to zero; use
/// [`GrantDuration::parse`] when a positive duration is required.
pub fn parse_duration_millis(text: &str) -> AppResult<i64> {
    let lowered = text.to_ascii_lowercase();

    let (amount, unit_millis) = if let Some(amount) = lowered.strip_suffix("mo") {
        (amount, MILLIS_PER_MONTH)
    } else if let Some(amount) = lowered.strip_suffix('s') {
        (amount, MILLIS_PER_SECOND)
    } else if let Some(amount) = lowered.strip_suffix('m') {
        (amount, MILLIS_PER_MINUTE)
    } else if let Some(amount) = lowered.strip_suffix('h') {
        (amount, MILLIS_PER_HOUR)
    } else if let Some(amount) = lowered.strip_suffix('d') {
        (amount, MILLIS_PER_DAY)
    } else {
        return Err(invalid_duration(text));
    };

    if amount.is_empty() || !amount.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid_duration(text));
    }

    amount
        .parse::<i64>()
        .ok()
        .and_then(|amount| amount.checked_mul(unit_millis))
        .ok_or_else(|| invalid_duration(text))
}

/// Formats milliseconds as a compact human string such as `1mo 3d` or `2h`.
#[must_use]
pub fn format_duration(duration_ms: i64) -> String {
    if duration_ms <= 0 {
        return EXPIRED_LABEL.to_owned();
    }

    let seconds = duration_ms / MILLIS_PER_SECOND;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    let months = days / 30;

    if months > 0 {
        with_subordinate(months, "mo", days % 30, "d")
    } else if days > 0 {
        with_subordinate(days, "d", hours % 24, "h")
    } else if hours > 0 {
        with_subordinate(hours, "h", minutes % 60, "m")
    } else if minutes > 0 {
        with_subordinate(minutes, "m", seconds % 60, "s")
    } else {
        format!("{seconds}s")
    }
}

fn with_subordinate(major: i64, major_unit: &str, minor: i64, minor_unit: &str) -> String {
    if minor > 0 {
        format!("{major}{major_unit} {minor}{minor_unit}")
    } else {
        format!("{major}{major_unit}")
    }
}

fn invalid_duration(text: &str) -> AppError {
    AppError::InvalidDuration(format!(
        "'{text}' is not a valid time, use e.g. 30s, 5m, 2h, 7d or 1mo"
    ))
}

/// A strictly positive grant length in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrantDuration(i64);

impl GrantDuration {
    /// Parses time text into a positive duration.
    pub fn parse(text: &str) -> AppResult<Self> {
        Self::from_millis(parse_duration_millis(text)?)
            .map_err(|_| AppError::InvalidDuration(format!("'{text}' must be longer than zero")))
    }

    /// Wraps a millisecond count, rejecting zero and negative values.
    pub fn from_millis(millis: i64) -> AppResult<Self> {
        if millis <= 0 {
            return Err(AppError::InvalidDuration(format!(
                "duration must be greater than zero, got {millis} ms"
            )));
        }

        Ok(Self(millis))
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl Display for GrantDuration {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(format_duration(self.0).as_str())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use temprank_core::AppError;

    use super::{
        GrantDuration, MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_MINUTE, MILLIS_PER_MONTH,
        format_duration, parse_duration_millis,
    };

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_duration_millis("30s").ok(), Some(30_000));
        assert_eq!(parse_duration_millis("5m").ok(), Some(300_000));
        assert_eq!(parse_duration_millis("2h").ok(), Some(7_200_000));
        assert_eq!(parse_duration_millis("7d").ok(), Some(604_800_000));
        assert_eq!(parse_duration_millis("1mo").ok(), Some(2_592_000_000));
    }

    #[test]
    fn units_are_case_insensitive() {
        assert_eq!(parse_duration_millis("2H").ok(), Some(7_200_000));
        assert_eq!(parse_duration_millis("3Mo").ok(), Some(3 * MILLIS_PER_MONTH));
        assert_eq!(parse_duration_millis("90M").ok(), Some(90 * MILLIS_PER_MINUTE));
    }

    #[test]
    fn zero_parses_but_is_not_a_grant_duration() {
        assert_eq!(parse_duration_millis("0s").ok(), Some(0));
        assert!(matches!(
            GrantDuration::parse("0s"),
            Err(AppError::InvalidDuration(_))
        ));
    }

    #[test]
    fn rejects_malformed_text() {
        for text in [
            "", "s", "mo", "10", "10x", "-5m", "+5m", " 5m", "5m ", "5 m", "1.5h", "5min", "1y",
            "٣m",
        ] {
            assert!(
                matches!(parse_duration_millis(text), Err(AppError::InvalidDuration(_))),
                "expected '{text}' to be rejected"
            );
        }
    }

    #[test]
    fn rejects_overflowing_amounts() {
        assert!(parse_duration_millis("99999999999999999mo").is_err());
        assert!(parse_duration_millis("99999999999999999999999s").is_err());
    }

    #[test]
    fn formats_canonical_strings() {
        assert_eq!(format_duration(0), "Expired");
        assert_eq!(format_duration(-10), "Expired");
        assert_eq!(format_duration(999), "0s");
        assert_eq!(format_duration(30_000), "30s");
        assert_eq!(format_duration(90 * MILLIS_PER_MINUTE), "1h 30m");
        assert_eq!(format_duration(2 * MILLIS_PER_HOUR), "2h");
        assert_eq!(format_duration(MILLIS_PER_DAY + 5 * MILLIS_PER_HOUR), "1d 5h");
        assert_eq!(format_duration(MILLIS_PER_MONTH + 3 * MILLIS_PER_DAY), "1mo 3d");
        assert_eq!(format_duration(12 * MILLIS_PER_DAY), "12d");
    }

    #[test]
    fn formatting_drops_units_below_the_subordinate() {
        let value = 2 * MILLIS_PER_HOUR + 5 * MILLIS_PER_MINUTE + 59_000;
        assert_eq!(format_duration(value), "2h 5m");
    }

    #[test]
    fn grant_duration_displays_formatted() {
        let duration = GrantDuration::parse("90m");
        assert!(duration.is_ok());
        let duration = duration.unwrap_or_else(|_| unreachable!());
        assert_eq!(duration.as_millis(), 5_400_000);
        assert_eq!(duration.to_string(), "1h 30m");
    }

    proptest! {
        #[test]
        fn single_unit_text_round_trips_through_format(amount in 1_i64..=23, unit_index in 0_usize..4) {
            let (suffix, unit_millis) = [
                ("s", 1_000),
                ("m", MILLIS_PER_MINUTE),
                ("h", MILLIS_PER_HOUR),
                ("d", MILLIS_PER_DAY),
            ][unit_index];
            let text = format!("{amount}{suffix}");
            let parsed = parse_duration_millis(text.as_str());
            prop_assert_eq!(parsed.ok(), Some(amount * unit_millis));
            prop_assert_eq!(format_duration(amount * unit_millis), text);
        }

        #[test]
        fn format_never_panics_and_is_never_empty(value in any::<i64>()) {
            prop_assert!(!format_duration(value).is_empty());
        }

        #[test]
        fn parse_rejects_any_text_without_a_known_unit(text in "[0-9]{1,6}[a-ce-gi-ln-rt-z]") {
            prop_assert!(parse_duration_millis(text.as_str()).is_err());
        }
    }
}
