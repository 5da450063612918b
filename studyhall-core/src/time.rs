/// Timestamp normalization helpers
///
/// All stored timestamps are timezone-aware (`DateTime<Utc>`). Input that
/// arrives as text, however, may lack an explicit offset: deadlines typed
/// by users, rows imported from older deployments that stored local wall
/// time. Such values are localized to the configured deployment offset
/// before any arithmetic; a naive value never meets an aware one in a
/// subtraction.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Accepted layouts for timestamps without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Timestamp parse error
#[derive(Debug, Error)]
pub enum TimestampError {
    /// Input matched no accepted layout
    #[error("unrecognized timestamp: {0:?}")]
    Unrecognized(String),

    /// Input fell in a gap or fold of the configured offset
    #[error("ambiguous local timestamp: {0:?}")]
    AmbiguousLocal(String),
}

/// Parses a timestamp, localizing offset-less input to `tz`.
///
/// Values carrying an explicit offset (RFC 3339) are honored as written;
/// everything else is interpreted as wall time in the configured offset.
///
/// # Example
///
/// ```
/// use chrono::FixedOffset;
/// use studyhall_core::time::parse_timestamp;
///
/// let tz: FixedOffset = "+05:00".parse().unwrap();
/// let aware = parse_timestamp("2024-06-01T12:00:00+05:00", tz).unwrap();
/// let naive = parse_timestamp("2024-06-01 12:00", tz).unwrap();
/// assert_eq!(aware.timestamp(), naive.timestamp());
/// ```
pub fn parse_timestamp(input: &str, tz: FixedOffset) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = input.trim();

    if let Ok(aware) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(aware.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return naive
                .and_local_timezone(tz)
                .single()
                .map(|local| local.with_timezone(&Utc))
                .ok_or_else(|| TimestampError::AmbiguousLocal(trimmed.to_string()));
        }
    }

    Err(TimestampError::Unrecognized(trimmed.to_string()))
}

/// Calendar day of `now` in the configured offset.
///
/// Usage counters bucket by this day, so "a new day" matches the audience's
/// wall clock rather than UTC midnight.
pub fn local_day(now: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tz() -> FixedOffset {
        "+05:00".parse().unwrap()
    }

    #[test]
    fn test_parse_honors_explicit_offset() {
        let parsed = parse_timestamp("2024-06-01T12:00:00+02:00", tz()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_localizes_naive_input() {
        for input in ["2024-06-01T12:00:00", "2024-06-01 12:00:00", "2024-06-01 12:00"] {
            let parsed = parse_timestamp(input, tz()).unwrap();
            assert_eq!(
                parsed,
                Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap(),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("tomorrow-ish", tz()).is_err());
        assert!(parse_timestamp("", tz()).is_err());
    }

    #[test]
    fn test_local_day_crosses_utc_midnight() {
        // 21:30 UTC is already the next day at +05:00
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 21, 30, 0).unwrap();
        assert_eq!(
            local_day(now, tz()),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
        );
    }
}
