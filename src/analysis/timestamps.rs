//! Timestamp Conversion
//!
//! Hedge-group records carry ISO-8601 strings with microsecond precision
//! (`YYYY-MM-DDTHH:MM:SS.ffffff`, UTC, no zone suffix). Tick archives carry
//! integer nanoseconds since the Unix epoch. Everything inside the analysis
//! core works in [`Nanos`].

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::error::AnalysisError;

/// Nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
pub type Nanos = i64;

pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

const ISO_FORMAT_IN: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_FORMAT_OUT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Parse an ISO-8601 timestamp into epoch nanoseconds.
///
/// Naive timestamps are UTC. A trailing `Z` or numeric offset is honoured.
pub fn parse_iso8601(value: &str) -> Result<Nanos, AnalysisError> {
    let trimmed = value.trim();

    let parsed = match NaiveDateTime::parse_from_str(trimmed, ISO_FORMAT_IN) {
        Ok(naive) => Ok(Utc.from_utc_datetime(&naive)),
        Err(naive_err) => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| naive_err),
    };

    let dt = parsed.map_err(|e| AnalysisError::Parse {
        context: "timestamp".to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    dt.timestamp_nanos_opt().ok_or_else(|| AnalysisError::Parse {
        context: "timestamp".to_string(),
        value: value.to_string(),
        reason: "outside the representable nanosecond range".to_string(),
    })
}

/// Render epoch nanoseconds as `YYYY-MM-DDTHH:MM:SS.ffffff` (UTC).
///
/// Sub-microsecond digits are dropped, matching the producer's format.
pub fn format_iso8601(ns: Nanos) -> String {
    Utc.timestamp_nanos(ns).format(ISO_FORMAT_OUT).to_string()
}

/// `serialize_with` helper writing [`Nanos`] as an ISO-8601 string.
pub fn serialize_iso8601<S>(ns: &Nanos, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_iso8601(*ns))
}

/// Shift a timestamp by whole milliseconds.
#[inline]
pub fn add_millis(ns: Nanos, ms: i64) -> Nanos {
    ns + ms * NANOS_PER_MILLI
}

/// Whole milliseconds from `start` to `end`, truncated toward zero.
#[inline]
pub fn diff_millis(start: Nanos, end: Nanos) -> i64 {
    (end - start) / NANOS_PER_MILLI
}

/// Fractional milliseconds from `start` to `end`.
#[inline]
pub fn diff_millis_f64(start: Nanos, end: Nanos) -> f64 {
    (end - start) as f64 / NANOS_PER_MILLI as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_naive_microseconds_as_utc() {
        let ns = parse_iso8601("1970-01-01T00:00:01.000250").unwrap();
        assert_eq!(ns, NANOS_PER_SEC + 250 * NANOS_PER_MICRO);
    }

    #[test]
    fn test_parse_with_zone_suffix() {
        let naive = parse_iso8601("2025-03-10T12:00:00.123456").unwrap();
        let zulu = parse_iso8601("2025-03-10T12:00:00.123456Z").unwrap();
        let offset = parse_iso8601("2025-03-10T14:00:00.123456+02:00").unwrap();
        assert_eq!(naive, zulu);
        assert_eq!(naive, offset);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_iso8601("yesterday").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
        assert!(parse_iso8601("N/A").is_err());
    }

    #[test]
    fn test_format_roundtrip() {
        let s = "2025-03-10T12:34:56.000789";
        assert_eq!(format_iso8601(parse_iso8601(s).unwrap()), s);
    }

    #[test]
    fn test_add_millis_crosses_second_boundary() {
        let send = parse_iso8601("2025-03-10T12:34:56.990000").unwrap();
        assert_eq!(format_iso8601(add_millis(send, 20)), "2025-03-10T12:34:57.010000");

        let send = parse_iso8601("2025-03-10T23:59:59.950001").unwrap();
        assert_eq!(format_iso8601(add_millis(send, 100)), "2025-03-11T00:00:00.050001");
    }

    #[test]
    fn test_diff_millis_truncates() {
        assert_eq!(diff_millis(0, 19_999_999), 19);
        assert_eq!(diff_millis(0, 20_000_000), 20);
        assert_eq!(diff_millis(20_000_000, 0), -20);
        assert!((diff_millis_f64(0, 1_500_000) - 1.5).abs() < 1e-12);
    }
}
