//! Timestamp parsing and formatting utilities.
//!
//! Moments arrive as `HH:MM:SS.mmm` wall-clock strings; captions leave as SRT
//! `HH:MM:SS,mmm` strings. Both directions live here.

/// Maximum reasonable media duration (24 hours in seconds).
pub const MAX_MEDIA_DURATION_SECS: f64 = 86400.0;

/// Parse a timestamp string to total seconds.
///
/// Supports formats:
/// - `HH:MM:SS` or `HH:MM:SS.mmm`
/// - `MM:SS` or `MM:SS.mmm`
/// - `SS` or `SS.mmm`
///
/// # Examples
/// ```
/// use mclip_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00.000").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [s] => ("0", "0", *s),
        [m, s] => ("0", *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    let hours = parse_component("hours", hours)?;
    let minutes = parse_component("minutes", minutes)?;
    let seconds = parse_component("seconds", seconds)?;

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    if total > MAX_MEDIA_DURATION_SECS {
        return Err(TimestampError::ExceedsMaxDuration(MAX_MEDIA_DURATION_SECS));
    }
    Ok(total)
}

fn parse_component(name: &'static str, raw: &str) -> Result<f64, TimestampError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| TimestampError::InvalidValue(name, raw.to_string()))?;
    if !value.is_finite() {
        return Err(TimestampError::InvalidValue(name, raw.to_string()));
    }
    if value < 0.0 {
        return Err(TimestampError::Negative);
    }
    Ok(value)
}

/// Format seconds into `HH:MM:SS.mmm`.
///
/// # Examples
/// ```
/// use mclip_models::timestamp::format_seconds;
/// assert_eq!(format_seconds(3661.5), "01:01:01.500");
/// ```
pub fn format_seconds(total_secs: f64) -> String {
    let (hours, mins, secs, millis) = split_millis(total_secs);
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
}

/// Format seconds into the SRT `HH:MM:SS,mmm` form.
pub fn format_srt_timestamp(total_secs: f64) -> String {
    let (hours, mins, secs, millis) = split_millis(total_secs);
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

fn split_millis(total_secs: f64) -> (u64, u64, u64, u64) {
    let total_millis = (total_secs.max(0.0) * 1000.0).round() as u64;
    let millis = total_millis % 1000;
    let total = total_millis / 1000;
    (total / 3600, (total % 3600) / 60, total % 60, millis)
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS.mmm, MM:SS or SS")]
    InvalidFormat(String),

    #[error("Timestamp exceeds maximum allowed duration ({0} seconds)")]
    ExceedsMaxDuration(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_hh_mm_ss() {
        assert_eq!(parse_timestamp("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timestamp("00:01:00").unwrap(), 60.0);
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
    }

    #[test]
    fn test_parse_timestamp_with_milliseconds() {
        let result = parse_timestamp("00:00:30.500").unwrap();
        assert!((result - 30.5).abs() < 0.001);
        let result = parse_timestamp("01:00:05.250").unwrap();
        assert!((result - 3605.25).abs() < 0.001);
    }

    #[test]
    fn test_parse_timestamp_short_forms() {
        assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
        assert_eq!(parse_timestamp("90").unwrap(), 90.0);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp(""), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("abc"), Err(TimestampError::InvalidValue(_, _))));
        assert!(matches!(parse_timestamp("1:2:3:4"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_timestamp("-1:00"), Err(TimestampError::Negative)));
        assert!(matches!(
            parse_timestamp("25:00:00.000"),
            Err(TimestampError::ExceedsMaxDuration(_))
        ));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "00:00:00.000");
        assert_eq!(format_seconds(90.0), "00:01:30.000");
        assert_eq!(format_seconds(3605.25), "01:00:05.250");
    }

    #[test]
    fn test_format_srt_timestamp() {
        assert_eq!(format_srt_timestamp(1.5), "00:00:01,500");
        assert_eq!(format_srt_timestamp(-3.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(59.9999), "00:01:00,000");
    }
}
