use chrono::{DateTime, NaiveDateTime};

/// Parse a timestamp cell into Unix seconds.
///
/// Flow exports disagree on timestamp formats, so several are tried in
/// order: RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`, `DD/MM/YYYY HH:MM[:SS]`,
/// and raw epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp());
        }
    }

    // Raw epoch seconds, integer or fractional
    if let Ok(secs) = value.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() {
            return Some(secs as i64);
        }
    }

    None
}
