use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::{LogsiftError, Result};
use crate::model::value::TIMESTAMP_FORMAT;

pub fn parse_log_timestamp(input: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), TIMESTAMP_FORMAT).ok()
}

/// Renders a naive timestamp written at `offset` as the UTC boundary string the
/// search backend expects, e.g. `2025-02-21T09:00:00.000Z`.
pub fn to_search_boundary(ts: NaiveDateTime, offset: FixedOffset) -> Result<String> {
    let local = offset
        .from_local_datetime(&ts)
        .single()
        .ok_or_else(|| LogsiftError::Parse(format!("ambiguous local time: {ts}")))?;
    Ok(local
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_timestamps() {
        let ts = parse_log_timestamp("2024-05-01 10:00:00").unwrap();
        assert_eq!(ts.to_string(), "2024-05-01 10:00:00");
        assert!(parse_log_timestamp("2024-05-01T10:00:00Z").is_none());
        assert!(parse_log_timestamp("yesterday").is_none());
    }

    #[test]
    fn boundary_shifts_into_utc() {
        let ts = parse_log_timestamp("2025-03-01 00:30:00").unwrap();
        let offset = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            to_search_boundary(ts, offset).unwrap(),
            "2025-02-28T23:30:00.000Z"
        );
    }
}
