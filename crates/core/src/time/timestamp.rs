use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses an export timestamp into UTC.
///
/// Offsets are honoured; values without one are taken as UTC, and a bare date is midnight UTC.
pub fn parse_utc(field: &'static str, raw: &str) -> EngineResult<DateTime<Utc>> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Trailing "Z" is not accepted by %z.
    let offset_input = match s.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => s.to_string(),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&offset_input, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(EngineError::MalformedTimestamp {
        field,
        value: raw.to_string(),
    })
}

/// Formats a resolved send time the way downstream reporting expects it.
pub fn format_send_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_offset_timestamps_into_utc() {
        let dt = parse_utc("sent_at", "2021-08-02 09:46:49.123456+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2021-08-02T07:46:49.123456+00:00");
    }

    #[test]
    fn parses_rfc3339_and_zulu() {
        let a = parse_utc("sent_at", "2021-08-02T07:46:49Z").unwrap();
        let b = parse_utc("sent_at", "2021-08-02 07:46:49Z").unwrap();
        assert_eq!(a, Utc.with_ymd_and_hms(2021, 8, 2, 7, 46, 49).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn treats_naive_values_as_utc() {
        let dt = parse_utc("created_at", "2021-01-05 23:00:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2021, 1, 5, 23, 0, 0).unwrap());

        let date_only = parse_utc("created_at", "2021-01-05").unwrap();
        assert_eq!(date_only, Utc.with_ymd_and_hms(2021, 1, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage_with_raw_value() {
        let err = parse_utc("sent_at", "yesterday-ish").unwrap_err();
        assert_eq!(
            err,
            EngineError::MalformedTimestamp {
                field: "sent_at",
                value: "yesterday-ish".to_string()
            }
        );
    }

    #[test]
    fn formats_with_microseconds_and_utc_suffix() {
        let dt = Utc.with_ymd_and_hms(2021, 10, 4, 9, 0, 0).unwrap();
        assert_eq!(format_send_time(dt), "2021-10-04 09:00:00.000000+00:00");
    }
}
