use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Whole seconds from `start` to `end`, zero when `end` is not after `start`.
pub fn seconds_between(start: OffsetDateTime, end: OffsetDateTime) -> u64 {
    let seconds = (end - start).whole_seconds();
    if seconds < 0 {
        0
    } else {
        seconds as u64
    }
}
