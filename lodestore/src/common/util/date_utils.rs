use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{ErrorKind, LodeError, LodeResult};

// Fast path: returns 0 on any error instead of double error handling
#[inline]
pub fn get_current_time_or_zero() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Current time with millisecond precision, the resolution dates are stored with.
#[inline]
pub fn now_utc() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Drops sub-millisecond precision so a date compares equal after a log round trip.
#[inline]
pub fn truncate_to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(date.timestamp_millis()).unwrap_or(date)
}

/// Converts milliseconds since the epoch into a date.
pub fn date_from_millis(millis: i64) -> LodeResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        log::error!("Timestamp {} is out of the supported date range", millis);
        LodeError::new(
            &format!("Timestamp {} is out of the supported date range", millis),
            ErrorKind::EncodingError,
        )
    })
}
