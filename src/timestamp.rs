//! Conversions between ZIP entry timestamps and system time.
//!
//! ZIP archives store modification times in MS-DOS format with 2-second
//! resolution and a representable range of 1980..=2107. Conversions outside
//! that range fall back to the codec's default epoch rather than failing,
//! since a slightly wrong timestamp never justifies aborting a rewrite.

use std::time::SystemTime;

use time::OffsetDateTime;
use zip::DateTime;

/// Converts a ZIP timestamp to a `SystemTime`, if representable.
pub(crate) fn to_system_time(dt: DateTime) -> Option<SystemTime> {
    OffsetDateTime::try_from(dt).ok().map(SystemTime::from)
}

/// Converts a `SystemTime` to a ZIP timestamp, if representable.
pub(crate) fn from_system_time(t: SystemTime) -> Option<DateTime> {
    DateTime::try_from(OffsetDateTime::from(t)).ok()
}

/// Returns the current time as a ZIP timestamp.
///
/// Falls back to the DOS epoch if the clock is outside the representable
/// range.
pub(crate) fn now_or_default() -> DateTime {
    DateTime::try_from(OffsetDateTime::now_utc()).unwrap_or_default()
}
