//! Pure expiry policy: calendar-month arithmetic and the expiration test.

use chrono::{DateTime, Months, Utc};

/// Add `months` calendar months to `from`.
///
/// Day-of-month is clamped to the last valid day of the target month, so
/// Jan 31 + 1 month = Feb 28 (29 in leap years). Overflow past the maximum
/// representable date saturates.
pub fn add_months(from: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    from.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True iff `expires_at` has passed. Hitting the boundary exactly counts
/// as expired.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}
