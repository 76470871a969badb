//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Unix-epoch milliseconds, the unit report and login timestamps are stored in.
/// A clock set before the epoch reads as 0.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
