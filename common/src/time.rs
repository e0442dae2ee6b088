// Timestamps are taken from the local clock and recorded on settlement
// entries and withdrawal requests. They never drive any decision.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Milliseconds since the epoch
pub type TimestampMillis = u64;

#[inline]
pub fn get_current_time() -> Duration {
    // A clock set before 1970 is reported as the epoch
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

// Return timestamp in milliseconds
pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}
