//! Small helpers shared across crates.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in seconds.
///
/// Returns 0 if the system clock is set before the epoch.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
