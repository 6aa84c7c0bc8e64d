//! Argument validation helpers.
//!
//! Construction-time checks that must fail before any hardware access.

use std::time::Duration;

use crate::error::{PinError, PinResult};
use crate::spec::PinNumber;

/// Validates a poll interval given in seconds and converts it to a
/// [`Duration`].
///
/// Zero selects the hardware's fresh-read primitive at full rate; positive
/// values pace the cached read. Negative, NaN, or infinite intervals are a
/// caller bug.
pub fn validate_interval(interval_secs: f64) -> PinResult<Duration> {
    if !interval_secs.is_finite() {
        return Err(PinError::InvalidArgument(format!(
            "poll interval must be finite, got {interval_secs}"
        )));
    }
    if interval_secs < 0.0 {
        return Err(PinError::InvalidArgument(format!(
            "poll interval must be >= 0, got {interval_secs}"
        )));
    }
    Ok(Duration::from_secs_f64(interval_secs))
}

/// Returns the first pin number that appears more than once.
pub fn find_duplicate_pin(pins: impl IntoIterator<Item = PinNumber>) -> Option<PinNumber> {
    let mut seen = std::collections::HashSet::new();
    pins.into_iter().find(|pin| !seen.insert(*pin))
}
