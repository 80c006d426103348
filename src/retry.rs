//! Retry and backoff utilities for camera acquisition.
//!
//! A busy or briefly missing camera is retried with exponential backoff.
//! Permission denials are never retried: they need the user.

use std::time::Duration;

use crate::capture::CaptureError;

/// Default number of extra acquisition attempts after a transient failure.
pub const DEFAULT_ACQUIRE_RETRIES: u32 = 2;

/// Base delay for exponential backoff (200 milliseconds).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Maximum delay cap for exponential backoff (2 seconds).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(2);

/// Whether an acquisition error is worth retrying automatically.
pub fn is_retryable(error: &CaptureError) -> bool {
    error.is_transient()
}

/// Calculate exponential backoff delay with jitter.
///
/// Uses the formula: min(base * 2^attempt + jitter, max_delay)
/// where jitter is half the base, capped at 500ms.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_ms = (base.as_millis() as u64).min(1000);
    let jitter = Duration::from_millis(jitter_ms / 2);
    exponential.saturating_add(jitter).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_first_attempt() {
        let delay = calculate_backoff(0, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        // 200ms + 100ms jitter
        assert_eq!(delay, Duration::from_millis(300));
    }

    #[test]
    fn test_calculate_backoff_grows() {
        let first = calculate_backoff(0, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        let second = calculate_backoff(1, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        let third = calculate_backoff(2, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn test_calculate_backoff_respects_max() {
        let delay = calculate_backoff(10, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        assert_eq!(delay, DEFAULT_BACKOFF_MAX);
    }

    #[test]
    fn test_calculate_backoff_huge_attempt_saturates() {
        let delay = calculate_backoff(u32::MAX, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&CaptureError::DeviceUnavailable(
            "busy".to_string()
        )));
        assert!(!is_retryable(&CaptureError::PermissionDenied));
        assert!(!is_retryable(&CaptureError::NotSupported(
            "camera".to_string()
        )));
    }
}
