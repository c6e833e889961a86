//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds elapsed since `since`, clamped at zero for clock skew
pub fn elapsed_ms(since: DateTime<Utc>) -> u64 {
    (now() - since).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_elapsed_ms_advances() {
        let start = now();
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert!(elapsed_ms(start) >= 10);
    }

    #[test]
    fn test_elapsed_ms_future_is_zero() {
        let future = now() + Duration::seconds(60);
        assert_eq!(elapsed_ms(future), 0);
    }
}
