use httpdate::parse_http_date;
use std::time::{Duration, SystemTime};

/// How long sends pause after a 429 response without a `Retry-After` header.
const DEFAULT_429_BACKOFF: Duration = Duration::from_secs(60);

/// A Utility that helps with rate limiting requests to the collection
/// endpoints.
#[derive(Debug, Default)]
pub struct RateLimiter {
    disabled_until: Option<SystemTime>,
}

impl RateLimiter {
    /// Create a new RateLimiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the RateLimiter with information from a `Retry-After` header.
    ///
    /// Returns how long to wait from now, if the header could be parsed.
    pub fn update_from_retry_after(&mut self, header: &str) -> Option<Duration> {
        let new_time = if let Ok(value) = header.trim().parse::<f64>() {
            SystemTime::now() + Duration::from_secs(value.max(0.0).ceil() as u64)
        } else if let Ok(value) = parse_http_date(header.trim()) {
            value
        } else {
            return None;
        };

        self.disabled_until = Some(new_time);
        Some(
            new_time
                .duration_since(SystemTime::now())
                .unwrap_or_default(),
        )
    }

    /// Updates the RateLimiter after a 429 response without a header.
    ///
    /// Returns how long to wait from now.
    pub fn update_from_429(&mut self) -> Duration {
        self.disabled_until = Some(SystemTime::now() + DEFAULT_429_BACKOFF);
        DEFAULT_429_BACKOFF
    }

    /// Query the RateLimiter.  Returns the time left if sends are disabled.
    pub fn is_disabled(&self) -> Option<Duration> {
        let ts = self.disabled_until?;
        ts.duration_since(SystemTime::now()).ok()
    }
}
