use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client-side throttle shared by every request to one environment
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RequestThrottle {
    pub fn new(requests: u32, per_seconds: u64) -> Self {
        let requests = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let period = Duration::from_secs(per_seconds.max(1)) / requests.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(requests);

        RequestThrottle {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn per_second(requests: u32) -> Self {
        Self::new(requests, 1)
    }

    /// Wait until the next request may be sent
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!("Request throttled, waiting for capacity");
            self.limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_burst_passes_without_waiting() {
        let throttle = RequestThrottle::per_second(5);
        let started = Instant::now();
        for _ in 0..5 {
            throttle.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_waits_once_burst_is_spent() {
        let throttle = RequestThrottle::per_second(10);
        for _ in 0..10 {
            throttle.acquire().await;
        }
        let started = Instant::now();
        throttle.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
