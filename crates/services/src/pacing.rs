use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Requests per minute assumed when nothing else is configured.
pub const DEFAULT_RPM: u32 = 15;

/// Keeps outbound generation requests at least `min_interval` apart.
///
/// Callers queue on an async mutex and sleep until their slot opens, so
/// requests are delayed and never rejected. One pacer is shared by every
/// session in the process.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Pacer for a requests-per-minute budget. Zero disables pacing.
    #[must_use]
    pub fn from_rpm(rpm: u32) -> Self {
        if rpm == 0 {
            return Self::new(Duration::ZERO);
        }
        Self::new(Duration::from_secs(60) / rpm)
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next request slot and claim it.
    ///
    /// Returns how long the caller was delayed.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_request.lock().await;
        let arrived = Instant::now();
        let mut waited = Duration::ZERO;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > arrived {
                tracing::debug!(
                    wait_ms = u64::try_from((ready_at - arrived).as_millis()).unwrap_or(u64::MAX),
                    "pacing generation request"
                );
                sleep_until(ready_at).await;
                waited = ready_at - arrived;
            }
        }

        *last = Some(Instant::now());
        waited
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::from_rpm(DEFAULT_RPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn rpm_maps_to_interval() {
        assert_eq!(RequestPacer::from_rpm(15).min_interval(), Duration::from_secs(4));
        assert_eq!(RequestPacer::from_rpm(0).min_interval(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_is_immediate() {
        let pacer = RequestPacer::from_rpm(15);
        assert_eq!(pacer.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced() {
        let pacer = RequestPacer::from_rpm(15);
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_queue_up() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_secs(2)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                tokio::spawn(async move {
                    pacer.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gap_longer_than_interval_needs_no_wait() {
        let pacer = RequestPacer::from_rpm(15);
        pacer.acquire().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(pacer.acquire().await, Duration::ZERO);
    }
}
