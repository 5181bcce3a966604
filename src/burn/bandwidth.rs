use tokio::time::{sleep, Duration, Instant};

use crate::cancel::CancelToken;

pub const DEFAULT_BURST: Duration = Duration::from_millis(1500);
const MIN_RATE: f64 = 1.0;
const MIN_BURST_SECS: f64 = 0.1;
const MAX_WAIT_SLICE: f64 = 0.25;
const MIN_WAIT: f64 = 0.01;

/// Token bucket holding at most `rate * burst` bytes of budget.
///
/// The bucket starts full. It is owned by the single fetch loop, so no
/// locking is involved.
pub struct BandwidthLimiter {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl BandwidthLimiter {
    pub fn new(rate_per_sec: f64, burst: Duration) -> Self {
        let rate = rate_per_sec.max(MIN_RATE);
        let capacity = rate * burst.as_secs_f64().max(MIN_BURST_SECS);
        Self {
            rate,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Waits until `amount` bytes of budget have been paid for.
    ///
    /// Returns early, without finishing the payment, once `cancel` fires.
    pub async fn consume(&mut self, amount: usize, cancel: &CancelToken) {
        let mut outstanding = amount as f64;
        while outstanding > 0.0 {
            if cancel.is_cancelled() {
                return;
            }

            self.refill();
            if self.tokens >= outstanding {
                self.tokens -= outstanding;
                return;
            }

            outstanding -= self.tokens;
            self.tokens = 0.0;

            let wait_secs = (outstanding / self.rate).clamp(MIN_WAIT, MAX_WAIT_SLICE);
            tokio::select! {
                _ = sleep(Duration::from_secs_f64(wait_secs)) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
    }
}
