//! Token-bucket rate limiter for outbound requests.
//!
//! The bucket never errors and never drops: when empty, `acquire` sleeps
//! until a token refills. State is guarded by a mutex held only for the
//! refill arithmetic, never across an await.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: capacity `ceil(rate)`, refilled at `rate` tokens/second.
pub struct TokenBucket {
    capacity: f64,
    rate_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate_per_second: f64) -> Self {
        let rate = rate_per_second.max(0.01);
        let capacity = rate.ceil().max(1.0);
        Self {
            capacity,
            rate_per_second: rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("token bucket poisoned");
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.rate_per_second,
                    ))
                }
            };

            match wait {
                None => return,
                Some(wait) => sleep(wait).await,
            }
        }
    }

    /// Tokens currently available (for observability).
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().expect("token bucket poisoned");
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.capacity);
        state.last_refill = Instant::now();
        state.tokens
    }
}
