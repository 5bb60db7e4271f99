use explorer_core::CoreError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    /// Bucket capacity and the number of requests allowed in flight at once.
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// Limits for the unauthenticated JSON endpoints.
    pub fn reddit_public(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            max_requests: requests_per_minute.max(1),
            time_window: Duration::from_secs(60),
            burst_allowance: burst.max(1),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::reddit_public(60, 5)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Takes `tokens_needed` tokens, or returns how long to wait until they are available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }
}

/// Requests counted in the current fixed window.
#[derive(Debug)]
struct RequestWindow {
    length: Duration,
    started: Instant,
    requests: u32,
    rate_limited: u32,
}

impl RequestWindow {
    fn new(length: Duration) -> Self {
        Self {
            length,
            started: Instant::now(),
            requests: 0,
            rate_limited: 0,
        }
    }

    /// Starts a fresh window once the current one has expired.
    fn current(&mut self) -> &mut Self {
        let now = Instant::now();
        if now.duration_since(self.started) >= self.length {
            *self = Self {
                started: now,
                ..Self::new(self.length)
            };
        }
        self
    }
}

/// Token bucket for pacing plus a semaphore bounding requests in flight.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
    in_flight: Arc<Semaphore>,
    window: Mutex<RequestWindow>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: TokenBucket::new(&config),
            in_flight: Arc::new(Semaphore::new(config.burst_allowance as usize)),
            window: Mutex::new(RequestWindow::new(config.time_window)),
            config,
        }
    }

    /// Waits for a concurrency slot and a token. The slot is held until the permit drops.
    pub async fn acquire_permit(&self) -> Result<RateLimitPermit, CoreError> {
        let queued_at = Instant::now();
        let permit = self
            .in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal {
                message: "Rate limiter semaphore closed".to_string(),
            })?;

        while let Err(wait) = self.bucket.acquire(1.0).await {
            debug!("Out of request tokens, waiting {:?}", wait);
            sleep(wait).await;
        }
        self.window.lock().await.current().requests += 1;

        Ok(RateLimitPermit {
            _permit: permit,
            queue_wait_time: queued_at.elapsed(),
        })
    }

    /// Counts a 429 answer against the current window.
    pub async fn record_rate_limited(&self) {
        self.window.lock().await.current().rate_limited += 1;
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let available_tokens = self.bucket.available_tokens().await as u32;
        let mut window = self.window.lock().await;
        let window = window.current();

        RateLimitStatus {
            available_tokens,
            max_tokens: self.config.burst_allowance,
            available_permits: self.in_flight.available_permits(),
            requests_per_minute: self.config.max_requests,
            current_window_requests: window.requests,
            rate_limited_in_window: window.rate_limited,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub available_permits: usize,
    pub requests_per_minute: u32,
    pub current_window_requests: u32,
    pub rate_limited_in_window: u32,
}

impl RateLimitStatus {
    pub fn requests_remaining_in_window(&self) -> u32 {
        self.requests_per_minute
            .saturating_sub(self.current_window_requests)
    }
}
