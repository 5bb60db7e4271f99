use crate::error::{CoreError, LlmError, RedditApiError};
use crate::error_utils::ErrorExt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Backoff and circuit breaker settings.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the computed delay added as random jitter (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Consecutive failed operations before the breaker opens
    pub failure_threshold: u32,
    /// Seconds an open breaker waits before letting a probe through
    pub recovery_timeout_s: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            failure_threshold: 5,
            recovery_timeout_s: 60,
        }
    }
}

impl RetryConfig {
    /// Interactive Reddit reads: slower backoff, quicker to trip.
    pub fn reddit() -> Self {
        Self {
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            jitter_factor: 0.2,
            failure_threshold: 3,
            recovery_timeout_s: 120,
            ..Self::default()
        }
    }

    /// Bulk link imports: 1s doubling up to 30s, ten attempts, no jitter.
    pub fn link_import() -> Self {
        Self {
            max_attempts: 10,
            jitter_factor: 0.0,
            ..Self::default()
        }
    }

    /// Chat completion calls.
    pub fn llm() -> Self {
        Self::default()
    }

    /// Delay before retry number `attempt + 1`, jitter included, capped at `max_delay_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay_ms as f64) as u64;
        let jitter_ms = fastrand::u64(0..=(capped_ms as f64 * self.jitter_factor) as u64);
        Duration::from_millis(capped_ms.saturating_add(jitter_ms).min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Stops calling a failing upstream until `recovery_timeout_s` has passed.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            failure_threshold: config.failure_threshold,
            recovery_timeout: Duration::from_secs(config.recovery_timeout_s),
        }
    }

    pub fn allow_request(&mut self) -> bool {
        if self.state != CircuitBreakerState::Open {
            return true;
        }
        let recovered = self
            .opened_at
            .is_some_and(|opened| opened.elapsed() >= self.recovery_timeout);
        if recovered {
            debug!("Circuit breaker half-open, letting one request through");
            self.state = CircuitBreakerState::HalfOpen;
        }
        recovered
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitBreakerState::HalfOpen {
            info!("Upstream recovered, circuit breaker closed");
        }
        self.state = CircuitBreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        let trip = match self.state {
            CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Closed => self.consecutive_failures >= self.failure_threshold,
            CircuitBreakerState::Open => false,
        };
        if trip {
            warn!(
                "Circuit breaker open after {} consecutive failures",
                self.consecutive_failures
            );
            self.state = CircuitBreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Exponential backoff
    Retry,
    /// Wait as long as the server asked
    RetryWithDelay(Duration),
    NoRetry,
}

impl RetryStrategy {
    pub fn for_error(error: &CoreError) -> Self {
        match error {
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })
            | CoreError::Llm(LlmError::RateLimitExceeded { retry_after, .. }) => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            CoreError::RedditApi(_) | CoreError::Llm(_) | CoreError::Network(_)
                if error.is_retryable() =>
            {
                RetryStrategy::Retry
            }
            _ => RetryStrategy::NoRetry,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    /// Extra attempts made by operations that eventually succeeded
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
    pub circuit_breaker_trips: u64,
    pub average_retry_delay_ms: f64,
}

impl RetryMetrics {
    fn record_recovery(&mut self, retries: u32, delay: Duration) {
        self.total_retries += u64::from(retries);
        self.successful_retries += 1;
        let n = self.successful_retries as f64;
        self.average_retry_delay_ms += (delay.as_millis() as f64 - self.average_retry_delay_ms) / n;
    }
}

/// Runs fallible async operations under a retry policy and a shared circuit breaker.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    breaker: Mutex<CircuitBreaker>,
    metrics: Mutex<RetryMetrics>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            breaker: Mutex::new(CircuitBreaker::new(&config)),
            metrics: Mutex::new(RetryMetrics::default()),
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calls `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// On exhaustion the error of the last attempt is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if !lock(&self.breaker).allow_request() {
            lock(&self.metrics).circuit_breaker_trips += 1;
            warn!("Circuit breaker open, skipping {}", operation_name);
            return Err(CoreError::Internal {
                message: format!("Circuit breaker is open for {}", operation_name),
            });
        }

        let mut waited = Duration::ZERO;
        let mut attempt = 0u32;

        // `upstream_failing` is false when the error concerns only this request
        let (last_error, upstream_failing) = loop {
            let err = match operation().await {
                Ok(value) => {
                    lock(&self.breaker).record_success();
                    if attempt > 0 {
                        lock(&self.metrics).record_recovery(attempt, waited);
                        info!(
                            "{} succeeded after {} retries ({:?} waited)",
                            operation_name, attempt, waited
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let attempts_left = attempt + 1 < self.config.max_attempts;
            let delay = match RetryStrategy::for_error(&err) {
                RetryStrategy::NoRetry => {
                    debug!("{} failed permanently: {}", operation_name, err);
                    break (err, false);
                }
                _ if !attempts_left => break (err, true),
                RetryStrategy::Retry => self.config.backoff(attempt),
                RetryStrategy::RetryWithDelay(delay) => delay,
            };

            info!(
                "{} failed ({}), attempt {}/{}, retrying in {:?}",
                operation_name,
                err,
                attempt + 1,
                self.config.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
            waited += delay;
            attempt += 1;
        };

        if upstream_failing {
            lock(&self.breaker).record_failure();
        }
        lock(&self.metrics).failed_retries += 1;
        error!(
            "{} gave up after {} attempts: {}",
            operation_name,
            attempt + 1,
            last_error
        );
        Err(last_error)
    }

    pub fn metrics(&self) -> RetryMetrics {
        lock(&self.metrics).clone()
    }

    pub fn circuit_breaker_state(&self) -> CircuitBreakerState {
        lock(&self.breaker).state()
    }
}
