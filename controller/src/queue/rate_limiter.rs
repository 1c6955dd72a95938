use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Decides how long an item must wait before it is handed out again after a failure.
pub trait RateLimiter<T>: Send {
    /// Returns the delay for `item` and records that it was requeued.
    fn when(&mut self, item: &T) -> Duration;

    /// Stop tracking `item`, typically after it was processed successfully.
    fn forget(&mut self, item: &T);

    /// The number of times `item` has been requeued since it was last forgotten.
    fn num_requeues(&self, item: &T) -> u32;
}

/// Backs off exponentially per item: `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ExponentialFailureRateLimiter<T> {
    base: Duration,
    max: Duration,
    failures: HashMap<T, u32>,
}

impl<T> ExponentialFailureRateLimiter<T> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }
}

impl<T> RateLimiter<T> for ExponentialFailureRateLimiter<T>
where
    T: Eq + Hash + Clone + Send,
{
    fn when(&mut self, item: &T) -> Duration {
        let failures = self.failures.entry(item.clone()).or_insert(0);
        let exponent = *failures;
        *failures = failures.saturating_add(1);

        // Past 2^63 every sane `base` has overflowed `max` anyway.
        let backoff = self.base.as_secs_f64() * 2f64.powi(exponent.min(63) as i32);
        if !backoff.is_finite() || backoff > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(backoff)
        }
    }

    fn forget(&mut self, item: &T) {
        self.failures.remove(item);
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.failures.get(item).copied().unwrap_or_default()
    }
}

/// An overall token bucket shared by all items: `qps` tokens per second up to `burst` tokens.
/// Once the bucket is empty the delay grows with the number of outstanding reservations.
#[derive(Debug)]
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    tokens: f64,
    last: Instant,
}

impl BucketRateLimiter {
    pub fn new(qps: f64, burst: u32) -> Self {
        Self {
            qps,
            burst: f64::from(burst),
            tokens: f64::from(burst),
            last: Instant::now(),
        }
    }
}

impl<T> RateLimiter<T> for BucketRateLimiter {
    fn when(&mut self, _: &T) -> Duration {
        // A non-positive rate means no limit.
        if self.qps <= 0.0 {
            return Duration::ZERO;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        self.tokens = (self.tokens + elapsed * self.qps).min(self.burst);
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.qps)
        }
    }

    fn forget(&mut self, _: &T) {}

    fn num_requeues(&self, _: &T) -> u32 {
        0
    }
}

/// Combines several limiters by taking the longest delay of any of them.
pub struct MaxOfRateLimiter<T> {
    limiters: Vec<Box<dyn RateLimiter<T>>>,
}

impl<T> MaxOfRateLimiter<T> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<T>>>) -> Self {
        Self { limiters }
    }
}

impl<T> RateLimiter<T> for MaxOfRateLimiter<T>
where
    T: Send,
{
    fn when(&mut self, item: &T) -> Duration {
        self.limiters
            .iter_mut()
            .map(|limiter| limiter.when(item))
            .max()
            .unwrap_or_default()
    }

    fn forget(&mut self, item: &T) {
        for limiter in self.limiters.iter_mut() {
            limiter.forget(item);
        }
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(item))
            .max()
            .unwrap_or_default()
    }
}

/// The parameters of [`default_controller_rate_limiter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterSettings {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub qps: f64,
    pub burst: u32,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
            qps: 10.0,
            burst: 100,
        }
    }
}

/// Per-item exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter<T>(settings: RateLimiterSettings) -> MaxOfRateLimiter<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    MaxOfRateLimiter::new(vec![
        Box::new(ExponentialFailureRateLimiter::new(
            settings.base_delay,
            settings.max_delay,
        )),
        Box::new(BucketRateLimiter::new(settings.qps, settings.burst)),
    ])
}
