use rand::Rng;
use std::time::Duration;

/// A pluggable backoff strategy for computing the delay before a retry attempt.
///
/// Implementations receive the zero-based attempt number (0 = the delay before
/// the first retry, i.e. after the initial attempt has failed) and return how
/// long to wait before trying again.
pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before retrying after the given (zero-based) attempt.
    fn interval(&self, attempt: usize) -> Duration;
}

/// No delay between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl IntervalFunction for NoBackoff {
    fn interval(&self, _attempt: usize) -> Duration {
        Duration::ZERO
    }
}

/// A fixed delay between every retry attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval(&self, _attempt: usize) -> Duration {
        self.interval
    }
}

/// A delay that grows linearly with the attempt count, optionally capped.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    base: Duration,
    max_interval: Option<Duration>,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max_interval: None,
        }
    }

    pub fn with_max(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for LinearBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let delay = self.base.saturating_mul((attempt as u32).saturating_add(1));
        match self.max_interval {
            Some(max) if delay > max => max,
            _ => delay,
        }
    }
}

/// Exponential backoff: `initial_interval * multiplier^attempt`, optionally capped.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    fn uncapped(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(self.initial_interval.as_secs_f64() * factor)
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let delay = self.uncapped(attempt);
        match self.max_interval {
            Some(max) if delay > max => max,
            _ => delay,
        }
    }
}

/// Exponential backoff with full jitter: a uniformly random delay in
/// `[0, (1 + randomization_factor) * base)` around the exponential curve.
pub struct ExponentialRandomBackoff {
    base: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            base: ExponentialBackoff::new(initial_interval),
            randomization_factor: 0.5,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.base = self.base.with_multiplier(multiplier);
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.base = self.base.with_max_interval(max_interval);
        self
    }

    pub fn with_randomization_factor(mut self, randomization_factor: f64) -> Self {
        self.randomization_factor = randomization_factor;
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let base = self.base.interval(attempt);
        let jitter_range = base.as_secs_f64() * self.randomization_factor;
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_range.max(0.0));
        Duration::from_secs_f64(base.as_secs_f64() + jitter)
    }
}

/// AWS-style "decorrelated jitter": each delay is a uniform random value in
/// `[base, min(max_interval, previous_delay * 3))`, tracked per attempt rather
/// than recursively, so it only depends on the attempt number and the
/// configured bounds.
#[derive(Debug, Clone, Copy)]
pub struct DecorrelatedJitterBackoff {
    base: Duration,
    max_interval: Duration,
}

impl DecorrelatedJitterBackoff {
    pub fn new(base: Duration, max_interval: Duration) -> Self {
        Self { base, max_interval }
    }
}

impl IntervalFunction for DecorrelatedJitterBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let ceiling = self
            .base
            .as_secs_f64()
            .max(1e-9)
            * 3f64.powi(attempt as i32);
        let ceiling = ceiling.min(self.max_interval.as_secs_f64());
        let low = self.base.as_secs_f64().min(ceiling);
        let delay = if ceiling > low {
            rand::thread_rng().gen_range(low..ceiling)
        } else {
            low
        };
        Duration::from_secs_f64(delay)
    }
}

/// A backoff strategy defined by an arbitrary closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
