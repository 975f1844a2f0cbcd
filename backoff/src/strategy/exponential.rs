use std::time::Duration;

use rand::Rng;

/// Delay that grows by `factor` on every step, starting at `base` and never exceeding `cap`.
///
/// The n-th delay (1-based) is `base * factor^(n - 1)`, scaled by a random multiplier drawn from
/// `[1 - jitter, 1 + jitter]` and then capped. A jitter of `0.0` gives a deterministic schedule.
///
/// ```
/// use backoff::strategy::exponential::Exponential;
/// use std::time::Duration;
///
/// let mut schedule = Exponential::from_millis(100, 1_000, 2.0, 0.0);
/// assert_eq!(schedule.next(), Some(Duration::from_millis(100)));
/// assert_eq!(schedule.next(), Some(Duration::from_millis(200)));
/// assert_eq!(schedule.next(), Some(Duration::from_millis(400)));
/// ```
#[derive(Debug, Clone)]
pub struct Exponential {
    base: Duration,
    cap: Duration,
    factor: f64,
    /// Clamped to `0.0..=1.0`.
    jitter: f64,
    attempt: u32,
}

impl Exponential {
    pub fn new(base: Duration, cap: Duration, factor: f64, jitter: f64) -> Self {
        Self {
            base,
            cap,
            factor,
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    pub fn from_millis(base_ms: u64, cap_ms: u64, factor: f64, jitter: f64) -> Self {
        Self::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(cap_ms),
            factor,
            jitter,
        )
    }

    /// Start the schedule over from `base`.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let mut delay_ms = self.base.as_millis() as f64 * self.factor.powi(exponent);

        if self.jitter > 0.0 {
            delay_ms *= rand::rng().random_range(1.0 - self.jitter..=1.0 + self.jitter);
        }

        // f64 -> u64 saturates, so an overflowing power still lands on the cap
        Duration::from_millis(delay_ms as u64).min(self.cap)
    }
}

impl Iterator for Exponential {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.attempt = self.attempt.saturating_add(1);
        Some(self.delay_for(self.attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_without_jitter() {
        let schedule = Exponential::from_millis(50, 10_000, 2.0, 0.0);
        let delays: Vec<u128> = schedule.take(4).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![50, 100, 200, 400]);
    }

    #[test]
    fn capped() {
        let mut schedule = Exponential::from_millis(100, 250, 3.0, 0.0);
        assert_eq!(schedule.next(), Some(Duration::from_millis(100)));
        assert_eq!(schedule.next(), Some(Duration::from_millis(250)));
        assert_eq!(schedule.next(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn huge_exponent_stays_at_cap() {
        let mut schedule = Exponential::from_millis(1_000, 5_000, 10.0, 0.0);
        for _ in 0..500 {
            assert!(schedule.next().unwrap() <= Duration::from_millis(5_000));
        }
    }

    #[test]
    fn jitter_within_bounds() {
        let mut schedule = Exponential::from_millis(200, 10_000, 2.0, 0.25);
        let first = schedule.next().unwrap();
        assert!(first >= Duration::from_millis(150));
        assert!(first <= Duration::from_millis(250));
    }

    #[test]
    fn jitter_is_clamped() {
        let schedule = Exponential::new(Duration::from_millis(1), Duration::from_secs(1), 2.0, 7.0);
        assert_eq!(schedule.jitter, 1.0);
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut schedule = Exponential::from_millis(10, 1_000, 2.0, 0.0);
        schedule.next();
        assert_eq!(schedule.next(), Some(Duration::from_millis(20)));

        schedule.reset();
        assert_eq!(schedule.next(), Some(Duration::from_millis(10)));
    }
}
