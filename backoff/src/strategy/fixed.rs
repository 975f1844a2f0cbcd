use std::time::Duration;

/// Yields the same delay forever.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    interval: Duration,
}

impl Interval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

impl Iterator for Interval {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_interval() {
        let mut interval = Interval::from_millis(100);
        assert_eq!(interval.next(), Some(Duration::from_millis(100)));
        assert_eq!(interval.next(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn bounded_by_take() {
        let delays: Vec<_> = Interval::new(Duration::from_secs(1)).take(4).collect();
        assert_eq!(delays.len(), 4);
        assert!(delays.iter().all(|d| *d == Duration::from_secs(1)));
    }
}
