//! Polling backoff between status queries.
//!
//! The interval starts at a floor, grows geometrically and is capped. It never
//! decreases and never drops below the floor, which is the only thing keeping
//! the request rate against the backing API bounded.

use std::time::Duration;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    min_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Floor for every interval. Values below [`DEFAULT_MIN_INTERVAL`] are
    /// raised to it; the cap is raised to match if needed.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval.max(DEFAULT_MIN_INTERVAL);
        self.max_interval = self.max_interval.max(self.min_interval);
        self
    }

    /// Cap for the interval. Values below the floor are clamped to the floor.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval.max(self.min_interval);
        self
    }

    /// Growth factor per step. Factors below 1.0 are treated as 1.0.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// The interval to use after `current`. Saturates at the cap instead of
    /// overflowing.
    pub fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_interval)
            .max(current)
            .clamp(self.min_interval, self.max_interval)
    }

    /// Infinite sequence of intervals, starting at the floor.
    pub fn delays(&self) -> Delays {
        Delays {
            backoff: *self,
            current: None,
        }
    }
}

/// Iterator returned by [`Backoff::delays`].
#[derive(Debug, Clone)]
pub struct Delays {
    backoff: Backoff,
    current: Option<Duration>,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let next = match self.current {
            None => self.backoff.min_interval,
            Some(current) => self.backoff.next_interval(current),
        };
        self.current = Some(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_sequence() {
        let delays: Vec<u64> = Backoff::default()
            .delays()
            .take(6)
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 10, 10, 10]);
    }

    #[test]
    fn test_cap_never_below_floor() {
        let backoff = Backoff::new()
            .with_max_interval(Duration::from_secs(1))
            .with_min_interval(Duration::from_secs(3));
        assert_eq!(backoff.max_interval(), Duration::from_secs(3));
        assert!(backoff.delays().take(4).all(|d| d == Duration::from_secs(3)));
    }

    #[test]
    fn test_sub_floor_settings_are_raised() {
        let backoff = Backoff::new()
            .with_min_interval(Duration::ZERO)
            .with_max_interval(Duration::ZERO);
        assert_eq!(backoff.min_interval(), DEFAULT_MIN_INTERVAL);
        assert_eq!(backoff.max_interval(), DEFAULT_MIN_INTERVAL);
        assert!(backoff.delays().take(5).all(|d| d == DEFAULT_MIN_INTERVAL));

        let backoff = Backoff::new().with_min_interval(Duration::from_millis(10));
        assert_eq!(backoff.min_interval(), DEFAULT_MIN_INTERVAL);
    }

    #[test]
    fn test_huge_growth_saturates_at_cap() {
        let backoff = Backoff::new()
            .with_max_interval(Duration::MAX)
            .with_multiplier(1e300);
        let delays: Vec<Duration> = backoff.delays().take(4).collect();
        assert_eq!(delays[0], DEFAULT_MIN_INTERVAL);
        assert!(delays[1..].iter().all(|d| *d == Duration::MAX));
    }

    #[test]
    fn test_shrinking_multiplier_is_ignored() {
        let backoff = Backoff::new().with_multiplier(0.5);
        let delays: Vec<Duration> = backoff.delays().take(3).collect();
        assert!(delays.iter().all(|d| *d == DEFAULT_MIN_INTERVAL));

        let backoff = Backoff::new().with_multiplier(f64::NAN);
        assert_eq!(backoff.next_interval(DEFAULT_MIN_INTERVAL), DEFAULT_MIN_INTERVAL);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Intervals never decrease and never drop below the floor.
        #[test]
        fn prop_delays_monotonic_and_floored(
            min_ms in 0u64..5_000,
            max_ms in 0u64..60_000,
            multiplier in 0.0f64..8.0,
        ) {
            let backoff = Backoff::new()
                .with_min_interval(Duration::from_millis(min_ms))
                .with_max_interval(Duration::from_millis(max_ms))
                .with_multiplier(multiplier);

            let delays: Vec<Duration> = backoff.delays().take(20).collect();
            prop_assert_eq!(delays[0], backoff.min_interval());
            for pair in delays.windows(2) {
                prop_assert!(pair[1] >= pair[0]);
            }
            for d in &delays {
                prop_assert!(*d >= backoff.min_interval());
                prop_assert!(*d <= backoff.max_interval());
            }
            prop_assert!(backoff.min_interval() >= DEFAULT_MIN_INTERVAL);
        }

        /// Any finite multiplier and cap yields bounded, non-decreasing intervals.
        #[test]
        fn prop_extreme_growth_never_overflows(
            multiplier in 1.0f64..=f64::MAX,
            unbounded_cap in any::<bool>(),
        ) {
            let cap = if unbounded_cap { Duration::MAX } else { Duration::from_secs(3_600) };
            let backoff = Backoff::new()
                .with_max_interval(cap)
                .with_multiplier(multiplier);

            let delays: Vec<Duration> = backoff.delays().take(64).collect();
            for pair in delays.windows(2) {
                prop_assert!(pair[1] >= pair[0]);
            }
            prop_assert!(delays.iter().all(|d| *d >= DEFAULT_MIN_INTERVAL && *d <= cap));
        }
    }
}
