//! Cycle duration sampling for the toggle task.
//!
//! A light holds each phase for a duration drawn uniformly from the
//! configured closed range. The draw is made once per toggle task unless
//! [`CycleConfig::reroll_each_cycle`] is set, in which case the task asks
//! for a fresh duration after every toggle.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::CycleConfig;

/// Draws cycle durations from a validated [`CycleConfig`].
#[derive(Debug)]
pub struct CycleTimer {
    rng: StdRng,
    min_secs: f64,
    max_secs: f64,
    reroll_each_cycle: bool,
}

impl CycleTimer {
    /// Create a timer for the given config.
    ///
    /// The RNG is seeded from `config.seed` when present, otherwise from the
    /// operating system. The config is expected to have passed
    /// [`CycleConfig::validate`].
    pub fn new(config: &CycleConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            rng,
            min_secs: config.min_cycle_secs,
            max_secs: config.max_cycle_secs,
            reroll_each_cycle: config.reroll_each_cycle,
        }
    }

    /// Draw one duration from `[min_cycle_secs, max_cycle_secs]`.
    pub fn draw(&mut self) -> Duration {
        let secs = if self.min_secs < self.max_secs {
            self.rng.random_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        // Bounds are validated to fit a Duration.
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Duration to use for the cycle after `current`.
    pub fn next_after(&mut self, current: Duration) -> Duration {
        if self.reroll_each_cycle {
            self.draw()
        } else {
            current
        }
    }
}

/// Tracks time since the last phase change.
///
/// Elapsed time is compared at full [`Duration`] precision; it is never
/// truncated to whole seconds.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    last: Instant,
}

impl Stopwatch {
    /// Start measuring from now.
    pub fn start() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Whether at least `cycle` has passed since the last reset.
    pub fn has_elapsed(&self, cycle: Duration) -> bool {
        self.last.elapsed() >= cycle
    }

    /// Restart measurement from now.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seeded(min: f64, max: f64, seed: u64) -> CycleConfig {
        CycleConfig {
            seed: Some(seed),
            ..CycleConfig::with_range(min, max)
        }
    }

    #[test]
    fn draws_stay_within_default_range() {
        let mut timer = CycleTimer::new(&seeded(4.0, 6.0, 7));
        for _ in 0..1_000 {
            let d = timer.draw();
            assert!(d >= Duration::from_secs(4), "{d:?} below range");
            assert!(d <= Duration::from_secs(6), "{d:?} above range");
        }
    }

    #[test]
    fn draws_are_not_truncated_to_whole_seconds() {
        let mut timer = CycleTimer::new(&seeded(4.0, 6.0, 11));
        let fractional = (0..100)
            .map(|_| timer.draw())
            .any(|d| d.subsec_nanos() != 0);
        assert!(fractional);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = CycleTimer::new(&seeded(1.0, 2.0, 42));
        let mut b = CycleTimer::new(&seeded(1.0, 2.0, 42));
        for _ in 0..10 {
            assert_eq!(a.draw(), b.draw());
        }
    }

    #[test]
    fn degenerate_range_yields_the_bound() {
        let mut timer = CycleTimer::new(&seeded(0.25, 0.25, 1));
        assert_eq!(timer.draw(), Duration::from_millis(250));
    }

    #[test]
    fn fixed_policy_keeps_current_duration() {
        let mut timer = CycleTimer::new(&seeded(1.0, 2.0, 3));
        let current = Duration::from_millis(1_234);
        assert_eq!(timer.next_after(current), current);
    }

    #[test]
    fn reroll_policy_draws_again() {
        let config = CycleConfig {
            reroll_each_cycle: true,
            ..seeded(10.0, 20.0, 5)
        };
        let mut timer = CycleTimer::new(&config);
        // Outside the range, so any draw differs from it.
        let current = Duration::from_secs(1);
        let next = timer.next_after(current);
        assert_ne!(next, current);
        assert!(next >= Duration::from_secs(10));
    }

    #[test]
    fn stopwatch_reports_elapsed() {
        let mut watch = Stopwatch::start();
        assert!(watch.has_elapsed(Duration::ZERO));
        assert!(!watch.has_elapsed(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(watch.has_elapsed(Duration::from_millis(10)));
        watch.reset();
        assert!(!watch.has_elapsed(Duration::from_secs(60)));
    }
}
