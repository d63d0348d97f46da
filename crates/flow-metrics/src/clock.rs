//! Clocks and timer samples.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync + Debug {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced [`Clock`] for tests.
#[derive(Debug)]
pub struct MockClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl MockClock {
    /// Create a clock frozen at construction time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        // Saturates after ~584 years of simulated time
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

/// Start instant of a timed flow.
///
/// Created once when a subscription is accepted; every `stop` measures from
/// the same start, so a sample read at completion and again at a late cancel
/// reports two elapsed times from one origin.
#[derive(Debug, Clone)]
pub struct TimerSample {
    clock: Arc<dyn Clock>,
    started_at: Instant,
}

impl TimerSample {
    /// Capture the clock's current instant.
    #[must_use]
    pub fn start(clock: &Arc<dyn Clock>) -> Self {
        Self {
            clock: Arc::clone(clock),
            started_at: clock.now(),
        }
    }

    /// Elapsed time since `start`, never negative.
    #[must_use]
    pub fn stop(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    /// Instant the sample was started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(250));
    }

    #[test]
    fn test_sample_measures_from_start() {
        let mock = Arc::new(MockClock::new());
        let clock: Arc<dyn Clock> = mock.clone();

        mock.advance(Duration::from_secs(3));
        let sample = TimerSample::start(&clock);
        mock.advance(Duration::from_millis(40));

        assert_eq!(sample.stop(), Duration::from_millis(40));

        // Stopping again measures from the same origin
        mock.advance(Duration::from_millis(10));
        assert_eq!(sample.stop(), Duration::from_millis(50));
    }

    #[test]
    fn test_sample_without_elapsed_time_is_zero() {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new());
        let sample = TimerSample::start(&clock);
        assert_eq!(sample.stop(), Duration::ZERO);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sample = TimerSample::start(&clock);
        assert!(sample.stop() >= Duration::ZERO);
    }
}
