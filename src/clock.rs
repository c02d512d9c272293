use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One reading of the clock, taken once per processed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Monotonic offset from the clock's origin; drives timers and cooldowns
    pub mono: Duration,
    /// Wall-clock time stamped onto alarms
    pub wall: DateTime<Utc>,
    /// Local hour of day (0..24), used for active-hour windows
    pub hour: u32,
}

/// Source of time for the engine
pub trait Clock: Send + Sync {
    fn now(&self) -> Tick;
}

/// Production clock backed by `Instant` and the system time zone
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Tick {
        let wall = Utc::now();
        Tick {
            mono: self.origin.elapsed(),
            wall,
            hour: wall.with_timezone(&Local).hour(),
        }
    }
}

/// Clock that only moves when told to.
///
/// Wall time is `origin + elapsed`, and the hour is taken in UTC so tests do
/// not depend on the host's time zone.
pub struct ManualClock {
    origin: DateTime<Utc>,
    elapsed_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            elapsed_nanos: AtomicU64::new(0),
        }
    }

    /// A clock starting at midday UTC on a fixed date
    pub fn at_noon() -> Self {
        Self::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, elapsed: Duration) {
        self.elapsed_nanos
            .store(elapsed.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Reading at an arbitrary offset, without moving the clock
    pub fn tick_at(&self, elapsed: Duration) -> Tick {
        let wall = self.origin
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        Tick {
            mono: elapsed,
            wall,
            hour: wall.hour(),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.tick_at(Duration::from_nanos(
            self.elapsed_nanos.load(Ordering::SeqCst),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::at_noon();
        let first = clock.now();
        assert_eq!(first, clock.now());

        clock.advance(Duration::from_millis(1500));
        let second = clock.now();
        assert_eq!(second.mono - first.mono, Duration::from_millis(1500));
        assert_eq!(second.wall - first.wall, chrono::Duration::milliseconds(1500));
        assert_eq!(second.hour, 12);
    }

    #[test]
    fn manual_clock_hour_rolls_over() {
        let clock = ManualClock::at_noon();
        clock.set(Duration::from_secs(13 * 3600));
        assert_eq!(clock.now().hour, 1);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b.mono >= a.mono);
        assert!(a.hour < 24);
    }
}
