//! Clock abstraction for frame timing.

use chrono::{DateTime, TimeDelta, Utc};

/// Abstraction over system time so frame drivers stay deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-frame time bookkeeping maintained by the frame driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTime {
    /// Timestamp of the current frame.
    pub time: DateTime<Utc>,
    /// Time elapsed since the previous frame.
    pub frame_time: TimeDelta,
    /// Number of frames ticked so far, including the current one.
    pub frame: u64,
}

impl FrameTime {
    /// Starts bookkeeping at `origin` with no frames ticked.
    #[must_use]
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            time: origin,
            frame_time: TimeDelta::zero(),
            frame: 0,
        }
    }

    /// Advances to a new frame observed at `now`.
    ///
    /// A timestamp earlier than the previous one is clamped, so `time` never
    /// moves backwards.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        let now = now.max(self.time);
        self.frame_time = now - self.time;
        self.time = now;
        self.frame += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_advance_records_delta_and_frame_count() {
        // Arrange
        let origin = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let mut frame = FrameTime::starting_at(origin);

        // Act
        frame.advance(origin + TimeDelta::milliseconds(16));
        frame.advance(origin + TimeDelta::milliseconds(40));

        // Assert
        assert_eq!(frame.frame, 2);
        assert_eq!(frame.frame_time, TimeDelta::milliseconds(24));
        assert_eq!(frame.time, origin + TimeDelta::milliseconds(40));
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let origin = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let mut frame = FrameTime::starting_at(origin);

        frame.advance(origin - TimeDelta::seconds(1));

        assert_eq!(frame.time, origin);
        assert_eq!(frame.frame_time, TimeDelta::zero());
    }
}
