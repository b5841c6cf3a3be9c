//! Wall-clock time sources

use std::cell::Cell;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// A source of wall-clock time
///
/// The [`Channel`](crate::Channel) samples the clock once for
/// each group that arrives without a receive time.
pub trait Clock {
    /// The current time
    fn now(&self) -> DateTime<Utc>;
}

/// The system's real-time clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Useful for replaying recorded input and for testing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    /// New clock, stopped at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Set the time
    ///
    /// The time may be set backwards.
    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    /// Move the time by `delta`, which may be negative
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C> Clock for &C
where
    C: Clock + ?Sized,
{
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Back-date a buffer's capture time to one of its bits
///
/// `buffer_end` is the time at which the last of `buffer_len`
/// bits was captured. Returns the time at which the bit at
/// `offset` was captured, assuming bits arrive at the RDS
/// bit rate. The last bit of the buffer maps to
/// `buffer_end` exactly.
pub fn backdate(buffer_end: DateTime<Utc>, buffer_len: usize, offset: usize) -> DateTime<Utc> {
    let bits_before_end = buffer_len.saturating_sub(offset + 1);
    let micros = (bits_before_end as f64 * 1.0e6 / crate::group::BITS_PER_SECOND) as i64;
    buffer_end - Duration::microseconds(micros)
}

/// True if `format` is a usable chrono `strftime` format
pub fn is_valid_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Format a receive time
///
/// Times are printed in UTC. An invalid `format` falls back
/// to RFC 3339.
pub fn format_time(time: &DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    if is_valid_time_format(format) && write!(out, "{}", time.format(format)).is_ok() {
        out
    } else {
        time.to_rfc3339_opts(SecondsFormat::Micros, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(start, clock.now());
        clock.advance(Duration::seconds(-2));
        assert_eq!(start - Duration::seconds(2), (&clock).now());
    }

    #[test]
    fn test_backdate() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(end, backdate(end, 1, 0));
        assert_eq!(end, backdate(end, 104, 103));

        // 1187.5 bits is one second
        assert_eq!(end - Duration::seconds(2), backdate(end, 2376, 0));

        // one bit is 842.1 µs
        assert_eq!(end - Duration::microseconds(842), backdate(end, 2, 0));
    }

    #[test]
    fn test_format_time() {
        let tm = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()
            + Duration::microseconds(250);
        assert_eq!(
            "2024-03-01T12:00:05.000250+00:00",
            format_time(&tm, crate::builder::DEFAULT_TIME_FORMAT)
        );
        assert_eq!("12:00", format_time(&tm, "%H:%M"));

        assert!(!is_valid_time_format("%Q"));
        assert_eq!("2024-03-01T12:00:05.000250+00:00", format_time(&tm, "%Q"));
    }
}
