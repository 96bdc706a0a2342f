//! Clock capability for parameter derivation.
//!
//! Report parameters fall back to "today" and to the finance hub go-live date
//! when a request leaves a date open. Both come from a `Clock` so a run
//! derives every value from one requested-at instant.

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Configured go-live date of the finance hub.
    fn go_live_date(&self) -> NaiveDate;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    go_live_date: NaiveDate,
}

impl SystemClock {
    pub fn new(go_live_date: NaiveDate) -> Self {
        Self { go_live_date }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn go_live_date(&self) -> NaiveDate {
        self.go_live_date
    }
}

/// A clock frozen at one instant. Each run resolves against one of these,
/// stamped with the run's requested-at time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    now: DateTime<Utc>,
    go_live_date: NaiveDate,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, go_live_date: NaiveDate) -> Self {
        Self { now, go_live_date }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn go_live_date(&self) -> NaiveDate {
        self.go_live_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let clock = FixedClock::new(now, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(clock.now(), now);
    }
}
