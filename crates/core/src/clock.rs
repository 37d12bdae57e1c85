use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Utc};

/// Source of "now" in the studio's single reference timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    zone: FixedOffset,
}

impl SystemClock {
    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.zone)
    }
}

/// Hand-driven clock for deterministic scheduling tests and replays.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, instant: DateTime<FixedOffset>) {
        match self.now.lock() {
            Ok(mut now) => *now = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    pub fn advance(&self, step: Duration) {
        match self.now.lock() {
            Ok(mut now) => *now += step,
            Err(poisoned) => *poisoned.into_inner() += step,
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, TimeZone};

    use super::{Clock, ManualClock, SystemClock};

    #[test]
    fn manual_clock_advances_in_place() {
        let zone = FixedOffset::east_opt(7200).expect("offset");
        let start = zone.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let shared = clock.clone();

        shared.advance(Duration::minutes(90));

        assert_eq!(clock.now(), zone.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn system_clock_reports_reference_offset() {
        let zone = FixedOffset::east_opt(3 * 3600).expect("offset");
        assert_eq!(SystemClock::new(zone).now().offset(), &zone);
    }
}
