use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{Datelike, FixedOffset, NaiveDate, Offset, Utc};

/// Source of the calendar day votes are recorded against.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock shifted into the voting timezone.
#[derive(Clone, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Out-of-range offsets fall back to UTC.
    pub fn with_offset_minutes(minutes: i32) -> Self {
        match FixedOffset::east_opt(minutes.saturating_mul(60)) {
            Some(offset) => Self { offset },
            None => {
                tracing::warn!(minutes, "invalid vote timezone offset; using UTC");
                Self::utc()
            }
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self { Self::utc() }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to a day; tests move it forward explicitly.
#[derive(Debug)]
pub struct FixedClock {
    days_from_ce: AtomicI32,
}

impl FixedClock {
    pub fn new(day: NaiveDate) -> Self {
        Self { days_from_ce: AtomicI32::new(day.num_days_from_ce()) }
    }

    pub fn advance_days(&self, days: i32) {
        self.days_from_ce.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        let days = self.days_from_ce.load(Ordering::SeqCst);
        NaiveDate::from_num_days_from_ce_opt(days).unwrap_or(NaiveDate::MIN)
    }
}
