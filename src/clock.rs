use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Source of the canonical calendar date.
///
/// Every "is this the same day" comparison goes through one of these, so
/// the date that stamps a completion is the date later compared against it.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock truncated to the date in a single fixed reference offset.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceClock {
    offset: FixedOffset,
}

impl ReferenceClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

impl Clock for ReferenceClock {
    fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }
}
