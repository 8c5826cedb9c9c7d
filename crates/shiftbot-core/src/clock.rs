//! Wall-clock access and local-offset resolution.
//!
//! The resolver models a single region with one daylight-saving rule: summer
//! time runs from the last Sunday of March to the last Sunday of October,
//! switching at 01:00 UTC on both days (the EU rule). Everything else in the
//! crate asks the resolver for the offset instead of caching one, so a
//! computation that straddles a transition always sees the right offset.

use std::sync::Mutex;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc, Weekday,
};

use crate::error::ClockError;

/// Source of "now". Injected everywhere so tests and audits can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Lets tests simulate clock jumps
/// without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hour (UTC) at which both daylight-saving transitions happen.
const TRANSITION_HOUR_UTC: u32 = 1;

const CET: FixedOffset = match FixedOffset::east_opt(3600) {
    Some(offset) => offset,
    None => panic!("UTC+1 is a valid offset"),
};
const CEST: FixedOffset = match FixedOffset::east_opt(2 * 3600) {
    Some(offset) => offset,
    None => panic!("UTC+2 is a valid offset"),
};

/// Resolves the local UTC offset for an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneResolver {
    standard: FixedOffset,
    summer: FixedOffset,
}

impl TimezoneResolver {
    /// Build a resolver from offsets east of UTC, in minutes.
    pub fn new(standard_minutes: i32, summer_minutes: i32) -> Result<Self, ClockError> {
        Ok(Self {
            standard: offset_from_minutes(standard_minutes)?,
            summer: offset_from_minutes(summer_minutes)?,
        })
    }

    /// Central European Time: UTC+1 in winter, UTC+2 in summer.
    pub fn central_european() -> Self {
        Self {
            standard: CET,
            summer: CEST,
        }
    }

    pub fn standard(&self) -> FixedOffset {
        self.standard
    }

    pub fn summer(&self) -> FixedOffset {
        self.summer
    }

    /// Offset in force at `at`.
    pub fn offset_at(&self, at: DateTime<Utc>) -> FixedOffset {
        if self.is_summer_time(at) {
            self.summer
        } else {
            self.standard
        }
    }

    /// Whether `at` lies inside the daylight-saving window of its year.
    pub fn is_summer_time(&self, at: DateTime<Utc>) -> bool {
        match summer_window(at.year()) {
            Some((start, end)) => at >= start && at < end,
            None => false,
        }
    }

    /// Express `at` in local time.
    pub fn localize(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset_at(at))
    }

    /// Map a local wall-clock reading back to an instant.
    ///
    /// During the autumn overlap the earlier (summer) instant wins. A reading
    /// inside the spring gap does not exist and is pushed forward by the size
    /// of the gap.
    pub fn resolve_local(&self, local: NaiveDateTime) -> DateTime<FixedOffset> {
        for offset in [self.summer, self.standard] {
            let utc = to_utc(local, offset);
            if self.offset_at(utc) == offset {
                return utc.with_timezone(&offset);
            }
        }
        self.localize(to_utc(local, self.standard))
    }
}

impl Default for TimezoneResolver {
    fn default() -> Self {
        Self::central_european()
    }
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, ClockError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ClockError::InvalidOffset { minutes })
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    let naive_utc = local - Duration::seconds(offset.local_minus_utc() as i64);
    Utc.from_utc_datetime(&naive_utc)
}

/// Start (inclusive) and end (exclusive) of summer time in `year`.
fn summer_window(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let switch = NaiveTime::from_hms_opt(TRANSITION_HOUR_UTC, 0, 0)?;
    let start = last_sunday(year, 3)?.and_time(switch).and_utc();
    let end = last_sunday(year, 10)?.and_time(switch).and_utc();
    Some((start, end))
}

/// Last Sunday of `month` in `year`.
pub fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last_day = first_of_next.pred_opt()?;
    let back = last_day.weekday().num_days_from_sunday() as i64;
    let sunday = last_day - Duration::days(back);
    debug_assert_eq!(sunday.weekday(), Weekday::Sun);
    Some(sunday)
}
