use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use shiftbot_core::clock::TimezoneResolver;
use shiftbot_core::types::TimeOfDay;

/// Local times of day at which the report is broadcast.
///
/// Entries are kept sorted and de-duplicated. Occurrences are resolved to
/// instants with the offset in force on their own date, so an entry keeps its
/// wall-clock time across daylight-saving changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireSchedule {
    times: Vec<TimeOfDay>,
}

impl FireSchedule {
    pub fn new(times: impl IntoIterator<Item = TimeOfDay>) -> Self {
        let mut times: Vec<TimeOfDay> = times.into_iter().collect();
        times.sort();
        times.dedup();
        Self { times }
    }

    pub fn times(&self) -> &[TimeOfDay] {
        &self.times
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Smallest occurrence strictly after `now`, or `None` for an empty schedule.
    pub fn next_after(
        &self,
        now: DateTime<Utc>,
        tz: &TimezoneResolver,
    ) -> Option<DateTime<FixedOffset>> {
        let today = tz.localize(now).date_naive();
        (-1..=2)
            .flat_map(|d| self.occurrences_on(today + Duration::days(d), tz))
            .filter(|occ| occ.with_timezone(&Utc) > now)
            .min_by_key(|occ| occ.with_timezone(&Utc))
    }

    /// Most recent occurrence at or before `now`, or `None` for an empty schedule.
    pub fn latest_at_or_before(
        &self,
        now: DateTime<Utc>,
        tz: &TimezoneResolver,
    ) -> Option<DateTime<FixedOffset>> {
        let today = tz.localize(now).date_naive();
        (-2..=1)
            .flat_map(|d| self.occurrences_on(today + Duration::days(d), tz))
            .filter(|occ| occ.with_timezone(&Utc) <= now)
            .max_by_key(|occ| occ.with_timezone(&Utc))
    }

    fn occurrences_on<'a>(
        &'a self,
        date: NaiveDate,
        tz: &'a TimezoneResolver,
    ) -> impl Iterator<Item = DateTime<FixedOffset>> + 'a {
        self.times
            .iter()
            .map(move |t| tz.resolve_local(date.and_time(t.as_naive())))
    }
}
