//! Deterministic shift rotation.
//!
//! The label for an instant depends only on the reference date, the day/night
//! boundaries, the rotation order and the instant itself. The rotation
//! advances at night-start, so the day segment of calendar day `d` already
//! belongs to index `d + 1`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::clock::TimezoneResolver;
use crate::error::{Result, ShiftbotError};
use crate::types::{Segment, ShiftLabel, TimeOfDay};

/// Maps instants to the shift on duty.
#[derive(Debug, Clone)]
pub struct ShiftCalculator {
    rotation: Vec<ShiftLabel>,
    reference: NaiveDate,
    day_start: NaiveTime,
    night_start: NaiveTime,
    tz: TimezoneResolver,
}

/// Everything the status query reports about "now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftStatus {
    pub local_time: DateTime<FixedOffset>,
    pub shift: ShiftLabel,
    pub segment: Segment,
    pub days_elapsed: i64,
}

impl ShiftCalculator {
    /// Fails when the rotation is empty or both boundaries coincide.
    pub fn new(
        rotation: Vec<ShiftLabel>,
        reference: NaiveDate,
        day_start: TimeOfDay,
        night_start: TimeOfDay,
        tz: TimezoneResolver,
    ) -> Result<Self> {
        if rotation.is_empty() {
            return Err(ShiftbotError::Config(
                "shift rotation must contain at least one label".to_string(),
            ));
        }
        if day_start == night_start {
            return Err(ShiftbotError::Config(format!(
                "day_start and night_start must differ (both {day_start})"
            )));
        }
        Ok(Self {
            rotation,
            reference,
            day_start: day_start.as_naive(),
            night_start: night_start.as_naive(),
            tz,
        })
    }

    pub fn rotation(&self) -> &[ShiftLabel] {
        &self.rotation
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn resolver(&self) -> &TimezoneResolver {
        &self.tz
    }

    /// Shift on duty at `now`, evaluated in the local time in force at `now`.
    pub fn current_shift(&self, now: DateTime<Utc>) -> ShiftLabel {
        let local = self.tz.localize(now).naive_local();
        self.shift_at_local(local).clone()
    }

    /// Shift on duty at a local wall-clock reading.
    pub fn shift_at_local(&self, local: NaiveDateTime) -> &ShiftLabel {
        &self.rotation[self.index_at_local(local)]
    }

    /// Rotation index at a local wall-clock reading, always in `[0, N)`.
    pub fn index_at_local(&self, local: NaiveDateTime) -> usize {
        let days = self.days_elapsed(local.date());
        let n = self.rotation.len() as i64;
        let idx = match self.segment_at(local.time()) {
            Segment::Day => (days + 1).rem_euclid(n),
            Segment::Night => days.rem_euclid(n),
        };
        idx as usize
    }

    /// Whole calendar days from the reference date; negative before it.
    pub fn days_elapsed(&self, date: NaiveDate) -> i64 {
        (date - self.reference).num_days()
    }

    /// Day segment is `[day_start, night_start)`; night is the rest.
    pub fn segment_at(&self, t: NaiveTime) -> Segment {
        let in_day = if self.day_start < self.night_start {
            t >= self.day_start && t < self.night_start
        } else {
            t >= self.day_start || t < self.night_start
        };
        if in_day {
            Segment::Day
        } else {
            Segment::Night
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> ShiftStatus {
        let local_time = self.tz.localize(now);
        let local = local_time.naive_local();
        ShiftStatus {
            local_time,
            shift: self.shift_at_local(local).clone(),
            segment: self.segment_at(local.time()),
            days_elapsed: self.days_elapsed(local.date()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn labels(names: &[&str]) -> Vec<ShiftLabel> {
        names.iter().map(|n| ShiftLabel::from(*n)).collect()
    }

    fn calc_from(reference: NaiveDate) -> ShiftCalculator {
        ShiftCalculator::new(
            labels(&["A", "B", "C", "D"]),
            reference,
            TimeOfDay::new(8, 0).unwrap(),
            TimeOfDay::new(20, 0).unwrap(),
            TimezoneResolver::central_european(),
        )
        .unwrap()
    }

    fn calc() -> ShiftCalculator {
        calc_from(NaiveDate::from_ymd_opt(2024, 10, 18).unwrap())
    }

    fn at(d: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        d.and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn documented_examples() {
        let c = calc();
        let day0 = c.reference();
        let day1 = day0.succ_opt().unwrap();
        assert_eq!(c.shift_at_local(at(day0, 9, 0)).as_str(), "B");
        assert_eq!(c.shift_at_local(at(day0, 21, 0)).as_str(), "A");
        assert_eq!(c.shift_at_local(at(day1, 9, 0)).as_str(), "C");
    }

    #[test]
    fn early_morning_belongs_to_previous_night() {
        let c = calc();
        let day1 = c.reference().succ_opt().unwrap();
        // 03:00 on day 1 is still night: index 1 mod 4.
        assert_eq!(c.shift_at_local(at(day1, 3, 0)).as_str(), "B");
    }

    #[test]
    fn current_shift_uses_local_offset() {
        let c = calc();
        // 2024-10-18 06:30 UTC is 08:30 CEST: day segment of day 0.
        let now = Utc.with_ymd_and_hms(2024, 10, 18, 6, 30, 0).unwrap();
        assert_eq!(c.current_shift(now).as_str(), "B");
        // 2024-10-18 05:30 UTC is 07:30 CEST: still night.
        let now = Utc.with_ymd_and_hms(2024, 10, 18, 5, 30, 0).unwrap();
        assert_eq!(c.current_shift(now).as_str(), "A");
    }

    #[test]
    fn deterministic_and_in_range() {
        let c = calc();
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        for step in 0..5000 {
            let t = start + Duration::minutes(step * 173);
            let first = c.current_shift(t);
            assert_eq!(first, c.current_shift(t));
            assert!(c.rotation().contains(&first));
        }
    }

    #[test]
    fn one_day_later_is_next_label() {
        let c = calc();
        let n = c.rotation().len();
        let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for _ in 0..800 {
            for (h, m) in [(0, 0), (7, 59), (8, 0), (12, 0), (19, 59), (20, 0), (23, 59)] {
                let today = c.index_at_local(at(date, h, m));
                let tomorrow = c.index_at_local(at(date.succ_opt().unwrap(), h, m));
                assert_eq!(tomorrow, (today + 1) % n, "{date} {h:02}:{m:02}");
            }
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn day_start_boundary_differs_from_one_tick_before() {
        for reference in [
            NaiveDate::from_ymd_opt(2024, 10, 18).unwrap(),
            NaiveDate::from_ymd_opt(2000, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2031, 7, 4).unwrap(),
        ] {
            let c = calc_from(reference);
            let boundary = at(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(), 8, 0);
            let before = boundary - Duration::nanoseconds(1);
            assert_eq!(c.segment_at(boundary.time()), Segment::Day);
            assert_eq!(c.segment_at(before.time()), Segment::Night);
            assert_ne!(c.shift_at_local(boundary), c.shift_at_local(before));
        }
    }

    #[test]
    fn night_start_boundary_belongs_to_night() {
        let c = calc();
        let day0 = c.reference();
        assert_eq!(c.segment_at(at(day0, 20, 0).time()), Segment::Night);
        assert_eq!(c.shift_at_local(at(day0, 20, 0)).as_str(), "A");
        assert_eq!(c.shift_at_local(at(day0, 19, 59)).as_str(), "B");
    }

    #[test]
    fn before_reference_date_wraps_positively() {
        let c = calc();
        let earlier = c.reference() - Duration::days(1);
        assert_eq!(c.days_elapsed(earlier), -1);
        // Night of day -1: (-1) mod 4 = 3.
        assert_eq!(c.shift_at_local(at(earlier, 22, 0)).as_str(), "D");
        // Day of day -1: 0 mod 4 = 0.
        assert_eq!(c.shift_at_local(at(earlier, 10, 0)).as_str(), "A");
        let far = c.reference() - Duration::days(4001);
        assert!(c.index_at_local(at(far, 22, 0)) < 4);
    }

    #[test]
    fn single_label_rotation_is_constant() {
        let c = ShiftCalculator::new(
            labels(&["ONLY"]),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TimeOfDay::new(8, 0).unwrap(),
            TimeOfDay::new(20, 0).unwrap(),
            TimezoneResolver::central_european(),
        )
        .unwrap();
        let t = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(c.current_shift(t).as_str(), "ONLY");
    }

    #[test]
    fn wrapped_day_segment() {
        let c = ShiftCalculator::new(
            labels(&["A", "B"]),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TimeOfDay::new(22, 0).unwrap(),
            TimeOfDay::new(6, 0).unwrap(),
            TimezoneResolver::central_european(),
        )
        .unwrap();
        assert_eq!(c.segment_at(NaiveTime::from_hms_opt(23, 0, 0).unwrap()), Segment::Day);
        assert_eq!(c.segment_at(NaiveTime::from_hms_opt(3, 0, 0).unwrap()), Segment::Day);
        assert_eq!(c.segment_at(NaiveTime::from_hms_opt(12, 0, 0).unwrap()), Segment::Night);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let eight = TimeOfDay::new(8, 0).unwrap();
        let tz = TimezoneResolver::central_european();
        assert!(ShiftCalculator::new(Vec::new(), date, eight, TimeOfDay::new(20, 0).unwrap(), tz).is_err());
        assert!(ShiftCalculator::new(labels(&["A"]), date, eight, eight, tz).is_err());
    }

    #[test]
    fn status_reports_segment_and_days() {
        let c = calc();
        let now = Utc.with_ymd_and_hms(2024, 10, 20, 19, 0, 0).unwrap(); // 21:00 CEST
        let s = c.status(now);
        assert_eq!(s.days_elapsed, 2);
        assert_eq!(s.segment, Segment::Night);
        assert_eq!(s.shift.as_str(), "C");
        assert_eq!(s.local_time.offset().local_minus_utc(), 7200);
    }
}
