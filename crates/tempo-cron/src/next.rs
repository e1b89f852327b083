use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::{CronError, Result};
use crate::expression::{next_set, CronExpression};

/// How many calendar years the roll-forward search may cover before an
/// expression is declared unreachable. Four years is enough to reach the next
/// leap-year February 29th.
pub const SEARCH_HORIZON_YEARS: i32 = 4;

/// Outcome of scanning for a matching day within one month.
enum NextDay {
    /// The current day already satisfies the day fields.
    Current,
    /// A later day of the same month does.
    Later(NaiveDate),
    /// No day of this month does; carry into the next month.
    NextMonth,
}

impl CronExpression {
    /// The smallest instant strictly after `from` that satisfies all six
    /// fields, evaluated in the expression's timezone.
    ///
    /// The search works at whole-second granularity: `from` is truncated to
    /// its second and the scan starts one second later. Fields are walked
    /// second → minute → hour → day → month; whenever a field has to move,
    /// all finer fields reset and the scan restarts, so a bump can carry all
    /// the way into the year. A local time that falls inside a DST
    /// spring-forward gap is skipped to the first instant that exists again
    /// and re-validated from there; an ambiguous fall-back time resolves to
    /// its earlier occurrence.
    ///
    /// Fails with [`CronError::NoMatch`] once the search has crossed
    /// [`SEARCH_HORIZON_YEARS`] without finding a match.
    pub fn next_after(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let start = from
            .with_timezone(&self.tz)
            .naive_local()
            .with_nanosecond(0)
            .unwrap()
            + Duration::seconds(1);
        let horizon = start.year() + SEARCH_HORIZON_YEARS;

        let mut t = start;
        loop {
            if t.year() > horizon {
                return Err(CronError::NoMatch(format!(
                    "no matching instant within {SEARCH_HORIZON_YEARS} years after {from}"
                )));
            }

            // Second.
            let second = t.second();
            match next_set(self.seconds, second) {
                Some(v) if v == second => {}
                Some(v) => {
                    // No finer field to reset; fall through to the minute.
                    t = t.with_second(v).unwrap();
                }
                None => {
                    t = t.with_second(0).unwrap() + Duration::minutes(1);
                    continue;
                }
            }

            // Minute.
            let minute = t.minute();
            match next_set(self.minutes, minute) {
                Some(v) if v == minute => {}
                Some(v) => {
                    t = t.with_minute(v).unwrap().with_second(0).unwrap();
                    continue;
                }
                None => {
                    t = t.with_minute(0).unwrap().with_second(0).unwrap() + Duration::hours(1);
                    continue;
                }
            }

            // Hour.
            let hour = t.hour();
            match next_set(self.hours, hour) {
                Some(v) if v == hour => {}
                Some(v) => {
                    t = at_midnight(t.date()).with_hour(v).unwrap();
                    continue;
                }
                None => {
                    t = at_midnight(t.date()) + Duration::days(1);
                    continue;
                }
            }

            // Day, honoring the day-of-month/day-of-week combination and real
            // month lengths.
            match self.next_day_in_month(t.date()) {
                NextDay::Current => {}
                NextDay::Later(date) => {
                    t = at_midnight(date);
                    continue;
                }
                NextDay::NextMonth => {
                    t = at_midnight(first_of_next_month(t.date()));
                    continue;
                }
            }

            // Month.
            let month = t.month();
            match next_set(self.months, month) {
                Some(v) if v == month => {}
                Some(v) => {
                    t = at_midnight(NaiveDate::from_ymd_opt(t.year(), v, 1).unwrap());
                    continue;
                }
                None => {
                    t = at_midnight(NaiveDate::from_ymd_opt(t.year() + 1, 1, 1).unwrap());
                    continue;
                }
            }

            // All six fields agree on `t`; resolve the wall time in the zone.
            match self.tz.from_local_datetime(&t) {
                LocalResult::Single(dt) => return Ok(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(earlier, _) => return Ok(earlier.with_timezone(&Utc)),
                LocalResult::None => {
                    // Spring-forward gap: this wall time never happens.
                    // Resume from the first local instant that exists again.
                    let resumed = skip_gap(&self.tz, t);
                    debug!(gapped = %t, resumed = %resumed, tz = %self.tz, "local time in DST gap, skipping");
                    t = resumed;
                    continue;
                }
            }
        }
    }

    /// Epoch-millisecond form of [`next_after`](Self::next_after), mirroring
    /// the classic `next(long) -> long` contract.
    pub fn next_after_millis(&self, from_millis: i64) -> Result<i64> {
        let from = DateTime::from_timestamp_millis(from_millis).ok_or_else(|| {
            CronError::NoMatch(format!("timestamp {from_millis}ms is not a representable instant"))
        })?;
        Ok(self.next_after(from)?.timestamp_millis())
    }

    fn next_day_in_month(&self, from: NaiveDate) -> NextDay {
        let (year, month) = (from.year(), from.month());
        let last = days_in_month(year, month);
        let mut day = from.day();
        while day <= last {
            let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            if self.day_matches(date) {
                return if day == from.day() { NextDay::Current } else { NextDay::Later(date) };
            }
            day += 1;
        }
        NextDay::NextMonth
    }
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap()
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    first_of_next_month(NaiveDate::from_ymd_opt(year, month, 1).unwrap())
        .pred_opt()
        .unwrap()
        .day()
}

/// Walk forward minute by minute until the wall time exists again. DST
/// transitions land on whole minutes, so this finds the exact gap end.
fn skip_gap(tz: &Tz, gapped: NaiveDateTime) -> NaiveDateTime {
    let mut t = gapped.with_second(0).unwrap() + Duration::minutes(1);
    while let LocalResult::None = tz.from_local_datetime(&t) {
        t += Duration::minutes(1);
    }
    t
}
