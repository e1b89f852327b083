use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{CronError, Result};

/// Legal value range of one cron field, plus its named aliases if any.
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    /// Three-letter aliases, in value order starting at `name_base`.
    /// Empty for numeric-only fields.
    names: &'static [&'static str],
    name_base: u32,
}

const SECOND: FieldSpec = FieldSpec { name: "second", min: 0, max: 59, names: &[], name_base: 0 };
const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], name_base: 0 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], name_base: 0 };
const DAY_OF_MONTH: FieldSpec =
    FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], name_base: 0 };
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"],
    name_base: 1,
};
// Parsed over 0-7 so that 7 can alias Sunday; bit 7 is folded onto bit 0
// before the mask is stored.
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"],
    name_base: 0,
};

/// A parsed six-field cron expression (second, minute, hour, day-of-month,
/// month, day-of-week) bound to the timezone its calendar arithmetic runs in.
///
/// Each field is kept as a bitmask over the field's legal values, so two
/// expressions that spell the same schedule differently (`57,59` vs `57/2`)
/// compare equal. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    pub(crate) seconds: u64,
    pub(crate) minutes: u64,
    pub(crate) hours: u64,
    pub(crate) days_of_month: u64,
    pub(crate) months: u64,
    pub(crate) days_of_week: u64,
    /// Whether the day-of-month field was written as `*`/`?`; the day
    /// combination rule needs to know, even though the mask is full either way.
    pub(crate) dom_wildcard: bool,
    pub(crate) dow_wildcard: bool,
    pub(crate) tz: Tz,
}

impl CronExpression {
    /// Parse a six-field cron expression.
    ///
    /// Grammar per field: `*`, a single value, a range `a-b`, a step
    /// `base/n` (base is `*`, a value, or a range; a bare value means
    /// "from there to the field maximum"), and comma-separated lists of the
    /// above. Months and weekdays also accept case-insensitive three-letter
    /// names (`FEB`, `mon`, ...). `?` is a wildcard accepted only in the two
    /// day fields, and weekday `7` is an alias for Sunday (`0`).
    ///
    /// Fields are split on runs of whitespace, so extra spacing is harmless.
    pub fn parse(expr: &str, tz: Tz) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(CronError::Parse(format!(
                "expected 6 fields (second minute hour day-of-month month day-of-week), got {} in '{expr}'",
                fields.len()
            )));
        }

        let (seconds, _) = parse_field(fields[0], &SECOND, false)?;
        let (minutes, _) = parse_field(fields[1], &MINUTE, false)?;
        let (hours, _) = parse_field(fields[2], &HOUR, false)?;
        let (days_of_month, dom_wildcard) = parse_field(fields[3], &DAY_OF_MONTH, true)?;
        let (months, _) = parse_field(fields[4], &MONTH, false)?;
        let (raw_dow, dow_wildcard) = parse_field(fields[5], &DAY_OF_WEEK, true)?;

        Ok(Self {
            seconds,
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week: fold_sunday(raw_dow),
            dom_wildcard,
            dow_wildcard,
            tz,
        })
    }

    /// The timezone this expression evaluates in.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Whether `instant` (taken at whole-second granularity) satisfies all
    /// six fields in the expression's timezone.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.tz);
        contains(self.seconds, local.second())
            && contains(self.minutes, local.minute())
            && contains(self.hours, local.hour())
            && contains(self.months, local.month())
            && self.day_matches(local.date_naive())
    }

    /// The day-combination rule: a wildcard day field defers entirely to the
    /// other one; when both are restricted, a day matches if either accepts
    /// it (the classic cron convention).
    pub(crate) fn day_matches(&self, date: NaiveDate) -> bool {
        let dom_hit = contains(self.days_of_month, date.day());
        let dow_hit = contains(self.days_of_week, date.weekday().num_days_from_sunday());
        match (self.dom_wildcard, self.dow_wildcard) {
            (true, true) => true,
            (true, false) => dow_hit,
            (false, true) => dom_hit,
            (false, false) => dom_hit || dow_hit,
        }
    }
}

pub(crate) fn contains(mask: u64, value: u32) -> bool {
    mask & (1 << value) != 0
}

/// Smallest set value >= `from`, or None if the mask has no bit there or above.
pub(crate) fn next_set(mask: u64, from: u32) -> Option<u32> {
    let shifted = mask >> from;
    if shifted == 0 {
        None
    } else {
        Some(from + shifted.trailing_zeros())
    }
}

fn mask_range(lo: u32, hi: u32) -> u64 {
    let mut mask = 0u64;
    for v in lo..=hi {
        mask |= 1 << v;
    }
    mask
}

/// Weekday 7 is an alias for Sunday; normalize it onto bit 0.
fn fold_sunday(mask: u64) -> u64 {
    if contains(mask, 7) {
        (mask & !(1 << 7)) | 1
    } else {
        mask
    }
}

/// Parse one whole field into (mask, was_wildcard).
fn parse_field(token: &str, spec: &FieldSpec, day_field: bool) -> Result<(u64, bool)> {
    if token == "*" || (day_field && token == "?") {
        return Ok((mask_range(spec.min, spec.max), true));
    }
    if token == "?" {
        return Err(CronError::Parse(format!("'?' is not valid in the {} field", spec.name)));
    }

    let mut mask = 0u64;
    for item in token.split(',') {
        mask |= parse_item(item, spec)?;
    }
    if mask == 0 {
        // Unreachable through the grammar above, but the non-empty invariant
        // is what the evaluator relies on.
        return Err(CronError::Parse(format!("{} field matches no values", spec.name)));
    }
    Ok((mask, false))
}

/// Parse one list item: `*`, `a`, `a-b`, optionally followed by `/n`.
fn parse_item(item: &str, spec: &FieldSpec) -> Result<u64> {
    let (base, step) = match item.split_once('/') {
        Some((base, step_text)) => {
            let step = step_text.parse::<u32>().ok().filter(|s| *s > 0).ok_or_else(|| {
                CronError::Parse(format!(
                    "step '/{step_text}' in {} field must be a positive integer",
                    spec.name
                ))
            })?;
            (base, Some(step))
        }
        None => (item, None),
    };

    let (lo, hi) = if base == "*" {
        (spec.min, spec.max)
    } else if let Some((a, b)) = base.split_once('-') {
        let lo = parse_value(a, spec)?;
        let hi = parse_value(b, spec)?;
        if lo > hi {
            return Err(CronError::Parse(format!(
                "reversed {} range {lo}-{hi} (ranges do not wrap)",
                spec.name
            )));
        }
        (lo, hi)
    } else {
        let v = parse_value(base, spec)?;
        // A stepped bare value (`4/4`) runs from there to the field maximum.
        (v, if step.is_some() { spec.max } else { v })
    };

    let step = step.unwrap_or(1);
    let mut mask = 0u64;
    let mut v = lo;
    while v <= hi {
        mask |= 1 << v;
        v += step;
    }
    Ok(mask)
}

/// Parse one numeric or named value and range-check it.
fn parse_value(token: &str, spec: &FieldSpec) -> Result<u32> {
    let value = if let Ok(n) = token.parse::<u32>() {
        n
    } else {
        let upper = token.to_ascii_uppercase();
        match spec.names.iter().position(|n| *n == upper) {
            Some(i) => spec.name_base + i as u32,
            None => {
                return Err(CronError::Parse(format!(
                    "unrecognized {} value '{token}'",
                    spec.name
                )))
            }
        }
    };
    if value < spec.min || value > spec.max {
        return Err(CronError::Parse(format!(
            "{} value {value} out of range {}-{}",
            spec.name, spec.min, spec.max
        )));
    }
    Ok(value)
}
