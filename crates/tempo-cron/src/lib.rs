//! `tempo-cron` — six-field cron expression parsing and evaluation.
//!
//! # Format
//!
//! | Field        | Range | Extras                                   |
//! |--------------|-------|------------------------------------------|
//! | second       | 0-59  |                                          |
//! | minute       | 0-59  |                                          |
//! | hour         | 0-23  |                                          |
//! | day-of-month | 1-31  | `?` as a wildcard                        |
//! | month        | 1-12  | `JAN`-`DEC` names                        |
//! | day-of-week  | 0-7   | `SUN`-`SAT` names, `?`, `7` = `0` = Sunday |
//!
//! Every field takes `*`, single values, ranges (`a-b`), steps (`*/n`,
//! `a/n`, `a-b/n`) and comma-separated lists. When both day fields are
//! restricted a day matches if either accepts it; a `*`/`?` day field
//! defers to the other one.
//!
//! [`CronExpression::next_after`] computes the next matching instant after a
//! timestamp by rolling fields forward with carry, honoring month lengths,
//! leap years and DST transitions in the expression's timezone. Expressions
//! that can never fire (February 30th) are detected against a bounded search
//! horizon and reported as [`CronError::NoMatch`].

pub mod error;
pub mod expression;
pub mod next;

pub use error::{CronError, Result};
pub use expression::CronExpression;
pub use next::SEARCH_HORIZON_YEARS;
