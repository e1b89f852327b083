use thiserror::Error;

/// Errors produced while parsing or evaluating a cron expression.
#[derive(Debug, Error)]
pub enum CronError {
    /// The expression text does not conform to the six-field grammar.
    #[error("Invalid cron expression: {0}")]
    Parse(String),

    /// The expression can never match within the bounded search horizon
    /// (e.g. `0 0 0 30 2 *`, February 30th).
    #[error("Unreachable cron expression: {0}")]
    NoMatch(String),
}

pub type Result<T> = std::result::Result<T, CronError>;
