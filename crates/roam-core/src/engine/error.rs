use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the compliance engine.
///
/// None of these are fatal; the host decides whether to reject the edit or
/// show a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid date `{input}`: {reason}")]
    Parse { input: String, reason: String },

    #[error("exit date {exit} is before entry date {entry}")]
    InvalidRange { entry: NaiveDate, exit: NaiveDate },

    #[error("{date} shifted by {days} days falls outside the supported calendar")]
    OutOfRange { date: NaiveDate, days: i64 },
}

impl EngineError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
