use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::date::iso_date_serde;
use crate::engine::{AsSpan, EngineError, Span};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawTrip", rename_all = "camelCase")]
pub struct Trip {
    pub id: String,

    #[serde(with = "iso_date_serde")]
    entry_date: NaiveDate,

    #[serde(with = "iso_date_serde")]
    exit_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrip {
    #[serde(default)]
    id: Option<String>,

    #[serde(with = "iso_date_serde")]
    entry_date: NaiveDate,

    #[serde(with = "iso_date_serde")]
    exit_date: NaiveDate,
}

impl TryFrom<RawTrip> for Trip {
    type Error = EngineError;

    fn try_from(raw: RawTrip) -> Result<Self, Self::Error> {
        let span = Span::new(raw.entry_date, raw.exit_date)?;
        Ok(match raw.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Self::with_id(id, span),
            None => Self::new(span),
        })
    }
}

impl Trip {
    /// A trip over `span` with a freshly minted id.
    pub fn new(span: Span) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), span)
    }

    pub fn with_id(id: impl Into<String>, span: Span) -> Self {
        Self {
            id: id.into(),
            entry_date: span.start(),
            exit_date: span.end(),
        }
    }

    pub fn between(entry: NaiveDate, exit: NaiveDate) -> Result<Self, EngineError> {
        Ok(Self::new(Span::new(entry, exit)?))
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn exit_date(&self) -> NaiveDate {
        self.exit_date
    }

    pub fn days(&self) -> u32 {
        self.span().days()
    }
}

impl AsSpan for Trip {
    fn span(&self) -> Span {
        Span::ordered(self.entry_date, self.exit_date)
    }
}
