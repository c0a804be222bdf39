use std::fmt;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use super::{EngineError, WINDOW_DAYS};

/// An inclusive run of calendar days, `start..=end`.
///
/// The constructor rejects `end < start`, so every `Span` in circulation
/// covers at least one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    start: NaiveDate,
    end: NaiveDate,
}

impl Span {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidRange {
                entry: start,
                exit: end,
            });
        }
        Ok(Self { start, end })
    }

    /// Builds a span from two endpoints given in either order.
    pub fn ordered(a: NaiveDate, b: NaiveDate) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> u32 {
        let diff = (self.end - self.start).num_days() + 1;
        u32::try_from(diff).unwrap_or(u32::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn intersect(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Span { start, end })
    }

    /// True when `next` overlaps this span or starts the day right after it.
    pub fn touches(&self, next: &Span) -> bool {
        match self.end.succ_opt() {
            Some(after) => next.start <= after && self.start <= next.end,
            None => self.start <= next.end,
        }
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub(crate) fn absorb(&mut self, other: Span) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Anything that occupies a run of calendar days.
pub trait AsSpan {
    fn span(&self) -> Span;
}

impl AsSpan for Span {
    fn span(&self) -> Span {
        *self
    }
}

/// The trailing window `[reference - 179, reference]`.
pub fn window_ending(reference: NaiveDate) -> Span {
    let start = reference
        .checked_sub_days(Days::new(u64::from(WINDOW_DAYS) - 1))
        .unwrap_or(NaiveDate::MIN);
    Span {
        start,
        end: reference,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Span, window_ending};
    use crate::engine::EngineError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn rejects_exit_before_entry() {
        let err = Span::new(date(2024, 5, 2), date(2024, 5, 1)).expect_err("inverted range");
        assert_eq!(
            err,
            EngineError::InvalidRange {
                entry: date(2024, 5, 2),
                exit: date(2024, 5, 1),
            }
        );
    }

    #[test]
    fn single_day_span_counts_one() {
        assert_eq!(Span::day(date(2024, 2, 29)).days(), 1);
    }

    #[test]
    fn touches_adjacent_but_not_gapped() {
        let first = Span::new(date(2024, 3, 1), date(2024, 3, 5)).expect("span");
        let adjacent = Span::new(date(2024, 3, 6), date(2024, 3, 10)).expect("span");
        let gapped = Span::new(date(2024, 3, 7), date(2024, 3, 10)).expect("span");
        assert!(first.touches(&adjacent));
        assert!(!first.touches(&gapped));
    }

    #[test]
    fn window_is_180_days_inclusive() {
        let window = window_ending(date(2024, 6, 28));
        assert_eq!(window.days(), 180);
        assert_eq!(window.start(), date(2024, 1, 1));
    }

    #[test]
    fn iter_days_includes_both_ends() {
        let span = Span::ordered(date(2024, 1, 3), date(2024, 1, 1));
        let days: Vec<_> = span.iter_days().collect();
        assert_eq!(days, vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]);
    }
}
