use chrono::NaiveDate;
use serde::Serialize;

use super::normalize::normalize;
use super::simulate::{MaxStayResult, max_safe_stay};
use super::span::{AsSpan, Span};
use super::usage::used_days;
use super::{EngineError, MAX_PRESENCE_DAYS};
use crate::date::shift_days;

/// Dashboard numbers for one reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub reference: NaiveDate,
    pub used: u32,
    pub remaining: u32,
    pub present: bool,
    pub max_stay: MaxStayResult,
}

#[tracing::instrument(skip(trips), fields(trips = trips.len(), reference = %reference))]
pub fn summary<T: AsSpan>(trips: &[T], reference: NaiveDate) -> WindowSummary {
    let spans = normalize(trips);
    let used = used_days(&spans, reference);
    WindowSummary {
        reference,
        used,
        remaining: MAX_PRESENCE_DAYS.saturating_sub(used),
        present: spans.contains(reference),
        max_stay: max_safe_stay(trips, reference),
    }
}

/// Pushes a planned trip's exit out by `days`.
///
/// With an exit already on or after `entry`, the extension is cumulative:
/// the new exit is `exit + days`. Otherwise the plan is rebased on `entry`
/// and the result lasts exactly `days` days (one day when `days` is 0).
pub fn extend_exit(
    entry: NaiveDate,
    exit: Option<NaiveDate>,
    days: u32,
) -> Result<Span, EngineError> {
    let new_exit = match exit.filter(|exit| *exit >= entry) {
        Some(exit) => shift_days(exit, i64::from(days))?,
        None => shift_days(entry, i64::from(days.saturating_sub(1)))?,
    };
    Span::new(entry, new_exit)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{extend_exit, summary};
    use crate::engine::Span;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn extension_is_cumulative_from_valid_exit() {
        let span = extend_exit(date(2024, 5, 1), Some(date(2024, 5, 10)), 5).expect("extend");
        assert_eq!(span.end(), date(2024, 5, 15));
    }

    #[test]
    fn extension_rebases_when_exit_missing_or_before_entry() {
        let missing = extend_exit(date(2024, 5, 1), None, 7).expect("extend");
        assert_eq!(missing, Span::new(date(2024, 5, 1), date(2024, 5, 7)).expect("span"));
        assert_eq!(missing.days(), 7);

        let stale = extend_exit(date(2024, 5, 1), Some(date(2024, 4, 20)), 7).expect("extend");
        assert_eq!(stale, missing);

        let zero = extend_exit(date(2024, 5, 1), None, 0).expect("extend");
        assert_eq!(zero, Span::day(date(2024, 5, 1)));
    }

    #[test]
    fn extension_reports_calendar_overflow() {
        assert!(extend_exit(NaiveDate::MAX, Some(NaiveDate::MAX), 1).is_err());
    }

    #[test]
    fn summary_reports_used_and_remaining() {
        let trips = [Span::new(date(2024, 1, 1), date(2024, 1, 10)).expect("span")];
        let result = summary(&trips, date(2024, 1, 10));
        assert_eq!(result.used, 10);
        assert_eq!(result.remaining, 80);
        assert!(result.present);
        // staying on from the 10th: 81 more days including the 10th itself
        assert_eq!(result.max_stay.max_days, 81);
    }
}
