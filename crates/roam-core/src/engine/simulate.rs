use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

use super::normalize::normalize_with;
use super::span::{AsSpan, Span};
use super::usage::used_days;
use super::MAX_PRESENCE_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStayResult {
    pub allowed: bool,
    pub violation_date: Option<NaiveDate>,
    /// Usage measured on the candidate exit day, history and candidate combined.
    pub used_on_exit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxStayResult {
    pub max_days: u32,
    /// Last day of the longest safe stay; `None` when not even one day fits.
    #[serde(rename = "untilDate")]
    pub until: Option<NaiveDate>,
}

/// Simulates adding `candidate` to `trips` and reports the first day of the
/// candidate on which the rolling usage goes above the limit.
///
/// Every day of the candidate is evaluated in order and the scan stops at
/// the first breach.
#[tracing::instrument(skip(trips), fields(trips = trips.len(), candidate = %candidate))]
pub fn check_stay<T: AsSpan>(trips: &[T], candidate: Span) -> CheckStayResult {
    let combined = normalize_with(trips, candidate);
    let violation_date = candidate
        .iter_days()
        .find(|day| used_days(&combined, *day) > MAX_PRESENCE_DAYS);
    let used_on_exit = used_days(&combined, candidate.end());

    if let Some(day) = violation_date {
        debug!(violation = %day, used_on_exit, "candidate stay breaches the limit");
    }

    CheckStayResult {
        allowed: violation_date.is_none(),
        violation_date,
        used_on_exit,
    }
}

/// Longest stay starting on `entry` that [`check_stay`] still accepts.
///
/// Usage on day `d` only sees presence up to `d`, so for a fixed entry the
/// verdict on `entry..=d` does not depend on how far past `d` the trip runs.
/// One scan over the 90-day candidate therefore gives the same answer as
/// re-simulating every length: the first violating day bounds the stay.
#[tracing::instrument(skip(trips), fields(trips = trips.len(), entry = %entry))]
pub fn max_safe_stay<T: AsSpan>(trips: &[T], entry: NaiveDate) -> MaxStayResult {
    let last = entry
        .checked_add_days(Days::new(u64::from(MAX_PRESENCE_DAYS) - 1))
        .unwrap_or(NaiveDate::MAX);
    let longest = Span::ordered(entry, last);

    let until = match check_stay(trips, longest).violation_date {
        Some(violation) => violation.pred_opt().filter(|day| *day >= entry),
        None => Some(last),
    };
    let max_days = until.map_or(0, |until| Span::ordered(entry, until).days());

    debug!(max_days, until = ?until, "resolved max safe stay");
    MaxStayResult { max_days, until }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::{check_stay, max_safe_stay};
    use crate::engine::{MAX_PRESENCE_DAYS, Span, normalize, used_days};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn plus(day: NaiveDate, n: u64) -> NaiveDate {
        day.checked_add_days(Days::new(n)).expect("in range")
    }

    /// Re-simulates every candidate length and stops at the first failure.
    fn max_stay_by_resimulation(trips: &[Span], entry: NaiveDate) -> u32 {
        let mut best = 0;
        for len in 1..=u64::from(MAX_PRESENCE_DAYS) {
            let candidate = Span::new(entry, plus(entry, len - 1)).expect("span");
            if !check_stay(trips, candidate).allowed {
                break;
            }
            best = len as u32;
        }
        best
    }

    fn histories() -> Vec<Vec<Span>> {
        vec![
            vec![],
            vec![Span::new(date(2024, 1, 1), date(2024, 2, 29)).expect("span")],
            vec![
                Span::new(date(2023, 11, 1), date(2023, 12, 20)).expect("span"),
                Span::new(date(2024, 2, 1), date(2024, 3, 15)).expect("span"),
            ],
            vec![
                Span::new(date(2024, 1, 1), date(2024, 3, 30)).expect("span"),
                Span::new(date(2024, 3, 25), date(2024, 4, 2)).expect("span"),
            ],
        ]
    }

    #[test]
    fn empty_history_breaches_on_day_91() {
        let entry = date(2024, 7, 1);
        let result = check_stay::<Span>(&[], Span::new(entry, plus(entry, 91)).expect("span"));
        assert!(!result.allowed);
        assert_eq!(result.violation_date, Some(plus(entry, 90)));
    }

    #[test]
    fn empty_history_allows_exactly_90_days() {
        let entry = date(2025, 2, 10);
        let result = check_stay::<Span>(&[], Span::new(entry, plus(entry, 89)).expect("span"));
        assert!(result.allowed);
        assert_eq!(result.violation_date, None);
        assert_eq!(result.used_on_exit, 90);
    }

    #[test]
    fn reports_first_violating_day_inside_trip() {
        // 60 days in Jan-Feb are all still in the window during May.
        let history = [Span::new(date(2024, 1, 1), date(2024, 2, 29)).expect("span")];
        let entry = date(2024, 5, 1);
        let candidate = Span::new(entry, plus(entry, 59)).expect("span");
        let result = check_stay(&history, candidate);
        assert!(!result.allowed);
        assert_eq!(result.violation_date, Some(date(2024, 5, 31)));
        assert!(result.used_on_exit > MAX_PRESENCE_DAYS);
    }

    #[test]
    fn allowed_stay_reports_usage_on_exit() {
        for history in histories() {
            let entry = date(2024, 6, 1);
            let candidate = Span::new(entry, plus(entry, 4)).expect("span");
            let result = check_stay(&history, candidate);
            if result.allowed {
                let mut combined = history.clone();
                combined.push(candidate);
                let used = used_days(&normalize(&combined), candidate.end());
                assert_eq!(result.used_on_exit, used);
                assert!(used <= MAX_PRESENCE_DAYS);
            }
        }
    }

    #[test]
    fn max_stay_on_empty_history_is_90() {
        for entry in [date(2024, 1, 1), date(2024, 2, 29), date(2031, 12, 31)] {
            let result = max_safe_stay::<Span>(&[], entry);
            assert_eq!(result.max_days, 90);
            assert_eq!(result.until, Some(plus(entry, 89)));
        }
    }

    #[test]
    fn max_stay_zero_when_window_is_full() {
        let history = [Span::new(date(2024, 1, 1), date(2024, 3, 30)).expect("span")];
        let result = max_safe_stay(&history, date(2024, 3, 31));
        assert_eq!(result.max_days, 0);
        assert_eq!(result.until, None);
    }

    #[test]
    fn max_stay_matches_resimulation() {
        for history in histories() {
            for entry in [date(2024, 3, 1), date(2024, 4, 10), date(2024, 6, 15), date(2024, 9, 1)] {
                let result = max_safe_stay(&history, entry);
                assert_eq!(result.max_days, max_stay_by_resimulation(&history, entry));
            }
        }
    }

    #[test]
    fn max_stay_sits_on_the_boundary() {
        for history in histories() {
            let entry = date(2024, 4, 20);
            let result = max_safe_stay(&history, entry);
            let len = u64::from(result.max_days);
            if len > 0 {
                let fits = Span::new(entry, plus(entry, len - 1)).expect("span");
                assert!(check_stay(&history, fits).allowed);
            }
            if result.max_days < MAX_PRESENCE_DAYS {
                let too_long = Span::new(entry, plus(entry, len)).expect("span");
                assert!(!check_stay(&history, too_long).allowed);
            }
        }
    }

    #[test]
    fn max_stay_serializes_until_date() {
        let entry = date(2024, 1, 1);
        let json = serde_json::to_value(max_safe_stay::<Span>(&[], entry)).expect("serialize");
        assert_eq!(json, serde_json::json!({ "maxDays": 90, "untilDate": "2024-03-30" }));

        let full = [Span::new(date(2023, 9, 1), date(2023, 12, 31)).expect("span")];
        let json = serde_json::to_value(max_safe_stay(&full, entry)).expect("serialize");
        assert_eq!(json["maxDays"], 0);
        assert!(json["untilDate"].is_null());
    }
}
