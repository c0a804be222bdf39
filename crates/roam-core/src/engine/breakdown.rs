use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use super::normalize::normalize;
use super::span::{AsSpan, Span, window_ending};
use super::usage::used_days;
use super::MAX_PRESENCE_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "MonthCount")]
pub struct MonthUsage {
    pub year: i32,
    pub month: u32,
    /// Presence days in this month that also fall inside the window.
    pub days: u32,
}

impl MonthUsage {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Wire shape of a histogram bucket: `{"month": "2024-05", "count": 12}`.
#[derive(Serialize)]
struct MonthCount {
    month: String,
    count: u32,
}

impl From<MonthUsage> for MonthCount {
    fn from(usage: MonthUsage) -> Self {
        Self {
            month: usage.label(),
            count: usage.days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownResult {
    pub window: Span,
    pub monthly: Vec<MonthUsage>,
    pub violations: Vec<NaiveDate>,
}

/// Month-by-month presence over the window ending on `reference`, plus
/// every presence day in that window whose own rolling usage exceeds 90.
///
/// Months touched by the window are listed even when empty.
#[tracing::instrument(skip(trips), fields(trips = trips.len(), reference = %reference))]
pub fn breakdown<T: AsSpan>(trips: &[T], reference: NaiveDate) -> BreakdownResult {
    let spans = normalize(trips);
    let window = window_ending(reference);

    let mut monthly: Vec<MonthUsage> = Vec::new();
    let mut violations = Vec::new();

    for day in window.iter_days() {
        let present = spans.contains(day);
        match monthly.last_mut() {
            Some(bucket) if bucket.year == day.year() && bucket.month == day.month() => {
                bucket.days += u32::from(present);
            }
            _ => monthly.push(MonthUsage {
                year: day.year(),
                month: day.month(),
                days: u32::from(present),
            }),
        }

        if present && used_days(&spans, day) > MAX_PRESENCE_DAYS {
            violations.push(day);
        }
    }

    debug!(months = monthly.len(), violations = violations.len(), "built window breakdown");
    BreakdownResult {
        window,
        monthly,
        violations,
    }
}
