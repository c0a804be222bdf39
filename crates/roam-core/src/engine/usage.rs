use chrono::NaiveDate;

use super::normalize::NormalizedSpans;
use super::span::window_ending;

/// Presence days inside the 180-day window ending on `reference`.
///
/// Always within `0..=180`.
pub fn used_days(spans: &NormalizedSpans, reference: NaiveDate) -> u32 {
    let window = window_ending(reference);
    spans
        .iter()
        .take_while(|span| span.start() <= reference)
        .filter_map(|span| span.intersect(&window))
        .map(|overlap| overlap.days())
        .sum()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::used_days;
    use crate::engine::{Span, normalize};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn counts_single_trip_up_to_reference() {
        let spans = normalize(&[Span::new(date(2024, 1, 1), date(2024, 1, 10)).expect("span")]);
        assert_eq!(used_days(&spans, date(2024, 1, 10)), 10);
        assert_eq!(used_days(&spans, date(2024, 1, 5)), 5);
    }

    #[test]
    fn ignores_presence_outside_window() {
        let spans = normalize(&[Span::new(date(2023, 1, 1), date(2023, 3, 1)).expect("span")]);
        assert_eq!(used_days(&spans, date(2024, 1, 1)), 0);
        assert_eq!(used_days(&spans, date(2022, 12, 31)), 0);
    }

    #[test]
    fn clips_trip_at_back_edge() {
        // window ending 2024-06-28 starts 2024-01-01
        let spans = normalize(&[Span::new(date(2023, 12, 22), date(2024, 1, 10)).expect("span")]);
        assert_eq!(used_days(&spans, date(2024, 6, 28)), 10);
    }

    #[test]
    fn full_presence_saturates_at_window_length() {
        let spans = normalize(&[Span::new(date(2020, 1, 1), date(2030, 1, 1)).expect("span")]);
        assert_eq!(used_days(&spans, date(2025, 7, 1)), 180);
    }
}
