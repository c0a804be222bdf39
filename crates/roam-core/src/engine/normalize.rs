use chrono::NaiveDate;
use serde::Serialize;

use super::span::{AsSpan, Span};

/// Sorted, pairwise disjoint and non-adjacent spans.
///
/// Only [`normalize`] builds one, which is what lets [`super::used_days`]
/// skip merging without risking double-counted days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedSpans(Vec<Span>);

impl NormalizedSpans {
    pub fn as_slice(&self) -> &[Span] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Span> {
        self.0
    }

    pub fn total_days(&self) -> u64 {
        self.0.iter().map(|span| u64::from(span.days())).sum()
    }

    /// Presence test for one day, by binary search.
    pub fn contains(&self, date: NaiveDate) -> bool {
        let idx = self.0.partition_point(|span| span.end() < date);
        self.0.get(idx).is_some_and(|span| span.contains(date))
    }
}

impl<'a> IntoIterator for &'a NormalizedSpans {
    type Item = &'a Span;
    type IntoIter = std::slice::Iter<'a, Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Collapses arbitrary, possibly overlapping intervals into their minimal
/// sorted form. Back-to-back intervals (zero-day gap) merge; a gap of one
/// or more empty days keeps them apart.
pub fn normalize<T: AsSpan>(items: &[T]) -> NormalizedSpans {
    normalize_spans(items.iter().map(AsSpan::span).collect())
}

pub(crate) fn normalize_with<T: AsSpan>(items: &[T], extra: Span) -> NormalizedSpans {
    let mut spans: Vec<Span> = items.iter().map(AsSpan::span).collect();
    spans.push(extra);
    normalize_spans(spans)
}

fn normalize_spans(mut spans: Vec<Span>) -> NormalizedSpans {
    spans.sort_unstable();

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(current) if current.touches(&span) => current.absorb(span),
            _ => merged.push(span),
        }
    }

    NormalizedSpans(merged)
}
