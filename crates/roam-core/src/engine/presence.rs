use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use super::span::{AsSpan, Span};
use crate::trip::Trip;

/// Explicit per-day view of a trip list, used while applying an edit.
///
/// Edits never patch individual trips: the list is expanded to days, the
/// days are changed, and a whole new list is collapsed back out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet(BTreeSet<NaiveDate>);

impl PresenceSet {
    pub fn expand<T: AsSpan>(trips: &[T]) -> Self {
        let mut set = Self::default();
        for trip in trips {
            set.insert_span(trip.span());
        }
        set
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date)
    }

    /// Flips membership of `date`; returns whether it is present afterwards.
    pub fn toggle(&mut self, date: NaiveDate) -> bool {
        if self.0.remove(&date) {
            false
        } else {
            self.0.insert(date);
            true
        }
    }

    pub fn insert_span(&mut self, span: Span) {
        self.0.extend(span.iter_days());
    }

    pub fn remove_span(&mut self, span: Span) {
        self.0.retain(|day| !span.contains(*day));
    }

    /// Run-length encodes the set into maximal runs of consecutive days.
    pub fn runs(&self) -> Vec<Span> {
        let mut runs: Vec<Span> = Vec::new();
        for &day in &self.0 {
            match runs.last_mut() {
                Some(run) if run.end().succ_opt() == Some(day) => run.absorb(Span::day(day)),
                _ => runs.push(Span::day(day)),
            }
        }
        runs
    }

    /// Trips for every run, each with a fresh id.
    pub fn collapse(&self) -> Vec<Trip> {
        self.runs().into_iter().map(Trip::new).collect()
    }
}

#[tracing::instrument(skip(trips), fields(trips = trips.len(), date = %date))]
pub fn toggle_presence(trips: &[Trip], date: NaiveDate) -> Vec<Trip> {
    let mut set = PresenceSet::expand(trips);
    let present = set.toggle(date);
    debug!(present, "toggled presence day");
    set.collapse()
}

/// Marks every day between `a` and `b` as present; either order is accepted.
#[tracing::instrument(skip(trips), fields(trips = trips.len()))]
pub fn add_range(trips: &[Trip], a: NaiveDate, b: NaiveDate) -> Vec<Trip> {
    let mut set = PresenceSet::expand(trips);
    let span = Span::ordered(a, b);
    set.insert_span(span);
    debug!(range = %span, days = set.len(), "added presence range");
    set.collapse()
}

/// Clears every day between `a` and `b`; either order is accepted.
#[tracing::instrument(skip(trips), fields(trips = trips.len()))]
pub fn remove_range(trips: &[Trip], a: NaiveDate, b: NaiveDate) -> Vec<Trip> {
    let mut set = PresenceSet::expand(trips);
    let span = Span::ordered(a, b);
    set.remove_span(span);
    debug!(range = %span, days = set.len(), "removed presence range");
    set.collapse()
}
