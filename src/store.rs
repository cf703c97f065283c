//! The interval store: an ordered collection of tagged intervals for one
//! document, with the invariants I1-I5 from the data model.

use crate::error::ProvError;
use crate::model::TaggedInterval;

/// Ordered collection of `TaggedInterval`s for a single document.
#[derive(Debug, Clone, Default)]
pub struct IntervalStore {
    intervals: Vec<TaggedInterval>,
}

impl IntervalStore {
    pub fn new() -> Self {
        IntervalStore { intervals: Vec::new() }
    }

    pub fn from_vec(intervals: Vec<TaggedInterval>) -> Self {
        IntervalStore { intervals }
    }

    pub fn as_slice(&self) -> &[TaggedInterval] {
        &self.intervals
    }

    pub fn into_vec(self) -> Vec<TaggedInterval> {
        self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn push(&mut self, interval: TaggedInterval) {
        self.intervals.push(interval);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedInterval> {
        self.intervals.iter()
    }

    /// Re-establishes I3 (sort by start, then end) and I5 (no full-field
    /// duplicates). Does not attempt to fix I1/I2/I4 — those are the
    /// responsibility of whichever transform produced the intervals; this
    /// is just the bookkeeping pass run after every mutation.
    pub fn normalize(&mut self) {
        self.intervals.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));
        self.intervals.dedup_by(|a, b| a == b);
    }

    /// Checks I1-I4 against `doc_bounds` (the last valid position in the
    /// document, inclusive). Returns the first violation found, if any.
    pub fn check_invariants(&self, doc_bounds: crate::position::Position) -> Result<(), String> {
        for iv in &self.intervals {
            if iv.range.start > iv.range.end {
                return Err(format!("inverted interval {:?}", iv.range));
            }
            if iv.range.end > doc_bounds {
                return Err(format!("interval {:?} exceeds document bounds {:?}", iv.range, doc_bounds));
            }
        }
        for i in 0..self.intervals.len() {
            for j in (i + 1)..self.intervals.len() {
                let a = &self.intervals[i];
                let b = &self.intervals[j];
                if !a.is_empty() && !b.is_empty() && a.range.overlaps(&b.range) {
                    return Err(format!("strict overlap between {:?} and {:?}", a.range, b.range));
                }
                if a == b {
                    return Err(format!("duplicate interval {:?}", a.range));
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self, doc_bounds: crate::position::Position, uri: &str) -> Result<(), ProvError> {
        self.check_invariants(doc_bounds)
            .map_err(|message| ProvError::InvariantViolation { uri: uri.to_string(), message })
    }
}

impl FromIterator<TaggedInterval> for IntervalStore {
    fn from_iter<T: IntoIterator<Item = TaggedInterval>>(iter: T) -> Self {
        IntervalStore { intervals: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProvenanceKind;
    use crate::position::{Position, Range};

    fn p(l: usize, c: usize) -> Position {
        Position::new(l, c)
    }

    #[test]
    fn normalize_sorts_by_start_then_end() {
        let mut store = IntervalStore::new();
        store.push(TaggedInterval::new(Range::new(p(0, 5), p(0, 6)), ProvenanceKind::UserEdit, 2));
        store.push(TaggedInterval::new(Range::new(p(0, 0), p(0, 1)), ProvenanceKind::UserEdit, 1));
        store.normalize();
        assert_eq!(store.as_slice()[0].range.start, p(0, 0));
    }

    #[test]
    fn check_invariants_flags_strict_overlap() {
        let mut store = IntervalStore::new();
        store.push(TaggedInterval::new(Range::new(p(0, 0), p(0, 5)), ProvenanceKind::UserEdit, 1));
        store.push(TaggedInterval::new(Range::new(p(0, 2), p(0, 7)), ProvenanceKind::UserEdit, 1));
        assert!(store.check_invariants(p(5, 0)).is_err());
    }

    #[test]
    fn check_invariants_allows_touching_non_empty_intervals() {
        let mut store = IntervalStore::new();
        store.push(TaggedInterval::new(Range::new(p(0, 0), p(0, 5)), ProvenanceKind::UserEdit, 1));
        store.push(TaggedInterval::new(Range::new(p(0, 5), p(0, 7)), ProvenanceKind::UserEdit, 1));
        assert!(store.check_invariants(p(5, 0)).is_ok());
    }
}
