//! The log merger: reconciles a just-loaded annotation log with the live
//! store, by timestamp precedence, one new interval at a time.

use crate::model::TaggedInterval;
use crate::position::Range;
use crate::store::IntervalStore;

fn strictly_overlaps(a: &Range, b: &Range) -> bool {
    a.start < b.end && b.start < a.end
}

/// Merges `new_batch` into `store`, each new interval winning or losing
/// against whichever existing intervals it strictly overlaps, by
/// `creation_ts` precedence (ties go to the existing interval).
///
/// `new_batch` entries are processed in order; later entries in the batch
/// see the store as already reconciled with earlier ones.
pub fn merge_sequentially(store: IntervalStore, new_batch: Vec<TaggedInterval>) -> IntervalStore {
    let mut current: Vec<TaggedInterval> = store.into_vec();

    for n in new_batch {
        let (candidates, rest): (Vec<_>, Vec<_>) =
            current.into_iter().partition(|ex| strictly_overlaps(&ex.range, &n.range));

        let mut ex_outputs: Vec<TaggedInterval> = Vec::new();
        let mut n_remaining: Vec<Range> = vec![n.range];

        let mut sorted_candidates = candidates;
        sorted_candidates.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));

        for ex in sorted_candidates {
            let mut ex_wins_here = false;
            let mut next_remaining = Vec::new();

            for f in n_remaining {
                if !strictly_overlaps(&ex.range, &f) {
                    next_remaining.push(f);
                    continue;
                }
                if n.creation_ts > ex.creation_ts {
                    // n wins: clip ex down to the slices of ex outside f,
                    // non-empty only. f (the part of n in contention) is
                    // untouched and survives.
                    if let Some(left) = Range::try_new(ex.range.start, f.start) {
                        if !left.is_empty() {
                            ex_outputs.push(TaggedInterval { range: left, ..ex.clone() });
                        }
                    }
                    if let Some(right) = Range::try_new(f.end, ex.range.end) {
                        if !right.is_empty() {
                            ex_outputs.push(TaggedInterval { range: right, ..ex.clone() });
                        }
                    }
                    next_remaining.push(f);
                } else {
                    // ex wins: trim f to the parts outside ex, non-empty
                    // only; ex itself is kept as-is (pushed once below).
                    ex_wins_here = true;
                    if let Some(left) = Range::try_new(f.start, ex.range.start) {
                        if !left.is_empty() {
                            next_remaining.push(left);
                        }
                    }
                    if let Some(right) = Range::try_new(ex.range.end, f.end) {
                        if !right.is_empty() {
                            next_remaining.push(right);
                        }
                    }
                }
            }

            if ex_wins_here {
                ex_outputs.push(ex);
            }
            n_remaining = next_remaining;
        }

        let n_outputs: Vec<TaggedInterval> =
            n_remaining.into_iter().map(|range| TaggedInterval { range, ..n.clone() }).collect();

        current = rest;
        current.extend(ex_outputs);
        current.extend(n_outputs);
    }

    current.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));
    current.dedup_by(|a, b| a == b);
    IntervalStore::from_vec(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProvenanceKind;
    use crate::position::Position;

    fn p(l: usize, c: usize) -> Position {
        Position::new(l, c)
    }

    #[test]
    fn s5_newer_interval_splits_older_one() {
        let existing = TaggedInterval::new(Range::new(p(0, 0), p(0, 10)), ProvenanceKind::UserEdit, 1_000);
        let store = IntervalStore::from_vec(vec![existing]);
        let incoming = TaggedInterval::new(Range::new(p(0, 5), p(0, 15)), ProvenanceKind::AiGenerated, 2_000);
        let merged = merge_sequentially(store, vec![incoming]);
        let ivs = merged.as_slice();
        assert_eq!(ivs.len(), 2);
        assert_eq!(ivs[0].kind, ProvenanceKind::UserEdit);
        assert_eq!(ivs[0].range, Range::new(p(0, 0), p(0, 5)));
        assert_eq!(ivs[0].creation_ts, 1_000);
        assert_eq!(ivs[1].kind, ProvenanceKind::AiGenerated);
        assert_eq!(ivs[1].range, Range::new(p(0, 5), p(0, 15)));
        assert_eq!(ivs[1].creation_ts, 2_000);
    }

    #[test]
    fn older_incoming_interval_loses_to_existing() {
        let existing = TaggedInterval::new(Range::new(p(0, 0), p(0, 10)), ProvenanceKind::UserEdit, 2_000);
        let store = IntervalStore::from_vec(vec![existing]);
        let incoming = TaggedInterval::new(Range::new(p(0, 2), p(0, 8)), ProvenanceKind::AiGenerated, 1_000);
        let merged = merge_sequentially(store, vec![incoming]);
        let ivs = merged.as_slice();
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].kind, ProvenanceKind::UserEdit);
        assert_eq!(ivs[0].range, Range::new(p(0, 0), p(0, 10)));
    }

    #[test]
    fn incoming_strictly_inside_existing_splits_existing_in_two() {
        let existing = TaggedInterval::new(Range::new(p(0, 0), p(0, 10)), ProvenanceKind::UserEdit, 1_000);
        let store = IntervalStore::from_vec(vec![existing]);
        let incoming = TaggedInterval::new(Range::new(p(0, 3), p(0, 6)), ProvenanceKind::AiGenerated, 2_000);
        let merged = merge_sequentially(store, vec![incoming]);
        let ivs = merged.as_slice();
        assert_eq!(ivs.len(), 3);
        assert_eq!(ivs[0].range, Range::new(p(0, 0), p(0, 3)));
        assert_eq!(ivs[1].range, Range::new(p(0, 3), p(0, 6)));
        assert_eq!(ivs[2].range, Range::new(p(0, 6), p(0, 10)));
    }
}
