//! The edit coalescer: collapses runs of adjacent `UserEdit` intervals into
//! one before persisting, so a log doesn't carry one entry per keystroke.

use crate::model::{ProvenanceKind, TaggedInterval};
use crate::store::IntervalStore;

/// Edits within this many milliseconds of each other's `creation_ts` are
/// considered one continuous typing burst.
pub const COALESCE_WINDOW_MS: i64 = 60_000;

/// Collapses adjacent `UserEdit` intervals in `store` where `prev.end ==
/// cur.start` and the two are within `COALESCE_WINDOW_MS` of one another,
/// keeping the earliest `creation_ts` and the first interval's author and
/// options. Only ever run at persist time, never on the live in-memory
/// store (design note #3: coalescing is lossy for undo granularity).
///
/// Per spec.md §4.4, the selection/grouping pass runs over the `UserEdit`
/// subsequence alone — an intervening non-`UserEdit` interval (e.g. a
/// zero-width `AIGenerated` marker dropped exactly between two typed
/// characters) must not break an otherwise-adjacent run of `UserEdit`s.
/// Non-`UserEdit` intervals pass through unchanged and are merged back in
/// by position afterwards.
pub fn coalesce(store: IntervalStore) -> IntervalStore {
    let mut intervals = store.into_vec();
    intervals.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));

    let (user_edits, others): (Vec<TaggedInterval>, Vec<TaggedInterval>) =
        intervals.into_iter().partition(|iv| iv.kind == ProvenanceKind::UserEdit);

    let mut groups: Vec<TaggedInterval> = Vec::with_capacity(user_edits.len());
    for cur in user_edits {
        if let Some(prev) = groups.last_mut() {
            let mergeable =
                prev.range.end == cur.range.start && (cur.creation_ts - prev.creation_ts).abs() < COALESCE_WINDOW_MS;
            if mergeable {
                prev.range.end = cur.range.end;
                prev.creation_ts = prev.creation_ts.min(cur.creation_ts);
                continue;
            }
        }
        groups.push(cur);
    }

    let mut out: Vec<TaggedInterval> = groups;
    out.extend(others);
    out.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));
    IntervalStore::from_vec(out)
}
