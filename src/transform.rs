//! The edit transformer: folds a batch of edit events over the interval
//! store, classifying new intervals and preserving the store's invariants.

use crate::classify::{classify, reclassify_paste, ClassifyInput, ClassifyOutcome, EditReason, VcsResolver};
use crate::doc::DocumentRef;
use crate::hints::ExternalHints;
use crate::model::{ProvenanceKind, TaggedInterval};
use crate::position::{shift, Edit, Position, Range};
use crate::store::IntervalStore;

/// Result of folding one batch of edits over a store.
pub struct TransformOutcome {
    pub store: IntervalStore,
    /// Set when the classifier scheduled a `clearAI` (an AI hint was
    /// consumed and should not be reused for a later, unrelated edit).
    pub clear_ai: bool,
    /// Set when the before-tool special case synthesised a derived edit;
    /// the caller (Session Coordinator) should stash this as the pending AI
    /// edit batch and feed it into the next `apply` call.
    pub pending_ai_edit: Option<Edit>,
}

/// Known host quirk (design note #1): a batch whose *last* edit ends at
/// `(0,0)` is actually one whole-file emission arriving with its edits in
/// reverse order. Collapsing it here keeps every other code path ignorant
/// of the quirk.
fn normalize_whole_file_quirk(edits: Vec<Edit>) -> Vec<Edit> {
    if edits.len() > 1 {
        let ends_at_origin = edits.last().map(|e| e.range.end == Position::new(0, 0)).unwrap_or(false);
        if ends_at_origin {
            let range = edits[0].range;
            let text: String = edits.iter().rev().map(|e| e.replacement.as_str()).collect();
            return vec![Edit::new(range, text)];
        }
    }
    edits
}

fn sort_descending_by_start(mut edits: Vec<Edit>) -> Vec<Edit> {
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    edits
}

struct FoldResult {
    kept: Vec<TaggedInterval>,
    additional: Vec<TaggedInterval>,
}

/// Folds one edit `e` into one existing interval `iv`, per the fold step:
/// deletion sub-step, addition (split) sub-step, shift sub-step.
fn fold_one(iv: &TaggedInterval, e: &Edit, is_ai: bool, doc: &dyn DocumentRef) -> FoldResult {
    let mut iv = iv.clone();
    let mut additional = Vec::new();

    if e.is_deletion() && e.range.intersects_excluding_touch(&iv.range) {
        if is_ai {
            let ai_added_end = doc.position_at(doc.offset_at(e.range.start) + e.replacement.len());
            let ai_added = Range { start: e.range.end, end: ai_added_end };
            if ai_added.contains(iv.range.start) {
                iv.range.start = ai_added.end;
            }
            if ai_added.contains(iv.range.end) {
                iv.range.end = ai_added.start;
            }
            if iv.range.start <= iv.range.end {
                additional.push(iv);
            }
            return FoldResult { kept: vec![], additional };
        } else {
            if e.range.contains(iv.range.start) {
                iv.range.start = e.range.end;
            }
            if e.range.contains(iv.range.end) {
                iv.range.end = e.range.start;
            }
            if iv.range.start > iv.range.end {
                return FoldResult { kept: vec![], additional };
            }
        }
    }

    let mut kept = vec![iv.clone()];
    if e.is_insertion() && e.range.intersects_excluding_touch(&iv.range) {
        let left = TaggedInterval { range: Range::new(iv.range.start, e.range.start), ..iv.clone() };
        let right = TaggedInterval { range: Range::new(e.range.start, iv.range.end), ..iv };
        kept = vec![left, right];
    }

    for piece in kept.iter_mut() {
        let new_start = shift(piece.range.start, e);
        let new_end = if !piece.range.is_empty() && piece.range.end == e.range.end {
            piece.range.end
        } else {
            shift(piece.range.end, e)
        };
        piece.range = Range { start: new_start, end: new_end };
    }

    FoldResult { kept, additional }
}

/// Removes touching empty intervals from a union of results, per design
/// note #2: an AI-clamped "additional" interval can re-overlap a
/// later-created interval, so this runs over the *entire* output, not just
/// the intervals the current edit mutated.
fn dedup_touching_empties(mut items: Vec<TaggedInterval>) -> Vec<TaggedInterval> {
    items.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));
    let mut drop = vec![false; items.len()];
    for i in 0..items.len() {
        if drop[i] {
            continue;
        }
        for j in (i + 1)..items.len() {
            if drop[j] {
                continue;
            }
            let (ri, rj) = (items[i].range, items[j].range);
            if ri.end == rj.start || ri.start == rj.end {
                if items[j].is_empty() {
                    drop[j] = true;
                } else if items[i].is_empty() {
                    drop[i] = true;
                }
            }
        }
    }
    items.into_iter().zip(drop).filter_map(|(iv, d)| if d { None } else { Some(iv) }).collect()
}

/// Arguments to `apply`, grouped because the function otherwise has an
/// unwieldy number of independent parameters.
pub struct ApplyInput<'a> {
    pub store: &'a IntervalStore,
    pub paste_hints: &'a [TaggedInterval],
    pub edits: Vec<Edit>,
    pub reason: EditReason,
    pub doc: &'a dyn DocumentRef,
    pub hints: &'a ExternalHints,
    pub now_ms: i64,
    pub vcs: Option<&'a dyn VcsResolver>,
}

/// Folds a batch of host-supplied edits over `store`, classifying each new
/// interval and re-establishing the store's invariants.
pub fn apply(input: ApplyInput) -> TransformOutcome {
    let edits = normalize_whole_file_quirk(input.edits);
    let ordered = sort_descending_by_start(edits);

    let mut working: Vec<Option<TaggedInterval>> = input.store.iter().cloned().map(Some).collect();
    let mut additional: Vec<TaggedInterval> = Vec::new();
    let mut clear_ai = false;
    let mut pending_ai_edit = None;

    for e in &ordered {
        let reason = reclassify_paste(input.reason, e.range.start, input.paste_hints, input.now_ms);
        let outcome = classify(ClassifyInput {
            reason,
            edit: e,
            paste_hints: input.paste_hints,
            hints: input.hints,
            now_ms: input.now_ms,
            doc: input.doc,
            vcs: input.vcs,
        });

        let is_ai = match &outcome {
            ClassifyOutcome::Emit { interval, .. } => interval.kind == ProvenanceKind::AiGenerated,
            _ => false,
        };

        match outcome {
            ClassifyOutcome::DeferBeforeTool { derived } => {
                pending_ai_edit = Some(derived);
                continue;
            }
            ClassifyOutcome::Emit { interval, clear_ai: should_clear } => {
                if should_clear {
                    clear_ai = true;
                }
                additional.push(interval);
            }
            ClassifyOutcome::NoEmit => {}
        }

        let mut next_working = Vec::with_capacity(working.len());
        for slot in working.drain(..) {
            match slot {
                None => {}
                Some(iv) => {
                    let result = fold_one(&iv, e, is_ai, input.doc);
                    additional.extend(result.additional);
                    for kept in result.kept {
                        next_working.push(Some(kept));
                    }
                }
            }
        }
        working = next_working;
    }

    let mut output: Vec<TaggedInterval> = working.into_iter().flatten().collect();
    output.extend(additional);
    let output = dedup_touching_empties(output);

    let mut store = IntervalStore::from_vec(output);
    store.normalize();

    TransformOutcome { store, clear_ai, pending_ai_edit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::PlainTextDocument;
    use crate::hints::ExternalHints;

    fn p(l: usize, c: usize) -> Position {
        Position::new(l, c)
    }

    #[test]
    fn s1_user_type_produces_single_user_edit() {
        let doc = PlainTextDocument::new("file:///a", "abc");
        let hints = ExternalHints::new();
        let store = IntervalStore::new();
        let edits = vec![Edit::new(Range::new(p(0, 3), p(0, 3)), "d")];
        let out = apply(ApplyInput {
            store: &store,
            paste_hints: &[],
            edits,
            reason: EditReason::None,
            doc: &doc,
            hints: &hints,
            now_ms: 1_000,
            vcs: None,
        });
        let ivs = out.store.as_slice();
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].kind, ProvenanceKind::UserEdit);
        assert_eq!(ivs[0].range, Range::new(p(0, 3), p(0, 4)));
    }

    #[test]
    fn s2_ai_insert_with_hint() {
        let doc = PlainTextDocument::new("file:///a", "");
        let mut hints = ExternalHints::new();
        hints.set_ai_command(crate::hints::AiCommand {
            command_type: crate::hints::AiCommand::INLINE_COMPLETION.to_string(),
            timestamp: 1_000,
            insert_text: Some("fn x(){}".to_string()),
            ..Default::default()
        });
        let store = IntervalStore::new();
        let edits = vec![Edit::new(Range::new(p(0, 0), p(0, 0)), "fn x(){}")];
        let out = apply(ApplyInput {
            store: &store,
            paste_hints: &[],
            edits,
            reason: EditReason::None,
            doc: &doc,
            hints: &hints,
            now_ms: 1_000,
            vcs: None,
        });
        let ivs = out.store.as_slice();
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].kind, ProvenanceKind::AiGenerated);
        assert_eq!(ivs[0].range, Range::new(p(0, 0), p(0, 8)));
        assert_eq!(ivs[0].options.ai_type, "inlineCompletion");
    }

    #[test]
    fn s3_paste_over_existing_user_edit_splits_it() {
        let doc = PlainTextDocument::new("file:///a", "abcde");
        let hints = ExternalHints::new();
        let existing = TaggedInterval::new(Range::new(p(0, 0), p(0, 5)), ProvenanceKind::UserEdit, 1_000);
        let store = IntervalStore::from_vec(vec![existing]);
        let paste_hint = TaggedInterval::new(Range::at(p(0, 2)), ProvenanceKind::Paste, 1_950);
        let edits = vec![Edit::new(Range::new(p(0, 2), p(0, 2)), "XYZ")];
        let out = apply(ApplyInput {
            store: &store,
            paste_hints: &[paste_hint],
            edits,
            reason: EditReason::None,
            doc: &doc,
            hints: &hints,
            now_ms: 2_000,
            vcs: None,
        });
        let mut ivs: Vec<_> = out.store.as_slice().to_vec();
        ivs.sort_by(|a, b| a.range.cmp_by_start_then_end(&b.range));
        assert_eq!(ivs.len(), 3);
        assert_eq!(ivs[0].kind, ProvenanceKind::UserEdit);
        assert_eq!(ivs[0].range, Range::new(p(0, 0), p(0, 2)));
        assert_eq!(ivs[1].kind, ProvenanceKind::Paste);
        assert_eq!(ivs[1].range, Range::new(p(0, 2), p(0, 5)));
        assert_eq!(ivs[2].kind, ProvenanceKind::UserEdit);
        assert_eq!(ivs[2].range, Range::new(p(0, 5), p(0, 8)));
    }

    #[test]
    fn s4_undo_shrinks_intersecting_interval() {
        let doc = PlainTextDocument::new("file:///a", "abcde");
        let hints = ExternalHints::new();
        let existing = TaggedInterval::new(Range::new(p(0, 0), p(0, 5)), ProvenanceKind::UserEdit, 1_000);
        let store = IntervalStore::from_vec(vec![existing]);
        let edits = vec![Edit::new(Range::new(p(0, 0), p(0, 5)), "")];
        let out = apply(ApplyInput {
            store: &store,
            paste_hints: &[],
            edits,
            reason: EditReason::Undo,
            doc: &doc,
            hints: &hints,
            now_ms: 2_000,
            vcs: None,
        });
        let ivs = out.store.as_slice();
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].kind, ProvenanceKind::UndoRedo);
    }

    #[test]
    fn invariants_hold_after_a_splitting_transform() {
        // Property 1: the store coming out of `apply` is sorted, free of
        // strict overlaps and inversions, and within document bounds.
        let doc = PlainTextDocument::new("file:///a", "abcde");
        let hints = ExternalHints::new();
        let existing = TaggedInterval::new(Range::new(p(0, 0), p(0, 5)), ProvenanceKind::UserEdit, 1_000);
        let store = IntervalStore::from_vec(vec![existing]);
        let paste_hint = TaggedInterval::new(Range::at(p(0, 2)), ProvenanceKind::Paste, 1_950);
        let edits = vec![Edit::new(Range::new(p(0, 2), p(0, 2)), "XYZ")];
        let out = apply(ApplyInput {
            store: &store,
            paste_hints: &[paste_hint],
            edits,
            reason: EditReason::None,
            doc: &doc,
            hints: &hints,
            now_ms: 2_000,
            vcs: None,
        });
        assert!(out.store.check_invariants(p(0, 8)).is_ok());
    }
}
