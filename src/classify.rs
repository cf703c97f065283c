//! The provenance classifier: maps `(recent-paste hint, recent-AI hint, edit
//! shape, undo/redo flag)` to a provenance tag plus metadata.

use unicode_segmentation::UnicodeSegmentation;

use crate::doc::DocumentRef;
use crate::hints::{AiCommand, ClipboardKind, ExternalHints};
use crate::model::{ProvenanceKind, ProvenanceOptions, TaggedInterval};
use crate::position::{Edit, Position, Range};

/// Why this batch of edits arrived, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditReason {
    None,
    Undo,
    Redo,
    Paste,
    IdePaste,
    AiGenerated,
}

/// VCS lookups needed to resolve an in-IDE paste's `pasteUrl`/`pasteTitle`.
/// A real implementation shells out to `git` (a suspension point, per the
/// concurrency model); the classifier only ever consumes its answers.
pub trait VcsResolver {
    fn remote_origin_url(&self, workspace_path: &str) -> Option<String>;
    fn current_branch(&self, workspace_path: &str) -> Option<String>;
}

pub struct ClassifyInput<'a> {
    pub reason: EditReason,
    pub edit: &'a Edit,
    pub paste_hints: &'a [TaggedInterval],
    pub hints: &'a ExternalHints,
    pub now_ms: i64,
    pub doc: &'a dyn DocumentRef,
    pub vcs: Option<&'a dyn VcsResolver>,
}

/// Outcome of classifying one edit within a batch.
pub enum ClassifyOutcome {
    /// Emit this interval. `clear_ai` signals that the AI hint should be
    /// dropped after this edit is folded (a "schedule clearAI" point).
    Emit { interval: TaggedInterval, clear_ai: bool },
    /// No interval for this edit, but the edit is still folded into the
    /// store as normal (e.g. the AI-matching branch found no match).
    NoEmit,
    /// The special before-tool branch: this edit is *not* folded at all.
    /// `derived` becomes the pending AI edit batch for the next `apply` call.
    DeferBeforeTool { derived: Edit },
}

const PASTE_HINT_WINDOW_MS: i64 = 200;
const CLIPBOARD_MATCH_WINDOW_MS: i64 = 60 * 60 * 1000;
const AI_RECENT_WINDOW_MS: i64 = 2_000;
const AI_INLINE_COMPLETION_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Step 1 of the per-edit loop: if a paste hint shares this edit's start and
/// is younger than 200ms, the edit's reason is promoted to `Paste`
/// regardless of what the host originally reported.
pub fn reclassify_paste(reason: EditReason, edit_start: Position, paste_hints: &[TaggedInterval], now_ms: i64) -> EditReason {
    let matched = paste_hints
        .iter()
        .any(|h| h.range.start == edit_start && h.creation_ts > now_ms - PASTE_HINT_WINDOW_MS);
    if matched {
        EditReason::Paste
    } else {
        reason
    }
}

fn grapheme_len(s: &str) -> usize {
    s.graphemes(true).count()
}

fn byte_end_position(doc: &dyn DocumentRef, start: Position, text: &str) -> Position {
    doc.position_at(doc.offset_at(start) + text.len())
}

fn resolve_paste(input: &ClassifyInput, base_kind: ProvenanceKind) -> TaggedInterval {
    let trimmed = input.edit.replacement.trim();
    let mut kind = base_kind;
    let mut options = ProvenanceOptions::default();

    if let Some(clip) = &input.hints.last_clipboard {
        let matches_text = clip.text.trim() == trimmed;
        let fresh = clip.ts > input.now_ms - CLIPBOARD_MATCH_WINDOW_MS;
        if matches_text && fresh {
            match clip.kind {
                ClipboardKind::IdeClipboardCopy => {
                    kind = ProvenanceKind::IdePaste;
                    let workspace = clip.workspace_path.as_deref().unwrap_or("");
                    let url = input.vcs.and_then(|v| v.remote_origin_url(workspace));
                    let branch = input.vcs.and_then(|v| v.current_branch(workspace));
                    options.paste_url = url.unwrap_or_default();
                    options.paste_title = match (&clip.relative_path, &branch) {
                        (Some(rp), Some(b)) if b != "main" && b != "master" => {
                            format!("{rp} (on branch {b})")
                        }
                        (Some(rp), _) => rp.clone(),
                        (None, _) => String::new(),
                    };
                }
                ClipboardKind::ClipboardCopy => {
                    kind = ProvenanceKind::Paste;
                    options.paste_url = clip.url.clone().unwrap_or_default();
                    options.paste_title = clip.title.clone().unwrap_or_default();
                }
            }
        }
    }

    let end = byte_end_position(input.doc, input.edit.range.start, &input.edit.replacement);
    TaggedInterval::new(Range::new(input.edit.range.start, end), kind, input.now_ms).with_options(options)
}

fn ai_metadata_from(ai: &AiCommand) -> ProvenanceOptions {
    ProvenanceOptions {
        ai_name: ai.extension_name.clone().unwrap_or_default(),
        ai_model: ai.model_id.clone().unwrap_or_default(),
        ai_explanation: ai.explanation.clone().unwrap_or_default(),
        ai_type: if ai.command_type == AiCommand::INLINE_COMPLETION {
            AiCommand::INLINE_COMPLETION.to_string()
        } else {
            ai.tool_name().to_string()
        },
        ..Default::default()
    }
}

/// The "AI-matching branch": is the current edit AI-generated, given the
/// last AI command envelope?
fn ai_matches(ai: &AiCommand, edit: &Edit, now_ms: i64) -> bool {
    let insert_text = match &ai.insert_text {
        Some(t) => t,
        None => return false,
    };
    let trimmed = edit.replacement.trim();
    if !insert_text.trim().contains(trimmed) {
        return false;
    }
    let recent = ai.timestamp > now_ms - AI_RECENT_WINDOW_MS;
    let inline_recent =
        ai.command_type == AiCommand::INLINE_COMPLETION && ai.timestamp > now_ms - AI_INLINE_COMPLETION_WINDOW_MS;
    if !(recent || inline_recent) {
        return false;
    }
    if let Some((range_start, _)) = ai.range {
        if range_start != edit.range.start {
            return false;
        }
    }
    true
}

/// Computes the derived edit the before-tool special case synthesises: a
/// zero-width edit at the offset of the longest common prefix between
/// `old_text` and `insert_text`, inserting whatever of `insert_text` remains
/// after also trimming the longest common suffix.
fn derive_before_tool_edit(ai: &AiCommand, doc: &dyn DocumentRef) -> Option<Edit> {
    let insert_text = ai.insert_text.as_deref()?.trim();
    let old_text = ai.old_text.as_deref().unwrap_or("");

    // Walk by char, not byte, so the split points below always land on char
    // boundaries regardless of multi-byte UTF-8 content.
    let prefix_chars = insert_text.chars().zip(old_text.chars()).take_while(|(a, b)| a == b).count();
    let prefix_byte_len: usize = insert_text.chars().take(prefix_chars).map(char::len_utf8).sum();
    let insert_rest = &insert_text[prefix_byte_len..];
    let old_rest = &old_text[old_text.chars().take(prefix_chars).map(char::len_utf8).sum::<usize>()..];

    let suffix_chars = insert_rest
        .chars()
        .rev()
        .zip(old_rest.chars().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix_byte_len: usize = insert_rest.chars().rev().take(suffix_chars).map(char::len_utf8).sum();
    let trimmed_insert = &insert_rest[..insert_rest.len() - suffix_byte_len];

    let (range_start, _) = ai.range?;
    let best_match_offset = doc.offset_at(range_start) + prefix_byte_len;
    let at = doc.position_at(best_match_offset);
    Some(Edit::new(Range::at(at), trimmed_insert.to_string()))
}

pub fn classify(input: ClassifyInput) -> ClassifyOutcome {
    match input.reason {
        EditReason::Paste => {
            ClassifyOutcome::Emit { interval: resolve_paste(&input, ProvenanceKind::Paste), clear_ai: false }
        }
        EditReason::IdePaste => {
            ClassifyOutcome::Emit { interval: resolve_paste(&input, ProvenanceKind::IdePaste), clear_ai: false }
        }
        EditReason::AiGenerated => {
            let end = byte_end_position(input.doc, input.edit.range.start, &input.edit.replacement);
            let interval = match &input.hints.last_ai_command {
                Some(ai) => TaggedInterval::new(Range::new(input.edit.range.start, end), ProvenanceKind::AiGenerated, input.now_ms)
                    .with_options(ai_metadata_from(ai)),
                None => TaggedInterval::new(Range::new(input.edit.range.start, end), ProvenanceKind::AiGenerated, input.now_ms),
            };
            ClassifyOutcome::Emit { interval, clear_ai: true }
        }
        EditReason::Undo | EditReason::Redo => {
            let end = byte_end_position(input.doc, input.edit.range.start, &input.edit.replacement);
            let interval = TaggedInterval::new(Range::new(input.edit.range.start, end), ProvenanceKind::UndoRedo, input.now_ms);
            ClassifyOutcome::Emit { interval, clear_ai: false }
        }
        EditReason::None => classify_untagged(&input),
    }
}

fn classify_untagged(input: &ClassifyInput) -> ClassifyOutcome {
    let trimmed = input.edit.replacement.trim();
    let ai_type_is_tool = input.hints.last_ai_command.as_ref().map(|ai| ai.is_tool_type()).unwrap_or(false);

    if grapheme_len(trimmed) <= 1 && !ai_type_is_tool {
        let interval = TaggedInterval::new(input.edit.range, ProvenanceKind::UserEdit, input.now_ms);
        return ClassifyOutcome::Emit { interval, clear_ai: false };
    }

    let ai = match &input.hints.last_ai_command {
        Some(ai) => ai,
        None => return ClassifyOutcome::NoEmit,
    };

    if ai.is_before_tool() {
        return match derive_before_tool_edit(ai, input.doc) {
            Some(derived) => ClassifyOutcome::DeferBeforeTool { derived },
            None => ClassifyOutcome::NoEmit,
        };
    }

    if ai_matches(ai, input.edit, input.now_ms) {
        let end = byte_end_position(input.doc, input.edit.range.start, &input.edit.replacement);
        let interval = TaggedInterval::new(Range::new(input.edit.range.start, end), ProvenanceKind::AiGenerated, input.now_ms)
            .with_options(ai_metadata_from(ai));
        ClassifyOutcome::Emit { interval, clear_ai: ai.is_terminal_after_tool() }
    } else {
        ClassifyOutcome::NoEmit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::PlainTextDocument;

    fn p(l: usize, c: usize) -> Position {
        Position::new(l, c)
    }

    #[test]
    fn single_char_typed_with_no_ai_hint_is_user_edit() {
        let doc = PlainTextDocument::new("file:///a", "abc");
        let edit = Edit::new(Range::new(p(0, 3), p(0, 3)), "d");
        let hints = ExternalHints::new();
        let out = classify(ClassifyInput {
            reason: EditReason::None,
            edit: &edit,
            paste_hints: &[],
            hints: &hints,
            now_ms: 1_000,
            doc: &doc,
            vcs: None,
        });
        match out {
            ClassifyOutcome::Emit { interval, .. } => assert_eq!(interval.kind, ProvenanceKind::UserEdit),
            _ => panic!("expected Emit"),
        }
    }

    #[test]
    fn ai_insert_with_fresh_inline_completion_hint_matches() {
        let doc = PlainTextDocument::new("file:///a", "");
        let edit = Edit::new(Range::new(p(0, 0), p(0, 0)), "fn x(){}");
        let mut hints = ExternalHints::new();
        hints.set_ai_command(AiCommand {
            command_type: AiCommand::INLINE_COMPLETION.to_string(),
            timestamp: 1_000,
            insert_text: Some("fn x(){}".to_string()),
            ..Default::default()
        });
        let out = classify(ClassifyInput {
            reason: EditReason::None,
            edit: &edit,
            paste_hints: &[],
            hints: &hints,
            now_ms: 1_000,
            doc: &doc,
            vcs: None,
        });
        match out {
            ClassifyOutcome::Emit { interval, .. } => {
                assert_eq!(interval.kind, ProvenanceKind::AiGenerated);
                assert_eq!(interval.options.ai_type, AiCommand::INLINE_COMPLETION);
            }
            _ => panic!("expected Emit"),
        }
    }

    #[test]
    fn single_char_edit_with_after_tool_hint_runs_ai_matching_branch() {
        // A single-character edit must not be shortcut to UserEdit when the
        // last AI command is an after-tool envelope: it should still run the
        // AI-matching branch and come back AIGenerated.
        let doc = PlainTextDocument::new("file:///a", "");
        let edit = Edit::new(Range::new(p(0, 0), p(0, 0)), "x");
        let mut hints = ExternalHints::new();
        hints.set_ai_command(AiCommand {
            command_type: AiCommand::AFTER_INSERT_EDIT.to_string(),
            timestamp: 1_000,
            insert_text: Some("x".to_string()),
            ..Default::default()
        });
        let out = classify(ClassifyInput {
            reason: EditReason::None,
            edit: &edit,
            paste_hints: &[],
            hints: &hints,
            now_ms: 1_000,
            doc: &doc,
            vcs: None,
        });
        match out {
            ClassifyOutcome::Emit { interval, clear_ai } => {
                assert_eq!(interval.kind, ProvenanceKind::AiGenerated);
                assert!(clear_ai);
            }
            _ => panic!("expected Emit(AiGenerated)"),
        }
    }

    #[test]
    fn paste_hint_outside_window_does_not_reclassify() {
        let pasted = TaggedInterval::new(Range::at(p(0, 2)), ProvenanceKind::Paste, 0);
        let reason = reclassify_paste(EditReason::None, p(0, 2), &[pasted], 1_000);
        assert_eq!(reason, EditReason::None);
    }

    #[test]
    fn paste_hint_inside_window_reclassifies() {
        let pasted = TaggedInterval::new(Range::at(p(0, 2)), ProvenanceKind::Paste, 950);
        let reason = reclassify_paste(EditReason::None, p(0, 2), &[pasted], 1_000);
        assert_eq!(reason, EditReason::Paste);
    }
}
