//! Process-wide (in this crate: coordinator-owned) ephemeral hints.
//!
//! `lastClipboard` and `lastAICommand` are read-only outside their update
//! points; both those points are owned by the Session Coordinator, so rather
//! than model them as global statics (which would let any component reach
//! in) we keep them as a plain struct the Coordinator owns and passes down
//! to the classifier by reference. This confines access to the Session
//! Coordinator in an idiomatic, testable shape rather than a process global.

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardKind {
    ClipboardCopy,
    IdeClipboardCopy,
}

/// The last thing copied to the clipboard, as reported by the platform
/// helper (`clipboard_copy`) or the in-IDE paste path (`ide_clipboard_copy`).
#[derive(Debug, Clone)]
pub struct ClipboardHint {
    pub text: String,
    /// Milliseconds since epoch.
    pub ts: i64,
    pub kind: ClipboardKind,
    pub url: Option<String>,
    pub title: Option<String>,
    pub workspace_path: Option<String>,
    pub relative_path: Option<String>,
}

/// Opaque AI-tool invocation envelope. Field names mirror the wire payload
/// from the AI-tool intake (§1's "external collaborator" boundary); this
/// crate only ever reads them.
#[derive(Debug, Clone, Default)]
pub struct AiCommand {
    pub command_type: String,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub insert_text: Option<String>,
    pub old_text: Option<String>,
    pub range: Option<(Position, Position)>,
    pub model_id: Option<String>,
    pub extension_name: Option<String>,
    pub explanation: Option<String>,
    pub command: Option<String>,
    /// Companion document/changes payload, present on some command types
    /// (e.g. `postInsertEdit`) and used to drive a re-run of the transformer.
    pub document: Option<String>,
    pub changes: Option<String>,
}

impl AiCommand {
    pub const BEFORE_INSERT_EDIT: &'static str = "onBeforeInsertEditTool";
    pub const BEFORE_REPLACE_STRING: &'static str = "onBeforeReplaceStringTool";
    pub const AFTER_INSERT_EDIT: &'static str = "onAfterInsertEditTool";
    pub const AFTER_REPLACE_STRING: &'static str = "onAfterReplaceStringTool";
    pub const AFTER_APPLY_PATCH: &'static str = "onAfterApplyPatchTool";
    pub const AFTER_CREATE_FILE: &'static str = "onAfterCreateFileTool";
    pub const INLINE_COMPLETION: &'static str = "inlineCompletion";
    pub const POST_INSERT_EDIT: &'static str = "postInsertEdit";
    pub const CREATE_FILE: &'static str = "createFile";

    pub fn is_before_tool(&self) -> bool {
        matches!(self.command_type.as_str(), Self::BEFORE_INSERT_EDIT | Self::BEFORE_REPLACE_STRING)
    }

    /// Any `onBefore*Tool`/`onAfter*Tool` envelope — the classifier's
    /// "before/after-tool types" gate that keeps a single-character edit from
    /// being shortcut to `UserEdit` before the AI-matching/before-tool
    /// branches get a chance to run.
    pub fn is_tool_type(&self) -> bool {
        self.is_before_tool() || self.is_terminal_after_tool()
    }

    /// "Terminal" after-tool types: once one of these lands, the pending AI
    /// hint should be cleared after it is consumed.
    pub fn is_terminal_after_tool(&self) -> bool {
        matches!(
            self.command_type.as_str(),
            Self::AFTER_INSERT_EDIT
                | Self::AFTER_REPLACE_STRING
                | Self::AFTER_APPLY_PATCH
                | Self::AFTER_CREATE_FILE
        )
    }

    /// Maps an `onBefore*/onAfter*Tool` type to the `aiType` metadata value
    /// stored on emitted intervals.
    pub fn tool_name(&self) -> &'static str {
        match self.command_type.as_str() {
            Self::AFTER_APPLY_PATCH => "applyPatch",
            Self::AFTER_CREATE_FILE | Self::CREATE_FILE => "createFile",
            Self::AFTER_INSERT_EDIT | Self::BEFORE_INSERT_EDIT => "insertEdit",
            Self::AFTER_REPLACE_STRING | Self::BEFORE_REPLACE_STRING => "replaceString",
            Self::INLINE_COMPLETION => "inlineCompletion",
            _ => "unknown",
        }
    }
}

/// The two ephemeral hint singletons, owned by one `Coordinator`.
#[derive(Debug, Clone, Default)]
pub struct ExternalHints {
    pub last_clipboard: Option<ClipboardHint>,
    pub last_ai_command: Option<AiCommand>,
}

impl ExternalHints {
    pub fn new() -> Self {
        ExternalHints::default()
    }

    pub fn set_clipboard(&mut self, hint: ClipboardHint) {
        self.last_clipboard = Some(hint);
    }

    pub fn set_ai_command(&mut self, cmd: AiCommand) {
        self.last_ai_command = Some(cmd);
    }

    pub fn clear_ai_command(&mut self) {
        self.last_ai_command = None;
    }
}
