//! The Session Coordinator: the per-process entry point the host calls into.
//! A single mutex guards every cached `SessionFileState`, so that every
//! entry point below runs under the same per-process exclusive lock
//! (documents deliberately share one lock, not one per document).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info_span, warn};

use crate::coalesce::coalesce;
use crate::config::{is_tracked_path, Config};
use crate::doc::DocumentRef;
use crate::hints::{AiCommand, ClipboardHint, ExternalHints};
use crate::merge::merge_sequentially;
use crate::model::{ProvenanceKind, TaggedInterval};
use crate::persist::{self, PersistenceBackend};
use crate::position::{Edit, Position, Range};
use crate::store::IntervalStore;
use crate::transform::{apply, ApplyInput};
use crate::classify::{EditReason, VcsResolver};

/// Per-document state owned exclusively by the Coordinator.
pub struct SessionFileState {
    pub store: IntervalStore,
    /// Recent `Paste` markers, pruned to entries younger than 400ms on every
    /// write (spec §3).
    pub paste_hints: Vec<TaggedInterval>,
    pub save_path: Option<String>,
    pub load_timestamp: i64,
    /// The before-tool branch's synthesised derived edit, consumed by the
    /// next `postInsertEdit` command for this document.
    pending_ai_edit: Option<Edit>,
}

impl SessionFileState {
    fn new(now_ms: i64) -> Self {
        SessionFileState {
            store: IntervalStore::new(),
            paste_hints: Vec::new(),
            save_path: None,
            load_timestamp: now_ms - 1,
            pending_ai_edit: None,
        }
    }

    fn prune_paste_hints(&mut self, now_ms: i64) {
        self.paste_hints.retain(|h| now_ms - h.creation_ts < 400);
    }
}

struct CoordinatorInner {
    states: HashMap<String, SessionFileState>,
    hints: ExternalHints,
    config: Config,
}

/// The Session Coordinator handle. Cheap to clone; every clone shares the
/// same lock and state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Mutex<CoordinatorInner>>,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Coordinator { inner: Arc::new(Mutex::new(CoordinatorInner { states: HashMap::new(), hints: ExternalHints::new(), config })) }
    }

    /// Folds a host-supplied edit batch into `doc`'s store.
    pub fn on_edit_batch(&self, doc: &dyn DocumentRef, edits: Vec<Edit>, reason: EditReason, now_ms: i64, vcs: Option<&dyn VcsResolver>) {
        let uri = doc.uri().to_string();
        if !is_tracked_path(&uri) {
            return;
        }
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        inner.states.entry(uri.clone()).or_insert_with(|| SessionFileState::new(now_ms));

        let CoordinatorInner { states, hints, .. } = &mut *inner;
        let state = states.get_mut(&uri).expect("just inserted");

        let outcome = apply(ApplyInput {
            store: &state.store,
            paste_hints: &state.paste_hints,
            edits,
            reason,
            doc,
            hints,
            now_ms,
            vcs,
        });

        state.store = outcome.store;
        if outcome.clear_ai {
            hints.clear_ai_command();
        }
        if let Some(derived) = outcome.pending_ai_edit {
            state.pending_ai_edit = Some(derived);
        }
    }

    /// Records fresh paste hints for `doc` at `ranges`, then prunes hints
    /// older than 400ms.
    pub fn on_paste(&self, doc: &dyn DocumentRef, ranges: &[Range], now_ms: i64) {
        let uri = doc.uri().to_string();
        if !is_tracked_path(&uri) {
            return;
        }
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        let state = inner.states.entry(uri).or_insert_with(|| SessionFileState::new(now_ms));
        for range in ranges {
            state.paste_hints.push(TaggedInterval::new(*range, ProvenanceKind::Paste, now_ms));
        }
        state.prune_paste_hints(now_ms);
    }

    /// Lazily loads `doc`'s persisted log (if not already cached) and merges
    /// it into the live store via the Log Merger.
    pub fn on_activate(&self, doc: &dyn DocumentRef, log_dir: &str, now_ms: i64, backend: &dyn PersistenceBackend) {
        let uri = doc.uri().to_string();
        if !is_tracked_path(&uri) {
            return;
        }
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        if inner.states.contains_key(&uri) {
            return;
        }
        let span = info_span!("on_activate", uri = %uri);
        let _guard = span.enter();

        let mut state = SessionFileState::new(now_ms);
        match backend.load(log_dir) {
            Ok(Some(bytes)) => match persist::parse_record(&uri, &bytes) {
                Ok(loaded) => {
                    state.store = merge_sequentially(IntervalStore::new(), loaded);
                }
                Err(err) => warn!(uri = %uri, error = %err, "skipping malformed persisted log"),
            },
            Ok(None) => {}
            Err(err) => warn!(uri = %uri, error = %err, "failed to load persisted log"),
        }
        inner.states.insert(uri, state);
    }

    /// Coalesces, filters to edits newer than `load_timestamp`, and persists
    /// `doc`'s store. A persistence failure is logged, never fatal.
    pub fn on_save(&self, doc: &dyn DocumentRef, save_path: &str, now_ms: i64, backend: &dyn PersistenceBackend) {
        let uri = doc.uri().to_string();
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        let state = match inner.states.get_mut(&uri) {
            Some(s) => s,
            None => return,
        };

        let coalesced = coalesce(std::mem::replace(&mut state.store, IntervalStore::new()));
        let to_persist: Vec<TaggedInterval> =
            coalesced.iter().filter(|iv| iv.creation_ts > state.load_timestamp).cloned().collect();
        state.store = coalesced;

        let span = info_span!("on_save", uri = %uri, now_ms);
        let _guard = span.enter();

        let record = persist::PersistedRecord::new(&to_persist, None);
        match record.to_json_bytes() {
            Ok(bytes) => {
                if let Err(err) = backend.save(save_path, &bytes) {
                    warn!(uri = %uri, error = %err, "persistence save failed, in-memory state preserved");
                } else {
                    state.save_path = Some(save_path.to_string());
                }
            }
            Err(err) => warn!(uri = %uri, error = %err, "failed to serialise persisted record"),
        }
    }

    /// Records an AI-tool invocation envelope, and (for the two
    /// "second-half" command types) re-runs the transformer against the
    /// pending AI edit it produces.
    pub fn on_internal_ai_command(&self, doc: &dyn DocumentRef, command: AiCommand, now_ms: i64) {
        let uri = doc.uri().to_string();
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");

        if command.command_type == AiCommand::POST_INSERT_EDIT {
            let CoordinatorInner { states, hints, .. } = &mut *inner;
            hints.set_ai_command(command);
            if let Some(state) = states.get_mut(&uri) {
                if let Some(derived) = state.pending_ai_edit.take() {
                    let outcome = apply(ApplyInput {
                        store: &state.store,
                        paste_hints: &state.paste_hints,
                        edits: vec![derived],
                        reason: EditReason::AiGenerated,
                        doc,
                        hints,
                        now_ms,
                        vcs: None,
                    });
                    state.store = outcome.store;
                    if outcome.clear_ai {
                        hints.clear_ai_command();
                    }
                }
            }
            return;
        }

        if command.command_type == AiCommand::CREATE_FILE {
            let insert_text = command.insert_text.clone().unwrap_or_default();
            let CoordinatorInner { states, hints, .. } = &mut *inner;
            hints.set_ai_command(command);
            let state = states.entry(uri).or_insert_with(|| SessionFileState::new(now_ms));
            let synthetic = Edit::new(Range::at(Position::new(0, 0)), insert_text);
            let outcome = apply(ApplyInput {
                store: &state.store,
                paste_hints: &state.paste_hints,
                edits: vec![synthetic],
                reason: EditReason::AiGenerated,
                doc,
                hints,
                now_ms,
                vcs: None,
            });
            state.store = outcome.store;
            return;
        }

        inner.hints.set_ai_command(command);
    }

    pub fn on_clipboard_hint(&self, hint: ClipboardHint) {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        inner.hints.set_clipboard(hint);
    }

    /// Drops every cached `SessionFileState`, since a layout change
    /// invalidates every previously-computed save path.
    pub fn on_storage_config_change(&self, config: Config) {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        inner.config = config;
        inner.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageLayout;
    use crate::doc::PlainTextDocument;

    /// Installs a `tracing-subscriber` fmt layer so the `info_span!`/`warn!`
    /// calls in `on_activate`/`on_save` actually go somewhere observable in
    /// this test run, instead of being silently dropped for lack of a
    /// subscriber. Safe to call from multiple tests: a later `try_init` is a
    /// no-op once a global subscriber is already set.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn on_save_logs_a_span_without_failing_when_persistence_errors() {
        init_test_tracing();
        struct FailingBackend;
        impl PersistenceBackend for FailingBackend {
            fn load(&self, _uri: &str) -> Result<Option<Vec<u8>>, crate::error::ProvError> {
                Ok(None)
            }
            fn save(&self, uri: &str, _bytes: &[u8]) -> Result<(), crate::error::ProvError> {
                Err(crate::error::ProvError::TransientExternal { uri: uri.to_string(), message: "disk full".into() })
            }
        }

        let coordinator = Coordinator::new(Config::default());
        let doc = PlainTextDocument::new("/ws/src/main.rs", "abc");
        coordinator.on_edit_batch(&doc, vec![Edit::new(Range::new(Position::new(0, 3), Position::new(0, 3)), "d")], EditReason::None, 1_000, None);
        coordinator.on_save(&doc, "/ws/.tabd/log/src/main.rs/x.json", 2_000, &FailingBackend);

        // The save failure is logged, not fatal: in-memory state survives.
        let inner = coordinator.inner.lock().unwrap();
        let state = inner.states.get("/ws/src/main.rs").unwrap();
        assert_eq!(state.store.len(), 1);
    }

    #[test]
    fn untracked_path_never_gains_state() {
        let coordinator = Coordinator::new(Config::default());
        let doc = PlainTextDocument::new("/ws/.git/config", "abc");
        coordinator.on_edit_batch(&doc, vec![Edit::new(Range::at(Position::new(0, 0)), "x")], EditReason::None, 1_000, None);
        let inner = coordinator.inner.lock().unwrap();
        assert!(!inner.states.contains_key("/ws/.git/config"));
    }

    #[test]
    fn edit_batch_creates_state_and_folds_edit() {
        let coordinator = Coordinator::new(Config::default());
        let doc = PlainTextDocument::new("/ws/src/main.rs", "abc");
        coordinator.on_edit_batch(&doc, vec![Edit::new(Range::new(Position::new(0, 3), Position::new(0, 3)), "d")], EditReason::None, 1_000, None);
        let inner = coordinator.inner.lock().unwrap();
        let state = inner.states.get("/ws/src/main.rs").unwrap();
        assert_eq!(state.store.len(), 1);
        assert_eq!(state.store.as_slice()[0].kind, ProvenanceKind::UserEdit);
    }

    #[test]
    fn storage_config_change_drops_cached_state() {
        let coordinator = Coordinator::new(Config::default());
        let doc = PlainTextDocument::new("/ws/src/main.rs", "abc");
        coordinator.on_edit_batch(&doc, vec![Edit::new(Range::new(Position::new(0, 3), Position::new(0, 3)), "d")], EditReason::None, 1_000, None);
        coordinator.on_storage_config_change(Config::new(StorageLayout::HomeDirectory, Some("/ws".to_string())));
        let inner = coordinator.inner.lock().unwrap();
        assert!(inner.states.is_empty());
    }

    #[test]
    fn paste_hints_are_pruned_to_400ms() {
        let coordinator = Coordinator::new(Config::default());
        let doc = PlainTextDocument::new("/ws/src/main.rs", "abc");
        coordinator.on_paste(&doc, &[Range::at(Position::new(0, 0))], 1_000);
        coordinator.on_paste(&doc, &[Range::at(Position::new(0, 1))], 1_500);
        let inner = coordinator.inner.lock().unwrap();
        let state = inner.states.get("/ws/src/main.rs").unwrap();
        assert_eq!(state.paste_hints.len(), 1);
    }
}
