//! The persisted-record wire format (§6), storage-layout path computation,
//! and the persistence/VCS/clipboard-helper trait boundaries. The core only
//! ever calls through `PersistenceBackend`; it never owns a concrete disk or
//! VCS implementation beyond the two filesystem-backed layouts below.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ProvError;
use crate::model::{ProvenanceKind, ProvenanceOptions, TaggedInterval};
use crate::position::{Position, Range};

const CURRENT_VERSION: u32 = 1;

/// One entry in the `changes` array of a persisted record. Mirrors
/// `TaggedInterval` but flattens `ProvenanceOptions` into sibling optional
/// fields to match the on-disk wire shape exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedChange {
    pub start: Position,
    pub end: Position,
    #[serde(rename = "type")]
    pub kind: ProvenanceKind,
    #[serde(rename = "creationTimestamp")]
    pub creation_ts: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "pasteUrl")]
    pub paste_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "pasteTitle")]
    pub paste_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "aiName")]
    pub ai_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "aiModel")]
    pub ai_model: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "aiExplanation")]
    pub ai_explanation: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "aiType")]
    pub ai_type: String,
}

impl From<&TaggedInterval> for PersistedChange {
    fn from(iv: &TaggedInterval) -> Self {
        PersistedChange {
            start: iv.range.start,
            end: iv.range.end,
            kind: iv.kind,
            creation_ts: iv.creation_ts,
            author: iv.author.clone(),
            paste_url: iv.options.paste_url.clone(),
            paste_title: iv.options.paste_title.clone(),
            ai_name: iv.options.ai_name.clone(),
            ai_model: iv.options.ai_model.clone(),
            ai_explanation: iv.options.ai_explanation.clone(),
            ai_type: iv.options.ai_type.clone(),
        }
    }
}

impl PersistedChange {
    /// Converts back into a `TaggedInterval`, rejecting an inverted range
    /// (a malformed record, not a transform bug).
    fn into_tagged(self, uri: &str) -> Result<TaggedInterval, ProvError> {
        let range = Range::try_new(self.start, self.end).ok_or_else(|| ProvError::MalformedLog {
            uri: uri.to_string(),
            message: format!("inverted range {:?}..{:?}", self.start, self.end),
        })?;
        Ok(TaggedInterval {
            range,
            kind: self.kind,
            creation_ts: self.creation_ts,
            author: self.author,
            options: ProvenanceOptions {
                paste_url: self.paste_url,
                paste_title: self.paste_title,
                ai_name: self.ai_name,
                ai_model: self.ai_model,
                ai_explanation: self.ai_explanation,
                ai_type: self.ai_type,
            },
        })
    }
}

/// The full on-disk/on-ref JSON record for one save of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub changes: Vec<PersistedChange>,
}

impl PersistedRecord {
    pub fn new(changes: &[TaggedInterval], checksum: Option<String>) -> Self {
        PersistedRecord { version: CURRENT_VERSION, checksum, changes: changes.iter().map(PersistedChange::from).collect() }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ProvError> {
        serde_json::to_vec(self).map_err(|e| ProvError::MalformedLog { uri: String::new(), message: e.to_string() })
    }
}

/// Parses a persisted record, per §7's `MalformedLog` policy: a parse
/// failure or unrecognised `version` skips the whole file rather than
/// propagating a hard error.
pub fn parse_record(uri: &str, bytes: &[u8]) -> Result<Vec<TaggedInterval>, ProvError> {
    let record: PersistedRecord =
        serde_json::from_slice(bytes).map_err(|e| ProvError::MalformedLog { uri: uri.to_string(), message: e.to_string() })?;
    if record.version != CURRENT_VERSION {
        return Err(ProvError::MalformedLog {
            uri: uri.to_string(),
            message: format!("unknown record version {}", record.version),
        });
    }
    record.changes.into_iter().map(|c| c.into_tagged(uri)).collect()
}

/// Replaces every run of non-alphanumeric characters with a single `_` and
/// trims leading/trailing underscores, per the `homeDirectory` layout's
/// sanitisation rule.
pub fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_underscore = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }
    out.trim_matches('_').to_string()
}

fn random_suffix() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..6).map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char).collect()
}

fn format_timestamp(now_ms: i64) -> String {
    use chrono::{TimeZone, Utc};
    let dt = Utc.timestamp_millis_opt(now_ms).single().unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    dt.format("%Y%m%d%H%M%S").to_string()
}

/// `<workspace>/.tabd/log/<relative/path>/<YYYYMMDDhhmmss>-<6 lowercase alnum>.json`
pub fn repository_log_path(workspace_root: &str, relative_path: &str, now_ms: i64) -> PathBuf {
    Path::new(workspace_root)
        .join(".tabd")
        .join("log")
        .join(relative_path)
        .join(format!("{}-{}.json", format_timestamp(now_ms), random_suffix()))
}

/// The platform home directory, for hosts that don't already track one.
/// Falls back to `None` if it cannot be determined (no `HOME`/profile dir),
/// in which case the `homeDirectory` layout is unavailable
/// (`ProvError::StorageUnavailable`).
pub fn default_home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// `<home>/.tabd/workspaces/<sanitized-workspace-path>/log/<relative/path>/...`
pub fn home_directory_log_path(home: &str, workspace_root: &str, relative_path: &str, now_ms: i64) -> PathBuf {
    Path::new(home)
        .join(".tabd")
        .join("workspaces")
        .join(sanitize_component(workspace_root))
        .join("log")
        .join(relative_path)
        .join(format!("{}-{}.json", format_timestamp(now_ms), random_suffix()))
}

/// `tabd__<branch>__<sha256(sanitized-relative-path)>`, the experimental
/// `vcs-notes` ref name.
pub fn vcs_notes_ref_name(branch: &str, relative_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sanitize_component(relative_path).as_bytes());
    let digest = hasher.finalize();
    format!("tabd__{branch}__{}", hex::encode(digest))
}

/// Where a file's persisted annotations live and how to read/write them.
/// `repository`/`homeDirectory` get the filesystem-backed default below;
/// `vcs-notes` is represented only by `VcsBackend` (no shipped implementation).
///
/// `load`'s `uri` is the log *directory* for one tracked file (one layout
/// path with the filename component stripped); `save`'s `uri` is the full
/// path to write, already computed by `repository_log_path` /
/// `home_directory_log_path`.
pub trait PersistenceBackend {
    fn load(&self, uri: &str) -> Result<Option<Vec<u8>>, ProvError>;
    fn save(&self, uri: &str, bytes: &[u8]) -> Result<(), ProvError>;
}

/// Filesystem-backed `PersistenceBackend` for the `repository` and
/// `homeDirectory` layouts. Load order within a directory is lexicographic,
/// which the `<timestamp>-<suffix>.json` filename scheme makes
/// timestamp-sortable; `load` returns the lexicographically-last entry.
pub struct FsBackend;

impl PersistenceBackend for FsBackend {
    fn load(&self, uri: &str) -> Result<Option<Vec<u8>>, ProvError> {
        let dir = Path::new(uri);
        let mut entries: Vec<_> = match fs::read_dir(dir) {
            Ok(read) => read.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => return Ok(None),
        };
        entries.sort();
        match entries.last() {
            Some(path) => {
                let bytes = fs::read(path).map_err(|e| ProvError::TransientExternal { uri: uri.to_string(), message: e.to_string() })?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    fn save(&self, uri: &str, bytes: &[u8]) -> Result<(), ProvError> {
        let path = Path::new(uri);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ProvError::StorageUnavailable { uri: uri.to_string(), message: e.to_string() })?;
        }
        fs::write(path, bytes).map_err(|e| ProvError::TransientExternal { uri: uri.to_string(), message: e.to_string() })
    }
}

/// The `vcs-notes` layout's boundary: attach a JSON record as a git-notes
/// body on the current head commit, under a per-file ref. No concrete
/// `git`-invoking implementation ships with this crate.
pub trait VcsBackend {
    /// `timeout_secs` ranges 5-15s, matching the 2-15s suspension-point
    /// budget VCS invocations get in the concurrency model.
    fn write_note(&self, ref_name: &str, body: &[u8], timeout_secs: u64) -> Result<(), ProvError>;
    fn read_notes(&self, ref_name: &str, timeout_secs: u64) -> Result<Vec<Vec<u8>>, ProvError>;
}

/// Resolved clipboard payload from the platform-native helper subprocess.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipboardPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub timestamp: i64,
    pub url: Option<String>,
    pub title: Option<String>,
}

/// The cross-browser clipboard helper subprocess boundary. Registration of
/// the helper (native-messaging manifests, OS-specific entries) is out of
/// scope; this trait only models invoking an already-registered helper.
pub trait ClipboardHelper {
    /// `timeout_secs` is 10s, the helper subprocess's suspension budget.
    fn invoke(&self, timeout_secs: u64) -> Result<Option<ClipboardPayload>, ProvError>;
}
