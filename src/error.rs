//! Closed-set error kinds for the provenance engine.
//!
//! None of these ever cause an accepted edit to be discarded; they only
//! degrade persistence or metadata completeness. Call sites log
//! (`tracing::warn!`/`tracing::error!`) and continue.

use thiserror::Error;

/// Errors the engine can surface. Every variant maps to one of the four
/// error kinds the design calls for.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProvError {
    /// A helper process or VCS invocation timed out or exited non-zero.
    /// Treated as absent metadata; never fails the operation that triggered it.
    #[error("transient external failure for {uri}: {message}")]
    TransientExternal { uri: String, message: String },

    /// A persisted log entry failed to parse, had the wrong shape, or carried
    /// an unknown `version`. The offending file is skipped, not fatal.
    #[error("malformed log entry in {uri}: {message}")]
    MalformedLog { uri: String, message: String },

    /// Two save attempts raced to the same persisted-record path. Fatal for
    /// that save attempt only; in-memory state is untouched.
    #[error("invariant violation for {uri}: {message}")]
    InvariantViolation { uri: String, message: String },

    /// No workspace root, or no VCS available for a layout that requires one.
    /// The save is a no-op with a warning; live tracking is unaffected.
    #[error("storage unavailable for {uri}: {message}")]
    StorageUnavailable { uri: String, message: String },
}

impl ProvError {
    pub fn uri(&self) -> &str {
        match self {
            ProvError::TransientExternal { uri, .. }
            | ProvError::MalformedLog { uri, .. }
            | ProvError::InvariantViolation { uri, .. }
            | ProvError::StorageUnavailable { uri, .. } => uri,
        }
    }

    /// Whether this error kind permits retrying the in-memory operation
    /// without any loss of accepted edits. All kinds do; this exists so call
    /// sites can assert the policy at the type level rather than by comment.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}
