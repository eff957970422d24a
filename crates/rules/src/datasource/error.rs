//! Error types and poll outcome structures for the rule datasources.

use std::path::PathBuf;
use std::time::Duration;

use crate::schema::RuleKind;

/// Errors that can occur while syncing rule files with memory.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error on a rule file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The rule root or one of its files could not be created.
    #[error("cannot prepare rule layout at {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content could not be turned into a rule set.
    #[error("failed to decode {kind} rules: {source}")]
    Decode {
        kind: RuleKind,
        #[source]
        source: CodecError,
    },

    /// A rule set could not be serialized for writing.
    #[error("failed to encode {kind} rules: {source}")]
    Encode {
        kind: RuleKind,
        #[source]
        source: CodecError,
    },

    /// A rule set was handed to the datasource of another kind.
    #[error("expected {expected} rules, got {actual} rules")]
    KindMismatch { expected: RuleKind, actual: RuleKind },

    /// The write was abandoned before it touched the file.
    #[error("write of {kind} rules was cancelled")]
    Cancelled { kind: RuleKind },

    /// A bounded file operation did not finish in time.
    #[error("{operation} of {kind} rules timed out after {after:?}")]
    Timeout {
        kind: RuleKind,
        operation: &'static str,
        after: Duration,
    },
}

/// Result alias for datasource operations.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Why a codec refused its input.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("content is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("rule #{index} is invalid: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("codec handles {expected} rules, got {actual} rules")]
    KindMismatch { expected: RuleKind, actual: RuleKind },
}

/// Outcome of a single watcher tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Content matches the last accepted fingerprint; nothing was decoded.
    Unchanged,
    /// New content was decoded and handed to the property.
    Reloaded {
        rules: usize,
        /// False when the decoded set equalled the current value.
        notified: bool,
    },
    /// Content changed but did not decode; the previous rules stay live.
    Rejected { error: String },
    /// The file could not be read this tick.
    ReadFailed { error: String },
    /// The tick exceeded its I/O bound.
    TimedOut,
    /// An earlier tick is still running; this one was skipped.
    Busy,
}

impl PollOutcome {
    /// Whether this tick replaced the property's value.
    pub fn is_reloaded(&self) -> bool {
        matches!(self, PollOutcome::Reloaded { .. })
    }
}
