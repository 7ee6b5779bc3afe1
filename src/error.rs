//! Error taxonomy for the client update core.
//!
//! Kinds mirror the semantic categories the engine distinguishes on: some
//! are fatal to the whole run, some are per-item and only recorded in the
//! [`crate::report::RunReport`]. See each variant's doc for which.

use thiserror::Error;

/// A single error kind produced anywhere in the engine.
#[derive(Debug, Error)]
pub enum GorillaError {
    /// Config file missing, unreadable, or fails to parse. Fatal to the run.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential required (`force_basic_auth`) but unavailable. Fatal only
    /// when required; callers downgrade to a warning otherwise.
    #[error("authorization unavailable: {0}")]
    Auth(String),

    /// Transient HTTP/IO error, retried per the Fetcher's policy and
    /// surfaced only once retries are exhausted.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Hash mismatch on a downloaded payload, a cached file, or an
    /// `installs[]` MD5 check. Fatal for the affected item.
    #[error("integrity error for {name} {version}: expected {expected}, got {actual}")]
    Integrity {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    /// Malformed YAML manifest or catalog document. Non-fatal: the caller
    /// skips the document and continues.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Item referenced by a manifest but missing from every catalog.
    /// Non-fatal: the caller skips it with a log line.
    #[error("item not found in any catalog: {0}")]
    NotFound(String),

    /// A script/file/registry probe hit an unexpected OS error. Treated as
    /// fail-open ("action needed") by callers.
    #[error("status probe error for {name}: {message}")]
    StatusProbe { name: String, message: String },

    /// A child installer process exited non-zero. Per-item fatal, recorded
    /// in the report; does not abort the run.
    #[error("installer error for {name} {version}: {message}")]
    Installer {
        name: String,
        version: String,
        message: String,
    },

    /// A pre/post install script failed. Aborts the remaining stages for
    /// that item only.
    #[error("script error for {name} {version} ({stage}): {message}")]
    Script {
        name: String,
        version: String,
        stage: &'static str,
        message: String,
    },

    /// Generic I/O failure not covered by a more specific kind above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GorillaError {
    /// True for whole-run errors that should end the process immediately
    /// (as opposed to per-item errors recorded in the report).
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, GorillaError::Config(_) | GorillaError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, GorillaError>;
