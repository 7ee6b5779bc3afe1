//! Authorization header acquisition.
//!
//! The actual source (Windows Credential Manager, DPAPI-encrypted
//! registry, or anything else) is out of scope here; this module only
//! specifies the contract: produce an opaque `Authorization` header
//! value, and sanitize it before use.

use crate::error::GorillaError;

/// Opaque source of an HTTP `Authorization` header value.
pub trait CredentialProvider: Send + Sync {
    /// Returns the header value to send, or `Err` if no credential is
    /// available. Implementations never panic; absence is a normal,
    /// expected outcome when no credential is configured.
    fn fetch(&self) -> Result<String, GorillaError>;
}

/// A provider that never has a credential, matching a repo with no auth
/// configured.
pub struct NoCredentialProvider;

impl CredentialProvider for NoCredentialProvider {
    fn fetch(&self) -> Result<String, GorillaError> {
        Err(GorillaError::Auth("no credential provider configured".into()))
    }
}

/// A provider backed by a fixed string, useful for tests and for simple
/// static-token deployments.
pub struct StaticCredentialProvider {
    value: String,
}

impl StaticCredentialProvider {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: sanitize(&value.into()),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn fetch(&self) -> Result<String, GorillaError> {
        Ok(self.value.clone())
    }
}

/// Strips null bytes, a leading `Authorization:` prefix (case-insensitive),
/// and surrounding CR/LF/whitespace from a raw stored credential value.
/// Does *not* add a `Basic ` prefix — callers prepend that only if the
/// sanitized value doesn't already carry a scheme.
pub fn sanitize(raw: &str) -> String {
    let no_nulls: String = raw.chars().filter(|&c| c != '\0').collect();
    let trimmed = no_nulls.trim_matches(|c: char| c == '\r' || c == '\n' || c.is_whitespace());
    let lower = trimmed.to_ascii_lowercase();
    let stripped = if let Some(rest) = lower.strip_prefix("authorization:") {
        trimmed[trimmed.len() - rest.len()..].trim_start()
    } else {
        trimmed
    };
    stripped.trim().to_string()
}

/// Builds the final header value, prepending `Basic ` only if the
/// sanitized value doesn't already declare a scheme (i.e. contains no
/// space, per HTTP's `<scheme> <value>` convention).
pub fn authorization_header_value(raw: &str) -> String {
    let clean = sanitize(raw);
    if clean.contains(' ') {
        clean
    } else {
        format!("Basic {}", clean)
    }
}
