//! Config Loader — reads a single YAML document describing repo URL,
//! client identifier, cache paths, catalogs, local-manifest paths, auth
//! mode, and verbosity.

use crate::error::GorillaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default well-known config path on a real Windows endpoint. Overridden
/// in tests and via `--config`.
pub const DEFAULT_CONFIG_PATH: &str = r"C:\ProgramData\ManagedInstalls\Config.yaml";

fn default_log_level() -> String {
    "info".to_string()
}

/// Process-wide configuration, immutable after load except for the single
/// reload permitted immediately after the preflight hook runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub software_repo_url: String,
    pub client_identifier: String,
    #[serde(default)]
    pub local_manifests: Vec<PathBuf>,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_catalogs_path")]
    pub catalogs_path: PathBuf,
    #[serde(default = "default_manifests_path")]
    pub manifests_path: PathBuf,
    #[serde(default)]
    pub catalogs: Vec<String>,
    #[serde(default = "default_arch")]
    pub default_arch: String,
    #[serde(default)]
    pub check_only: bool,
    #[serde(default)]
    pub force_basic_auth: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub verbose: u8,
    #[serde(default)]
    pub debug: bool,
}

#[cfg(windows)]
fn default_cache_path() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\ManagedInstalls\Cache")
}

#[cfg(windows)]
fn default_catalogs_path() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\ManagedInstalls\catalogs")
}

#[cfg(windows)]
fn default_manifests_path() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\ManagedInstalls\manifests")
}

/// Non-Windows builds have no `ProgramData`; fall back to the platform
/// cache dir so the dev/test suite doesn't need a config file that
/// overrides every path.
#[cfg(not(windows))]
fn managed_installs_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ManagedInstalls")
}

#[cfg(not(windows))]
fn default_cache_path() -> PathBuf {
    managed_installs_root().join("Cache")
}

#[cfg(not(windows))]
fn default_catalogs_path() -> PathBuf {
    managed_installs_root().join("catalogs")
}

#[cfg(not(windows))]
fn default_manifests_path() -> PathBuf {
    managed_installs_root().join("manifests")
}

fn default_arch() -> String {
    "x64".to_string()
}

impl Config {
    /// Reads and parses the config document at `path`. `ConfigError` is
    /// fatal to the run, so this is the one place a caller should treat a
    /// `Result::Err` as a reason to stop rather than continue.
    pub fn load(path: &Path) -> Result<Self, GorillaError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GorillaError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, GorillaError> {
        serde_yaml::from_str(content)
            .map_err(|e| GorillaError::Config(format!("cannot parse config: {}", e)))
    }

    /// Serializes the effective configuration back to YAML, used by
    /// `--show-config`.
    pub fn to_yaml(&self) -> Result<String, GorillaError> {
        serde_yaml::to_string(self).map_err(|e| GorillaError::Config(e.to_string()))
    }

    /// Runtime architecture normalized: `amd64` -> `x64`,
    /// `arm64` passed through, anything else passed through.
    pub fn detected_arch(&self) -> String {
        normalize_arch(std::env::consts::ARCH)
    }
}

pub fn normalize_arch(raw: &str) -> String {
    match raw {
        "x86_64" | "amd64" => "x64".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
software_repo_url: https://example.com/repo
client_identifier: demo
"#;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg = Config::parse(MINIMAL).unwrap();
        assert_eq!(cfg.software_repo_url, "https://example.com/repo");
        assert_eq!(cfg.client_identifier, "demo");
        assert_eq!(cfg.default_arch, "x64");
        assert!(!cfg.check_only);
        assert!(!cfg.force_basic_auth);
        assert!(cfg.catalogs.is_empty());
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = Config::parse(MINIMAL).unwrap();
        let yaml = cfg.to_yaml().unwrap();
        let reparsed = Config::parse(&yaml).unwrap();
        assert_eq!(cfg.software_repo_url, reparsed.software_repo_url);
        assert_eq!(cfg.client_identifier, reparsed.client_identifier);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = Config::parse("not: valid: yaml: [").unwrap_err();
        assert!(matches!(err, GorillaError::Config(_)));
    }

    #[test]
    fn normalizes_known_architectures() {
        assert_eq!(normalize_arch("amd64"), "x64");
        assert_eq!(normalize_arch("x86_64"), "x64");
        assert_eq!(normalize_arch("arm64"), "arm64");
        assert_eq!(normalize_arch("riscv64"), "riscv64");
    }
}
