//! Status Checker: decides whether an action is required for a catalog
//! item against live system state.
//!
//! Probes are a closed tagged variant exposing one `needed()` operation;
//! the truth tables are pure functions over probe result × action, not
//! scattered branching.

use crate::catalog::{CatalogItem, FileCheck};
use crate::error::GorillaError;
use crate::hash::{hashes_equal, md5_file, sha256_file};
use crate::registry::{find_by_name, RegistrySource};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
    Uninstall,
}

/// A `Probe` abstracts over which check mechanism applies to an item;
/// dispatch order is script > file > registry > installs[] > infer.
pub enum Probe<'a> {
    Script(&'a str),
    File(&'a [FileCheck]),
    Registry { name: &'a str, version: &'a str },
    InstallsArray(&'a [FileCheck]),
    Infer,
}

impl<'a> Probe<'a> {
    pub fn for_item(item: &'a CatalogItem) -> Self {
        if let Some(script) = item.check.script.as_deref().filter(|s| !s.is_empty()) {
            Probe::Script(script)
        } else if !item.check.file.is_empty() {
            Probe::File(&item.check.file)
        } else if let Some(reg) = item
            .check
            .registry
            .as_ref()
            .filter(|r| !r.version.is_empty())
        {
            Probe::Registry {
                name: &reg.name,
                version: &reg.version,
            }
        } else if !item.installs.is_empty() {
            Probe::InstallsArray(&item.installs)
        } else {
            Probe::Infer
        }
    }
}

/// File-version resource reader, abstracted so tests don't need a real
/// Windows PE file. On Windows this would read the VERSIONINFO resource;
/// elsewhere (and in this crate's tests) it's supplied as a stub.
pub trait FileVersionReader {
    fn read_version(&self, path: &Path) -> Option<String>;
}

/// Always reports "no version resource found" — the conservative default
/// for non-Windows hosts and for files that carry no VERSIONINFO.
pub struct NoVersionReader;

impl FileVersionReader for NoVersionReader {
    fn read_version(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Runs a PowerShell probe script, non-interactively, in bypass mode, and
/// returns whether it exited zero ("present/as expected").
pub trait ScriptRunner {
    fn run_check_script(&self, script: &str, cache_path: &Path) -> Result<bool, GorillaError>;
}

/// Shells out to `powershell.exe`, writing the script to a temp `.ps1`
/// under `cache_path` and deleting it afterward.
pub struct RealScriptRunner;

impl ScriptRunner for RealScriptRunner {
    fn run_check_script(&self, script: &str, cache_path: &Path) -> Result<bool, GorillaError> {
        let temp_path = cache_path.join(format!("gorilla-check-{}.ps1", std::process::id()));
        std::fs::write(&temp_path, script)?;
        let result = Command::new("powershell")
            .args([
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-File",
            ])
            .arg(&temp_path)
            .status();
        let _ = std::fs::remove_file(&temp_path);
        match result {
            Ok(status) => Ok(status.success()),
            Err(e) => Err(GorillaError::StatusProbe {
                name: "<script>".to_string(),
                message: e.to_string(),
            }),
        }
    }
}

pub struct StatusChecker<'a> {
    pub registry: &'a dyn RegistrySource,
    pub script_runner: &'a dyn ScriptRunner,
    pub version_reader: &'a dyn FileVersionReader,
    pub cache_path: PathBuf,
}

impl<'a> StatusChecker<'a> {
    /// Returns whether `action` is required for `item`, dispatching to the
    /// appropriate probe.
    pub fn action_needed(&self, item: &CatalogItem, action: Action) -> Result<bool, GorillaError> {
        match Probe::for_item(item) {
            Probe::Script(script) => {
                match self.script_runner.run_check_script(script, &self.cache_path) {
                    Ok(ok) => Ok(script_truth_table(ok, action)),
                    Err(e) => {
                        log::warn!("status probe error for {}: {}", item.name, e);
                        Ok(true) // fail-open toward update
                    }
                }
            }
            Probe::File(checks) => Ok(checks
                .iter()
                .any(|c| self.file_probe_needed(c, action, HashKind::Sha256))),
            Probe::Registry { name, version } => Ok(self.registry_probe_needed(item, name, version, action)),
            Probe::InstallsArray(checks) => Ok(checks
                .iter()
                .any(|c| self.file_probe_needed(c, action, HashKind::Md5))),
            Probe::Infer => Ok(self.infer_needed(item, action)),
        }
    }

    fn file_probe_needed(&self, check: &FileCheck, action: Action, hash_kind: HashKind) -> bool {
        let path = Path::new(&check.path);
        if !path.exists() {
            return matches!(action, Action::Install);
        }
        if action == Action::Uninstall {
            return true;
        }
        if let Some(expected) = hash_kind.expected(check) {
            let actual = match hash_kind {
                HashKind::Sha256 => sha256_file(path).ok(),
                HashKind::Md5 => md5_file(path).ok(),
            };
            match actual {
                Some(actual) if !hashes_equal(&actual, expected) => return true,
                None => return true,
                _ => {}
            }
        }
        if let Some(required) = &check.version {
            if let Some(local) = self.version_reader.read_version(path) {
                if crate::catalog::compare_versions(&local, required) == std::cmp::Ordering::Less
                {
                    return matches!(action, Action::Install | Action::Update);
                }
            }
        }
        false
    }

    /// Matches an item against the registry snapshot by `DisplayName`
    /// first, falling back to its declared MSI product code when the name
    /// lookup misses and the item is MSI-installed.
    fn match_registry_app(
        &self,
        apps: &[crate::registry::RegistryApplication],
        name: &str,
        item: &CatalogItem,
    ) -> Option<crate::registry::RegistryApplication> {
        find_by_name(apps, name).cloned().or_else(|| {
            if item.installer.installer_type == Some(crate::catalog::InstallerType::Msi) {
                item.installer
                    .product_code
                    .as_ref()
                    .and_then(|code| self.registry.by_product_code(code))
            } else {
                None
            }
        })
    }

    fn registry_probe_needed(
        &self,
        item: &CatalogItem,
        name: &str,
        version: &str,
        action: Action,
    ) -> bool {
        let apps = self.registry.scan();
        let matched = self.match_registry_app(&apps, name, item);

        match matched {
            None => matches!(action, Action::Install),
            Some(app) => {
                let outdated =
                    crate::catalog::compare_versions(&app.version, version) == std::cmp::Ordering::Less;
                match action {
                    Action::Install => outdated,
                    Action::Update => outdated,
                    Action::Uninstall => true,
                }
            }
        }
    }

    /// Infers installed state by the same registry name/MSI product-code
    /// cascade as `registry_probe_needed`, then refines the detected
    /// version against the matched entry's install location when a file
    /// version resource is readable there.
    fn infer_needed(&self, item: &CatalogItem, action: Action) -> bool {
        let apps = self.registry.scan();
        let matched = self.match_registry_app(&apps, &item.name, item);

        let detected_version = matched.as_ref().map(|app| {
            app.location
                .as_deref()
                .and_then(|loc| self.version_reader.read_version(Path::new(loc)))
                .unwrap_or_else(|| app.version.clone())
        });

        match detected_version {
            None => matches!(action, Action::Install),
            Some(local) => {
                let outdated =
                    crate::catalog::compare_versions(&local, &item.version) == std::cmp::Ordering::Less;
                match action {
                    Action::Install | Action::Update => outdated,
                    Action::Uninstall => true,
                }
            }
        }
    }
}

enum HashKind {
    Sha256,
    Md5,
}

impl HashKind {
    fn expected<'a>(&self, check: &'a FileCheck) -> Option<&'a str> {
        match self {
            HashKind::Sha256 => check.hash.as_deref(),
            HashKind::Md5 => check.md5checksum.as_deref(),
        }
    }
}

/// The fixed script-probe truth table: exit 0 means "present/as expected".
fn script_truth_table(exit_zero: bool, action: Action) -> bool {
    match (exit_zero, action) {
        (true, Action::Uninstall) => true,
        (true, _) => false,
        (false, Action::Uninstall) => false,
        (false, _) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Check, InstallerSpec, RegistryCheck};
    use crate::registry::{RegistryApplication, StaticRegistry};
    use std::cell::RefCell;

    struct FixedScriptRunner(RefCell<Option<bool>>);

    impl ScriptRunner for FixedScriptRunner {
        fn run_check_script(&self, _script: &str, _cache_path: &Path) -> Result<bool, GorillaError> {
            Ok(self.0.borrow().unwrap())
        }
    }

    fn base_item(name: &str, version: &str) -> CatalogItem {
        CatalogItem {
            name: name.to_string(),
            display_name: String::new(),
            version: version.to_string(),
            supported_architectures: vec![],
            dependencies: vec![],
            installer: InstallerSpec::default(),
            uninstaller: InstallerSpec::default(),
            check: Check::default(),
            installs: vec![],
            preinstall_script: None,
            postinstall_script: None,
        }
    }

    fn checker<'a>(
        registry: &'a dyn RegistrySource,
        script_runner: &'a dyn ScriptRunner,
    ) -> StatusChecker<'a> {
        StatusChecker {
            registry,
            script_runner,
            version_reader: &NoVersionReader,
            cache_path: std::env::temp_dir(),
        }
    }

    #[test]
    fn script_probe_truth_table_covers_all_action_pairs() {
        assert!(!script_truth_table(true, Action::Install));
        assert!(!script_truth_table(true, Action::Update));
        assert!(script_truth_table(true, Action::Uninstall));
        assert!(script_truth_table(false, Action::Install));
        assert!(script_truth_table(false, Action::Update));
        assert!(!script_truth_table(false, Action::Uninstall));
    }

    #[test]
    fn registry_probe_not_installed_needs_install_only() {
        let registry = StaticRegistry::new(vec![]);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);
        let mut item = base_item("foo", "1.2.0");
        item.check = Check {
            script: None,
            file: vec![],
            registry: Some(RegistryCheck {
                name: "Foo".into(),
                version: "1.2.0".into(),
            }),
        };
        assert!(c.action_needed(&item, Action::Install).unwrap());
        assert!(!c.action_needed(&item, Action::Update).unwrap());
        assert!(!c.action_needed(&item, Action::Uninstall).unwrap());
    }

    #[test]
    fn registry_probe_installed_current_needs_only_uninstall() {
        let registry = StaticRegistry::new(vec![RegistryApplication {
            key: "Foo".into(),
            name: "Foo".into(),
            version: "1.2.0".into(),
            uninstall_string: String::new(),
            location: None,
            source: None,
        }]);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);
        let mut item = base_item("foo", "1.2.0");
        item.check.registry = Some(RegistryCheck {
            name: "Foo".into(),
            version: "1.2.0".into(),
        });
        assert!(!c.action_needed(&item, Action::Install).unwrap());
        assert!(!c.action_needed(&item, Action::Update).unwrap());
        assert!(c.action_needed(&item, Action::Uninstall).unwrap());
    }

    #[test]
    fn registry_probe_installed_outdated_needs_install_update_and_uninstall() {
        let registry = StaticRegistry::new(vec![RegistryApplication {
            key: "Foo".into(),
            name: "Foo".into(),
            version: "1.0.0".into(),
            uninstall_string: String::new(),
            location: None,
            source: None,
        }]);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);
        let mut item = base_item("foo", "1.2.0");
        item.check.registry = Some(RegistryCheck {
            name: "Foo".into(),
            version: "1.2.0".into(),
        });
        assert!(c.action_needed(&item, Action::Install).unwrap());
        assert!(c.action_needed(&item, Action::Update).unwrap());
        assert!(c.action_needed(&item, Action::Uninstall).unwrap());
    }

    #[test]
    fn installs_array_probe_matching_md5_needs_no_action() {
        use tempfile::NamedTempFile;
        use std::io::Write;
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"payload").unwrap();
        let digest = md5_file(f.path()).unwrap();

        let registry = StaticRegistry::new(vec![]);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);
        let mut item = base_item("foo", "1.0.0");
        item.installs = vec![FileCheck {
            path: f.path().to_string_lossy().to_string(),
            hash: None,
            md5checksum: Some(digest),
            version: None,
            product_name: None,
        }];
        assert!(!c.action_needed(&item, Action::Install).unwrap());
    }

    #[test]
    fn installs_array_probe_missing_file_needs_install() {
        let registry = StaticRegistry::new(vec![]);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);
        let mut item = base_item("foo", "1.0.0");
        item.installs = vec![FileCheck {
            path: "/nonexistent/path/for/test".into(),
            hash: None,
            md5checksum: None,
            version: None,
            product_name: None,
        }];
        assert!(c.action_needed(&item, Action::Install).unwrap());
        assert!(!c.action_needed(&item, Action::Update).unwrap());
        assert!(!c.action_needed(&item, Action::Uninstall).unwrap());
    }

    #[test]
    fn dispatch_order_prefers_script_over_registry() {
        let registry = StaticRegistry::new(vec![]);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);
        let mut item = base_item("foo", "1.0.0");
        item.check.script = Some("exit 0".to_string());
        item.check.registry = Some(RegistryCheck {
            name: "Foo".into(),
            version: "9.9.9".into(),
        });
        // Registry alone (not installed) would say "install needed", but
        // the script (exit 0, "OK") takes precedence and says no.
        assert!(!c.action_needed(&item, Action::Install).unwrap());
    }

    #[test]
    fn infer_probe_falls_back_to_msi_product_code_when_name_differs() {
        use std::collections::HashMap;
        let installed = RegistryApplication {
            key: "{PRODUCT-CODE}".into(),
            name: "Foo, Branded Edition".into(),
            version: "1.2.0".into(),
            uninstall_string: String::new(),
            location: None,
            source: None,
        };
        let mut by_code = HashMap::new();
        by_code.insert("{PRODUCT-CODE}".to_string(), installed.clone());
        let registry = StaticRegistry::with_product_codes(vec![installed], by_code);
        let runner = FixedScriptRunner(RefCell::new(Some(true)));
        let c = checker(&registry, &runner);

        let mut item = base_item("foo", "1.2.0");
        item.installer = InstallerSpec {
            installer_type: Some(crate::catalog::InstallerType::Msi),
            location: String::new(),
            hash: String::new(),
            arguments: vec![],
            product_code: Some("{PRODUCT-CODE}".to_string()),
        };

        // "foo" doesn't match the registry's "Foo, Branded Edition" by name
        // or substring, but the MSI product code does, and the version is
        // current, so no install/update is needed.
        assert!(!c.action_needed(&item, Action::Install).unwrap());
        assert!(!c.action_needed(&item, Action::Update).unwrap());
        assert!(c.action_needed(&item, Action::Uninstall).unwrap());
    }
}
