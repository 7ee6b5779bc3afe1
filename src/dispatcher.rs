//! Installer Dispatcher: drives each planned action through download,
//! pre-script, install/uninstall, and post-script stages, re-checking
//! status immediately before acting and recording every outcome without
//! aborting the rest of the run.

use crate::cache::CacheStore;
use crate::catalog::{verify_installer_hash, CatalogItem};
use crate::credential::CredentialProvider;
use crate::error::GorillaError;
use crate::http::Fetcher;
use crate::installer::{Installable, InstallerKind};
use crate::planner::PlannedAction;
use crate::report::RunReport;
use crate::retry::Sleeper;
use crate::status::{Action, StatusChecker};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Planned,
    Downloaded,
    PreOk,
    Installed,
    PostOk,
}

pub struct Dispatcher<'a> {
    pub fetcher: Fetcher<'a>,
    pub cache: &'a CacheStore,
    pub status: &'a StatusChecker<'a>,
    pub check_only: bool,
    backend_for: Box<dyn Fn(InstallerKind) -> Box<dyn Installable> + 'a>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        credentials: &'a dyn CredentialProvider,
        sleeper: &'a dyn Sleeper,
        cache: &'a CacheStore,
        status: &'a StatusChecker<'a>,
        check_only: bool,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(credentials, sleeper),
            cache,
            status,
            check_only,
            backend_for: Box::new(InstallerKind::backend),
        }
    }

    /// Same as [`Self::new`] but with the `InstallerKind -> Installable`
    /// resolution overridden, so tests can exercise the download/hash
    /// pipeline without spawning a real `msiexec`/`powershell` process.
    #[cfg(test)]
    fn with_backend(
        credentials: &'a dyn CredentialProvider,
        sleeper: &'a dyn Sleeper,
        cache: &'a CacheStore,
        status: &'a StatusChecker<'a>,
        check_only: bool,
        backend_for: impl Fn(InstallerKind) -> Box<dyn Installable> + 'a,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(credentials, sleeper),
            cache,
            status,
            check_only,
            backend_for: Box::new(backend_for),
        }
    }

    /// Runs every planned action, looking each up in `lookup` for its full
    /// catalog definition, and recording outcomes into `report`.
    pub fn run_all(
        &self,
        planned: &[PlannedAction],
        lookup: impl Fn(&str) -> Option<CatalogItem>,
        report: &mut RunReport,
    ) {
        for action in planned {
            let Some(item) = lookup(&action.name) else {
                log::warn!("planned action for {} has no catalog entry at dispatch time", action.name);
                continue;
            };
            self.run_one(&item, action.action, report);
        }
    }

    fn run_one(&self, item: &CatalogItem, action: Action, report: &mut RunReport) {
        match self.status.action_needed(item, action) {
            Ok(false) => {
                log::info!("{} already satisfies {:?}, skipping", item.name, action);
                return;
            }
            Err(e) => {
                log::warn!("status probe failed for {}: {}; proceeding fail-open", item.name, e);
            }
            Ok(true) => {}
        }

        if self.check_only {
            log::info!("check-only: would perform {:?} on {}", action, item.name);
            report.record_success(&item.name, &item.version, action);
            return;
        }

        if let Err(e) = self.execute(item, action) {
            log::error!("{:?} failed for {}: {}", action, item.name, e);
            report.record_failure(&item.name, &item.version, action, e.to_string());
            return;
        }
        report.record_success(&item.name, &item.version, action);
    }

    fn execute(&self, item: &CatalogItem, action: Action) -> Result<(), GorillaError> {
        let spec = if action == Action::Uninstall {
            &item.uninstaller
        } else {
            &item.installer
        };

        let mut stage = Stage::Planned;

        let payload_path = self.cache.path_for(&spec.location);
        // Redownload whenever the local file is absent or its hash no
        // longer matches the catalog's declared hash, not merely when the
        // cache's own self-consistency check fails: a stale payload left
        // over from a prior version is self-consistent with its own
        // sidecar but still wrong.
        let needs_download = if spec.hash.is_empty() {
            !self.cache.is_valid(&payload_path)
        } else if !payload_path.exists() {
            true
        } else {
            let actual = crate::hash::sha256_file(&payload_path)?;
            !crate::hash::hashes_equal(&spec.hash, &actual)
        };
        if needs_download {
            self.fetcher.download_file(&spec.location, &payload_path)?;
        }
        if !spec.hash.is_empty() {
            let actual = crate::hash::sha256_file(&payload_path)?;
            verify_installer_hash(item, &actual)?;
        }
        stage = Stage::Downloaded;

        if action != Action::Uninstall {
            if let Some(script) = &item.preinstall_script {
                run_lifecycle_script(item, script, "preinstall")?;
            }
        }
        stage = Stage::PreOk;

        let kind = InstallerKind::from(spec.installer_type.ok_or_else(|| GorillaError::Installer {
            name: item.name.clone(),
            version: item.version.clone(),
            message: "no installer type declared".to_string(),
        })?);
        let backend = (self.backend_for)(kind);

        match action {
            Action::Install | Action::Update => backend.install(item, &payload_path)?,
            Action::Uninstall => backend.uninstall(item, &payload_path)?,
        }
        stage = Stage::Installed;

        if action != Action::Uninstall {
            if let Some(script) = &item.postinstall_script {
                run_lifecycle_script(item, script, "postinstall")?;
            }
        }
        stage = Stage::PostOk;

        let _ = stage;
        Ok(())
    }
}

fn run_lifecycle_script(item: &CatalogItem, script: &str, stage: &'static str) -> Result<(), GorillaError> {
    let temp_path =
        std::env::temp_dir().join(format!("gorilla-{}-{}.ps1", stage, std::process::id()));
    std::fs::write(&temp_path, script).map_err(|e| GorillaError::Script {
        name: item.name.clone(),
        version: item.version.clone(),
        stage,
        message: e.to_string(),
    })?;
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
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(GorillaError::Script {
            name: item.name.clone(),
            version: item.version.clone(),
            stage,
            message: format!("exited with {}", status),
        }),
        Err(e) => Err(GorillaError::Script {
            name: item.name.clone(),
            version: item.version.clone(),
            stage,
            message: e.to_string(),
        }),
    }
}
