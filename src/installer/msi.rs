use super::{run_checked, Installable};
use crate::catalog::CatalogItem;
use crate::error::GorillaError;
use std::path::Path;
use std::process::Command;

/// Invokes `msiexec` directly: `/i` to install/update, `/x` to uninstall,
/// always `/qn /norestart` plus the catalog's declared arguments.
pub struct MsiInstaller;

impl Installable for MsiInstaller {
    fn install(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        let mut cmd = Command::new("msiexec");
        cmd.arg("/i")
            .arg(payload)
            .arg("/qn")
            .arg("/norestart")
            .args(&item.installer.arguments);
        run_checked(item, cmd)
    }

    fn uninstall(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        let mut cmd = Command::new("msiexec");
        cmd.arg("/x")
            .arg(payload)
            .arg("/qn")
            .arg("/norestart")
            .args(&item.uninstaller.arguments);
        run_checked(item, cmd)
    }
}
