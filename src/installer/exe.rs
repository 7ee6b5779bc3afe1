use super::{run_checked, Installable};
use crate::catalog::CatalogItem;
use crate::error::GorillaError;
use std::path::Path;
use std::process::Command;

/// Runs the downloaded executable directly with the catalog's declared
/// arguments, trusting the vendor installer's own silent-mode flags.
pub struct ExeInstaller;

impl Installable for ExeInstaller {
    fn install(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        let mut cmd = Command::new(payload);
        cmd.args(&item.installer.arguments);
        run_checked(item, cmd)
    }

    fn uninstall(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        let mut cmd = Command::new(payload);
        cmd.args(&item.uninstaller.arguments);
        run_checked(item, cmd)
    }
}
