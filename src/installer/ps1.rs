use super::{run_checked, Installable};
use crate::catalog::CatalogItem;
use crate::error::GorillaError;
use std::path::Path;
use std::process::Command;

/// Runs the downloaded script with `powershell -NoProfile -NonInteractive
/// -ExecutionPolicy Bypass -File <path>`, the same invocation the Status
/// Checker's script probe uses.
pub struct Ps1Installer;

fn command_for(payload: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args([
        "-NoProfile",
        "-NonInteractive",
        "-ExecutionPolicy",
        "Bypass",
        "-File",
    ])
    .arg(payload)
    .args(args);
    cmd
}

impl Installable for Ps1Installer {
    fn install(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        run_checked(item, command_for(payload, &item.installer.arguments))
    }

    fn uninstall(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        run_checked(item, command_for(payload, &item.uninstaller.arguments))
    }
}
