//! Installer Dispatcher's per-type execution strategies.
//!
//! A closed tagged enum dispatches to one of four `Installable`
//! implementations instead of a string-keyed switch.

mod exe;
mod msi;
mod nupkg;
mod ps1;

use crate::catalog::{CatalogItem, InstallerType};
use crate::error::GorillaError;
use std::path::Path;

pub use exe::ExeInstaller;
pub use msi::MsiInstaller;
pub use nupkg::NupkgInstaller;
pub use ps1::Ps1Installer;

/// Shared contract every installer backend implements.
pub trait Installable {
    fn install(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError>;
    fn uninstall(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError>;
}

/// Picks the `Installable` for a catalog item's declared installer type.
#[derive(Debug, Clone, Copy)]
pub enum InstallerKind {
    Msi,
    Exe,
    Ps1,
    Nupkg,
}

impl From<InstallerType> for InstallerKind {
    fn from(t: InstallerType) -> Self {
        match t {
            InstallerType::Msi => InstallerKind::Msi,
            InstallerType::Exe => InstallerKind::Exe,
            InstallerType::Ps1 => InstallerKind::Ps1,
            InstallerType::Nupkg => InstallerKind::Nupkg,
        }
    }
}

impl InstallerKind {
    pub fn backend(self) -> Box<dyn Installable> {
        match self {
            InstallerKind::Msi => Box::new(MsiInstaller),
            InstallerKind::Exe => Box::new(ExeInstaller),
            InstallerKind::Ps1 => Box::new(Ps1Installer),
            InstallerKind::Nupkg => Box::new(NupkgInstaller),
        }
    }
}

/// Runs a subprocess to completion and maps a non-zero exit into an
/// `Installer` error. Shared by every backend's command invocation.
fn run_checked(
    item: &CatalogItem,
    mut cmd: std::process::Command,
) -> Result<(), GorillaError> {
    let output = cmd.output().map_err(|e| GorillaError::Installer {
        name: item.name.clone(),
        version: item.version.clone(),
        message: format!("failed to spawn: {}", e),
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(GorillaError::Installer {
            name: item.name.clone(),
            version: item.version.clone(),
            message: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        })
    }
}
