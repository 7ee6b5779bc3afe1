use super::{run_checked, Installable};
use crate::catalog::CatalogItem;
use crate::error::GorillaError;
use std::io::Read;
use std::path::Path;
use std::process::Command;
use zip::ZipArchive;

/// Extracts `<id>`/`<version>` from the package's `.nuspec` entry and
/// drives the `nuget` CLI for install/uninstall, matching the NuGet
/// console-client invocation the package ecosystem expects.
pub struct NupkgInstaller;

fn read_nuspec_field(archive_path: &Path, field: &str) -> Result<String, GorillaError> {
    let file = std::fs::File::open(archive_path)?;
    let mut zip = ZipArchive::new(file).map_err(|e| GorillaError::Installer {
        name: archive_path.display().to_string(),
        version: String::new(),
        message: format!("failed to open nupkg archive: {}", e),
    })?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| GorillaError::Installer {
            name: archive_path.display().to_string(),
            version: String::new(),
            message: format!("failed to read nupkg entry: {}", e),
        })?;
        if entry.name().ends_with(".nuspec") {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return extract_tag(&content, field).ok_or_else(|| GorillaError::Installer {
                name: archive_path.display().to_string(),
                version: String::new(),
                message: format!("nuspec missing <{}>", field),
            });
        }
    }
    Err(GorillaError::Installer {
        name: archive_path.display().to_string(),
        version: String::new(),
        message: "no .nuspec entry found in package".to_string(),
    })
}

/// Minimal same-line tag extraction; nuspec metadata fields are simple
/// leaf elements with no nested markup.
fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].trim().to_string())
}

impl Installable for NupkgInstaller {
    fn install(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        let id = read_nuspec_field(payload, "id")?;
        let version = read_nuspec_field(payload, "version")?;
        let source_dir = payload
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        let mut cmd = Command::new("nuget");
        cmd.args(["install", &id, "--version", &version, "-s"])
            .arg(&source_dir)
            .args(&item.installer.arguments);
        run_checked(item, cmd)
    }

    fn uninstall(&self, item: &CatalogItem, payload: &Path) -> Result<(), GorillaError> {
        let id = read_nuspec_field(payload, "id")?;
        let mut cmd = Command::new("nuget");
        cmd.args(["uninstall", &id]).args(&item.uninstaller.arguments);
        run_checked(item, cmd)
    }
}
