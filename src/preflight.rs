//! Preflight hook: an optional site-local script run before config reload.
//! A non-zero exit aborts the run.

use std::path::Path;
use std::process::Command;

/// Well-known preflight script location, mirroring the fixed config path.
pub const DEFAULT_PREFLIGHT_PATH: &str = r"C:\ProgramData\ManagedInstalls\preflight.ps1";

/// Runs the preflight script at `path` if it exists. Returns `Ok(true)` if
/// there was nothing to run or it exited zero, `Ok(false)` if it exited
/// non-zero (the caller should abort), and `Err` on a spawn failure.
pub fn run(path: &Path) -> std::io::Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let status = Command::new("powershell")
        .args([
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
            "-File",
        ])
        .arg(path)
        .status()?;
    Ok(status.success())
}
