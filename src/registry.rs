//! Windows uninstall-registry scanning.
//!
//! Grounded directly in `pahkat-client-core`'s
//! `package_store/windows.rs`: enumerate `...\Uninstall` (and its
//! WOW6432Node twin) under `HKEY_LOCAL_MACHINE`, keeping only subkeys that
//! carry `DisplayName`, `DisplayVersion`, and `UninstallString`.
//!
//! The scan is abstracted behind [`RegistrySource`] so the Status Checker
//! can be exercised on any host, not just Windows.

use std::collections::HashMap;

/// One observed installed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryApplication {
    pub key: String,
    pub name: String,
    pub version: String,
    pub uninstall_string: String,
    pub location: Option<String>,
    pub source: Option<String>,
}

/// A source of observed installed applications. Implementations are
/// expected to snapshot once and hand back the same data for the
/// lifetime of a run.
pub trait RegistrySource {
    fn scan(&self) -> Vec<RegistryApplication>;

    /// Direct lookup of a product code's uninstall subkey, used as the
    /// fallback when name matching fails for an MSI-type installer.
    fn by_product_code(&self, product_code: &str) -> Option<RegistryApplication>;
}

/// Looks up `name` against a snapshot: exact `DisplayName` match first,
/// then substring containment.
pub fn find_by_name<'a>(
    apps: &'a [RegistryApplication],
    name: &str,
) -> Option<&'a RegistryApplication> {
    apps.iter()
        .find(|a| a.name == name)
        .or_else(|| apps.iter().find(|a| a.name.contains(name)))
}

/// An in-memory registry snapshot, used in production by caching the real
/// Windows scan once per run, and directly in tests to avoid touching the
/// actual registry.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    apps: Vec<RegistryApplication>,
    by_code: HashMap<String, RegistryApplication>,
}

impl StaticRegistry {
    pub fn new(apps: Vec<RegistryApplication>) -> Self {
        Self {
            apps,
            by_code: HashMap::new(),
        }
    }

    pub fn with_product_codes(
        apps: Vec<RegistryApplication>,
        by_code: HashMap<String, RegistryApplication>,
    ) -> Self {
        Self { apps, by_code }
    }
}

impl RegistrySource for StaticRegistry {
    fn scan(&self) -> Vec<RegistryApplication> {
        self.apps.clone()
    }

    fn by_product_code(&self, product_code: &str) -> Option<RegistryApplication> {
        self.by_code.get(product_code).cloned()
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::RegistryApplication;
    use winreg::enums::*;
    use winreg::RegKey;

    const UNINSTALL_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Uninstall";

    fn scan_hive(hklm: &RegKey, flags: u32) -> Vec<RegistryApplication> {
        let mut apps = Vec::new();
        let uninstall = match hklm.open_subkey_with_flags(UNINSTALL_PATH, KEY_READ | flags) {
            Ok(k) => k,
            Err(_) => return apps,
        };
        for subkey_name in uninstall.enum_keys().flatten() {
            let Ok(subkey) = uninstall.open_subkey_with_flags(&subkey_name, KEY_READ | flags)
            else {
                continue;
            };
            let name: Result<String, _> = subkey.get_value("DisplayName");
            let version: Result<String, _> = subkey.get_value("DisplayVersion");
            let uninstall_string: Result<String, _> = subkey.get_value("UninstallString");
            if let (Ok(name), Ok(version), Ok(uninstall_string)) =
                (name, version, uninstall_string)
            {
                let location = subkey.get_value("InstallLocation").ok();
                let source = subkey.get_value("Publisher").ok();
                apps.push(RegistryApplication {
                    key: subkey_name,
                    name,
                    version,
                    uninstall_string,
                    location,
                    source,
                });
            }
        }
        apps
    }

    /// The real Windows-backed registry source, scanning both the native
    /// and WOW6432Node uninstall hives.
    pub struct WindowsRegistry;

    impl super::RegistrySource for WindowsRegistry {
        fn scan(&self) -> Vec<RegistryApplication> {
            let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
            let mut apps = scan_hive(&hklm, KEY_WOW64_64KEY);
            apps.extend(scan_hive(&hklm, KEY_WOW64_32KEY));
            apps
        }

        fn by_product_code(&self, product_code: &str) -> Option<RegistryApplication> {
            let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
            let path = format!(r"{}\{}", UNINSTALL_PATH, product_code);
            let subkey = hklm
                .open_subkey_with_flags(&path, KEY_READ | KEY_WOW64_64KEY)
                .or_else(|_| hklm.open_subkey_with_flags(&path, KEY_READ | KEY_WOW64_32KEY))
                .ok()?;
            let version: String = subkey.get_value("DisplayVersion").ok()?;
            let name: String = subkey
                .get_value("DisplayName")
                .unwrap_or_else(|_| product_code.to_string());
            let uninstall_string: String =
                subkey.get_value("UninstallString").unwrap_or_default();
            Some(RegistryApplication {
                key: product_code.to_string(),
                name,
                version,
                uninstall_string,
                location: subkey.get_value("InstallLocation").ok(),
                source: subkey.get_value("Publisher").ok(),
            })
        }
    }
}

#[cfg(windows)]
pub use windows_impl::WindowsRegistry;
