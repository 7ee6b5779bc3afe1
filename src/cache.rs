//! Cache Store: a content-addressed download cache keyed by the URL's
//! basename, with a sibling `.hash` side-file recording the expected
//! SHA-256 of each cached payload.

use crate::hash::{hashes_equal, sha256_file};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const DEFAULT_RETENTION_DAYS: u64 = 30;

pub struct CacheStore {
    root: PathBuf,
    retention_days: u64,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: u64) -> Self {
        self.retention_days = days;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a download of `url` would land at: `root/basename(url)`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root.join(basename(url))
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn catalogs_dir(&self) -> PathBuf {
        self.root.join("catalogs")
    }

    fn hash_sidecar(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".hash");
        PathBuf::from(name)
    }

    /// True iff `path` exists, is non-empty, its `.hash` sidecar matches
    /// its current SHA-256, and it was modified within `retention_days`.
    pub fn is_valid(&self, path: &Path) -> bool {
        let Ok(meta) = fs::metadata(path) else {
            return false;
        };
        if meta.len() == 0 {
            return false;
        }
        let Ok(modified) = meta.modified() else {
            return false;
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > Duration::from_secs(self.retention_days * 86_400) {
            return false;
        }
        let sidecar = Self::hash_sidecar(path);
        let Ok(expected) = fs::read_to_string(&sidecar) else {
            return false;
        };
        let Ok(actual) = sha256_file(path) else {
            return false;
        };
        hashes_equal(expected.trim(), &actual)
    }

    /// Copies `src` into `dst`, writing a sibling `.hash` sidecar with the
    /// computed SHA-256 of the copied content.
    pub fn promote(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        let digest = sha256_file(dst)?;
        fs::write(Self::hash_sidecar(dst), digest)?;
        Ok(())
    }
}

/// Extracts the last path segment of a URL, ignoring query string and
/// fragment. Falls back to the whole string if no `/` is present.
pub fn basename(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn basename_extracts_final_path_segment() {
        assert_eq!(basename("https://example.com/pkgs/foo-1.2.0.msi"), "foo-1.2.0.msi");
        assert_eq!(basename("https://example.com/pkgs/foo.msi?x=1"), "foo.msi");
        assert_eq!(basename("https://example.com/"), "download");
    }

    #[test]
    fn is_valid_false_when_file_missing() {
        let dir = tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        assert!(!cache.is_valid(&dir.path().join("nope")));
    }

    #[test]
    fn is_valid_true_after_promote() {
        let src_dir = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        let src = src_dir.path().join("payload.bin");
        File::create(&src).unwrap().write_all(b"hello world").unwrap();

        let cache = CacheStore::new(cache_dir.path());
        let dst = cache.path_for("https://example.com/payload.bin");
        cache.promote(&src, &dst).unwrap();

        assert!(cache.is_valid(&dst));
    }

    #[test]
    fn is_valid_false_when_sidecar_mismatches_content() {
        let src_dir = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        let src = src_dir.path().join("payload.bin");
        File::create(&src).unwrap().write_all(b"hello world").unwrap();

        let cache = CacheStore::new(cache_dir.path());
        let dst = cache.path_for("https://example.com/payload.bin");
        cache.promote(&src, &dst).unwrap();

        // Tamper with the cached payload without updating its sidecar.
        File::create(&dst).unwrap().write_all(b"tampered").unwrap();
        assert!(!cache.is_valid(&dst));
    }

    #[test]
    fn is_valid_false_when_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        File::create(&path).unwrap();
        fs::write(format!("{}.hash", path.display()), sha256_file(&path).unwrap()).unwrap();
        let cache = CacheStore::new(dir.path());
        assert!(!cache.is_valid(&path));
    }

    #[test]
    fn is_valid_respects_zero_retention_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.bin");
        File::create(&path).unwrap().write_all(b"data").unwrap();
        fs::write(format!("{}.hash", path.display()), sha256_file(&path).unwrap()).unwrap();

        // A freshly written file is never older than "now", so a
        // zero-day retention window must reject it immediately.
        let cache = CacheStore::new(dir.path()).with_retention_days(0);
        assert!(!cache.is_valid(&path));
    }
}
