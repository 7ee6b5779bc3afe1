//! Cache Cleaner: a two-pass sweep of the cache root. First pass deletes
//! regular files older than `age_days`; second pass removes directories
//! left empty by the first (bottom-up, so nested empties collapse too).

use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

pub const DEFAULT_AGE_DAYS: u64 = 5;

pub fn cleanup(root: &Path, age_days: u64) {
    let cutoff = Duration::from_secs(age_days * 86_400);
    delete_stale_files(root, cutoff);
    delete_empty_directories(root);
}

fn delete_stale_files(root: &Path, cutoff: Duration) {
    let now = SystemTime::now();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else { continue };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age > cutoff {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                log::warn!("failed to remove stale cache file {}: {}", entry.path().display(), e);
            }
        }
    }
}

fn delete_empty_directories(root: &Path) {
    // contents_first walks children before parents, so a directory
    // emptied by this same pass is seen as empty by the time its
    // parent is visited.
    for entry in WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path() == root || !entry.file_type().is_dir() {
            continue;
        }
        let is_empty = std::fs::read_dir(entry.path())
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if is_empty {
            if let Err(e) = std::fs::remove_dir(entry.path()) {
                log::warn!("failed to remove empty cache dir {}: {}", entry.path().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    #[test]
    fn leaves_fresh_files_and_their_directories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("manifests");
        fs::create_dir_all(&sub).unwrap();
        let file = sub.join("fresh.yaml");
        File::create(&file).unwrap().write_all(b"name: x").unwrap();

        cleanup(dir.path(), DEFAULT_AGE_DAYS);

        assert!(file.exists());
        assert!(sub.exists());
    }

    #[test]
    fn removes_directory_left_empty_after_stale_file_deletion() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("catalogs");
        fs::create_dir_all(&sub).unwrap();
        let file = sub.join("stale.yaml");
        File::create(&file).unwrap().write_all(b"x").unwrap();

        // Zero-day cutoff: any file with a nonzero age (true for anything
        // not created in this exact instant) is considered stale.
        std::thread::sleep(StdDuration::from_millis(10));
        cleanup(dir.path(), 0);

        assert!(!file.exists());
        assert!(!sub.exists());
    }

    #[test]
    fn root_itself_is_never_removed() {
        let dir = tempdir().unwrap();
        cleanup(dir.path(), 0);
        assert!(dir.path().exists());
    }
}
