//! Flat directory lister.
//!
//! Lists the files of one directory whose extension is on the allow-list,
//! ordered by case-insensitive display name.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::GridError;
use crate::models::MediaItem;

/// A file accepted by the lister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub path: PathBuf,
    pub name: String,
}

impl ListedEntry {
    pub fn into_item(self) -> MediaItem {
        MediaItem::new(self.path, self.name)
    }
}

/// Check a path against a lowercase extension allow-list.
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

/// List eligible files directly inside `dir`.
///
/// Entries that cannot be read are skipped. An empty result is reported as
/// `GridError::NoMedia` since there is nothing to show.
pub fn list_directory(dir: &Path, extensions: &[String]) -> Result<Vec<ListedEntry>, GridError> {
    if let Err(e) = std::fs::metadata(dir) {
        return Err(GridError::io(dir, e));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        // Follow symlinks to files, skip everything else that is not a file.
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file || !has_allowed_extension(entry.path(), extensions) {
            continue;
        }

        entries.push(ListedEntry {
            path: entry.path().to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
        });
    }

    if entries.is_empty() {
        return Err(GridError::NoMedia {
            dir: dir.to_path_buf(),
        });
    }

    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    debug!(?dir, count = entries.len(), "Listed directory");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        ["png", "jpg"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_dir_is_no_media() {
        let dir = tempdir().unwrap();
        let err = list_directory(dir.path(), &exts()).unwrap_err();
        assert!(matches!(err, GridError::NoMedia { .. }));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let err = list_directory(&dir.path().join("nope"), &exts()).unwrap_err();
        assert!(matches!(err, GridError::Io { .. }));
    }

    #[test]
    fn test_filters_and_sorts_case_insensitively() {
        let dir = tempdir().unwrap();
        for name in ["b.png", "A.JPG", "c.txt", "a2.png", "C.png"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        File::create(sub.join("nested.png")).unwrap();

        let entries = list_directory(dir.path(), &exts()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A.JPG", "a2.png", "b.png", "C.png"]);
    }

    #[test]
    fn test_listing_is_stable() {
        let dir = tempdir().unwrap();
        for name in ["x.png", "X.png", "y.jpg", "Z.png"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let first = list_directory(dir.path(), &exts()).unwrap();
        for _ in 0..5 {
            assert_eq!(list_directory(dir.path(), &exts()).unwrap(), first);
        }
    }

    #[test]
    fn test_has_allowed_extension() {
        assert!(has_allowed_extension(Path::new("/a/b.PNG"), &exts()));
        assert!(!has_allowed_extension(Path::new("/a/b.gif"), &exts()));
        assert!(!has_allowed_extension(Path::new("/a/png"), &exts()));
    }
}
