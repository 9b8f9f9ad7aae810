//! State folder scanner
//!
//! Lists the regular, readable files directly inside one state folder.
//! Subdirectories, symlinks and system clutter are skipped; nothing here is
//! treated as a failure.

use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Single-level file scanner
pub struct FileScanner {
    /// Exact file names of OS clutter
    ignore_names: Vec<String>,
    /// Extensions of in-progress downloads
    ignore_extensions: Vec<String>,
}

impl FileScanner {
    /// Create new file scanner with default ignore lists
    ///
    /// Ignores system files like .DS_Store, Thumbs.db and partial downloads
    /// (`*.part`, `*.crdownload`). Matching is by whole name or extension.
    pub fn new() -> Self {
        Self {
            ignore_names: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "desktop.ini".to_string(),
            ],
            ignore_extensions: vec!["part".to_string(), "crdownload".to_string()],
        }
    }

    /// Regular, readable files directly inside `folder`, sorted by path
    pub fn scan(&self, folder: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !folder.exists() {
            return Err(ScanError::PathNotFound(folder.to_path_buf()));
        }

        if !folder.is_dir() {
            return Err(ScanError::NotADirectory(folder.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(folder)
            .follow_links(false)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_entry(|e| {
                let ignored = self.is_ignored(e);
                if ignored {
                    tracing::debug!(path = %e.path().display(), "Ignoring system or partial file");
                }
                !ignored
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        tracing::debug!(path = %entry.path().display(), "Skipping non-regular entry");
                        continue;
                    }
                    if let Err(e) = File::open(entry.path()) {
                        tracing::warn!(
                            file = %entry.path().display(),
                            error = %e,
                            "Skipping unreadable file"
                        );
                        continue;
                    }
                    files.push(entry.into_path());
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with('.') || self.ignore_names.iter().any(|n| *n == file_name) {
            return true;
        }
        entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.ignore_extensions.contains(&ext))
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_nonexistent_path() {
        let scanner = FileScanner::new();
        let result = scanner.scan(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, b"test").unwrap();

        let scanner = FileScanner::new();
        let result = scanner.scan(&file_path);
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_is_single_level_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.flac"), b"x").unwrap();
        fs::write(root.join("a.wav"), b"x").unwrap();
        fs::write(root.join(".DS_Store"), b"x").unwrap();
        fs::write(root.join(".hidden.mp3"), b"x").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("c.mp3"), b"x").unwrap();

        let scanner = FileScanner::new();
        let files = scanner.scan(root).unwrap();
        assert_eq!(files, vec![root.join("a.wav"), root.join("b.flac")]);
    }

    #[test]
    fn test_part_in_name_is_not_a_partial_download() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("live.part1.mp3"), b"x").unwrap();
        fs::write(root.join("departure.flac"), b"x").unwrap();
        fs::write(root.join("incoming.mp3.part"), b"x").unwrap();
        fs::write(root.join("other.wav.crdownload"), b"x").unwrap();

        let scanner = FileScanner::new();
        let files = scanner.scan(root).unwrap();
        assert_eq!(
            files,
            vec![root.join("departure.flac"), root.join("live.part1.mp3")]
        );
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = FileScanner::new();
        assert!(scanner.scan(temp_dir.path()).unwrap().is_empty());
    }
}
