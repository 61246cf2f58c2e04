//! Atomic file operations
//!
//! The record store rewrites its whole table after every mutation. To keep
//! the canonical file intact across crashes, writes go through a sibling
//! temporary file:
//!
//! 1. Write to a temporary file (.tmp)
//! 2. Call sync_all() to flush to disk
//! 3. Rename temp file to final path (atomic on most filesystems)
//!
//! A reader therefore sees either the old table or the new one, never a
//! partial write.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for atomic operations
pub type AtomicResult<T> = Result<T, AtomicError>;

/// Errors that can occur during atomic operations
#[derive(Debug, Error)]
pub enum AtomicError {
    #[error("IO error writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Sibling temp path used while a write is in flight
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically write content to a file
///
/// The parent directory is created if missing.
///
/// # Example
///
/// ```ignore
/// atomic_write("data/weather_data.json", "{}")?;
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> AtomicResult<()> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    let write = || -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()
    };
    write().map_err(|source| AtomicError::Write {
        path: temp_path.clone(),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| AtomicError::Rename {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })
}

/// Remove a temp file left behind by an interrupted write
///
/// Returns whether a leftover file was found and removed.
pub fn remove_stale_temp<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    let temp_path = temp_path_for(path.as_ref());
    match fs::remove_file(&temp_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weather_data.json");

        atomic_write(&path, "{}").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{}");

        // Temp file should not exist
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weather_data.json");

        atomic_write(&path, r#"{"a":{"id":"a"}}"#).unwrap();
        atomic_write(&path, r#"{"b":{"id":"b"}}"#).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"b":{"id":"b"}}"#);
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("nested").join("weather_data.json");

        atomic_write(&path, "{}").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_temp_path_keeps_full_name() {
        let path = Path::new("data/weather_data.json");
        assert_eq!(temp_path_for(path), Path::new("data/weather_data.json.tmp"));
    }

    #[test]
    fn test_remove_stale_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weather_data.json");
        fs::write(temp_path_for(&path), "{\"partial").unwrap();

        assert!(remove_stale_temp(&path).unwrap());
        assert!(!temp_path_for(&path).exists());
        assert!(!remove_stale_temp(&path).unwrap());
    }

    #[test]
    fn test_write_into_missing_dir_under_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let err = atomic_write(blocker.join("weather_data.json"), "{}").unwrap_err();
        assert!(matches!(err, AtomicError::Write { .. }));
    }
}
