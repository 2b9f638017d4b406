//! Shared persistence utilities: staged writes and JSON output.
//!
//! Files are written to a `.tmp` sibling and renamed into place, so a reader
//! never sees a partially written file. [`StagedFile`] exposes the two halves
//! separately for callers that must stage several files before committing
//! any of them.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Atomically write JSON data to a file (2-space indentation).
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to a file, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    StagedFile::write(path, data)?.commit()
}

/// A file written next to its destination but not yet renamed into place.
///
/// Dropping an uncommitted `StagedFile` removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn write(target: &Path, data: &[u8]) -> io::Result<Self> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staged = Self {
            tmp: tmp_path(target),
            target: target.to_path_buf(),
            committed: false,
        };
        std::fs::write(&staged.tmp, data)?;
        Ok(staged)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file over its destination.
    pub fn commit(mut self) -> io::Result<()> {
        std::fs::rename(&self.tmp, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

/// `model.bin` -> `model.bin.tmp`; keeps the original extension visible.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        count: u32,
    }

    #[test]
    fn test_atomic_write_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.json");
        let data = TestData {
            name: "hello".into(),
            count: 42,
        };

        atomic_write_json(&path, &data).unwrap();
        let loaded: TestData =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, data);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n  \"name\""));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dir").join("test.json");
        atomic_write(&path, b"{}").unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested/dir/test.json.tmp").exists());
    }

    #[test]
    fn test_uncommitted_stage_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        {
            let staged = StagedFile::write(&path, b"abc").unwrap();
            assert!(dir.path().join("model.bin.tmp").exists());
            assert_eq!(staged.target(), path.as_path());
        }
        assert!(!dir.path().join("model.bin.tmp").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_tmp_path_keeps_extension() {
        assert_eq!(
            tmp_path(Path::new("/a/rf_parameters.json")),
            PathBuf::from("/a/rf_parameters.json.tmp")
        );
    }
}
