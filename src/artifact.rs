//! Artifact layout - deterministic filesystem mapping for run outputs
//!
//! The layout is a pure function from `(experiment, run_nr, model folder,
//! file name)` to a path under a configured root, plus idempotent directory
//! creation and create-parents-then-write file writes. No uniqueness logic
//! lives here.
//!
//! On-disk shape:
//!
//! ```text
//! <root>/<experiment>/<run_nr>/              run directory
//! <root>/<experiment>/<run_nr>/files/<name>  uploaded model files
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Folder under a run directory that holds uploaded model files.
pub const DEFAULT_MODEL_FOLDER: &str = "files";

/// A named file payload destined for a run's model folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunFile {
    /// File name within the model folder.
    pub name: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl RunFile {
    /// Create a run file payload.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Deterministic path mapping under a configured artifact root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    /// Create a layout rooted at `root`. No filesystem access happens here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the artifact root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an experiment directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the name is not a valid path segment.
    pub fn experiment_dir(&self, experiment_name: &str) -> Result<PathBuf> {
        Ok(self.root.join(segment(experiment_name)?))
    }

    /// Path of a run directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the experiment name is not a valid path
    /// segment.
    pub fn run_dir(&self, experiment_name: &str, run_nr: u64) -> Result<PathBuf> {
        Ok(self.experiment_dir(experiment_name)?.join(run_nr.to_string()))
    }

    /// Path of a file inside a run's model folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if any caller-supplied segment is not a
    /// valid path segment.
    pub fn run_file(
        &self,
        experiment_name: &str,
        run_nr: u64,
        model_folder: &str,
        file_name: &str,
    ) -> Result<PathBuf> {
        Ok(self
            .run_dir(experiment_name, run_nr)?
            .join(segment(model_folder)?)
            .join(segment(file_name)?))
    }

    /// Create a directory and all missing parents. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the filesystem refuses.
    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// Write a file, creating parent directories first and overwriting any
    /// existing content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the filesystem refuses.
    pub fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Validate one caller-supplied path segment.
///
/// Rejects empty segments, separators, `.`/`..` and NUL so uploaded names
/// cannot escape the layout root.
fn segment(name: &str) -> Result<&str> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(Error::Storage(format!("invalid path segment: {name:?}")));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_deterministic() {
        let layout = ArtifactLayout::new("/tmp/artifacts");
        let path = layout.run_file("exp1", 3, "files", "model.bin").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/artifacts/exp1/3/files/model.bin"));
        assert_eq!(path, layout.run_file("exp1", 3, "files", "model.bin").unwrap());
    }

    #[test]
    fn test_traversal_segments_rejected() {
        let layout = ArtifactLayout::new("/tmp/artifacts");
        assert!(layout.experiment_dir("..").is_err());
        assert!(layout.experiment_dir("a/b").is_err());
        assert!(layout.run_file("exp1", 1, "files", "..\\evil").is_err());
        assert!(layout.experiment_dir("").is_err());
    }

    #[test]
    fn test_write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let path = layout.run_file("exp1", 1, "files", "weights.bin").unwrap();
        layout.write_file(&path, b"abc").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");

        // Overwrite wins.
        layout.write_file(&path, b"xyz").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"xyz");
    }

    #[test]
    fn test_ensure_dir_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let run_dir = layout.run_dir("exp1", 1).unwrap();
        layout.ensure_dir(&run_dir).unwrap();
        layout.ensure_dir(&run_dir).unwrap();
        assert!(run_dir.is_dir());
    }
}
