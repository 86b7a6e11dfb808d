// src/scratch.rs

//! Per-request scratch files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::Result;

/// Input, output and progress paths for one file-mode request.
///
/// All three share one random identifier, so concurrent requests using the
/// same scratch directory never collide. Nothing is written on creation: the
/// caller writes `input`, the worker writes `output` and `progress`.
///
/// The set is released exactly once, either through [`cleanup`] or when it is
/// dropped, so an aborted request never leaves files behind.
///
/// [`cleanup`]: TempResourceSet::cleanup
#[derive(Debug)]
pub struct TempResourceSet {
    id: String,
    input: PathBuf,
    output: PathBuf,
    progress: PathBuf,
    released: bool,
}

impl TempResourceSet {
    /// Allocate a fresh set inside `scratch_dir`, creating the directory if
    /// needed.
    pub fn create(scratch_dir: &Path) -> Result<Self> {
        fs::create_dir_all(scratch_dir)?;

        let id = Uuid::new_v4().simple().to_string();
        let set = Self {
            input: scratch_dir.join(format!("{id}_input.png")),
            output: scratch_dir.join(format!("{id}_output.png")),
            progress: scratch_dir.join(format!("{id}_progress.json")),
            id,
            released: false,
        };

        debug!(id = %set.id, dir = %scratch_dir.display(), "allocated scratch files");
        Ok(set)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn progress(&self) -> &Path {
        &self.progress
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.input, &self.output, &self.progress]
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete whichever of the three files exist.
    ///
    /// Deletion failures are logged and swallowed: a failed cleanup never
    /// turns into a failed request. Calling this more than once is a no-op.
    pub fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for path in [&self.input, &self.output, &self.progress] {
            match fs::remove_file(path) {
                Ok(()) => debug!(id = %self.id, path = %path.display(), "removed scratch file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    id = %self.id,
                    path = %path.display(),
                    error = %e,
                    "failed to remove scratch file"
                ),
            }
        }
    }
}

impl Drop for TempResourceSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_share_one_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let set = TempResourceSet::create(dir.path()).unwrap();

        for path in set.paths() {
            let name = path.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with(set.id()), "{name} should start with {}", set.id());
            assert_eq!(path.parent(), Some(dir.path()));
        }
        assert!(set.input().to_string_lossy().ends_with("_input.png"));
        assert!(set.output().to_string_lossy().ends_with("_output.png"));
        assert!(set.progress().to_string_lossy().ends_with("_progress.json"));
    }

    #[test]
    fn create_makes_missing_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let set = TempResourceSet::create(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(!set.input().exists());
    }
}
