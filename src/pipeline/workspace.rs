//! Scratch space for the intermediate files of a mosh.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding the intermediate and moshed AVI files.
///
/// Everything in it is deleted when the workspace is dropped.
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("moshpit-")
            .tempdir()
            .context("Failed to create temporary workspace")?;
        tracing::debug!("Workspace at {:?}", temp_dir.path());
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Source re-encoded with keyframes at the frames to remove.
    pub fn intermediate(&self) -> PathBuf {
        self.temp_dir.path().join("intermediate.avi")
    }

    /// Intermediate with the frames removed.
    pub fn moshed(&self) -> PathBuf {
        self.temp_dir.path().join("moshed.avi")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_workspace_and_are_removed_on_drop() {
        let workspace = Workspace::new().unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(workspace.intermediate().starts_with(&dir));
        assert_eq!(workspace.moshed().extension().unwrap(), "avi");

        std::fs::write(workspace.moshed(), b"data").unwrap();
        drop(workspace);
        assert!(!dir.exists());
    }
}
