//! Archiving of finished artifacts

use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::model::PropertyInfo;
use crate::portal::names;
use std::path::{Path, PathBuf};

/// Collaborator that archives an accepted artifact and returns its identifier
pub trait ArtifactStore {
    fn archive(&self, local: &Path, info: &PropertyInfo) -> WorkflowResult<String>;
}

/// Keeps artifacts where they were written; the identifier is the local path
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnly;

impl ArtifactStore for LocalOnly {
    fn archive(&self, local: &Path, _info: &PropertyInfo) -> WorkflowResult<String> {
        Ok(local.display().to_string())
    }
}

/// Copies artifacts into a `(year, district, taluka, village, property)` folder
/// chain below a fixed root, creating or reusing each level
#[derive(Debug, Clone)]
pub struct FolderArchive {
    root: PathBuf,
}

impl FolderArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactStore for FolderArchive {
    fn archive(&self, local: &Path, info: &PropertyInfo) -> WorkflowResult<String> {
        let dir = names::artifact_dir(&self.root, info);
        std::fs::create_dir_all(&dir)
            .map_err(|e| WorkflowError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;

        let file_name = local
            .file_name()
            .ok_or_else(|| WorkflowError::Storage(format!("{} has no file name", local.display())))?;
        let target = dir.join(file_name);
        std::fs::copy(local, &target)
            .map_err(|e| WorkflowError::Storage(format!("Failed to copy to {}: {}", target.display(), e)))?;

        log::info!("Archived {} to {}", local.display(), target.display());
        Ok(target.display().to_string())
    }
}
