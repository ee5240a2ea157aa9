use crate::{FileMetadata, VfsError};
use std::path::Path;

/// Read-only view of a filesystem.
///
/// The folder view only ever asks whether paths exist and what kind they
/// are, so the trait is limited to lookups.
pub trait Vfs: Send + Sync {
    /// Returns the metadata for a specific path
    fn metadata(&self, path: &Path) -> Result<FileMetadata, VfsError>;

    /// Checks if a path exists and is a directory
    fn is_existing_dir(&self, path: &Path) -> bool {
        self.metadata(path).map(|meta| meta.is_dir).unwrap_or(false)
    }
}
