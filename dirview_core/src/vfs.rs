use crate::open::PathProbe;
use dirview_common::{FileMetadata, Vfs, VfsError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Local filesystem VFS implementation.
///
/// Relative paths resolve against `root`; absolute paths are used as given.
#[derive(Debug, Clone, Default)]
pub struct LocalVfs {
    root: PathBuf,
}

impl LocalVfs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Vfs for LocalVfs {
    fn metadata(&self, path: &Path) -> Result<FileMetadata, VfsError> {
        let full_path = self.root.join(path);
        let meta = fs::metadata(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(full_path.display().to_string()),
            _ => VfsError::Io(e),
        })?;

        Ok(FileMetadata {
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: meta.is_dir(),
        })
    }
}

impl PathProbe for LocalVfs {
    fn is_existing_dir(&self, path: &Path) -> bool {
        Vfs::is_existing_dir(self, path)
    }
}
