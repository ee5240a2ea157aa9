use dirview_common::{AppConfig, DirViewError, FileEntry};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Folder scanner feeding one side of a comparison
pub struct FolderScanner {
    config: AppConfig,
    recursive: bool,
    keep_filtered: bool,
    custom_ignore: Option<Gitignore>,
}

impl FolderScanner {
    pub fn new(config: AppConfig) -> Self {
        let custom_ignore = Self::build_custom_ignore(&config);
        Self {
            config,
            recursive: true,
            keep_filtered: false,
            custom_ignore,
        }
    }

    /// Only list the immediate children of the root when `false`
    pub fn with_recursion(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Report entries matching an ignore pattern instead of dropping them.
    /// Ignored folders are reported but not descended into.
    pub fn with_filtered(mut self, keep: bool) -> Self {
        self.keep_filtered = keep;
        self
    }

    fn build_custom_ignore(config: &AppConfig) -> Option<Gitignore> {
        if config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in &config.ignore_patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                debug!("Failed to add ignore pattern '{}': {}", pattern, err);
            }
        }

        match builder.build() {
            Ok(ignore) => {
                debug!("Built ignore matcher with {} patterns", config.ignore_patterns.len());
                Some(ignore)
            }
            Err(e) => {
                debug!("Failed to build ignore matcher: {}", e);
                None
            }
        }
    }

    /// Whether `path` (relative to a side root) is excluded by the ignore
    /// patterns, either itself or through one of its parent folders
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Some(ref custom_ignore) = self.custom_ignore else {
            return false;
        };
        if custom_ignore.matched(path, is_dir).is_ignore() {
            return true;
        }

        let mut current = path;
        while let Some(parent) = current.parent() {
            if !parent.as_os_str().is_empty() && custom_ignore.matched(parent, true).is_ignore() {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Excluded because a parent folder is ignored; such entries are never
    /// listed, even when filtered entries are kept.
    fn under_ignored_parent(&self, path: &Path) -> bool {
        path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or(false, |parent| self.is_ignored(parent, true))
    }

    fn should_skip(&self, path: &Path, is_dir: bool) -> bool {
        if self.keep_filtered {
            self.under_ignored_parent(path)
        } else {
            self.is_ignored(path, is_dir)
        }
    }

    /// Scan a directory and return all files and subdirectories
    pub fn scan(&self, root: &Path) -> Result<Vec<FileEntry>, DirViewError> {
        self.scan_with_cancel(root, None)
    }

    /// Scan a directory, stopping early when `cancel` is raised
    pub fn scan_with_cancel(&self, root: &Path, cancel: Option<&AtomicBool>) -> Result<Vec<FileEntry>, DirViewError> {
        let mut entries = Vec::new();

        let mut walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(false)
            .sort(true);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker {
            if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                return Err(DirViewError::Comparison("Scan cancelled".to_string()));
            }

            let entry = entry.map_err(|e| {
                DirViewError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("Walk error: {}", e)))
            })?;

            let path = entry.path();
            let relative_path = path
                .strip_prefix(root)
                .map_err(|e| DirViewError::Path(e.to_string()))?
                .to_path_buf();

            // jwalk yields the root itself first
            if relative_path.as_os_str().is_empty() {
                continue;
            }

            let is_dir = entry.file_type().is_dir();
            if self.should_skip(&relative_path, is_dir) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                DirViewError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("Metadata error: {}", e)))
            })?;

            entries.push(FileEntry {
                path: relative_path,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                is_dir: metadata.is_dir(),
            });
        }

        debug!("Scanned {} entries from {:?}", entries.len(), root);
        Ok(entries)
    }
}
