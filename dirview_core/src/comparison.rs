use crate::diff_tree::{DiffItem, DiffTree, NodeId};
use crate::hash_cache::HashCache;
use crate::scanner::FolderScanner;
use dirview_common::{DirViewError, FileEntry, ResultKind, MAX_SIDES, MIN_SIDES};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Builds a [`DiffTree`] from the listings of two or three folders
pub struct ComparisonEngine {
    cache: HashCache,
    verify_hashes: bool,
}

impl ComparisonEngine {
    pub fn new(cache: HashCache) -> Self {
        Self {
            cache,
            verify_hashes: false,
        }
    }

    /// Compare equal-sized files by content hash instead of modification time
    pub fn with_hash_verification(mut self, enabled: bool) -> Self {
        self.verify_hashes = enabled;
        self
    }

    pub fn persist_cache(&self) -> Result<(), DirViewError> {
        self.cache.persist()
    }

    /// Scan every root with `scanner` and compare the listings
    pub fn compare_folders(
        &self,
        roots: &[PathBuf],
        scanner: &FolderScanner,
        cancel: Option<&AtomicBool>,
    ) -> Result<DiffTree, DirViewError> {
        let mut side_entries = Vec::with_capacity(roots.len());
        for root in roots {
            if !root.is_dir() {
                return Err(DirViewError::Path(format!("Not a directory: {}", root.display())));
            }
            side_entries.push(scanner.scan_with_cancel(root, cancel)?);
        }
        self.compare_entries(
            roots.to_vec(),
            side_entries,
            |path, is_dir| scanner.is_ignored(path, is_dir),
            cancel,
        )
    }

    /// Compare per-side listings (paths relative to each root).
    ///
    /// Entries for which `is_filtered` answers true become `Filtered`. Once
    /// `cancel` is raised, every entry not yet compared becomes `Aborted`.
    pub fn compare_entries<F>(
        &self,
        roots: Vec<PathBuf>,
        side_entries: Vec<Vec<FileEntry>>,
        is_filtered: F,
        cancel: Option<&AtomicBool>,
    ) -> Result<DiffTree, DirViewError>
    where
        F: Fn(&Path, bool) -> bool,
    {
        if side_entries.len() != roots.len() || roots.len() < MIN_SIDES || roots.len() > MAX_SIDES {
            return Err(DirViewError::Comparison(format!(
                "Expected {} to {} side listings matching the roots, got {} listings for {} roots",
                MIN_SIDES,
                MAX_SIDES,
                side_entries.len(),
                roots.len()
            )));
        }

        info!(
            "Comparing {} sides: {}",
            roots.len(),
            side_entries
                .iter()
                .map(|entries| entries.len().to_string())
                .collect::<Vec<_>>()
                .join(" / ")
        );

        let mut maps: Vec<HashMap<PathBuf, FileEntry>> = side_entries
            .into_iter()
            .map(|entries| entries.into_iter().map(|e| (e.path.clone(), e)).collect())
            .collect();

        // Path ordering compares components, so parents sort before children
        let mut all_paths: Vec<PathBuf> = maps.iter().flat_map(|map| map.keys().cloned()).collect();
        all_paths.sort();
        all_paths.dedup();

        let mut tree = DiffTree::new(roots)?;
        let mut nodes: HashMap<PathBuf, NodeId> = HashMap::with_capacity(all_paths.len());
        let mut aborted = false;

        for path in all_paths {
            if !aborted && cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                warn!("Comparison cancelled, remaining entries are marked aborted");
                aborted = true;
            }

            let sides: Vec<Option<FileEntry>> = maps.iter_mut().map(|map| map.remove(&path)).collect();
            let present: Vec<&FileEntry> = sides.iter().flatten().collect();
            let is_dir = present.iter().any(|e| e.is_dir);
            let mixed_kinds = present.iter().any(|e| e.is_dir != is_dir);

            let result = if aborted {
                ResultKind::Aborted
            } else if mixed_kinds {
                warn!("{:?} is a file on one side and a folder on another", path);
                ResultKind::Error
            } else if is_filtered(&path, is_dir) {
                ResultKind::Filtered
            } else if present.len() < sides.len() {
                ResultKind::Different
            } else if is_dir {
                ResultKind::Same
            } else {
                self.compare_files(&tree, &path, &present)
            };

            let parent = path.parent().and_then(|parent| nodes.get(parent)).copied();
            let id = tree.insert(parent, DiffItem::new(path.clone(), is_dir, result, sides))?;
            nodes.insert(path, id);
        }

        propagate_folder_results(&mut tree);

        debug!("Built diff tree with {} nodes", tree.len());
        Ok(tree)
    }

    /// Compare one file present on every side
    fn compare_files(&self, tree: &DiffTree, path: &Path, present: &[&FileEntry]) -> ResultKind {
        let size = present[0].size;
        if present.iter().any(|e| e.size != size) {
            return ResultKind::Different;
        }

        if !self.verify_hashes {
            let modified = present[0].modified;
            return if present.iter().all(|e| e.modified == modified) {
                ResultKind::Same
            } else {
                ResultKind::Different
            };
        }

        let mut first = None;
        for side in 0..tree.side_count() {
            let full_path = tree.base_path(side).join(path);
            let hash = match self.cache.hash_file(&full_path) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Failed to read {:?}: {}", full_path, e);
                    return ResultKind::Error;
                }
            };
            match first {
                None => first = Some(hash),
                Some(expected) if expected != hash => return ResultKind::Different,
                Some(_) => {}
            }
        }
        ResultKind::Same
    }
}

/// A folder that exists everywhere is different when anything below it is
/// different, missing somewhere, or unreadable.
fn propagate_folder_results(tree: &mut DiffTree) {
    let order: Vec<NodeId> = tree.iter().collect();
    for &id in order.iter().rev() {
        let item = tree.get(id);
        if item.result != ResultKind::Same || !item.has_children() {
            continue;
        }
        let differs = item.children().iter().any(|&child| {
            let child = tree.get(child);
            child.counts_as_difference() || child.is_error()
        });
        if differs {
            tree.get_mut(id).result = ResultKind::Different;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirview_common::AppConfig;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::TempDir;

    struct Sides {
        _temp: TempDir,
        roots: Vec<PathBuf>,
        cache_dir: PathBuf,
    }

    fn make_sides(names: &[&str]) -> Sides {
        let temp = TempDir::new().unwrap();
        let roots: Vec<PathBuf> = names.iter().map(|name| temp.path().join(name)).collect();
        for root in &roots {
            fs::create_dir_all(root).unwrap();
        }
        let cache_dir = temp.path().join("cache");
        Sides {
            _temp: temp,
            roots,
            cache_dir,
        }
    }

    fn write(root: &Path, rel: &str, content: &[u8], mtime: i64) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    fn engine(sides: &Sides) -> ComparisonEngine {
        ComparisonEngine::new(HashCache::new(sides.cache_dir.clone()).unwrap())
    }

    fn result_of(tree: &DiffTree, rel: &str) -> ResultKind {
        tree.get(tree.find(Path::new(rel)).unwrap()).result
    }

    #[test]
    fn test_two_way_tree() {
        let sides = make_sides(&["left", "right"]);
        let (left, right) = (&sides.roots[0], &sides.roots[1]);
        write(left, "same.txt", b"hello", 1_000);
        write(right, "same.txt", b"hello", 1_000);
        write(left, "changed.txt", b"hello", 1_000);
        write(right, "changed.txt", b"hello world", 1_000);
        write(left, "sub/inner.txt", b"abc", 1_000);
        write(right, "sub/inner.txt", b"abc", 1_000);
        write(left, "docs/only.md", b"left", 1_000);
        write(right, "docs/keep.md", b"k", 1_000);
        write(left, "docs/keep.md", b"k", 1_000);

        let scanner = FolderScanner::new(AppConfig::default());
        let tree = engine(&sides).compare_folders(&sides.roots, &scanner, None).unwrap();

        assert_eq!(result_of(&tree, "same.txt"), ResultKind::Same);
        assert_eq!(result_of(&tree, "changed.txt"), ResultKind::Different);
        assert_eq!(result_of(&tree, "sub"), ResultKind::Same);
        assert_eq!(result_of(&tree, "docs"), ResultKind::Different);

        let only = tree.find(Path::new("docs/only.md")).unwrap();
        assert!(tree.get(only).is_side_only(0));
        let docs = tree.find(Path::new("docs")).unwrap();
        assert_eq!(tree.get(only).parent(), Some(docs));
        assert_eq!(tree.get(docs).children().len(), 2);
    }

    #[test]
    fn test_three_way_tree() {
        let sides = make_sides(&["base", "mine", "theirs"]);
        for root in &sides.roots {
            write(root, "common.txt", b"same", 500);
        }
        write(&sides.roots[1], "mine.txt", b"m", 500);
        write(&sides.roots[0], "edited.txt", b"one", 500);
        write(&sides.roots[1], "edited.txt", b"one", 500);
        write(&sides.roots[2], "edited.txt", b"two!", 900);

        let scanner = FolderScanner::new(AppConfig::default());
        let tree = engine(&sides).compare_folders(&sides.roots, &scanner, None).unwrap();

        assert_eq!(tree.side_count(), 3);
        assert_eq!(result_of(&tree, "common.txt"), ResultKind::Same);
        assert_eq!(result_of(&tree, "edited.txt"), ResultKind::Different);
        let mine = tree.find(Path::new("mine.txt")).unwrap();
        assert!(tree.get(mine).is_side_only(1));
    }

    #[test]
    fn test_file_and_folder_with_same_name_is_error() {
        let sides = make_sides(&["left", "right"]);
        write(&sides.roots[0], "thing", b"file", 1_000);
        write(&sides.roots[1], "thing/inner.txt", b"nested", 1_000);

        let scanner = FolderScanner::new(AppConfig::default());
        let tree = engine(&sides).compare_folders(&sides.roots, &scanner, None).unwrap();

        let thing = tree.find(Path::new("thing")).unwrap();
        assert_eq!(tree.get(thing).result, ResultKind::Error);
        assert!(!crate::selection::openable(tree.get(thing)));
        assert!(!crate::selection::copyable_to(tree.get(thing), 0));
        let inner = tree.find(Path::new("thing/inner.txt")).unwrap();
        assert!(tree.get(inner).is_side_only(1));
    }

    #[test]
    fn test_hash_verification_ignores_mtime() {
        let sides = make_sides(&["left", "right"]);
        write(&sides.roots[0], "a.bin", b"payload", 1_000);
        write(&sides.roots[1], "a.bin", b"payload", 2_000);
        write(&sides.roots[0], "b.bin", b"payload", 1_000);
        write(&sides.roots[1], "b.bin", b"PAYLOAD", 1_000);

        let scanner = FolderScanner::new(AppConfig::default());
        let by_time = engine(&sides).compare_folders(&sides.roots, &scanner, None).unwrap();
        assert_eq!(result_of(&by_time, "a.bin"), ResultKind::Different);
        assert_eq!(result_of(&by_time, "b.bin"), ResultKind::Same);

        let hashing = engine(&sides).with_hash_verification(true);
        let by_hash = hashing.compare_folders(&sides.roots, &scanner, None).unwrap();
        assert_eq!(result_of(&by_hash, "a.bin"), ResultKind::Same);
        assert_eq!(result_of(&by_hash, "b.bin"), ResultKind::Different);
        hashing.persist_cache().unwrap();
        assert!(sides.cache_dir.join("dirview_hashes.bin").exists());
    }

    #[test]
    fn test_filtered_entries_marked() {
        let sides = make_sides(&["left", "right"]);
        write(&sides.roots[0], "main.o", b"obj", 1_000);
        write(&sides.roots[0], "main.c", b"src", 1_000);
        write(&sides.roots[1], "main.c", b"src", 1_000);

        let config = AppConfig {
            ignore_patterns: vec!["*.o".to_string()],
            ..AppConfig::default()
        };
        let scanner = FolderScanner::new(config).with_filtered(true);
        let tree = engine(&sides).compare_folders(&sides.roots, &scanner, None).unwrap();

        let object = tree.find(Path::new("main.o")).unwrap();
        assert_eq!(tree.get(object).result, ResultKind::Filtered);
        assert!(!tree.get(object).counts_as_difference());
        assert_eq!(result_of(&tree, "main.c"), ResultKind::Same);
    }

    #[test]
    fn test_cancelled_compare_marks_aborted() {
        let sides = make_sides(&["left", "right"]);
        let entries = vec![
            vec![FileEntry {
                path: PathBuf::from("x"),
                size: 1,
                modified: std::time::UNIX_EPOCH,
                is_dir: false,
            }],
            Vec::new(),
        ];
        let cancel = AtomicBool::new(true);
        let tree = engine(&sides)
            .compare_entries(sides.roots.clone(), entries, |_, _| false, Some(&cancel))
            .unwrap();
        assert_eq!(result_of(&tree, "x"), ResultKind::Aborted);
    }

    #[test]
    fn test_missing_root_rejected() {
        let sides = make_sides(&["left"]);
        let roots = vec![sides.roots[0].clone(), sides.roots[0].join("nope")];
        let scanner = FolderScanner::new(AppConfig::default());
        assert!(matches!(
            engine(&sides).compare_folders(&roots, &scanner, None),
            Err(DirViewError::Path(_))
        ));
    }

    #[test]
    fn test_listing_count_must_match_roots() {
        let sides = make_sides(&["left", "right"]);
        let result = engine(&sides).compare_entries(sides.roots.clone(), vec![Vec::new()], |_, _| false, None);
        assert!(matches!(result, Err(DirViewError::Comparison(_))));
    }
}
