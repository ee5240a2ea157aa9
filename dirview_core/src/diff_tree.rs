use bitflags::bitflags;
use dirview_common::{DirViewError, FileEntry, ResultKind, MAX_SIDES, MIN_SIDES};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

bitflags! {
    /// View state stored on each tree node.
    ///
    /// These are the only bits the folder view writes back into the tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ViewFlags: u8 {
        /// Directory children are shown in tree mode
        const EXPANDED = 1 << 0;

        /// Excluded from every projection until shown again
        const HIDDEN = 1 << 1;
    }
}

/// Stable handle of a node inside a [`DiffTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One compared entry (file or directory) with per-side information
#[derive(Debug, Clone)]
pub struct DiffItem {
    /// Path relative to every side root
    pub relative_path: PathBuf,
    /// One slot per side; `None` when the entry is missing there
    pub sides: Vec<Option<FileEntry>>,
    pub is_dir: bool,
    pub result: ResultKind,
    pub flags: ViewFlags,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    next_sibling: Option<NodeId>,
}

impl DiffItem {
    pub fn new(
        relative_path: impl Into<PathBuf>,
        is_dir: bool,
        result: ResultKind,
        sides: Vec<Option<FileEntry>>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            sides,
            is_dir,
            result,
            flags: ViewFlags::empty(),
            parent: None,
            children: Vec::new(),
            next_sibling: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn side_count(&self) -> usize {
        self.sides.len()
    }

    pub fn exists(&self, side: usize) -> bool {
        self.sides.get(side).map_or(false, Option::is_some)
    }

    pub fn exists_all(&self) -> bool {
        self.sides.iter().all(Option::is_some)
    }

    pub fn exists_count(&self) -> usize {
        self.sides.iter().filter(|side| side.is_some()).count()
    }

    /// Present on `side` and nowhere else
    pub fn is_side_only(&self, side: usize) -> bool {
        self.exists(side) && self.exists_count() == 1
    }

    pub fn is_result_diff(&self) -> bool {
        self.result == ResultKind::Different
    }

    pub fn is_filtered(&self) -> bool {
        self.result == ResultKind::Filtered
    }

    pub fn is_error(&self) -> bool {
        self.result == ResultKind::Error
    }

    pub fn is_expanded(&self) -> bool {
        self.flags.contains(ViewFlags::EXPANDED)
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ViewFlags::HIDDEN)
    }

    /// Counts toward the difference total shown after a compare
    pub fn counts_as_difference(&self) -> bool {
        self.is_result_diff() || (!self.exists_all() && !self.is_filtered())
    }

    /// File name of the entry
    pub fn name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.relative_path.to_string_lossy().to_string())
    }

    /// Parent folder of the entry relative to the side roots
    pub fn parent_path(&self) -> PathBuf {
        self.relative_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Extension of a file entry, lowercase; directories have none
    pub fn extension(&self) -> String {
        if self.is_dir {
            return String::new();
        }
        self.relative_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Arena holding the result of a 2- or 3-way folder comparison.
///
/// Nodes are addressed by [`NodeId`]. Parents own their children through the
/// child list; the `parent` link is a plain back-reference handle.
#[derive(Debug, Clone)]
pub struct DiffTree {
    side_roots: Vec<PathBuf>,
    nodes: Vec<DiffItem>,
    top_level: Vec<NodeId>,
}

impl DiffTree {
    pub fn new(side_roots: Vec<PathBuf>) -> Result<Self, DirViewError> {
        if side_roots.len() < MIN_SIDES || side_roots.len() > MAX_SIDES {
            return Err(DirViewError::Comparison(format!(
                "A comparison needs {} or {} sides, got {}",
                MIN_SIDES,
                MAX_SIDES,
                side_roots.len()
            )));
        }
        Ok(Self {
            side_roots,
            nodes: Vec::new(),
            top_level: Vec::new(),
        })
    }

    pub fn side_count(&self) -> usize {
        self.side_roots.len()
    }

    pub fn base_path(&self, side: usize) -> &Path {
        &self.side_roots[side]
    }

    pub fn side_roots(&self) -> &[PathBuf] {
        &self.side_roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add `item` as the last child of `parent` (or as a top-level entry).
    ///
    /// The item must carry one side slot per compared side.
    pub fn insert(&mut self, parent: Option<NodeId>, mut item: DiffItem) -> Result<NodeId, DirViewError> {
        if item.sides.len() != self.side_count() {
            return Err(DirViewError::Comparison(format!(
                "Item {} has {} sides, tree has {}",
                item.relative_path.display(),
                item.sides.len(),
                self.side_count()
            )));
        }
        if let Some(parent) = parent {
            if parent.0 >= self.nodes.len() {
                return Err(DirViewError::Comparison(format!("Unknown parent node {}", parent.0)));
            }
        }

        let id = NodeId(self.nodes.len());
        item.parent = parent;
        item.children.clear();
        item.next_sibling = None;

        let previous = match parent {
            Some(parent) => self.nodes[parent.0].children.last().copied(),
            None => self.top_level.last().copied(),
        };
        if let Some(previous) = previous {
            self.nodes[previous.0].next_sibling = Some(id);
        }

        self.nodes.push(item);
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.top_level.push(id),
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> &DiffItem {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut DiffItem {
        &mut self.nodes[id.0]
    }

    pub fn top_level(&self) -> &[NodeId] {
        &self.top_level
    }

    /// First top-level entry
    pub fn first_diff_position(&self) -> Option<NodeId> {
        self.top_level.first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next_sibling
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    /// Next node in pre-order, crossing into children and back up to the
    /// parents' siblings.
    pub fn next_diff_ref_position(&self, id: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(id) {
            return Some(child);
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(sibling) = self.next_sibling(node) {
                return Some(sibling);
            }
            current = self.nodes[node.0].parent;
        }
        None
    }

    /// Pre-order iterator over every node
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            next: self.first_diff_position(),
        }
    }

    /// Iterator over the strict descendants of `id`, in pre-order
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// True when `of` is `candidate` itself or one of its parents
    pub fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(node) = current {
            if node == of {
                return true;
            }
            current = self.nodes[node.0].parent;
        }
        false
    }

    /// Nesting level, 0 for top-level entries
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[id.0].parent;
        while let Some(node) = current {
            depth += 1;
            current = self.nodes[node.0].parent;
        }
        depth
    }

    /// Full path of the entry on `side`, whether or not it exists there
    pub fn item_path(&self, id: NodeId, side: usize) -> PathBuf {
        self.side_roots[side].join(&self.nodes[id.0].relative_path)
    }

    pub fn find(&self, relative_path: &Path) -> Option<NodeId> {
        self.iter().find(|id| self.nodes[id.0].relative_path == relative_path)
    }

    pub fn set_flags(&mut self, id: NodeId, flags: ViewFlags) {
        self.nodes[id.0].flags.insert(flags);
    }

    pub fn clear_flags(&mut self, id: NodeId, flags: ViewFlags) {
        self.nodes[id.0].flags.remove(flags);
    }

    pub fn set_flags_all(&mut self, flags: ViewFlags) {
        for node in &mut self.nodes {
            node.flags.insert(flags);
        }
    }

    pub fn clear_flags_all(&mut self, flags: ViewFlags) {
        for node in &mut self.nodes {
            node.flags.remove(flags);
        }
    }

    pub fn hidden_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_hidden()).count()
    }

    /// Expand state of every directory with children, keyed by relative path
    pub fn save_tree_state(&self) -> TreeState {
        let expanded = self
            .nodes
            .iter()
            .filter(|node| node.has_children())
            .map(|node| (node.relative_path.clone(), node.is_expanded()))
            .collect();
        TreeState { expanded }
    }

    /// Re-apply a saved expand state, typically after a rescan rebuilt the tree.
    /// Directories unknown to the saved state keep their current flag.
    pub fn restore_tree_state(&mut self, state: &TreeState) {
        for node in &mut self.nodes {
            if !node.has_children() {
                continue;
            }
            if let Some(&expanded) = state.expanded.get(&node.relative_path) {
                node.flags.set(ViewFlags::EXPANDED, expanded);
            }
        }
    }
}

/// Snapshot of directory expand state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeState {
    expanded: HashMap<PathBuf, bool>,
}

impl TreeState {
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn is_expanded(&self, relative_path: &Path) -> Option<bool> {
        self.expanded.get(relative_path).copied()
    }
}

pub struct PreOrder<'a> {
    tree: &'a DiffTree,
    next: Option<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next_diff_ref_position(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    tree: &'a DiffTree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self
            .tree
            .next_diff_ref_position(current)
            .filter(|&node| node != self.root && self.tree.is_ancestor(node, self.root));
        Some(current)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_rejects_wrong_side_count() {
        assert!(DiffTree::new(vec![PathBuf::from("/only")]).is_err());
        assert!(DiffTree::new(vec![PathBuf::new(); 4]).is_err());
    }

    #[test]
    fn test_insert_rejects_mismatched_sides() {
        let mut tree = two_way();
        let bad = item("x", false, ResultKind::Same, &[true, true, true]);
        assert!(tree.insert(None, bad).is_err());
    }

    #[test]
    fn test_sibling_and_child_navigation() {
        let (tree, a, a1, a2, b) = scenario_tree();
        assert_eq!(tree.first_diff_position(), Some(a));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.next_sibling(b), None);
        assert_eq!(tree.first_child(a), Some(a1));
        assert_eq!(tree.next_sibling(a1), Some(a2));
        assert_eq!(tree.first_child(b), None);
    }

    #[test]
    fn test_pre_order_iteration() {
        let (tree, a, a1, a2, b) = scenario_tree();
        let order: Vec<NodeId> = tree.iter().collect();
        assert_eq!(order, vec![a, a1, a2, b]);
        assert_eq!(tree.next_diff_ref_position(a2), Some(b));
    }

    #[test]
    fn test_descendants_stop_at_subtree_end() {
        let (tree, a, a1, a2, b) = scenario_tree();
        assert_eq!(tree.descendants(a).collect::<Vec<_>>(), vec![a1, a2]);
        assert_eq!(tree.descendants(b).count(), 0);
        assert_eq!(tree.descendants(a1).count(), 0);
    }

    #[test]
    fn test_is_ancestor_includes_self() {
        let (tree, a, a1, _a2, b) = scenario_tree();
        assert!(tree.is_ancestor(a1, a));
        assert!(tree.is_ancestor(a, a));
        assert!(!tree.is_ancestor(a, a1));
        assert!(!tree.is_ancestor(a1, b));
    }

    #[test]
    fn test_depth_and_paths() {
        let (tree, a, a1, _a2, _b) = scenario_tree();
        assert_eq!(tree.depth(a), 0);
        assert_eq!(tree.depth(a1), 1);
        assert_eq!(tree.item_path(a1, 0), PathBuf::from("/left/A/a1"));
        assert_eq!(tree.item_path(a1, 1), PathBuf::from("/right/A/a1"));
        assert_eq!(tree.find(Path::new("A/a2")).map(|id| tree.get(id).name()), Some("a2".to_string()));
    }

    #[test]
    fn test_existence_helpers() {
        let (tree, a, _a1, _a2, b) = scenario_tree();
        assert!(tree.get(a).exists_all());
        assert!(tree.get(b).is_side_only(0));
        assert!(!tree.get(b).is_side_only(1));
        assert!(tree.get(b).counts_as_difference());
    }

    #[test]
    fn test_tree_state_survives_rebuilt_tree() {
        let (mut tree, a, _a1, _a2, _b) = scenario_tree();
        tree.set_flags(a, ViewFlags::EXPANDED);
        let state = tree.save_tree_state();
        assert_eq!(state.len(), 1);
        assert_eq!(state.is_expanded(Path::new("A")), Some(true));

        let (mut rescanned, a, _a1, _a2, _b) = scenario_tree();
        assert!(!rescanned.get(a).is_expanded());
        rescanned.restore_tree_state(&state);
        assert!(rescanned.get(a).is_expanded());
    }

    #[test]
    fn test_bulk_flag_updates() {
        let (mut tree, a, a1, _a2, b) = scenario_tree();
        tree.set_flags_all(ViewFlags::HIDDEN);
        assert_eq!(tree.hidden_count(), 4);
        tree.clear_flags_all(ViewFlags::HIDDEN);
        assert_eq!(tree.hidden_count(), 0);
        tree.set_flags(a1, ViewFlags::HIDDEN | ViewFlags::EXPANDED);
        tree.clear_flags(a1, ViewFlags::EXPANDED);
        assert!(tree.get(a1).is_hidden());
        assert!(!tree.get(a1).is_expanded());
        assert!(!tree.get(a).is_hidden());
        assert!(!tree.get(b).is_hidden());
    }
}
