//! Flattening of a [`DiffTree`] into the ordered rows of the folder view.
//!
//! Rows always form a pre-order walk of the visible part of the tree. In
//! tree mode the rows of an expanded directory's subtree follow it as one
//! contiguous block, which is what lets [`ViewProjector::collapse`] remove
//! them without a full rebuild.

use crate::diff_tree::{DiffTree, NodeId, ViewFlags};
use crate::selection::SelectionSet;
use dirview_common::{DisplayConfig, ResultKind};
use std::path::PathBuf;
use tracing::debug;

/// What a row of the folder view stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// The ".." entry that navigates to the parent folders
    ParentDir { enabled: bool },
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectedRow {
    pub key: RowKey,
    /// Indentation level; always 0 in flat mode
    pub depth: usize,
}

impl ProjectedRow {
    pub fn node(&self) -> Option<NodeId> {
        match self.key {
            RowKey::Node(id) => Some(id),
            RowKey::ParentDir { .. } => None,
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self.key, RowKey::ParentDir { .. })
    }
}

/// Ordered rows plus the number of differences met while building them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    rows: Vec<ProjectedRow>,
    diff_count: usize,
}

impl Projection {
    pub fn rows(&self) -> &[ProjectedRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<ProjectedRow> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&ProjectedRow> {
        self.rows.get(row)
    }

    pub fn node_at(&self, row: usize) -> Option<NodeId> {
        self.rows.get(row).and_then(ProjectedRow::node)
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.position_of(RowKey::Node(node))
    }

    pub fn position_of(&self, key: RowKey) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    pub fn special_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_special()).count()
    }

    /// Differences counted during the last full rebuild
    pub fn diff_count(&self) -> usize {
        self.diff_count
    }
}

/// Whether the view may navigate above the compared folders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpwardDirectory {
    /// At a filesystem root; no parent row at all
    Never,
    /// Parent row shown but disabled (parents do not correspond)
    No,
    ParentIsRegularPath,
    /// Compared folders live in a temporary extraction directory
    ParentIsTempPath,
}

impl UpwardDirectory {
    /// Decide upward navigation for the compared roots and return the parent
    /// folders when navigation is allowed.
    ///
    /// Navigation is allowed when every root has a parent and all roots share
    /// the same final component, so that the parents line up as a compare.
    pub fn resolve(roots: &[PathBuf]) -> (Self, Vec<PathBuf>) {
        let parents: Option<Vec<PathBuf>> = roots
            .iter()
            .map(|root| root.parent().filter(|p| !p.as_os_str().is_empty()).map(PathBuf::from))
            .collect();
        let Some(parents) = parents else {
            return (UpwardDirectory::Never, Vec::new());
        };

        let mut names = roots.iter().map(|root| root.file_name());
        let first = names.next().flatten();
        if first.is_some() && names.all(|name| name == first) {
            (UpwardDirectory::ParentIsRegularPath, parents)
        } else {
            (UpwardDirectory::No, Vec::new())
        }
    }
}

/// Builds and incrementally updates [`Projection`]s
#[derive(Debug, Clone)]
pub struct ViewProjector {
    config: DisplayConfig,
    upward: UpwardDirectory,
}

impl ViewProjector {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            config,
            upward: UpwardDirectory::Never,
        }
    }

    pub fn with_upward(mut self, upward: UpwardDirectory) -> Self {
        self.upward = upward;
        self
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DisplayConfig) {
        self.config = config;
    }

    pub fn upward(&self) -> UpwardDirectory {
        self.upward
    }

    pub fn set_upward(&mut self, upward: UpwardDirectory) {
        self.upward = upward;
    }

    /// Expand state is only honoured in tree mode of a recursive compare
    pub fn tree_mode_active(&self) -> bool {
        self.config.tree_mode && self.config.recursive
    }

    /// Build the full row sequence from scratch
    pub fn rebuild(&self, tree: &DiffTree) -> Projection {
        let mut projection = Projection::default();

        if !self.config.recursive || self.upward == UpwardDirectory::ParentIsTempPath {
            match self.upward {
                UpwardDirectory::Never => {}
                UpwardDirectory::No => projection.rows.push(ProjectedRow {
                    key: RowKey::ParentDir { enabled: false },
                    depth: 0,
                }),
                UpwardDirectory::ParentIsRegularPath | UpwardDirectory::ParentIsTempPath => {
                    projection.rows.push(ProjectedRow {
                        key: RowKey::ParentDir { enabled: true },
                        depth: 0,
                    })
                }
            }
        }

        let mut diff_count = 0;
        self.visit_siblings(tree, tree.first_diff_position(), 0, &mut projection.rows, &mut diff_count);
        projection.diff_count = diff_count;

        debug!(
            "Projected {} rows ({} differences) from {} nodes",
            projection.rows.len(),
            diff_count,
            tree.len()
        );
        projection
    }

    fn is_showable(&self, tree: &DiffTree, id: NodeId) -> bool {
        let item = tree.get(id);
        if item.flags.contains(ViewFlags::HIDDEN) {
            return false;
        }
        self.config.show_hidden || item.result != ResultKind::Filtered
    }

    fn visit_siblings(
        &self,
        tree: &DiffTree,
        first: Option<NodeId>,
        depth: usize,
        rows: &mut Vec<ProjectedRow>,
        diff_count: &mut usize,
    ) {
        let tree_mode = self.tree_mode_active();
        let mut position = first;
        while let Some(id) = position {
            position = tree.next_sibling(id);
            let item = tree.get(id);

            if item.counts_as_difference() {
                *diff_count += 1;
            }

            if !self.is_showable(tree, id) {
                continue;
            }

            if tree_mode {
                rows.push(ProjectedRow {
                    key: RowKey::Node(id),
                    depth,
                });
                if item.has_children() && item.is_expanded() {
                    self.visit_siblings(tree, tree.first_child(id), depth + 1, rows, diff_count);
                }
            } else {
                if !self.config.recursive || !item.is_dir || !item.exists_all() {
                    rows.push(ProjectedRow {
                        key: RowKey::Node(id),
                        depth: 0,
                    });
                }
                if item.has_children() {
                    self.visit_siblings(tree, tree.first_child(id), depth + 1, rows, diff_count);
                }
            }
        }
    }

    /// Expand the directory shown at `row` and insert its newly visible rows.
    ///
    /// With `recursive`, every descendant directory that has children is
    /// marked expanded as well. Returns the number of inserted rows; an
    /// already expanded directory, a plain file or flat mode yield 0.
    pub fn expand(&self, tree: &mut DiffTree, projection: &mut Projection, row: usize, recursive: bool) -> usize {
        let Some(id) = projection.node_at(row) else {
            return 0;
        };
        let item = tree.get(id);
        if !self.tree_mode_active() || item.is_expanded() || !item.has_children() {
            return 0;
        }

        tree.set_flags(id, ViewFlags::EXPANDED);
        if recursive {
            let nested: Vec<NodeId> = tree
                .descendants(id)
                .filter(|&child| tree.get(child).has_children())
                .collect();
            for child in nested {
                tree.set_flags(child, ViewFlags::EXPANDED);
            }
        }

        let depth = projection.rows[row].depth;
        let mut inserted = Vec::new();
        let mut ignored = 0;
        self.visit_siblings(tree, tree.first_child(id), depth + 1, &mut inserted, &mut ignored);

        let count = inserted.len();
        projection.rows.splice(row + 1..row + 1, inserted);
        debug!("Expanded {:?}: {} rows inserted", tree.get(id).relative_path, count);
        count
    }

    /// Collapse the directory shown at `row`, removing exactly the contiguous
    /// run of rows below it that belong to its subtree. Returns the number of
    /// removed rows.
    pub fn collapse(&self, tree: &mut DiffTree, projection: &mut Projection, row: usize) -> usize {
        let Some(id) = projection.node_at(row) else {
            return 0;
        };
        let item = tree.get(id);
        if !self.tree_mode_active() || !item.is_expanded() || !item.has_children() {
            return 0;
        }

        tree.clear_flags(id, ViewFlags::EXPANDED);

        let end = projection.rows[row + 1..]
            .iter()
            .position(|candidate| match candidate.node() {
                Some(node) => !tree.is_ancestor(node, id),
                None => true,
            })
            .map_or(projection.rows.len(), |offset| row + 1 + offset);

        let removed = end - (row + 1);
        projection.rows.drain(row + 1..end);
        debug!("Collapsed {:?}: {} rows removed", tree.get(id).relative_path, removed);
        removed
    }

    /// Mark every node in the tree expanded and rebuild
    pub fn expand_all(&self, tree: &mut DiffTree) -> Projection {
        tree.set_flags_all(ViewFlags::EXPANDED);
        self.rebuild(tree)
    }

    /// Clear the expanded mark everywhere and rebuild
    pub fn collapse_all(&self, tree: &mut DiffTree) -> Projection {
        tree.clear_flags_all(ViewFlags::EXPANDED);
        self.rebuild(tree)
    }

    /// Hide the nodes of the selected rows and drop their rows, together with
    /// any rows of their descendants. Special rows are ignored. Returns the
    /// number of nodes newly hidden.
    pub fn hide_rows(&self, tree: &mut DiffTree, projection: &mut Projection, selection: &SelectionSet) -> usize {
        let hidden: Vec<NodeId> = selection
            .iter()
            .filter_map(|row| projection.node_at(row))
            .filter(|&id| !tree.get(id).is_hidden())
            .collect();
        if hidden.is_empty() {
            return 0;
        }

        for &id in &hidden {
            tree.set_flags(id, ViewFlags::HIDDEN);
        }
        projection.rows.retain(|row| match row.node() {
            Some(node) => !hidden.iter().any(|&h| tree.is_ancestor(node, h)),
            None => true,
        });

        debug!("Hid {} items", hidden.len());
        hidden.len()
    }

    /// Clear every user-hidden mark and rebuild
    pub fn show_all_hidden(&self, tree: &mut DiffTree) -> Projection {
        tree.clear_flags_all(ViewFlags::HIDDEN);
        self.rebuild(tree)
    }
}
