//! Column sorting of projected rows.
//!
//! In tree mode rows are reordered among their siblings only, so every
//! directory keeps its subtree directly below it. Flat mode sorts the whole
//! list. The parent-directory row always stays first.

use crate::diff_tree::{DiffItem, DiffTree, NodeId};
use crate::projector::{ProjectedRow, Projection};
use dirview_common::{DisplayConfig, SortColumn};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Current sort column and direction of the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<SortColumn>,
    pub ascending: bool,
}

impl SortState {
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            column: config.sort_column,
            ascending: config.sort_ascending,
        }
    }

    /// Apply a header click: the active column flips direction, a new column
    /// starts in its default direction.
    pub fn click(&mut self, column: SortColumn) {
        if self.column == Some(column) {
            self.ascending = !self.ascending;
        } else {
            self.column = Some(column);
            self.ascending = column.default_ascending();
        }
    }

    pub fn store(&self, config: &mut DisplayConfig) {
        config.sort_column = self.column;
        config.sort_ascending = self.ascending;
    }
}

/// Side index a per-side column reads from
fn column_side(column: SortColumn, side_count: usize) -> Option<usize> {
    match column {
        SortColumn::LeftDate | SortColumn::LeftSize => Some(0),
        SortColumn::MiddleDate | SortColumn::MiddleSize => Some(1),
        SortColumn::RightDate | SortColumn::RightSize => Some(side_count - 1),
        _ => None,
    }
}

/// Compare two items by a single column, ascending
pub fn compare_items(column: SortColumn, side_count: usize, a: &DiffItem, b: &DiffItem) -> Ordering {
    match column {
        SortColumn::Name => a
            .name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.name().cmp(&b.name())),
        SortColumn::Path => a
            .parent_path()
            .to_string_lossy()
            .to_lowercase()
            .cmp(&b.parent_path().to_string_lossy().to_lowercase()),
        SortColumn::Status => a.result.sort_rank().cmp(&b.result.sort_rank()),
        SortColumn::LeftDate | SortColumn::MiddleDate | SortColumn::RightDate => {
            let side = column_side(column, side_count).unwrap_or(0);
            let date = |item: &DiffItem| item.sides.get(side).and_then(|s| s.as_ref()).map(|e| e.modified);
            date(a).cmp(&date(b))
        }
        SortColumn::LeftSize | SortColumn::MiddleSize | SortColumn::RightSize => {
            let side = column_side(column, side_count).unwrap_or(0);
            let size = |item: &DiffItem| {
                item.sides
                    .get(side)
                    .and_then(|s| s.as_ref())
                    .filter(|e| !e.is_dir)
                    .map(|e| e.size)
            };
            size(a).cmp(&size(b))
        }
        SortColumn::Extension => a.extension().cmp(&b.extension()),
    }
}

/// Sort the rows of `projection` in place according to `state`.
///
/// Does nothing when no column is selected or the column does not exist for
/// the tree's side count.
pub fn sort_projection(tree: &DiffTree, projection: &mut Projection, state: SortState, tree_mode: bool) {
    let Some(column) = state.column else {
        return;
    };
    if !column.is_available(tree.side_count()) {
        warn!("Sort column {:?} is not available for a {}-way compare", column, tree.side_count());
        return;
    }

    let side_count = tree.side_count();
    let by_column = |a: NodeId, b: NodeId| {
        let ordering = compare_items(column, side_count, tree.get(a), tree.get(b));
        let ordering = if state.ascending { ordering } else { ordering.reverse() };
        ordering.then_with(|| a.cmp(&b))
    };

    let rows = projection.rows_mut();
    let split = rows.iter().take_while(|row| row.is_special()).count();
    let sortable = &mut rows[split..];

    if tree_mode {
        sortable.sort_by(|a, b| compare_in_tree(tree, a, b, &by_column));
    } else {
        sortable.sort_by(|a, b| match (a.node(), b.node()) {
            (Some(x), Some(y)) => by_column(x, y),
            _ => Ordering::Equal,
        });
    }

    debug!(
        "Sorted {} rows by {:?} ({})",
        sortable.len(),
        column,
        if state.ascending { "ascending" } else { "descending" }
    );
}

/// Chain of ancestors from the top level down to `id` inclusive
fn lineage(tree: &DiffTree, id: NodeId) -> Vec<NodeId> {
    let mut chain = vec![id];
    let mut current = tree.get(id).parent();
    while let Some(parent) = current {
        chain.push(parent);
        current = tree.get(parent).parent();
    }
    chain.reverse();
    chain
}

/// Ancestors come before their descendants; otherwise the two rows are
/// ordered by their ancestors that are siblings of each other.
fn compare_in_tree<F>(tree: &DiffTree, a: &ProjectedRow, b: &ProjectedRow, by_column: &F) -> Ordering
where
    F: Fn(NodeId, NodeId) -> Ordering,
{
    let (Some(x), Some(y)) = (a.node(), b.node()) else {
        return Ordering::Equal;
    };
    if x == y {
        return Ordering::Equal;
    }

    let left = lineage(tree, x);
    let right = lineage(tree, y);
    let common = left.iter().zip(&right).take_while(|(l, r)| l == r).count();

    match (left.get(common), right.get(common)) {
        (Some(&l), Some(&r)) => by_column(l, r),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff_tree::fixtures::*;
    use crate::diff_tree::ViewFlags;
    use crate::projector::{RowKey, UpwardDirectory, ViewProjector};
    use dirview_common::ResultKind;

    fn names(tree: &DiffTree, projection: &Projection) -> Vec<String> {
        projection
            .rows()
            .iter()
            .map(|row| match row.node() {
                Some(id) => tree.get(id).relative_path.to_string_lossy().to_string(),
                None => "..".to_string(),
            })
            .collect()
    }

    fn sample_tree() -> DiffTree {
        let mut tree = two_way();
        let zeta = tree
            .insert(None, item("zeta", true, ResultKind::Different, &[true, true]))
            .unwrap();
        tree.insert(Some(zeta), item("zeta/b.txt", false, ResultKind::Same, &[true, true]))
            .unwrap();
        tree.insert(Some(zeta), item("zeta/a.txt", false, ResultKind::Different, &[true, true]))
            .unwrap();
        tree.insert(None, item("alpha.rs", false, ResultKind::Same, &[true, true]))
            .unwrap();
        tree.insert(None, item("Mid.c", false, ResultKind::Error, &[true, false]))
            .unwrap();
        tree.set_flags(zeta, ViewFlags::EXPANDED);
        tree
    }

    #[test]
    fn test_click_toggles_and_resets() {
        let mut state = SortState::default();
        state.click(SortColumn::Name);
        assert_eq!(state.column, Some(SortColumn::Name));
        assert!(state.ascending);
        state.click(SortColumn::Name);
        assert!(!state.ascending);
        state.click(SortColumn::LeftDate);
        assert_eq!(state.column, Some(SortColumn::LeftDate));
        assert!(!state.ascending);
        state.click(SortColumn::LeftDate);
        assert!(state.ascending);

        let mut config = DisplayConfig::default();
        state.store(&mut config);
        assert_eq!(SortState::from_config(&config), state);
    }

    #[test]
    fn test_tree_mode_sort_keeps_subtrees_together() {
        let mut tree = sample_tree();
        let projector = ViewProjector::new(DisplayConfig::default());
        let mut projection = projector.rebuild(&tree);

        let state = SortState {
            column: Some(SortColumn::Name),
            ascending: true,
        };
        sort_projection(&tree, &mut projection, state, true);
        assert_eq!(
            names(&tree, &projection),
            vec!["alpha.rs", "Mid.c", "zeta", "zeta/a.txt", "zeta/b.txt"]
        );

        let descending = SortState {
            column: Some(SortColumn::Name),
            ascending: false,
        };
        sort_projection(&tree, &mut projection, descending, true);
        assert_eq!(
            names(&tree, &projection),
            vec!["zeta", "zeta/b.txt", "zeta/a.txt", "Mid.c", "alpha.rs"]
        );

        // collapse still finds the contiguous block after sorting
        let removed = projector.collapse(&mut tree, &mut projection, 0);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_flat_sort_and_pinned_parent_row() {
        let tree = sample_tree();
        let config = DisplayConfig {
            tree_mode: false,
            recursive: false,
            ..DisplayConfig::default()
        };
        let mut projection = ViewProjector::new(config)
            .with_upward(UpwardDirectory::ParentIsRegularPath)
            .rebuild(&tree);

        let state = SortState {
            column: Some(SortColumn::Status),
            ascending: true,
        };
        sort_projection(&tree, &mut projection, state, false);
        assert_eq!(projection.rows()[0].key, RowKey::ParentDir { enabled: true });
        // zeta keeps its files inlined right after it
        assert_eq!(
            names(&tree, &projection),
            vec!["..", "Mid.c", "zeta", "zeta/a.txt", "zeta/b.txt", "alpha.rs"]
        );
    }

    #[test]
    fn test_missing_side_sorts_first_by_size() {
        let tree = sample_tree();
        let mid = tree.find(std::path::Path::new("Mid.c")).unwrap();
        let alpha = tree.find(std::path::Path::new("alpha.rs")).unwrap();
        assert_eq!(
            compare_items(SortColumn::RightSize, 2, tree.get(mid), tree.get(alpha)),
            Ordering::Less
        );
        assert_eq!(
            compare_items(SortColumn::LeftSize, 2, tree.get(mid), tree.get(alpha)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_unavailable_column_leaves_rows() {
        let tree = sample_tree();
        let mut projection = ViewProjector::new(DisplayConfig::default()).rebuild(&tree);
        let before = projection.clone();
        let state = SortState {
            column: Some(SortColumn::MiddleDate),
            ascending: true,
        };
        sort_projection(&tree, &mut projection, state, true);
        assert_eq!(projection, before);
    }
}
