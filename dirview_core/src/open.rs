//! Resolution of the selected rows into the paths of a compare to open.
//!
//! One row opens that entry across its own sides. Two or three rows are
//! paired so that every side of the new compare gets a path from an entry
//! that actually exists there.

use crate::diff_tree::{DiffItem, DiffTree, NodeId};
use crate::projector::{Projection, RowKey};
use crate::selection::SelectionSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Filesystem query used to catch stale compare results
pub trait PathProbe {
    fn is_existing_dir(&self, path: &Path) -> bool;
}

/// How two selected rows of a 2-way compare are paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionType {
    /// Pick the pairing from where the entries exist
    #[default]
    Normal,
    /// Left side of the first row against the left side of the second
    Left1Left2,
    Right1Right2,
    Left1Right2,
    Left2Right1,
}

impl SelectionType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(SelectionType::Normal),
            "left1left2" => Some(SelectionType::Left1Left2),
            "right1right2" => Some(SelectionType::Right1Right2),
            "left1right2" => Some(SelectionType::Left1Right2),
            "left2right1" => Some(SelectionType::Left2Right1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// The selection has no valid pairing; the command does nothing
    #[error("The selected items cannot be opened together")]
    NotApplicable,

    /// A folder from the compare result is gone; the compare must be rerun
    #[error("Folder no longer exists: {}. Refresh the compare.", .0.display())]
    StaleCompare(PathBuf),
}

/// Paths to open, one per side of the new compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOpen {
    /// Empty when the entry is missing on that side
    pub paths: Vec<PathBuf>,
    /// Entry supplying each side
    pub nodes: Vec<NodeId>,
    pub is_dir: bool,
    /// Caption for sides without a file, e.g. "Untitled right"
    pub descriptions: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTarget {
    /// The ".." row: navigate to the parent folders
    ParentDirectory,
    Compare(ResolvedOpen),
}

/// Which entry and which of its sides fills one slot of the new compare
type Slot = (NodeId, usize);

fn slot_name(slot: usize, slot_count: usize) -> &'static str {
    if slot == 0 {
        "left"
    } else if slot + 1 == slot_count {
        "right"
    } else {
        "middle"
    }
}

/// Existing on sides 0 and 1 of a 2-way compare
fn on_both(item: &DiffItem) -> bool {
    item.exists(0) && item.exists(1)
}

fn pair_two(a: NodeId, b: NodeId, tree: &DiffTree, selection_type: SelectionType) -> Option<[Slot; 2]> {
    let (da, db) = (tree.get(a), tree.get(b));
    match selection_type {
        SelectionType::Normal => {
            let openable = (da.is_side_only(0) && (db.is_side_only(1) || on_both(db)))
                || (da.is_side_only(1) && (db.is_side_only(0) || on_both(db)))
                || (on_both(da) && (db.is_side_only(0) || db.is_side_only(1)));
            if !openable {
                return None;
            }
            let swap = da.is_side_only(1) || (on_both(da) && db.is_side_only(0));
            let (left, right) = if swap { (b, a) } else { (a, b) };
            Some([(left, 0), (right, 1)])
        }
        SelectionType::Left1Left2 => (da.exists(0) && db.exists(0)).then_some([(a, 0), (b, 0)]),
        SelectionType::Right1Right2 => (da.exists(1) && db.exists(1)).then_some([(a, 1), (b, 1)]),
        SelectionType::Left1Right2 => (da.exists(0) && db.exists(1)).then_some([(a, 0), (b, 1)]),
        SelectionType::Left2Right1 => (da.exists(1) && db.exists(0)).then_some([(b, 0), (a, 1)]),
    }
}

/// Two rows of a 3-way compare: one row covers two sides, the other the
/// third. The row covering two sides is used twice.
fn pair_two_of_three(a: NodeId, b: NodeId, tree: &DiffTree) -> Option<[NodeId; 3]> {
    let (da, db) = (tree.get(a), tree.get(b));
    let on = |item: &DiffItem, x: usize, y: usize| item.exists(x) && item.exists(y);

    if on(da, 0, 1) && db.exists(2) {
        Some([a, a, b])
    } else if on(da, 0, 2) && db.exists(1) {
        Some([a, b, a])
    } else if on(da, 1, 2) && db.exists(0) {
        Some([b, a, a])
    } else if on(db, 0, 1) && da.exists(2) {
        Some([b, b, a])
    } else if on(db, 0, 2) && da.exists(1) {
        Some([b, a, b])
    } else if on(db, 1, 2) && da.exists(0) {
        Some([a, b, b])
    } else {
        None
    }
}

/// Orders in which three rows are tried against the left, middle and right
/// slots.
const THREE_ROW_ORDERS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

fn pair_three(rows: [NodeId; 3], tree: &DiffTree) -> Option<[NodeId; 3]> {
    THREE_ROW_ORDERS.iter().find_map(|order| {
        let assigned = [rows[order[0]], rows[order[1]], rows[order[2]]];
        assigned
            .iter()
            .enumerate()
            .all(|(slot, &id)| tree.get(id).exists(slot))
            .then_some(assigned)
    })
}

fn same_kind(tree: &DiffTree, nodes: &[NodeId]) -> Option<bool> {
    let is_dir = tree.get(*nodes.first()?).is_dir;
    nodes
        .iter()
        .all(|&id| tree.get(id).is_dir == is_dir)
        .then_some(is_dir)
}

/// Compute which entry fills which side without touching the filesystem.
///
/// `Ok(None)` stands for the parent-directory row.
fn resolve_slots(
    tree: &DiffTree,
    projection: &Projection,
    selection: &SelectionSet,
    selection_type: SelectionType,
) -> Result<Option<Vec<Slot>>, OpenError> {
    let rows: Vec<usize> = selection.iter().collect();
    if rows.is_empty() || rows.len() > 3 {
        return Err(OpenError::NotApplicable);
    }

    let mut nodes = Vec::with_capacity(rows.len());
    for &row in &rows {
        match projection.get(row).map(|r| r.key) {
            Some(RowKey::Node(id)) => nodes.push(id),
            Some(RowKey::ParentDir { enabled }) if rows.len() == 1 && enabled => return Ok(None),
            _ => return Err(OpenError::NotApplicable),
        }
    }

    let side_count = tree.side_count();
    if same_kind(tree, &nodes).is_none() {
        return Err(OpenError::NotApplicable);
    }

    let slots: Vec<Slot> = match (nodes.as_slice(), side_count) {
        (&[id], _) => {
            let item = tree.get(id);
            if item.is_error() || (item.is_dir && !item.exists_all()) {
                return Err(OpenError::NotApplicable);
            }
            (0..side_count).map(|side| (id, side)).collect()
        }
        (&[a, b], 2) => pair_two(a, b, tree, selection_type)
            .ok_or(OpenError::NotApplicable)?
            .to_vec(),
        (&[a, b], 3) => pair_two_of_three(a, b, tree)
            .ok_or(OpenError::NotApplicable)?
            .iter()
            .enumerate()
            .map(|(slot, &id)| (id, slot))
            .collect(),
        (&[a, b, c], 3) => pair_three([a, b, c], tree)
            .ok_or(OpenError::NotApplicable)?
            .iter()
            .enumerate()
            .map(|(slot, &id)| (id, slot))
            .collect(),
        _ => return Err(OpenError::NotApplicable),
    };

    Ok(Some(slots))
}

/// Whether the selection forms a valid compare to open
pub fn are_items_openable(
    tree: &DiffTree,
    projection: &Projection,
    selection: &SelectionSet,
    selection_type: SelectionType,
) -> bool {
    resolve_slots(tree, projection, selection, selection_type).is_ok()
}

/// Resolve the selection into the paths of a compare to open.
///
/// Folder results are checked against the filesystem: a folder that no longer
/// exists yields [`OpenError::StaleCompare`].
pub fn resolve_open(
    tree: &DiffTree,
    projection: &Projection,
    selection: &SelectionSet,
    selection_type: SelectionType,
    probe: &dyn PathProbe,
) -> Result<OpenTarget, OpenError> {
    let Some(slots) = resolve_slots(tree, projection, selection, selection_type)? else {
        return Ok(OpenTarget::ParentDirectory);
    };

    let slot_count = slots.len();
    let is_dir = tree.get(slots[0].0).is_dir;
    let single = slots.iter().all(|&(id, _)| id == slots[0].0);

    let mut paths = Vec::with_capacity(slot_count);
    let mut descriptions = Vec::with_capacity(slot_count);
    for (slot, &(id, side)) in slots.iter().enumerate() {
        if single && !is_dir && !tree.get(id).exists(side) {
            paths.push(PathBuf::new());
            descriptions.push(Some(format!("Untitled {}", slot_name(slot, slot_count))));
        } else {
            paths.push(tree.item_path(id, side));
            descriptions.push(None);
        }
    }

    if is_dir {
        if let Some(missing) = paths.iter().find(|path| !probe.is_existing_dir(path)) {
            warn!("Stale compare result, folder is gone: {}", missing.display());
            return Err(OpenError::StaleCompare(missing.clone()));
        }
    }

    debug!("Resolved open of {} rows into {:?}", selection.len(), paths);
    Ok(OpenTarget::Compare(ResolvedOpen {
        paths,
        nodes: slots.iter().map(|&(id, _)| id).collect(),
        is_dir,
        descriptions,
    }))
}
