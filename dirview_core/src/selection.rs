//! Selection-driven command eligibility for the folder view.
//!
//! Everything here is a pure query over the tree, the current projection and
//! the selected rows. Nothing mutates the tree.

use crate::diff_tree::{DiffItem, DiffTree};
use crate::projector::{Projection, RowKey};
use dirview_common::{side_name, ResultKind};
use std::collections::BTreeSet;
use tracing::debug;

/// Selected rows of the current projection plus the focused row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    rows: BTreeSet<usize>,
    focus: Option<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `rows`, focusing the first of them
    pub fn from_rows(rows: impl IntoIterator<Item = usize>) -> Self {
        let rows: BTreeSet<usize> = rows.into_iter().collect();
        let focus = rows.iter().next().copied();
        Self { rows, focus }
    }

    /// Selected row indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    pub fn insert(&mut self, row: usize) {
        self.rows.insert(row);
    }

    pub fn remove(&mut self, row: usize) {
        self.rows.remove(&row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.focus = None;
    }

    pub fn select_only(&mut self, row: usize) {
        self.rows.clear();
        self.rows.insert(row);
        self.focus = Some(row);
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn set_focus(&mut self, row: Option<usize>) {
        self.focus = row;
    }

    /// Move the focus to `row`. A single (or empty) selection travels with
    /// the focus; a multi-row selection is left alone.
    pub fn move_focus(&mut self, row: usize) {
        if self.rows.len() <= 1 {
            self.rows.clear();
            self.rows.insert(row);
        }
        self.focus = Some(row);
    }

    /// The items behind the selected rows, so the selection can follow them
    /// when rows are inserted, removed or reordered
    pub fn anchor(&self, projection: &Projection) -> SelectionAnchor {
        let key_at = |row: usize| projection.get(row).map(|r| r.key);
        SelectionAnchor {
            keys: self.rows.iter().filter_map(|&row| key_at(row)).collect(),
            focus: self.focus.and_then(key_at),
        }
    }
}

/// Selection recorded by row identity rather than row index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionAnchor {
    keys: Vec<RowKey>,
    focus: Option<RowKey>,
}

impl SelectionAnchor {
    /// Map the recorded rows onto `projection`; rows that are gone drop out
    pub fn resolve(&self, projection: &Projection) -> SelectionSet {
        SelectionSet {
            rows: self
                .keys
                .iter()
                .filter_map(|&key| projection.position_of(key))
                .collect(),
            focus: self.focus.and_then(|key| projection.position_of(key)),
        }
    }
}

/// There is content on another side that can be copied onto `side`
pub fn copyable_to(item: &DiffItem, side: usize) -> bool {
    let has_source = (0..item.side_count()).any(|other| other != side && item.exists(other));
    has_source && !matches!(item.result, ResultKind::Error | ResultKind::Aborted)
}

/// The entry on `side` can be copied somewhere else
pub fn copyable_from(item: &DiffItem, side: usize) -> bool {
    item.exists(side) && !matches!(item.result, ResultKind::Error | ResultKind::Aborted)
}

pub fn deletable_on(item: &DiffItem, side: usize) -> bool {
    item.exists(side)
}

/// Present on every side so that deleting "all" removes something everywhere
pub fn deletable_all(item: &DiffItem) -> bool {
    item.exists_all() && !item.is_error()
}

pub fn deletable_any(item: &DiffItem, read_only: &[bool]) -> bool {
    (0..item.side_count()).any(|side| !read_only.get(side).copied().unwrap_or(false) && deletable_on(item, side))
}

pub fn movable_from(item: &DiffItem, side: usize) -> bool {
    copyable_from(item, side) && deletable_on(item, side)
}

pub fn openable_on(item: &DiffItem, side: usize) -> bool {
    item.exists(side) && !item.is_filtered()
}

/// Can be opened in a compare window; directories only when present on
/// every side
pub fn openable(item: &DiffItem) -> bool {
    if item.is_error() {
        return false;
    }
    !item.is_dir || item.exists_all()
}

/// Counts for "Copy filenames"; folders have no content to name
pub fn copyable_name(item: &DiffItem) -> bool {
    !item.is_dir
}

/// Stops "next/previous difference" navigation
pub fn navigable_diff(item: &DiffItem) -> bool {
    if item.is_filtered() || item.is_error() {
        return false;
    }
    item.is_result_diff() || item.exists_count() == 1
}

/// Commands whose availability depends on the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Copy the other side's version onto this side
    CopyTo(usize),
    /// Copy this side's version to a folder of the user's choice
    CopyFrom(usize),
    /// Move this side's version to a folder of the user's choice
    MoveFrom(usize),
    DeleteOn(usize),
    /// Delete the entry on every side
    DeleteAll,
    /// Delete on whichever writable sides hold the entry
    DeleteAny,
    /// Open this side's version with an external program
    Open(usize),
    /// Open the selected entries in a compare window
    Compare,
    CopyFilenames,
    Rename,
}

impl Operation {
    pub fn verb(&self, side_count: usize) -> String {
        match *self {
            Operation::CopyTo(side) => format!("Copy to {}", side_name(side, side_count)),
            Operation::CopyFrom(side) => format!("Copy {} to...", side_name(side, side_count)),
            Operation::MoveFrom(side) => format!("Move {} to...", side_name(side, side_count)),
            Operation::DeleteOn(side) => format!("Delete {}", side_name(side, side_count)),
            Operation::DeleteAll => "Delete All".to_string(),
            Operation::DeleteAny => "Delete".to_string(),
            Operation::Open(side) => format!("Open {}", side_name(side, side_count)),
            Operation::Compare => "Compare".to_string(),
            Operation::CopyFilenames => "Copy Filenames".to_string(),
            Operation::Rename => "Rename".to_string(),
        }
    }

    /// Operations for a compare with `side_count` sides, in menu order
    pub fn all(side_count: usize) -> Vec<Operation> {
        let mut ops = vec![Operation::Compare];
        for side in 0..side_count {
            ops.push(Operation::CopyTo(side));
        }
        for side in 0..side_count {
            ops.push(Operation::CopyFrom(side));
            ops.push(Operation::MoveFrom(side));
        }
        for side in 0..side_count {
            ops.push(Operation::DeleteOn(side));
        }
        ops.push(Operation::DeleteAll);
        ops.push(Operation::DeleteAny);
        for side in 0..side_count {
            ops.push(Operation::Open(side));
        }
        ops.push(Operation::CopyFilenames);
        ops.push(Operation::Rename);
        ops
    }
}

/// Result of running a predicate over a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub eligible: usize,
    /// Selected rows that are real entries
    pub total: usize,
}

impl Classification {
    pub fn is_enabled(&self) -> bool {
        self.eligible > 0
    }

    /// "Verb (3)" when every row qualifies, "Verb (2 of 3)" otherwise
    pub fn label(&self, verb: &str) -> String {
        if self.eligible == self.total {
            format!("{} ({})", verb, self.eligible)
        } else {
            format!("{} ({} of {})", verb, self.eligible, self.total)
        }
    }
}

/// Enablement and menu text of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandState {
    pub operation: Operation,
    pub enabled: bool,
    pub label: String,
    pub classification: Classification,
}

/// Run `predicate` over every non-special selected row
pub fn classify<F>(tree: &DiffTree, projection: &Projection, selection: &SelectionSet, predicate: F) -> Classification
where
    F: Fn(&DiffItem) -> bool,
{
    let mut classification = Classification::default();
    for id in selection.iter().filter_map(|row| projection.node_at(row)) {
        classification.total += 1;
        if predicate(tree.get(id)) {
            classification.eligible += 1;
        }
    }
    classification
}

/// Decides which commands apply to a selection.
///
/// The only state is which sides are read-only; every query is otherwise a
/// pure function of its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    read_only: Vec<bool>,
}

impl SelectionPolicy {
    pub fn new(side_count: usize) -> Self {
        Self {
            read_only: vec![false; side_count],
        }
    }

    pub fn with_read_only(mut self, side: usize, read_only: bool) -> Self {
        self.set_read_only(side, read_only);
        self
    }

    pub fn set_read_only(&mut self, side: usize, read_only: bool) {
        if let Some(flag) = self.read_only.get_mut(side) {
            *flag = read_only;
        }
    }

    pub fn is_read_only(&self, side: usize) -> bool {
        self.read_only.get(side).copied().unwrap_or(false)
    }

    pub fn side_count(&self) -> usize {
        self.read_only.len()
    }

    /// True when a read-only side rules out the whole operation
    fn blocked_by_read_only(&self, operation: Operation) -> bool {
        match operation {
            Operation::CopyTo(side) | Operation::MoveFrom(side) | Operation::DeleteOn(side) => {
                self.is_read_only(side)
            }
            Operation::DeleteAll => self.read_only.iter().any(|&ro| ro),
            Operation::DeleteAny => self.read_only.iter().all(|&ro| ro),
            Operation::CopyFrom(_)
            | Operation::Open(_)
            | Operation::Compare
            | Operation::CopyFilenames
            | Operation::Rename => false,
        }
    }

    /// Count the selected rows `operation` applies to
    pub fn classify(
        &self,
        tree: &DiffTree,
        projection: &Projection,
        selection: &SelectionSet,
        operation: Operation,
    ) -> Classification {
        if self.blocked_by_read_only(operation) {
            let total = classify(tree, projection, selection, |_| false).total;
            return Classification { eligible: 0, total };
        }

        match operation {
            Operation::CopyTo(side) => classify(tree, projection, selection, |item| copyable_to(item, side)),
            Operation::CopyFrom(side) => classify(tree, projection, selection, |item| copyable_from(item, side)),
            Operation::MoveFrom(side) => classify(tree, projection, selection, |item| movable_from(item, side)),
            Operation::DeleteOn(side) => classify(tree, projection, selection, |item| deletable_on(item, side)),
            Operation::DeleteAll => classify(tree, projection, selection, deletable_all),
            Operation::DeleteAny => {
                classify(tree, projection, selection, |item| deletable_any(item, &self.read_only))
            }
            Operation::Open(side) => classify(tree, projection, selection, |item| openable_on(item, side)),
            Operation::Compare => classify(tree, projection, selection, openable),
            Operation::CopyFilenames => classify(tree, projection, selection, copyable_name),
            Operation::Rename => {
                let total = classify(tree, projection, selection, |_| false).total;
                let single = total == 1 && selection.len() == 1;
                Classification {
                    eligible: usize::from(single),
                    total,
                }
            }
        }
    }

    pub fn command_state(
        &self,
        tree: &DiffTree,
        projection: &Projection,
        selection: &SelectionSet,
        operation: Operation,
    ) -> CommandState {
        let classification = self.classify(tree, projection, selection, operation);
        let verb = operation.verb(tree.side_count());
        let label = match operation {
            Operation::Rename | Operation::Compare => verb,
            _ => classification.label(&verb),
        };
        let state = CommandState {
            operation,
            enabled: classification.is_enabled(),
            label,
            classification,
        };
        debug!(
            "{:?}: {} of {} eligible, enabled={}",
            operation, classification.eligible, classification.total, state.enabled
        );
        state
    }

    pub fn command_states(&self, tree: &DiffTree, projection: &Projection, selection: &SelectionSet) -> Vec<CommandState> {
        Operation::all(tree.side_count())
            .into_iter()
            .map(|operation| self.command_state(tree, projection, selection, operation))
            .collect()
    }
}

fn is_navigable_row(tree: &DiffTree, projection: &Projection, row: usize) -> bool {
    projection
        .node_at(row)
        .map_or(false, |id| navigable_diff(tree.get(id)))
}

pub fn first_diff_row(tree: &DiffTree, projection: &Projection) -> Option<usize> {
    (0..projection.len()).find(|&row| is_navigable_row(tree, projection, row))
}

pub fn last_diff_row(tree: &DiffTree, projection: &Projection) -> Option<usize> {
    (0..projection.len()).rev().find(|&row| is_navigable_row(tree, projection, row))
}

/// First difference after `from`, or the first one when nothing is focused
pub fn next_diff_row(tree: &DiffTree, projection: &Projection, from: Option<usize>) -> Option<usize> {
    let start = from.map_or(0, |row| row + 1);
    (start..projection.len()).find(|&row| is_navigable_row(tree, projection, row))
}

/// Last difference before `from`, or the last one when nothing is focused
pub fn prev_diff_row(tree: &DiffTree, projection: &Projection, from: Option<usize>) -> Option<usize> {
    let end = from.unwrap_or(projection.len()).min(projection.len());
    (0..end).rev().find(|&row| is_navigable_row(tree, projection, row))
}

/// Status bar text: "Items: n" without focus, "Item i of n" on a real row.
/// The parent-directory row is not counted.
pub fn status_text(projection: &Projection, focus: Option<usize>) -> String {
    let count = projection.len() - projection.special_count();
    match focus.and_then(|row| projection.get(row).map(|r| (row, r))) {
        None => format!("Items: {}", count),
        Some((_, row)) if row.is_special() => String::new(),
        Some((index, _)) => {
            let specials_before = projection.rows()[..index]
                .iter()
                .filter(|row| row.is_special())
                .count();
            format!("Item {} of {}", index - specials_before + 1, count)
        }
    }
}
