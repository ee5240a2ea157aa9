//! Folder view controller.
//!
//! [`DirView`] owns a compare result together with everything the view
//! derives from it and keeps a [`PresentationAdapter`] informed. Front ends
//! implement the adapter; the controller never depends on a UI toolkit.

use crate::diff_tree::{DiffTree, TreeState};
use crate::open::{are_items_openable, resolve_open, OpenError, OpenTarget, PathProbe, SelectionType};
use crate::projector::{ProjectedRow, Projection, UpwardDirectory, ViewProjector};
use crate::selection::{
    first_diff_row, last_diff_row, next_diff_row, prev_diff_row, status_text, CommandState, SelectionPolicy,
    SelectionAnchor, SelectionSet,
};
use crate::sort::{sort_projection, SortState};
use dirview_common::{DisplayConfig, SortColumn};
use std::path::PathBuf;
use tracing::{debug, info};

/// Receives everything the folder view wants to show
pub trait PresentationAdapter {
    /// The full row sequence changed
    fn render_rows(&mut self, tree: &DiffTree, rows: &[ProjectedRow]);

    /// Selection or focus changed; `status` is the status bar text
    fn on_selection_changed(&mut self, selection: &SelectionSet, status: &str);

    /// A row was opened
    fn on_activate(&mut self, row: usize, target: &OpenTarget);
}

/// Difference navigation commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffNavigation {
    First,
    Last,
    Next,
    Previous,
}

pub struct DirView<A: PresentationAdapter> {
    tree: DiffTree,
    projector: ViewProjector,
    projection: Projection,
    selection: SelectionSet,
    sort: SortState,
    policy: SelectionPolicy,
    parent_paths: Vec<PathBuf>,
    adapter: A,
}

impl<A: PresentationAdapter> DirView<A> {
    pub fn new(tree: DiffTree, config: DisplayConfig, adapter: A) -> Self {
        let (upward, parent_paths) = UpwardDirectory::resolve(tree.side_roots());
        let policy = SelectionPolicy::new(tree.side_count());
        let mut view = Self {
            tree,
            projector: ViewProjector::new(config).with_upward(upward),
            projection: Projection::default(),
            selection: SelectionSet::new(),
            sort: SortState::from_config(&config),
            policy,
            parent_paths,
            adapter,
        };
        view.redisplay();
        view
    }

    /// Override the upward navigation answer, e.g. for compares inside a
    /// temporary extraction folder
    pub fn set_upward(&mut self, upward: UpwardDirectory) {
        self.projector.set_upward(upward);
        self.redisplay();
    }

    /// Take a freshly completed compare, keeping the expand state of folders
    /// that still exist
    pub fn on_compare_completed(&mut self, mut tree: DiffTree) {
        let state: TreeState = self.tree.save_tree_state();
        tree.restore_tree_state(&state);

        if tree.side_roots() != self.tree.side_roots() {
            let (upward, parents) = UpwardDirectory::resolve(tree.side_roots());
            self.projector.set_upward(upward);
            self.parent_paths = parents;
        }
        if tree.side_count() != self.tree.side_count() {
            self.policy = SelectionPolicy::new(tree.side_count());
        }

        self.tree = tree;
        info!("Compare completed with {} items", self.tree.len());
        self.redisplay();
    }

    /// Rebuild all rows from the tree
    pub fn redisplay(&mut self) {
        self.projection = self.projector.rebuild(&self.tree);
        self.apply_sort();
        self.selection.clear();
        self.adapter.render_rows(&self.tree, self.projection.rows());
        self.notify_selection();
    }

    fn apply_sort(&mut self) {
        sort_projection(
            &self.tree,
            &mut self.projection,
            self.sort,
            self.projector.tree_mode_active(),
        );
    }

    fn notify_selection(&mut self) {
        let status = status_text(&self.projection, self.selection.focus());
        self.adapter.on_selection_changed(&self.selection, &status);
    }

    /// Rows moved; reselect the items that were selected before
    fn rows_changed(&mut self, anchor: SelectionAnchor) {
        self.selection = anchor.resolve(&self.projection);
        self.adapter.render_rows(&self.tree, self.projection.rows());
        self.notify_selection();
    }

    pub fn tree(&self) -> &DiffTree {
        &self.tree
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn parent_paths(&self) -> &[PathBuf] {
        &self.parent_paths
    }

    /// Current display options including the sort state
    pub fn display_config(&self) -> DisplayConfig {
        let mut config = *self.projector.config();
        self.sort.store(&mut config);
        config
    }

    pub fn diff_count(&self) -> usize {
        self.projection.diff_count()
    }

    pub fn hidden_count(&self) -> usize {
        self.tree.hidden_count()
    }

    pub fn status_text(&self) -> String {
        status_text(&self.projection, self.selection.focus())
    }

    pub fn set_read_only(&mut self, side: usize, read_only: bool) {
        self.policy.set_read_only(side, read_only);
    }

    pub fn set_tree_mode(&mut self, tree_mode: bool) {
        let mut config = *self.projector.config();
        config.tree_mode = tree_mode;
        self.projector.set_config(config);
        self.redisplay();
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        let mut config = *self.projector.config();
        config.show_hidden = show_hidden;
        self.projector.set_config(config);
        self.redisplay();
    }

    /// Expand the folder at `row`; selected items keep their selection
    pub fn expand(&mut self, row: usize, recursive: bool) -> usize {
        let anchor = self.selection.anchor(&self.projection);
        let inserted = self.projector.expand(&mut self.tree, &mut self.projection, row, recursive);
        if inserted > 0 {
            self.apply_sort();
            self.rows_changed(anchor);
        }
        inserted
    }

    pub fn collapse(&mut self, row: usize) -> usize {
        let anchor = self.selection.anchor(&self.projection);
        let removed = self.projector.collapse(&mut self.tree, &mut self.projection, row);
        if removed > 0 {
            self.rows_changed(anchor);
        }
        removed
    }

    pub fn expand_all(&mut self) {
        self.projection = self.projector.expand_all(&mut self.tree);
        self.apply_sort();
        self.rows_changed(SelectionAnchor::default());
    }

    pub fn collapse_all(&mut self) {
        self.projection = self.projector.collapse_all(&mut self.tree);
        self.apply_sort();
        self.rows_changed(SelectionAnchor::default());
    }

    /// Hide the selected rows; returns how many items were hidden
    pub fn hide_selected(&mut self) -> usize {
        let hidden = self
            .projector
            .hide_rows(&mut self.tree, &mut self.projection, &self.selection);
        if hidden > 0 {
            self.rows_changed(SelectionAnchor::default());
        }
        hidden
    }

    pub fn show_hidden_items(&mut self) {
        self.projection = self.projector.show_all_hidden(&mut self.tree);
        self.apply_sort();
        self.rows_changed(SelectionAnchor::default());
    }

    /// Header click on `column`
    pub fn sort_by(&mut self, column: SortColumn) {
        let anchor = self.selection.anchor(&self.projection);
        self.sort.click(column);
        self.apply_sort();
        self.rows_changed(anchor);
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn select(&mut self, rows: impl IntoIterator<Item = usize>) {
        let count = self.projection.len();
        self.selection = SelectionSet::from_rows(rows.into_iter().filter(|&row| row < count));
        self.notify_selection();
    }

    /// Move to a difference; returns the row moved to
    pub fn go_to_diff(&mut self, navigation: DiffNavigation) -> Option<usize> {
        let focus = self.selection.focus();
        let target = match navigation {
            DiffNavigation::First => first_diff_row(&self.tree, &self.projection),
            DiffNavigation::Last => last_diff_row(&self.tree, &self.projection),
            DiffNavigation::Next => next_diff_row(&self.tree, &self.projection, focus),
            DiffNavigation::Previous => prev_diff_row(&self.tree, &self.projection, focus),
        }?;
        self.selection.move_focus(target);
        self.notify_selection();
        Some(target)
    }

    pub fn command_states(&self) -> Vec<CommandState> {
        self.policy
            .command_states(&self.tree, &self.projection, &self.selection)
    }

    pub fn can_open(&self, selection_type: SelectionType) -> bool {
        are_items_openable(&self.tree, &self.projection, &self.selection, selection_type)
    }

    /// Open the current selection
    pub fn open_selection(
        &mut self,
        selection_type: SelectionType,
        probe: &dyn PathProbe,
    ) -> Result<OpenTarget, OpenError> {
        let target = resolve_open(&self.tree, &self.projection, &self.selection, selection_type, probe)?;
        let row = self
            .selection
            .focus()
            .or_else(|| self.selection.iter().next())
            .unwrap_or(0);
        debug!("Opening selection at row {}", row);
        self.adapter.on_activate(row, &target);
        Ok(target)
    }

    /// Activate a single row: folders toggle in tree mode, anything else opens.
    ///
    /// Returns `Ok(None)` when the row only expanded or collapsed.
    pub fn activate(&mut self, row: usize, probe: &dyn PathProbe) -> Result<Option<OpenTarget>, OpenError> {
        let toggles = self.projector.tree_mode_active()
            && self
                .projection
                .node_at(row)
                .map_or(false, |id| self.tree.get(id).is_dir);
        if toggles {
            let is_expanded = self
                .projection
                .node_at(row)
                .map_or(false, |id| self.tree.get(id).is_expanded());
            if is_expanded {
                self.collapse(row);
            } else {
                self.expand(row, false);
            }
            return Ok(None);
        }

        self.selection.select_only(row);
        self.notify_selection();
        self.open_selection(SelectionType::Normal, probe).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff_tree::fixtures::*;
    use crate::projector::RowKey;
    use crate::selection::Operation;
    use dirview_common::ResultKind;
    use std::path::Path;

    #[derive(Default)]
    struct Recorder {
        renders: usize,
        last_rows: Vec<ProjectedRow>,
        last_status: String,
        activations: Vec<(usize, OpenTarget)>,
    }

    impl PresentationAdapter for Recorder {
        fn render_rows(&mut self, _tree: &DiffTree, rows: &[ProjectedRow]) {
            self.renders += 1;
            self.last_rows = rows.to_vec();
        }

        fn on_selection_changed(&mut self, _selection: &SelectionSet, status: &str) {
            self.last_status = status.to_string();
        }

        fn on_activate(&mut self, row: usize, target: &OpenTarget) {
            self.activations.push((row, target.clone()));
        }
    }

    struct AllDirs;

    impl PathProbe for AllDirs {
        fn is_existing_dir(&self, _path: &Path) -> bool {
            true
        }
    }

    fn view() -> DirView<Recorder> {
        let (tree, ..) = scenario_tree();
        DirView::new(tree, DisplayConfig::default(), Recorder::default())
    }

    #[test]
    fn test_initial_render() {
        let view = view();
        assert_eq!(view.adapter().renders, 1);
        assert_eq!(view.adapter().last_rows.len(), 2);
        assert_eq!(view.adapter().last_status, "Items: 2");
        assert_eq!(view.diff_count(), 2);
    }

    #[test]
    fn test_activate_folder_toggles() {
        let mut view = view();
        assert_eq!(view.activate(0, &AllDirs), Ok(None));
        assert_eq!(view.projection().len(), 4);
        assert_eq!(view.adapter().last_rows.len(), 4);

        assert_eq!(view.activate(0, &AllDirs), Ok(None));
        assert_eq!(view.projection().len(), 2);
    }

    #[test]
    fn test_activate_file_opens() {
        let mut view = view();
        view.expand(0, false);
        let target = view.activate(2, &AllDirs).unwrap().unwrap();
        let OpenTarget::Compare(resolved) = target else {
            panic!("expected compare")
        };
        assert_eq!(
            resolved.paths,
            vec![PathBuf::from("/left/A/a2"), PathBuf::from("/right/A/a2")]
        );
        assert_eq!(view.adapter().activations.len(), 1);
        assert_eq!(view.adapter().activations[0].0, 2);
        assert_eq!(view.status_text(), "Item 3 of 4");
    }

    #[test]
    fn test_rescan_keeps_expand_state() {
        let mut view = view();
        view.expand(0, false);
        let (fresh, ..) = scenario_tree();
        view.on_compare_completed(fresh);
        assert_eq!(view.projection().len(), 4);
    }

    #[test]
    fn test_hide_and_show() {
        let mut view = view();
        view.select([1]);
        assert_eq!(view.hide_selected(), 1);
        assert_eq!(view.hidden_count(), 1);
        assert_eq!(view.projection().len(), 1);
        view.show_hidden_items();
        assert_eq!(view.hidden_count(), 0);
        assert_eq!(view.projection().len(), 2);
    }

    #[test]
    fn test_sort_and_remembered_config() {
        let mut tree = two_way();
        tree.insert(None, item("b.txt", false, ResultKind::Same, &[true, true]))
            .unwrap();
        tree.insert(None, item("a.txt", false, ResultKind::Different, &[true, true]))
            .unwrap();
        let mut view = DirView::new(tree, DisplayConfig::default(), Recorder::default());

        view.sort_by(SortColumn::Name);
        let first = view.projection().node_at(0).unwrap();
        assert_eq!(view.tree().get(first).name(), "a.txt");

        view.sort_by(SortColumn::Name);
        let first = view.projection().node_at(0).unwrap();
        assert_eq!(view.tree().get(first).name(), "b.txt");

        let config = view.display_config();
        assert_eq!(config.sort_column, Some(SortColumn::Name));
        assert!(!config.sort_ascending);
    }

    #[test]
    fn test_selection_follows_item_across_expand() {
        let (tree, _, a1, _, b) = scenario_tree();
        let mut view = DirView::new(tree, DisplayConfig::default(), Recorder::default());
        view.select([1]);
        assert_eq!(view.expand(0, false), 2);
        assert_eq!(view.selection().iter().collect::<Vec<_>>(), vec![3]);
        assert_eq!(view.selection().focus(), Some(3));
        assert_eq!(view.status_text(), "Item 4 of 4");

        assert_eq!(view.hide_selected(), 1);
        assert!(view.tree().get(b).is_hidden());
        assert!(!view.tree().get(a1).is_hidden());
    }

    #[test]
    fn test_selection_follows_item_across_sort() {
        let mut tree = two_way();
        let b = tree
            .insert(None, item("b.txt", false, ResultKind::Same, &[true, true]))
            .unwrap();
        tree.insert(None, item("a.txt", false, ResultKind::Different, &[true, true]))
            .unwrap();
        let mut view = DirView::new(tree, DisplayConfig::default(), Recorder::default());
        view.select([0]);
        assert_eq!(view.projection().node_at(0), Some(b));

        view.sort_by(SortColumn::Name);
        assert_eq!(view.projection().index_of(b), Some(1));
        assert_eq!(view.selection().iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(view.selection().focus(), Some(1));
    }

    #[test]
    fn test_navigation_and_commands() {
        let mut view = view();
        view.expand_all();
        // rows: A, a1, a2, B
        assert_eq!(view.go_to_diff(DiffNavigation::First), Some(0));
        assert_eq!(view.go_to_diff(DiffNavigation::Next), Some(2));
        assert_eq!(view.go_to_diff(DiffNavigation::Next), Some(3));
        assert_eq!(view.go_to_diff(DiffNavigation::Next), None);
        assert_eq!(view.go_to_diff(DiffNavigation::Previous), Some(2));
        assert_eq!(view.selection().iter().collect::<Vec<_>>(), vec![2]);

        view.set_read_only(1, true);
        let states = view.command_states();
        let copy_right = states
            .iter()
            .find(|state| state.operation == Operation::CopyTo(1))
            .unwrap();
        assert!(!copy_right.enabled);
        let copy_left = states
            .iter()
            .find(|state| state.operation == Operation::CopyTo(0))
            .unwrap();
        assert!(copy_left.enabled);
        assert_eq!(copy_left.label, "Copy to Left (1)");
    }

    #[test]
    fn test_display_toggles_rebuild() {
        let mut tree = two_way();
        tree.insert(None, item("x.txt", false, ResultKind::Same, &[true, true]))
            .unwrap();
        tree.insert(None, item("y.log", false, ResultKind::Filtered, &[true, true]))
            .unwrap();
        let mut view = DirView::new(tree, DisplayConfig::default(), Recorder::default());
        assert_eq!(view.projection().len(), 1);

        view.set_show_hidden(true);
        assert_eq!(view.projection().len(), 2);
        assert!(view.display_config().show_hidden);

        let mut view = self::view();
        view.set_tree_mode(false);
        // A exists on both sides and is replaced by its files
        assert_eq!(view.projection().len(), 3);
        view.select([0]);
        assert!(view.can_open(SelectionType::Normal));
        view.select([2]);
        assert!(!view.can_open(SelectionType::Normal));
    }

    #[test]
    fn test_flat_mode_parent_row() {
        let tree = DiffTree::new(vec![PathBuf::from("/v1/proj"), PathBuf::from("/v2/proj")]).unwrap();
        let config = DisplayConfig {
            tree_mode: false,
            recursive: false,
            ..DisplayConfig::default()
        };
        let mut view = DirView::new(tree, config, Recorder::default());
        assert_eq!(view.projection().rows()[0].key, RowKey::ParentDir { enabled: true });
        assert_eq!(view.parent_paths(), &[PathBuf::from("/v1"), PathBuf::from("/v2")]);
        assert_eq!(view.activate(0, &AllDirs), Ok(Some(OpenTarget::ParentDirectory)));
    }

    #[test]
    fn test_unique_folder_open_rejected() {
        let (tree, ..) = scenario_tree();
        let config = DisplayConfig {
            tree_mode: false,
            ..DisplayConfig::default()
        };
        let mut view = DirView::new(tree, config, Recorder::default());
        // flat recursive: A exists on both sides so only its files and B show
        let b = view
            .projection()
            .rows()
            .iter()
            .position(|row| row.node().map_or(false, |id| view.tree().get(id).name() == "B"))
            .unwrap();
        assert_eq!(view.activate(b, &AllDirs), Err(OpenError::NotApplicable));
        assert!(view.adapter().activations.is_empty());
    }
}
