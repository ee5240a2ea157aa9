pub mod comparison;
pub mod diff_tree;
pub mod dir_view;
pub mod hash_cache;
pub mod open;
pub mod plugin;
pub mod projector;
pub mod scanner;
pub mod selection;
pub mod sort;
pub mod vfs;

pub use comparison::ComparisonEngine;
pub use diff_tree::{DiffItem, DiffTree, NodeId, TreeState, ViewFlags};
pub use dir_view::{DiffNavigation, DirView, PresentationAdapter};
pub use hash_cache::HashCache;
pub use open::{are_items_openable, resolve_open, OpenError, OpenTarget, PathProbe, ResolvedOpen, SelectionType};
pub use plugin::{PackOutcome, Plugin, PluginError, PluginEvent, PluginMetadata, PluginRegistry, UnpackOutcome};
pub use projector::{ProjectedRow, Projection, RowKey, UpwardDirectory, ViewProjector};
pub use scanner::FolderScanner;
pub use selection::{Classification, CommandState, Operation, SelectionPolicy, SelectionSet};
pub use sort::{sort_projection, SortState};
pub use vfs::LocalVfs;
