use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Smallest number of sides a comparison can have
pub const MIN_SIDES: usize = 2;
/// Largest number of sides a comparison can have (left, middle, right)
pub const MAX_SIDES: usize = 3;

/// Represents a file or directory entry found on one side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
}

/// Metadata for a file or directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
}

/// Outcome of comparing one entry across all sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    /// Every present side has identical content
    Same,
    /// Content differs, or the entry is missing on some side
    Different,
    /// The entry could not be read on some side
    Error,
    /// The compare was cancelled before this entry was examined
    Aborted,
    /// The entry was excluded by a filter
    Filtered,
    /// Binary content was skipped by the compare method
    SkippedBinary,
}

impl ResultKind {
    /// Ordinal used when sorting by the status column
    pub fn sort_rank(self) -> u8 {
        match self {
            ResultKind::Error => 0,
            ResultKind::Aborted => 1,
            ResultKind::Different => 2,
            ResultKind::SkippedBinary => 3,
            ResultKind::Filtered => 4,
            ResultKind::Same => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResultKind::Same => "identical",
            ResultKind::Different => "different",
            ResultKind::Error => "error",
            ResultKind::Aborted => "aborted",
            ResultKind::Filtered => "filtered",
            ResultKind::SkippedBinary => "binary skipped",
        }
    }
}

/// Human readable name of a side in an `n`-way comparison.
pub fn side_name(side: usize, side_count: usize) -> &'static str {
    if side == 0 {
        "Left"
    } else if side + 1 == side_count {
        "Right"
    } else {
        "Middle"
    }
}

/// Columns the folder view can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortColumn {
    Name,
    Path,
    Status,
    LeftDate,
    MiddleDate,
    RightDate,
    LeftSize,
    MiddleSize,
    RightSize,
    Extension,
}

impl SortColumn {
    pub const ALL: [SortColumn; 10] = [
        SortColumn::Name,
        SortColumn::Path,
        SortColumn::Status,
        SortColumn::LeftDate,
        SortColumn::MiddleDate,
        SortColumn::RightDate,
        SortColumn::LeftSize,
        SortColumn::MiddleSize,
        SortColumn::RightSize,
        SortColumn::Extension,
    ];

    /// Direction a column starts in the first time it is clicked.
    /// Dates start newest-first, everything else ascending.
    pub fn default_ascending(self) -> bool {
        match self {
            SortColumn::Name => true,
            SortColumn::Path => true,
            SortColumn::Status => true,
            SortColumn::LeftDate => false,
            SortColumn::MiddleDate => false,
            SortColumn::RightDate => false,
            SortColumn::LeftSize => true,
            SortColumn::MiddleSize => true,
            SortColumn::RightSize => true,
            SortColumn::Extension => true,
        }
    }

    /// Whether the column exists for a comparison with `side_count` sides
    pub fn is_available(self, side_count: usize) -> bool {
        match self {
            SortColumn::MiddleDate | SortColumn::MiddleSize => side_count == MAX_SIDES,
            _ => true,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "name" => Some(SortColumn::Name),
            "path" => Some(SortColumn::Path),
            "status" => Some(SortColumn::Status),
            "left-date" => Some(SortColumn::LeftDate),
            "middle-date" => Some(SortColumn::MiddleDate),
            "right-date" => Some(SortColumn::RightDate),
            "left-size" => Some(SortColumn::LeftSize),
            "middle-size" => Some(SortColumn::MiddleSize),
            "right-size" => Some(SortColumn::RightSize),
            "extension" | "ext" => Some(SortColumn::Extension),
            _ => None,
        }
    }
}

/// Display options for the folder view.
///
/// Passed explicitly into projection and sorting instead of being read from
/// global option storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Show the folder hierarchy with expandable directories
    #[serde(default = "default_true")]
    pub tree_mode: bool,

    /// Whether the compare descended into subfolders
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Include entries that were excluded by filters.
    /// Items hidden by the user stay hidden until they are shown again.
    #[serde(default)]
    pub show_hidden: bool,

    #[serde(default)]
    pub sort_column: Option<SortColumn>,

    #[serde(default = "default_true")]
    pub sort_ascending: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tree_mode: true,
            recursive: true,
            show_hidden: false,
            sort_column: None,
            sort_ascending: true,
        }
    }
}

/// Cache key for file hashing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Ignore patterns (e.g., "*.o", "node_modules/")
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Whether to follow symbolic links
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Whether to compare equal-sized files by content hash
    #[serde(default)]
    pub use_hash_verification: bool,

    /// Cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,

    /// Remembered folder view preferences
    #[serde(default)]
    pub view: DisplayConfig,
}

/// BLAKE3 hash value (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<blake3::Hash> for Blake3Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_names() {
        assert_eq!(side_name(0, 2), "Left");
        assert_eq!(side_name(1, 2), "Right");
        assert_eq!(side_name(0, 3), "Left");
        assert_eq!(side_name(1, 3), "Middle");
        assert_eq!(side_name(2, 3), "Right");
    }

    #[test]
    fn test_date_columns_default_descending() {
        for column in SortColumn::ALL {
            let is_date = matches!(
                column,
                SortColumn::LeftDate | SortColumn::MiddleDate | SortColumn::RightDate
            );
            assert_eq!(column.default_ascending(), !is_date, "{:?}", column);
        }
    }

    #[test]
    fn test_middle_columns_need_three_sides() {
        assert!(!SortColumn::MiddleDate.is_available(2));
        assert!(SortColumn::MiddleDate.is_available(3));
        assert!(SortColumn::LeftSize.is_available(2));
    }

    #[test]
    fn test_parse_sort_column() {
        assert_eq!(SortColumn::parse("Left_Date"), Some(SortColumn::LeftDate));
        assert_eq!(SortColumn::parse("ext"), Some(SortColumn::Extension));
        assert_eq!(SortColumn::parse("bogus"), None);
    }

    #[test]
    fn test_display_config_from_partial_toml() {
        let config: AppConfig = toml::from_str("[view]\ntree_mode = false\n").unwrap();
        assert!(!config.view.tree_mode);
        assert!(config.view.recursive);
        assert!(config.view.sort_ascending);
        assert_eq!(config.view.sort_column, None);
    }
}
