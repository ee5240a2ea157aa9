use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use dirview_common::{
    default_cache_dir, load_config, load_config_from, save_config, side_name, DisplayConfig, FileEntry,
    LoadedConfig, ResultKind, SortColumn,
};
use dirview_core::{
    ComparisonEngine, DiffItem, DiffNavigation, DiffTree, DirView, FolderScanner, HashCache, LocalVfs, OpenTarget,
    PluginMetadata, PluginRegistry, PresentationAdapter, ProjectedRow, RowKey, SelectionSet, SelectionType,
};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dirview")]
#[command(author = "DirView Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Folder comparison view for two or three directories", long_about = None)]
struct Cli {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CompareArgs {
    /// Directories to compare (left, optional middle, right)
    #[arg(required = true, num_args = 2..=3)]
    dirs: Vec<PathBuf>,

    /// Ignore patterns (can be specified multiple times)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Verify file hashes for same-sized files
    #[arg(short = 'v', long)]
    verify_hashes: bool,

    /// Disable file hash verification
    #[arg(long, conflicts_with = "verify_hashes")]
    no_verify_hashes: bool,

    /// Cache directory for hash storage
    #[arg(short, long)]
    cache_dir: Option<PathBuf>,

    /// List items with their relative paths instead of a folder tree
    #[arg(long)]
    flat: bool,

    /// Only compare the top level of each directory
    #[arg(long)]
    non_recursive: bool,

    /// Include items excluded by ignore patterns
    #[arg(long)]
    show_filtered: bool,

    /// Expand every folder before listing
    #[arg(short = 'x', long)]
    expand_all: bool,

    /// Sort column: name, path, status, left-date, middle-date, right-date,
    /// left-size, middle-size, right-size or extension
    #[arg(short, long)]
    sort: Option<String>,

    /// Sort in descending order
    #[arg(long, requires = "sort")]
    desc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare directories and print the folder view
    View {
        #[command(flatten)]
        compare: CompareArgs,

        /// Rows to hide before listing (comma separated)
        #[arg(long, value_delimiter = ',')]
        hide: Vec<usize>,

        /// Difference navigation steps: first, last, next, prev (comma separated)
        #[arg(long, value_delimiter = ',')]
        goto: Vec<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Disable ANSI colors in output
        #[arg(long)]
        no_color: bool,

        /// Store the display options as the new defaults
        #[arg(long)]
        remember: bool,
    },

    /// Resolve selected rows into the paths a compare would open
    Open {
        #[command(flatten)]
        compare: CompareArgs,

        /// Selected rows (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        rows: Vec<usize>,

        /// Pairing of two rows in a 2-way compare: normal, left1left2,
        /// right1right2, left1right2 or left2right1
        #[arg(short = 't', long = "type", default_value = "normal")]
        selection_type: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which commands apply to the selected rows
    Classify {
        #[command(flatten)]
        compare: CompareArgs,

        /// Selected rows (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        rows: Vec<usize>,

        /// Sides to treat as read-only, counted from 0 (comma separated)
        #[arg(long, value_delimiter = ',')]
        read_only: Vec<usize>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or run the built-in plugins
    Plugins {
        #[command(subcommand)]
        action: PluginCommands,
    },
}

#[derive(Subcommand)]
enum PluginCommands {
    /// List registered plugins
    List {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Unpack a file with the plugin that claims it
    Unpack { src: PathBuf, dst: PathBuf },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config;

    match cli.command {
        Commands::View {
            compare,
            hide,
            goto,
            json,
            no_color,
            remember,
        } => {
            if let Err(e) = run_view(config_path.as_deref(), compare, hide, goto, json, no_color, remember) {
                error!("View failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Open {
            compare,
            rows,
            selection_type,
            json,
        } => {
            if let Err(e) = run_open(config_path.as_deref(), compare, rows, &selection_type, json) {
                error!("Open failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Classify {
            compare,
            rows,
            read_only,
            json,
        } => {
            if let Err(e) = run_classify(config_path.as_deref(), compare, rows, read_only, json) {
                error!("Classify failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Plugins { action } => {
            let result = match action {
                PluginCommands::List { json } => run_plugins_list(json),
                PluginCommands::Unpack { src, dst } => run_plugins_unpack(&src, &dst),
            };
            if let Err(e) = result {
                error!("Plugin command failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Renders folder view rows as plain text lines
struct TerminalAdapter {
    use_color: bool,
    tree_mode: bool,
    lines: Vec<String>,
    status: String,
}

impl TerminalAdapter {
    fn new(use_color: bool, tree_mode: bool) -> Self {
        Self {
            use_color,
            tree_mode,
            lines: Vec::new(),
            status: String::new(),
        }
    }

    fn format_row(&self, tree: &DiffTree, index: usize, row: &ProjectedRow) -> String {
        let item = match row.key {
            RowKey::ParentDir { enabled } => {
                let suffix = if enabled { "" } else { "  (unavailable)" };
                return format!("{:>4}  ..{}", index, suffix);
            }
            RowKey::Node(id) => tree.get(id),
        };

        let indent = if self.tree_mode {
            "  ".repeat(row.depth)
        } else {
            String::new()
        };
        let marker = match (self.tree_mode && item.is_dir, item.is_expanded()) {
            (false, _) => "",
            (true, true) => "[-] ",
            (true, false) => "[+] ",
        };
        let name = if self.tree_mode {
            item.name()
        } else {
            item.relative_path.display().to_string()
        };
        let name = if item.is_dir { format!("{}/", name) } else { name };

        let (color, reset) = status_color(item.result, self.use_color);
        let sides = item
            .sides
            .iter()
            .map(|side| format_side(side.as_ref()))
            .collect::<Vec<_>>()
            .join(" | ");

        format!(
            "{:>4}  {}{}{}  {}[{}]{}  {}",
            index,
            indent,
            marker,
            name,
            color,
            status_label(item, tree.side_count()),
            reset,
            sides
        )
    }
}

impl PresentationAdapter for TerminalAdapter {
    fn render_rows(&mut self, tree: &DiffTree, rows: &[ProjectedRow]) {
        let lines: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| self.format_row(tree, index, row))
            .collect();
        self.lines = lines;
    }

    fn on_selection_changed(&mut self, _selection: &SelectionSet, status: &str) {
        self.status = status.to_string();
    }

    fn on_activate(&mut self, row: usize, target: &OpenTarget) {
        debug!("Row {} opened: {:?}", row, target);
    }
}

fn status_color(result: ResultKind, use_color: bool) -> (&'static str, &'static str) {
    if !use_color {
        return ("", "");
    }
    let color = match result {
        ResultKind::Same => "\x1b[32m",          // Green
        ResultKind::Different => "\x1b[31m",     // Red
        ResultKind::Error => "\x1b[35m",         // Magenta
        ResultKind::Aborted => "\x1b[36m",       // Cyan
        ResultKind::Filtered => "\x1b[90m",      // Grey
        ResultKind::SkippedBinary => "\x1b[33m", // Yellow
    };
    (color, "\x1b[0m")
}

/// "Left only", "Left+Middle only" for entries missing somewhere, otherwise
/// the result label
fn status_label(item: &DiffItem, side_count: usize) -> String {
    if item.result == ResultKind::Different && !item.exists_all() {
        let present: Vec<&str> = (0..side_count)
            .filter(|&side| item.exists(side))
            .map(|side| side_name(side, side_count))
            .collect();
        return format!("{} only", present.join("+"));
    }
    item.result.label().to_string()
}

fn format_side(entry: Option<&FileEntry>) -> String {
    match entry {
        None => "-".to_string(),
        Some(entry) if entry.is_dir => format_time(entry.modified),
        Some(entry) => format!("{} B {}", entry.size, format_time(entry.modified)),
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M").to_string()
}

struct Session {
    loaded: LoadedConfig,
    view: DirView<TerminalAdapter>,
}

fn load(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let loaded = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config(false)?,
    };
    debug!("Configuration: {} (exists: {})", loaded.path.display(), loaded.exists);
    Ok(loaded)
}

fn display_options(mut display: DisplayConfig, args: &CompareArgs) -> Result<DisplayConfig> {
    if args.flat {
        display.tree_mode = false;
    }
    if args.non_recursive {
        display.recursive = false;
    }
    if args.show_filtered {
        display.show_hidden = true;
    }
    if let Some(name) = &args.sort {
        let column = SortColumn::parse(name).with_context(|| format!("Unknown sort column: {}", name))?;
        display.sort_column = Some(column);
        display.sort_ascending = !args.desc;
    }
    Ok(display)
}

/// Run the compare and build the folder view on top of it
fn open_session(config_path: Option<&Path>, args: &CompareArgs, use_color: bool) -> Result<Session> {
    for dir in &args.dirs {
        if !dir.is_dir() {
            bail!("Not a directory: {}", dir.display());
        }
    }

    for (side, dir) in args.dirs.iter().enumerate() {
        info!("  {:<6} {}", side_name(side, args.dirs.len()), dir.display());
    }

    let loaded = load(config_path)?;
    let mut config = loaded.config.clone();

    if !args.ignore.is_empty() {
        config.ignore_patterns.extend(args.ignore.iter().cloned());
    }
    if args.follow_symlinks {
        config.follow_symlinks = true;
    }
    let verify_hashes = if args.verify_hashes {
        true
    } else if args.no_verify_hashes {
        false
    } else {
        config.use_hash_verification
    };
    let display = display_options(config.view, args)?;

    // Determine cache directory
    let cache_path = match args.cache_dir.clone().or_else(|| config.cache_dir.clone()) {
        Some(path) => path,
        None => default_cache_dir(loaded.portable, &loaded.path)?,
    };
    info!("Using cache directory: {}", cache_path.display());

    let engine = ComparisonEngine::new(HashCache::new(cache_path)?).with_hash_verification(verify_hashes);
    let scanner = FolderScanner::new(config)
        .with_recursion(display.recursive)
        .with_filtered(true);

    info!("Comparing directories...");
    let tree = engine.compare_folders(&args.dirs, &scanner, None)?;
    engine.persist_cache()?;

    let adapter = TerminalAdapter::new(use_color, display.tree_mode && display.recursive);
    let mut view = DirView::new(tree, display, adapter);
    if args.expand_all {
        view.expand_all();
    }

    Ok(Session { loaded, view })
}

fn check_rows(view: &DirView<TerminalAdapter>, rows: &[usize]) -> Result<()> {
    let count = view.projection().len();
    if let Some(row) = rows.iter().find(|&&row| row >= count) {
        bail!("Row {} is out of range (the view has {} rows)", row, count);
    }
    Ok(())
}

fn parse_navigation(step: &str) -> Result<DiffNavigation> {
    match step.trim().to_ascii_lowercase().as_str() {
        "first" => Ok(DiffNavigation::First),
        "last" => Ok(DiffNavigation::Last),
        "next" => Ok(DiffNavigation::Next),
        "prev" | "previous" => Ok(DiffNavigation::Previous),
        other => bail!("Unknown navigation step: {}", other),
    }
}

#[derive(Serialize)]
struct JsonView {
    roots: Vec<String>,
    tree_mode: bool,
    sort_column: Option<SortColumn>,
    sort_ascending: bool,
    focus: Option<usize>,
    summary: JsonSummary,
    rows: Vec<JsonRow>,
}

#[derive(Serialize)]
struct JsonSummary {
    rows: usize,
    items: usize,
    differences: usize,
    hidden: usize,
    status: String,
}

#[derive(Serialize)]
struct JsonRow {
    row: usize,
    depth: usize,
    /// Only set on the ".." row
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_enabled: Option<bool>,
    path: String,
    name: String,
    is_dir: bool,
    status: Option<ResultKind>,
    expanded: bool,
    sides: Vec<Option<JsonSide>>,
}

#[derive(Serialize)]
struct JsonSide {
    size: u64,
    modified_unix: Option<u64>,
    is_dir: bool,
}

fn build_json_view(view: &DirView<TerminalAdapter>) -> JsonView {
    let tree = view.tree();
    let projection = view.projection();
    let display = view.display_config();

    let rows = projection
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| match row.key {
            RowKey::ParentDir { enabled } => JsonRow {
                row: index,
                depth: row.depth,
                parent_enabled: Some(enabled),
                path: "..".to_string(),
                name: "..".to_string(),
                is_dir: true,
                status: None,
                expanded: false,
                sides: Vec::new(),
            },
            RowKey::Node(id) => {
                let item = tree.get(id);
                JsonRow {
                    row: index,
                    depth: row.depth,
                    parent_enabled: None,
                    path: item.relative_path.to_string_lossy().replace('\\', "/"),
                    name: item.name(),
                    is_dir: item.is_dir,
                    status: Some(item.result),
                    expanded: item.is_expanded(),
                    sides: item.sides.iter().map(|side| side.as_ref().map(json_side)).collect(),
                }
            }
        })
        .collect();

    JsonView {
        roots: tree
            .side_roots()
            .iter()
            .map(|root| root.to_string_lossy().to_string())
            .collect(),
        tree_mode: display.tree_mode && display.recursive,
        sort_column: display.sort_column,
        sort_ascending: display.sort_ascending,
        focus: view.selection().focus(),
        summary: JsonSummary {
            rows: projection.len(),
            items: projection.len() - projection.special_count(),
            differences: view.diff_count(),
            hidden: view.hidden_count(),
            status: view.status_text(),
        },
        rows,
    }
}

fn json_side(entry: &FileEntry) -> JsonSide {
    JsonSide {
        size: entry.size,
        modified_unix: entry.modified.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs()),
        is_dir: entry.is_dir,
    }
}

fn print_view(view: &DirView<TerminalAdapter>) {
    let tree = view.tree();
    let side_count = tree.side_count();

    println!("\n{}", "=".repeat(80));
    println!("Folder View");
    for (side, root) in tree.side_roots().iter().enumerate() {
        println!("  {:<7} {}", side_name(side, side_count), root.display());
    }
    println!("{}", "=".repeat(80));

    for line in &view.adapter().lines {
        println!("{}", line);
    }

    println!("{}", "=".repeat(80));
    println!("Differences: {}", view.diff_count());
    println!("Hidden:      {}", view.hidden_count());
    let sort = view.sort_state();
    if let Some(column) = sort.column {
        let direction = if sort.ascending { "ascending" } else { "descending" };
        println!("Sorted by:   {:?} ({})", column, direction);
    }
    println!("{}", view.adapter().status);
    println!("{}", "=".repeat(80));
}

fn run_view(
    config_path: Option<&Path>,
    args: CompareArgs,
    hide: Vec<usize>,
    goto: Vec<String>,
    json: bool,
    no_color: bool,
    remember: bool,
) -> Result<()> {
    let use_color = !no_color && !json && std::io::stdout().is_terminal();
    let mut session = open_session(config_path, &args, use_color)?;
    let view = &mut session.view;

    if !hide.is_empty() {
        check_rows(view, &hide)?;
        view.select(hide);
        let hidden = view.hide_selected();
        info!("Hid {} items", hidden);
    }

    for step in &goto {
        let navigation = parse_navigation(step)?;
        match view.go_to_diff(navigation) {
            Some(row) => debug!("Moved to difference at row {}", row),
            None => info!("No difference to move to ({})", step),
        }
    }

    if remember {
        let mut stored = session.loaded.config.clone();
        stored.view = view.display_config();
        save_config(&session.loaded.path, &stored)?;
        info!("Saved display options to {}", session.loaded.path.display());
    }

    if json {
        let report = build_json_view(view);
        let output = serde_json::to_string_pretty(&report)?;
        println!("{output}");
        return Ok(());
    }

    print_view(view);
    Ok(())
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonOpen {
    Parent { paths: Vec<String> },
    Compare { is_dir: bool, sides: Vec<JsonOpenSide> },
}

#[derive(Serialize)]
struct JsonOpenSide {
    path: Option<String>,
    description: Option<String>,
}

fn run_open(
    config_path: Option<&Path>,
    args: CompareArgs,
    rows: Vec<usize>,
    selection_type: &str,
    json: bool,
) -> Result<()> {
    let selection_type = SelectionType::parse(selection_type)
        .with_context(|| format!("Unknown selection type: {}", selection_type))?;

    let mut session = open_session(config_path, &args, false)?;
    let view = &mut session.view;
    check_rows(view, &rows)?;
    view.select(rows);

    let probe = LocalVfs::default();
    let target = view.open_selection(selection_type, &probe)?;

    let report = match &target {
        OpenTarget::ParentDirectory => JsonOpen::Parent {
            paths: view
                .parent_paths()
                .iter()
                .map(|path| path.to_string_lossy().to_string())
                .collect(),
        },
        OpenTarget::Compare(resolved) => JsonOpen::Compare {
            is_dir: resolved.is_dir,
            sides: resolved
                .paths
                .iter()
                .zip(&resolved.descriptions)
                .map(|(path, description)| JsonOpenSide {
                    path: (!path.as_os_str().is_empty()).then(|| path.to_string_lossy().to_string()),
                    description: description.clone(),
                })
                .collect(),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report {
        JsonOpen::Parent { paths } => {
            println!("Open parent folders:");
            for (side, path) in paths.iter().enumerate() {
                println!("  {:<7} {}", side_name(side, paths.len()), path);
            }
        }
        JsonOpen::Compare { is_dir, sides } => {
            println!("Open {} compare:", if is_dir { "folder" } else { "file" });
            for (side, entry) in sides.iter().enumerate() {
                let text = entry
                    .path
                    .as_deref()
                    .or(entry.description.as_deref())
                    .unwrap_or("-");
                println!("  {:<7} {}", side_name(side, sides.len()), text);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonCommand {
    operation: String,
    label: String,
    enabled: bool,
    eligible: usize,
    total: usize,
}

fn run_classify(
    config_path: Option<&Path>,
    args: CompareArgs,
    rows: Vec<usize>,
    read_only: Vec<usize>,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config_path, &args, false)?;
    let view = &mut session.view;
    let side_count = view.tree().side_count();

    check_rows(view, &rows)?;
    for side in read_only {
        if side >= side_count {
            bail!("Side {} does not exist in a {}-way compare", side, side_count);
        }
        view.set_read_only(side, true);
    }
    view.select(rows);

    let commands: Vec<JsonCommand> = view
        .command_states()
        .into_iter()
        .map(|state| JsonCommand {
            operation: state.operation.verb(side_count),
            label: state.label,
            enabled: state.enabled,
            eligible: state.classification.eligible,
            total: state.classification.total,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&commands)?);
        return Ok(());
    }

    for command in &commands {
        let mark = if command.enabled { "x" } else { " " };
        println!("[{}] {}", mark, command.label);
    }
    Ok(())
}

fn run_plugins_list(json: bool) -> Result<()> {
    let registry = PluginRegistry::with_builtin();

    if json {
        let metadata: Vec<&PluginMetadata> = registry.iter().map(|plugin| plugin.metadata()).collect();
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No plugins available");
        return Ok(());
    }
    for plugin in registry.iter() {
        let metadata = plugin.metadata();
        let automatic = if metadata.is_automatic { " (automatic)" } else { "" };
        println!("{:<12} {:<16} {}{}", metadata.name, metadata.event.label(), metadata.file_filters, automatic);
        println!("    {}", metadata.description);
    }
    Ok(())
}

fn run_plugins_unpack(src: &Path, dst: &Path) -> Result<()> {
    let registry = PluginRegistry::with_builtin();
    match registry.unpack_file(src, dst)? {
        Some((name, outcome)) => {
            let note = if outcome.changed { "" } else { " (unchanged)" };
            println!("Unpacked {} with {}{}", src.display(), name, note);
            Ok(())
        }
        None => bail!("No plugin handles {}", src.display()),
    }
}
