use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dirview_common::{DisplayConfig, FileEntry, ResultKind, SortColumn};
use dirview_core::{sort_projection, DiffItem, DiffTree, NodeId, SortState, ViewFlags, ViewProjector};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

fn entry(path: &str, is_dir: bool, size: u64) -> FileEntry {
    FileEntry {
        path: PathBuf::from(path),
        size,
        modified: UNIX_EPOCH + Duration::from_secs(size),
        is_dir,
    }
}

// Wide two-way tree: `dirs` folders holding `files` files each
fn build_tree(dirs: usize, files: usize) -> DiffTree {
    let mut tree = DiffTree::new(vec![PathBuf::from("/left"), PathBuf::from("/right")]).unwrap();
    for d in 0..dirs {
        let dir_path = format!("dir_{:04}", d);
        let dir = tree
            .insert(
                None,
                DiffItem::new(
                    dir_path.clone(),
                    true,
                    ResultKind::Different,
                    vec![Some(entry(&dir_path, true, 0)), Some(entry(&dir_path, true, 0))],
                ),
            )
            .unwrap();
        for f in 0..files {
            let file_path = format!("{}/file_{:04}.txt", dir_path, f);
            let right = (f % 3 != 0).then(|| entry(&file_path, false, f as u64));
            let result = if f % 2 == 0 { ResultKind::Same } else { ResultKind::Different };
            tree.insert(
                Some(dir),
                DiffItem::new(
                    file_path.clone(),
                    false,
                    result,
                    vec![Some(entry(&file_path, false, f as u64)), right],
                ),
            )
            .unwrap();
        }
    }
    tree
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    for &(dirs, files) in &[(10, 100), (100, 100), (100, 1000)] {
        let mut tree = build_tree(dirs, files);
        tree.set_flags_all(ViewFlags::EXPANDED);
        let projector = ViewProjector::new(DisplayConfig::default());
        group.bench_with_input(
            BenchmarkId::new("tree_mode_expanded", dirs * files),
            &tree,
            |b, tree| b.iter(|| black_box(projector.rebuild(black_box(tree)))),
        );

        let flat = ViewProjector::new(DisplayConfig {
            tree_mode: false,
            ..DisplayConfig::default()
        });
        group.bench_with_input(BenchmarkId::new("flat", dirs * files), &tree, |b, tree| {
            b.iter(|| black_box(flat.rebuild(black_box(tree))))
        });
    }
    group.finish();
}

fn bench_expand_collapse(c: &mut Criterion) {
    c.bench_function("expand_collapse_middle_folder_1000_files", |b| {
        let mut tree = build_tree(100, 1000);
        let projector = ViewProjector::new(DisplayConfig::default());
        let mut projection = projector.rebuild(&tree);
        b.iter(|| {
            let inserted = projector.expand(&mut tree, &mut projection, 50, false);
            let removed = projector.collapse(&mut tree, &mut projection, 50);
            black_box((inserted, removed));
        });
    });
}

fn bench_sort(c: &mut Criterion) {
    c.bench_function("sort_tree_mode_by_size_10000_rows", |b| {
        let mut tree = build_tree(10, 1000);
        tree.set_flags_all(ViewFlags::EXPANDED);
        let projector = ViewProjector::new(DisplayConfig::default());
        let projection = projector.rebuild(&tree);
        let state = SortState {
            column: Some(SortColumn::RightSize),
            ascending: false,
        };
        b.iter(|| {
            let mut rows = projection.clone();
            sort_projection(&tree, &mut rows, state, true);
            black_box(rows.node_at(0).map(NodeId::index));
        });
    });
}

criterion_group!(benches, bench_rebuild, bench_expand_collapse, bench_sort);
criterion_main!(benches);
