//! View validation and geometry benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use textbtree::{CellLayout, TextBTree, ViewId, WrapMode};

fn document(lines: usize) -> TextBTree {
    let text: Vec<String> = (0..lines)
        .map(|i| format!("{i} lorem ipsum dolor sit amet, consectetur adipiscing elit"))
        .collect();
    let mut tree = TextBTree::new();
    let mut at = tree.start_iter();
    tree.insert_text(&mut at, &text.join("\n"))
        .expect("bench document");
    tree
}

fn wrapped() -> CellLayout {
    CellLayout::new().wrap_mode(WrapMode::Word).wrap_width(40)
}

fn validation(c: &mut Criterion) {
    c.bench_function("validate_full_10k", |b| {
        let mut tree = document(10_000);
        let view = ViewId(1);
        tree.add_view(view, wrapped()).unwrap();
        let start = tree.start_iter();
        let end = tree.end_iter();
        b.iter(|| {
            tree.invalidate_region(&start, &end, false).unwrap();
            tree.validate(view, i32::MAX).unwrap()
        });
    });

    c.bench_function("validate_screenful_after_edit", |b| {
        let mut tree = document(10_000);
        let view = ViewId(1);
        tree.add_view(view, wrapped()).unwrap();
        tree.validate(view, i32::MAX).unwrap();
        b.iter(|| {
            let mut at = tree.iter_at_line(5_000).unwrap();
            tree.insert_text(&mut at, "x").unwrap();
            tree.validate(view, black_box(50)).unwrap()
        });
    });
}

fn geometry(c: &mut Criterion) {
    let mut tree = document(10_000);
    let view = ViewId(1);
    tree.add_view(view, wrapped()).unwrap();
    tree.validate(view, i32::MAX).unwrap();
    let (_, height) = tree.view_size(view).unwrap();

    c.bench_function("line_at_y", |b| {
        let mut y = 0;
        b.iter(|| {
            y = (y + 7919) % height;
            black_box(&tree).line_at_y(view, black_box(y)).unwrap()
        });
    });

    c.bench_function("find_line_top", |b| {
        let mut line = 0;
        b.iter(|| {
            line = (line + 97) % 10_000;
            black_box(&tree).find_line_top(view, black_box(line)).unwrap()
        });
    });
}

criterion_group!(benches, validation, geometry);
criterion_main!(benches);
