//! Tree editing and query benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use textbtree::{Style, TextBTree};

fn document(lines: usize) -> TextBTree {
    let text: Vec<String> = (0..lines)
        .map(|i| format!("line {i}: the quick brown fox jumps over the lazy dog"))
        .collect();
    let mut tree = TextBTree::new();
    let mut at = tree.start_iter();
    tree.insert_text(&mut at, &text.join("\n"))
        .expect("bench document");
    tree
}

fn tree_creation(c: &mut Criterion) {
    c.bench_function("tree_new", |b| {
        b.iter(TextBTree::new);
    });

    let text = "x\n".repeat(10_000);
    c.bench_function("tree_insert_10k_lines", |b| {
        b.iter(|| {
            let mut tree = TextBTree::new();
            let mut at = tree.start_iter();
            tree.insert_text(&mut at, black_box(&text)).unwrap();
            tree
        });
    });
}

fn tree_editing(c: &mut Criterion) {
    c.bench_function("tree_insert_char_middle", |b| {
        let mut tree = document(10_000);
        let middle = tree.char_count() / 2;
        b.iter(|| {
            let mut at = tree.iter_at_char(black_box(middle)).unwrap();
            tree.insert_text(&mut at, "x").unwrap();
        });
    });

    c.bench_function("tree_insert_line_middle", |b| {
        let mut tree = document(10_000);
        let middle = tree.char_count() / 2;
        b.iter(|| {
            let mut at = tree.iter_at_char(black_box(middle)).unwrap();
            tree.insert_text(&mut at, "a new line\n").unwrap();
        });
    });

    c.bench_function("tree_delete_lines", |b| {
        b.iter_batched(
            || document(1_000),
            |mut tree| {
                let mut start = tree.iter_at_line(100).unwrap();
                let mut end = tree.iter_at_line(900).unwrap();
                tree.delete_range(&mut start, &mut end).unwrap();
                tree
            },
            BatchSize::SmallInput,
        );
    });
}

fn tree_queries(c: &mut Criterion) {
    let tree = document(10_000);
    let count = tree.char_count();

    c.bench_function("tree_iter_at_char", |b| {
        let mut offset = 0;
        b.iter(|| {
            offset = (offset + 7919) % count;
            black_box(&tree).iter_at_char(black_box(offset)).unwrap()
        });
    });

    c.bench_function("tree_iter_at_line", |b| {
        let mut line = 0;
        b.iter(|| {
            line = (line + 97) % 10_000;
            black_box(&tree).iter_at_line(black_box(line)).unwrap()
        });
    });

    c.bench_function("tree_text", |b| {
        b.iter(|| black_box(&tree).text());
    });
}

fn tree_tagging(c: &mut Criterion) {
    c.bench_function("tag_apply_remove_range", |b| {
        let mut tree = document(10_000);
        let bold = tree.create_tag("bold", Style::bold()).unwrap();
        let start = tree.iter_at_line(1_000).unwrap();
        let end = tree.iter_at_line(9_000).unwrap();
        b.iter(|| {
            tree.apply_tag(&start, &end, bold, true).unwrap();
            tree.apply_tag(&start, &end, bold, false).unwrap();
        });
    });

    let mut tree = document(10_000);
    let bold = tree.create_tag("bold", Style::bold()).unwrap();
    for line in (0..10_000).step_by(100) {
        let start = tree.iter_at_line(line).unwrap();
        let end = tree.iter_at_line_char(line, 4).unwrap();
        tree.apply_tag(&start, &end, bold, true).unwrap();
    }

    c.bench_function("tag_has_tag", |b| {
        let at = tree.iter_at_line(5_050).unwrap();
        b.iter(|| black_box(&tree).has_tag(black_box(&at), bold).unwrap());
    });

    c.bench_function("tag_forward_to_toggle", |b| {
        let from = tree.iter_at_line(5_050).unwrap();
        b.iter(|| {
            let mut at = from;
            black_box(&tree).forward_to_tag_toggle(&mut at, bold).unwrap()
        });
    });
}

criterion_group!(
    benches,
    tree_creation,
    tree_editing,
    tree_queries,
    tree_tagging
);
criterion_main!(benches);
