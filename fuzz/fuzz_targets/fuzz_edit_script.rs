//! Fuzz target for edit scripts.
//!
//! Replays arbitrary inserts, deletes, tag changes, mark moves and view
//! validation on a small-fanout tree and checks the tree after every step.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use textbtree::{
    ConsistencyChecks, LineContent, LineSize, Style, TextBTree, TreeOptions, ViewId,
};

#[derive(Arbitrary, Debug)]
enum Op {
    Insert { at: u16, text: String },
    Delete { from: u16, to: u16 },
    Tag { tag: bool, from: u16, to: u16, apply: bool },
    Mark { at: u16, left_gravity: bool },
    Validate { budget: i8 },
    Invalidate { from: u16, to: u16 },
}

fn clamp(tree: &TextBTree, offset: u16) -> usize {
    usize::from(offset) % (tree.char_count() + 1)
}

fn height(line: &LineContent<'_>) -> LineSize {
    let chars = i32::try_from(line.char_count()).unwrap_or(i32::MAX);
    LineSize::new(chars, 1 + chars % 4)
}

fuzz_target!(|ops: Vec<Op>| {
    let mut tree = TextBTree::with_options(
        TreeOptions::new()
            .with_min_children(2)
            .with_consistency_checks(ConsistencyChecks::Never),
    );
    let tags = [
        tree.create_tag("a", Style::bold()).unwrap(),
        tree.create_tag("b", Style::italic()).unwrap(),
    ];
    let view = ViewId(1);
    tree.add_view(view, height).unwrap();

    for op in ops.iter().take(64) {
        match op {
            Op::Insert { at, text } => {
                let mut iter = tree.iter_at_char(clamp(&tree, *at)).unwrap();
                tree.insert_text(&mut iter, text).unwrap();
            }
            Op::Delete { from, to } => {
                let mut start = tree.iter_at_char(clamp(&tree, *from)).unwrap();
                let mut end = tree.iter_at_char(clamp(&tree, *to)).unwrap();
                tree.delete_range(&mut start, &mut end).unwrap();
            }
            Op::Tag {
                tag,
                from,
                to,
                apply,
            } => {
                let start = tree.iter_at_char(clamp(&tree, *from)).unwrap();
                let end = tree.iter_at_char(clamp(&tree, *to)).unwrap();
                tree.apply_tag(&start, &end, tags[usize::from(*tag)], *apply)
                    .unwrap();
            }
            Op::Mark { at, left_gravity } => {
                let iter = tree.iter_at_char(clamp(&tree, *at)).unwrap();
                tree.create_mark(None, &iter, *left_gravity).unwrap();
            }
            Op::Validate { budget } => {
                tree.validate(view, i32::from(*budget)).unwrap();
            }
            Op::Invalidate { from, to } => {
                let start = tree.iter_at_char(clamp(&tree, *from)).unwrap();
                let end = tree.iter_at_char(clamp(&tree, *to)).unwrap();
                tree.invalidate_region(&start, &end, false).unwrap();
            }
        }
        if let Err(violation) = tree.check() {
            panic!("{violation}\n{}", tree.dump());
        }
    }
});
