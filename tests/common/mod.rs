//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;
use textbtree::{
    ConsistencyChecks, LineContent, LineSize, LogLevel, TextBTree, TreeOptions, set_log_callback,
};
use tracing::Level;

/// Install a test subscriber and forward the tree's log callback into
/// `tracing`.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_test_writer()
            .try_init();
        set_log_callback(|level, message| match level {
            LogLevel::Debug => tracing::debug!(target: "textbtree", "{message}"),
            LogLevel::Info => tracing::info!(target: "textbtree", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "textbtree", "{message}"),
            LogLevel::Error => tracing::error!(target: "textbtree", "{message}"),
        });
    });
}

/// A tree with the smallest fan-out and checks after every mutation, so
/// that small documents already exercise splits and merges.
pub fn checked_tree() -> TextBTree {
    TextBTree::with_options(
        TreeOptions::new()
            .with_min_children(2)
            .with_consistency_checks(ConsistencyChecks::Always),
    )
}

pub fn tree_with(text: &str) -> TextBTree {
    let mut tree = checked_tree();
    insert_at(&mut tree, 0, text);
    tree
}

pub fn insert_at(tree: &mut TextBTree, offset: usize, text: &str) {
    let mut at = tree.iter_at_char(offset).expect("insert offset in range");
    tree.insert_text(&mut at, text).expect("insert");
}

pub fn delete(tree: &mut TextBTree, from: usize, to: usize) {
    let mut start = tree.iter_at_char(from).expect("delete start in range");
    let mut end = tree.iter_at_char(to).expect("delete end in range");
    tree.delete_range(&mut start, &mut end).expect("delete");
}

/// Layout whose line height depends on the line length, so that tops are
/// not simply multiples of the line number.
pub fn uneven_height(line: &LineContent<'_>) -> LineSize {
    let chars = i32::try_from(line.char_count()).unwrap_or(i32::MAX);
    LineSize::new(chars, 1 + chars % 3)
}
