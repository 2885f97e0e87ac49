//! Snapshot tests of the tree dump.
//!
//! The dump shows node shape, counts and every segment, so these catch
//! unintended changes in splitting, toggle placement and mark ordering.

mod common;

use common::{delete, init_logging, tree_with};
use textbtree::Style;

#[test]
fn test_dump_after_split_and_tag() {
    init_logging();
    let mut tree = tree_with("a\nb\nc\nd");
    let bold = tree.create_tag("bold", Style::bold()).unwrap();
    let start = tree.iter_at_char(2).unwrap();
    let end = tree.iter_at_char(5).unwrap();
    tree.apply_tag(&start, &end, bold, true).unwrap();

    insta::assert_snapshot!(tree.dump(), @r#"
    node level=1 lines=5 chars=8
      node level=0 lines=2 chars=4
        line "a\n"
        line +bold "b\n"
      node level=0 lines=3 chars=4
        line "c" -bold "\n"
        line "d" <insert:R> <selection_bound:R> "\n"
        line (end)
    "#);
}

#[test]
fn test_dump_after_deleting_tagged_range() {
    init_logging();
    let mut tree = tree_with("a\nb\nc\nd");
    let bold = tree.create_tag("bold", Style::bold()).unwrap();
    let start = tree.iter_at_char(2).unwrap();
    let end = tree.iter_at_char(5).unwrap();
    tree.apply_tag(&start, &end, bold, true).unwrap();

    delete(&mut tree, 2, 5);

    insta::assert_snapshot!(tree.dump(), @r#"
    node level=1 lines=4 chars=5
      node level=0 lines=2 chars=3
        line "a\n"
        line "\n"
      node level=0 lines=2 chars=2
        line "d" <insert:R> <selection_bound:R> "\n"
        line (end)
    "#);
}
