//! Applying tags and answering tag queries.
//!
//! A tag's extent is recorded only by its toggle segments. Whether a tag
//! applies at a position is the parity of its toggles before that position;
//! node summaries let both the parity count and the toggle searches skip
//! whole subtrees.

use crate::error::Result;
use crate::event::emit_event;
use crate::style::Style;
use crate::text::iter::TextIter;
use crate::text::node::Children;
use crate::text::segment::Segment;
use crate::text::tag::TextTag;
use crate::text::{LineId, NodeId, TagId, TextBTree};
use std::cmp::Ordering;
use std::collections::HashMap;

impl TextBTree {
    /// Create a named tag with the highest priority so far.
    pub fn create_tag(&mut self, name: &str, style: Style) -> Result<TagId> {
        self.tags.create(Some(name), style)
    }

    /// Create an unnamed tag with the highest priority so far.
    pub fn create_anonymous_tag(&mut self, style: Style) -> TagId {
        // Only named tags can collide.
        match self.tags.create(None, style) {
            Ok(tag) => tag,
            Err(err) => unreachable!("anonymous tag creation failed: {err}"),
        }
    }

    /// Find a tag by name.
    #[must_use]
    pub fn lookup_tag(&self, name: &str) -> Option<TagId> {
        self.tags.lookup(name)
    }

    /// A tag's definition.
    pub fn tag(&self, tag: TagId) -> Result<&TextTag> {
        self.tags.get(tag)
    }

    /// Number of tags in the table.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Move a tag in the priority order, shifting the others. Priorities
    /// stay the dense range `0..tag_count()`.
    pub fn set_tag_priority(&mut self, tag: TagId, priority: usize) -> Result<()> {
        self.tags.set_priority(tag, priority)
    }

    /// Change a tag's appearance. Lines spanned by the tag are invalidated
    /// in every view.
    pub fn set_tag_style(&mut self, tag: TagId, style: Style) -> Result<()> {
        self.ensure_mutable()?;
        self.tags.set_style(tag, style)?;
        let lines = self.lines_with_toggles(tag);
        if let (Some(&first), Some(&last)) = (lines.first(), lines.last()) {
            self.invalidate_lines(first, last);
        }
        Ok(())
    }

    /// Remove a tag from the whole document, then from the table.
    pub fn remove_tag(&mut self, tag: TagId) -> Result<()> {
        self.ensure_mutable()?;
        self.tags.get(tag)?;

        let lines = self.lines_with_toggles(tag);
        for &line in &lines {
            let segments = &mut self.lines[line].segments;
            segments.retain(|segment| segment.toggle().is_none_or(|(t, _)| t != tag));
            self.lines[line].canonicalize();
        }
        for node in self.nodes.values_mut() {
            node.summaries.remove(&tag);
        }
        if !lines.is_empty() {
            self.segments_changed();
            for line in lines {
                self.invalidate_lines(line, line);
            }
        }
        self.tags.remove(tag)?;
        emit_event("remove-tag", &format!("tag={tag:?} scope=table"));
        self.after_mutation();
        Ok(())
    }

    /// Apply (`apply == true`) or remove a tag over `[start, end)`.
    ///
    /// Toggles of the tag inside the range are dropped; at most one toggle
    /// is added at each end, and toggles that would sit back to back with an
    /// opposite one are cancelled instead.
    pub fn apply_tag(
        &mut self,
        start: &TextIter,
        end: &TextIter,
        tag: TagId,
        apply: bool,
    ) -> Result<()> {
        self.ensure_mutable()?;
        self.tags.get(tag)?;
        let (s, e) = self.ordered(start, end)?;
        if s.char_offset == e.char_offset {
            return Ok(());
        }

        let was_on_at_start = self.toggle_parity(s.line, s.byte_index, tag);
        let end_pos = (e.line, e.byte_index);
        let mut inside = Vec::new();
        let mut cursor = (s.line, s.byte_index);
        while let Some(found) = self.next_toggle(tag, cursor.0, cursor.1, false) {
            if self.compare_positions(found, end_pos) != Ordering::Less {
                break;
            }
            inside.push(found);
            cursor = found;
        }
        let was_on_before_end = was_on_at_start ^ (inside.len() % 2 == 1);

        let mut touched = vec![s.line, e.line];
        for &(line, byte) in &inside {
            self.remove_toggle_at(line, byte, tag);
            touched.push(line);
        }
        if was_on_at_start != apply {
            self.insert_toggle(s.line, s.byte_index, tag, apply);
        }
        if was_on_before_end != apply {
            self.insert_toggle(e.line, e.byte_index, tag, !apply);
        }
        touched.sort();
        touched.dedup();
        for line in touched {
            self.cleanup_line(line);
        }

        self.segments_changed();
        self.invalidate_lines(s.line, e.line);
        emit_event(
            if apply { "apply-tag" } else { "remove-tag" },
            &format!("tag={tag:?} start={} end={}", s.char_offset, e.char_offset),
        );
        self.after_mutation();
        Ok(())
    }

    /// Remove every tag from `[start, end)`.
    pub fn remove_all_tags(&mut self, start: &TextIter, end: &TextIter) -> Result<()> {
        let tags: Vec<TagId> = self.tags.ids().collect();
        for tag in tags {
            self.apply_tag(start, end, tag, false)?;
        }
        Ok(())
    }

    /// Whether `tag` applies to the character at `iter`.
    pub fn has_tag(&self, iter: &TextIter, tag: TagId) -> Result<bool> {
        self.tags.get(tag)?;
        let iter = self.resolve(iter)?;
        Ok(self.toggle_parity(iter.line, iter.byte_index, tag))
    }

    /// Tags applying to the character at `iter`, lowest priority first.
    pub fn tags_at(&self, iter: &TextIter) -> Result<Vec<TagId>> {
        let iter = self.resolve(iter)?;
        let mut counts: HashMap<TagId, u32> = HashMap::new();
        self.toggles_before(iter.line, iter.byte_index, |tag, count| {
            *counts.entry(tag).or_default() += count;
        });
        let mut tags: Vec<TagId> = counts
            .into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .map(|(tag, _)| tag)
            .collect();
        self.tags.sort_by_priority(&mut tags);
        Ok(tags)
    }

    /// Styles of the tags at `iter`, overlaid in priority order.
    pub fn style_at(&self, iter: &TextIter) -> Result<Style> {
        let styles = self
            .tags_at(iter)?
            .into_iter()
            .map(|tag| self.tags.get(tag).map(TextTag::style))
            .collect::<Result<Vec<_>>>()?;
        Ok(Style::layered(styles))
    }

    /// Whether `tag` applies to any character of `[start, end)`.
    pub fn tag_intersects_range(
        &self,
        tag: TagId,
        start: &TextIter,
        end: &TextIter,
    ) -> Result<bool> {
        self.tags.get(tag)?;
        let (s, e) = self.ordered(start, end)?;
        if s.char_offset == e.char_offset || !self.nodes[self.root].has_toggles(tag) {
            return Ok(false);
        }
        if self.toggle_parity(s.line, s.byte_index, tag) {
            return Ok(true);
        }
        Ok(self
            .next_toggle(tag, s.line, s.byte_index, false)
            .is_some_and(|found| {
                self.compare_positions(found, (e.line, e.byte_index)) == Ordering::Less
            }))
    }

    /// Position of the first toggle of `tag` in the document.
    pub fn find_first_toggle(&self, tag: TagId) -> Result<Option<TextIter>> {
        self.tags.get(tag)?;
        Ok(self
            .first_toggle_under(self.root, tag)
            .map(|(line, byte)| self.make_iter(line, byte, None)))
    }

    /// Position of the last toggle of `tag` in the document.
    pub fn find_last_toggle(&self, tag: TagId) -> Result<Option<TextIter>> {
        self.tags.get(tag)?;
        Ok(self
            .last_toggle_under(self.root, tag)
            .map(|(line, byte)| self.make_iter(line, byte, None)))
    }

    /// Move `iter` to the next toggle of `tag` strictly after it. Without
    /// one, moves to the end and returns `false`.
    pub fn forward_to_tag_toggle(&self, iter: &mut TextIter, tag: TagId) -> Result<bool> {
        self.tags.get(tag)?;
        let at = self.resolve(iter)?;
        match self.next_toggle(tag, at.line, at.byte_index, false) {
            Some((line, byte)) => {
                *iter = self.make_iter(line, byte, None);
                Ok(true)
            }
            None => {
                *iter = self.end_iter();
                Ok(false)
            }
        }
    }

    /// Move `iter` to the previous toggle of `tag` strictly before it.
    /// Without one, moves to the start and returns `false`.
    pub fn backward_to_tag_toggle(&self, iter: &mut TextIter, tag: TagId) -> Result<bool> {
        self.tags.get(tag)?;
        let at = self.resolve(iter)?;
        match self.prev_toggle(tag, at.line, at.byte_index) {
            Some((line, byte)) => {
                *iter = self.make_iter(line, byte, None);
                Ok(true)
            }
            None => {
                *iter = self.start_iter();
                Ok(false)
            }
        }
    }

    /// Add toggle deltas for `tag` to `node` and all its ancestors,
    /// dropping summaries that reach zero toggles.
    pub(crate) fn adjust_toggle_count(&mut self, node: NodeId, tag: TagId, on: i64, off: i64) {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            let node = &mut self.nodes[current];
            let summary = node.summaries.entry(tag).or_default();
            summary.add(on, off);
            if summary.toggles == 0 {
                node.summaries.remove(&tag);
            }
            cursor = node.parent;
        }
    }

    fn insert_toggle(&mut self, line: LineId, byte: usize, tag: TagId, on: bool) {
        let index = self.lines[line].split_at(byte);
        let segment = if on {
            Segment::ToggleOn(tag)
        } else {
            Segment::ToggleOff(tag)
        };
        self.lines[line].segments.insert(index, segment);
        let parent = self.lines[line].parent;
        if on {
            self.adjust_toggle_count(parent, tag, 1, 0);
        } else {
            self.adjust_toggle_count(parent, tag, 0, 1);
        }
    }

    fn remove_toggle_at(&mut self, line: LineId, byte: usize, tag: TagId) {
        let mut position = 0;
        let mut found = None;
        for (index, segment) in self.lines[line].segments.iter().enumerate() {
            if position == byte && segment.toggle().is_some_and(|(t, _)| t == tag) {
                found = Some(index);
                break;
            }
            position += segment.byte_len();
            if position > byte {
                break;
            }
        }
        if let Some(index) = found {
            let segment = self.lines[line].segments.remove(index);
            let parent = self.lines[line].parent;
            match segment {
                Segment::ToggleOn(_) => self.adjust_toggle_count(parent, tag, -1, 0),
                _ => self.adjust_toggle_count(parent, tag, 0, -1),
            }
        }
    }

    /// Whether an odd number of `tag` toggles precede the character at
    /// `byte` of `line`.
    pub(crate) fn toggle_parity(&self, line: LineId, byte: usize, tag: TagId) -> bool {
        if !self.nodes[self.root].has_toggles(tag) {
            return false;
        }
        let mut count = 0;
        self.toggles_before(line, byte, |t, n| {
            if t == tag {
                count += n;
            }
        });
        count % 2 == 1
    }

    /// Report toggle counts, per tag, for everything before the character
    /// at `byte` of `line`. Toggles sitting at `byte` count as before it.
    fn toggles_before(&self, line: LineId, byte: usize, mut visit: impl FnMut(TagId, u32)) {
        let current = &self.lines[line];
        let (limit, _) = current.locate_byte(byte);
        for (tag, _) in current.segments[..limit].iter().filter_map(Segment::toggle) {
            visit(tag, 1);
        }
        let parent = current.parent;
        for &earlier in self.nodes[parent].lines() {
            if earlier == line {
                break;
            }
            for (tag, _) in self.lines[earlier].segments.iter().filter_map(Segment::toggle) {
                visit(tag, 1);
            }
        }
        let mut node = parent;
        while let Some(up) = self.nodes[node].parent {
            for &sibling in self.nodes[up].child_nodes() {
                if sibling == node {
                    break;
                }
                for (tag, summary) in &self.nodes[sibling].summaries {
                    visit(*tag, summary.toggles);
                }
            }
            node = up;
        }
    }

    /// First toggle of `tag` after `byte` of `line` (or at it, when
    /// `inclusive`).
    pub(crate) fn next_toggle(
        &self,
        tag: TagId,
        line: LineId,
        byte: usize,
        inclusive: bool,
    ) -> Option<(LineId, usize)> {
        let found = self.lines[line]
            .toggle_positions(tag)
            .find(|&at| at > byte || (inclusive && at == byte));
        if let Some(at) = found {
            return Some((line, at));
        }
        let parent = self.lines[line].parent;
        let position = self.line_position(line);
        for &later in &self.nodes[parent].lines()[position + 1..] {
            if let Some(at) = self.lines[later].toggle_positions(tag).next() {
                return Some((later, at));
            }
        }
        let mut node = parent;
        while let Some(up) = self.nodes[node].parent {
            let children = self.nodes[up].child_nodes();
            let position = children.iter().position(|child| *child == node)?;
            for &sibling in &children[position + 1..] {
                if self.nodes[sibling].has_toggles(tag) {
                    return self.first_toggle_under(sibling, tag);
                }
            }
            node = up;
        }
        None
    }

    /// Last toggle of `tag` strictly before `byte` of `line`.
    fn prev_toggle(&self, tag: TagId, line: LineId, byte: usize) -> Option<(LineId, usize)> {
        let found = self.lines[line]
            .toggle_positions(tag)
            .take_while(|&at| at < byte)
            .last();
        if let Some(at) = found {
            return Some((line, at));
        }
        let parent = self.lines[line].parent;
        let position = self.line_position(line);
        for &earlier in self.nodes[parent].lines()[..position].iter().rev() {
            if let Some(at) = self.lines[earlier].toggle_positions(tag).last() {
                return Some((earlier, at));
            }
        }
        let mut node = parent;
        while let Some(up) = self.nodes[node].parent {
            let children = self.nodes[up].child_nodes();
            let position = children.iter().position(|child| *child == node)?;
            for &sibling in children[..position].iter().rev() {
                if self.nodes[sibling].has_toggles(tag) {
                    return self.last_toggle_under(sibling, tag);
                }
            }
            node = up;
        }
        None
    }

    fn first_toggle_under(&self, mut node: NodeId, tag: TagId) -> Option<(LineId, usize)> {
        loop {
            match &self.nodes[node].children {
                Children::Nodes(children) => {
                    node = *children
                        .iter()
                        .find(|child| self.nodes[**child].has_toggles(tag))?;
                }
                Children::Lines(lines) => {
                    return lines.iter().find_map(|&line| {
                        self.lines[line]
                            .toggle_positions(tag)
                            .next()
                            .map(|at| (line, at))
                    });
                }
            }
        }
    }

    fn last_toggle_under(&self, mut node: NodeId, tag: TagId) -> Option<(LineId, usize)> {
        loop {
            match &self.nodes[node].children {
                Children::Nodes(children) => {
                    node = *children
                        .iter()
                        .rev()
                        .find(|child| self.nodes[**child].has_toggles(tag))?;
                }
                Children::Lines(lines) => {
                    return lines.iter().rev().find_map(|&line| {
                        self.lines[line]
                            .toggle_positions(tag)
                            .last()
                            .map(|at| (line, at))
                    });
                }
            }
        }
    }

    /// Lines holding at least one toggle of `tag`, in document order.
    fn lines_with_toggles(&self, tag: TagId) -> Vec<LineId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if !self.nodes[node].has_toggles(tag) {
                continue;
            }
            match &self.nodes[node].children {
                Children::Nodes(children) => stack.extend(children.iter().rev()),
                Children::Lines(lines) => found.extend(
                    lines
                        .iter()
                        .filter(|line| self.lines[**line].toggle_positions(tag).next().is_some()),
                ),
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::style::{Color, TextAttributes};

    fn tree_with(text: &str) -> TextBTree {
        let mut tree = TextBTree::new();
        let mut at = tree.start_iter();
        tree.insert_text(&mut at, text).unwrap();
        tree
    }

    fn tag_range(tree: &mut TextBTree, tag: TagId, from: usize, to: usize, apply: bool) {
        let start = tree.iter_at_char(from).unwrap();
        let end = tree.iter_at_char(to).unwrap();
        tree.apply_tag(&start, &end, tag, apply).unwrap();
    }

    fn tagged(tree: &TextBTree, tag: TagId) -> String {
        (0..tree.char_count())
            .map(|offset| {
                let iter = tree.iter_at_char(offset).unwrap();
                if tree.has_tag(&iter, tag).unwrap() { '#' } else { '.' }
            })
            .collect()
    }

    #[test]
    fn test_apply_and_query() {
        let mut tree = tree_with("hello world");
        let bold = tree.create_tag("bold", Style::bold()).unwrap();
        tag_range(&mut tree, bold, 2, 7, true);
        assert_eq!(tagged(&tree, bold), "..#####....");
        let root = tree.root;
        assert_eq!(tree.nodes[root].summaries[&bold].toggles, 2);
        assert_eq!(tree.nodes[root].summaries[&bold].balance, 0);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut tree = tree_with("hello world");
        let bold = tree.create_tag("bold", Style::bold()).unwrap();
        tag_range(&mut tree, bold, 2, 7, true);
        tag_range(&mut tree, bold, 2, 7, true);
        assert_eq!(tagged(&tree, bold), "..#####....");
        assert_eq!(tree.nodes[tree.root].summaries[&bold].toggles, 2);
    }

    #[test]
    fn test_adjacent_ranges_coalesce() {
        let mut tree = tree_with("hello world");
        let bold = tree.create_tag("bold", Style::bold()).unwrap();
        tag_range(&mut tree, bold, 0, 5, true);
        tag_range(&mut tree, bold, 5, 8, true);
        assert_eq!(tagged(&tree, bold), "########...");
        assert_eq!(tree.nodes[tree.root].summaries[&bold].toggles, 2);
    }

    #[test]
    fn test_remove_middle_splits_range() {
        let mut tree = tree_with("hello world");
        let bold = tree.create_tag("bold", Style::bold()).unwrap();
        tag_range(&mut tree, bold, 0, 11, true);
        tag_range(&mut tree, bold, 3, 6, false);
        assert_eq!(tagged(&tree, bold), "###...#####");
        tag_range(&mut tree, bold, 0, 11, false);
        assert_eq!(tagged(&tree, bold), "...........");
        assert!(!tree.nodes[tree.root].has_toggles(bold));
    }

    #[test]
    fn test_apply_across_lines() {
        let mut tree = tree_with("ab\ncd\nef");
        let tag = tree.create_tag("t", Style::NONE).unwrap();
        tag_range(&mut tree, tag, 1, 7, true);
        assert_eq!(tagged(&tree, tag), ".######.");
        tag_range(&mut tree, tag, 3, 5, false);
        assert_eq!(tagged(&tree, tag), ".##..##.");
    }

    #[test]
    fn test_tags_at_priority_order_and_style() {
        let mut tree = tree_with("abc");
        let low = tree
            .create_tag("low", Style::fg(Color::Indexed(1)).with_bold())
            .unwrap();
        let high = tree.create_tag("high", Style::fg(Color::Indexed(2))).unwrap();
        tag_range(&mut tree, high, 0, 3, true);
        tag_range(&mut tree, low, 1, 3, true);
        let iter = tree.iter_at_char(1).unwrap();
        assert_eq!(tree.tags_at(&iter).unwrap(), vec![low, high]);
        let style = tree.style_at(&iter).unwrap();
        assert_eq!(style.fg, Some(Color::Indexed(2)));
        assert!(style.attributes.contains(TextAttributes::BOLD));

        tree.set_tag_priority(low, 1).unwrap();
        assert_eq!(tree.tags_at(&iter).unwrap(), vec![high, low]);
        assert_eq!(tree.style_at(&iter).unwrap().fg, Some(Color::Indexed(1)));
    }

    #[test]
    fn test_intersects_range() {
        let mut tree = tree_with("0123456789");
        let tag = tree.create_tag("t", Style::NONE).unwrap();
        tag_range(&mut tree, tag, 4, 6, true);
        let range = |a: usize, b: usize| {
            let s = tree.iter_at_char(a).unwrap();
            let e = tree.iter_at_char(b).unwrap();
            tree.tag_intersects_range(tag, &s, &e).unwrap()
        };
        assert!(range(0, 5));
        assert!(range(5, 9));
        assert!(!range(0, 4));
        assert!(!range(6, 10));
        assert!(!range(5, 5));
    }

    #[test]
    fn test_toggle_navigation() {
        let mut tree = tree_with("0123456789");
        let tag = tree.create_tag("t", Style::NONE).unwrap();
        assert_eq!(tree.find_first_toggle(tag).unwrap(), None);
        tag_range(&mut tree, tag, 2, 4, true);
        tag_range(&mut tree, tag, 6, 8, true);

        let first = tree.find_first_toggle(tag).unwrap().unwrap();
        let last = tree.find_last_toggle(tag).unwrap().unwrap();
        assert_eq!(first.char_offset(&tree).unwrap(), 2);
        assert_eq!(last.char_offset(&tree).unwrap(), 8);

        let mut iter = tree.iter_at_char(2).unwrap();
        let mut stops = Vec::new();
        while tree.forward_to_tag_toggle(&mut iter, tag).unwrap() {
            stops.push(iter.char_offset(&tree).unwrap());
        }
        assert_eq!(stops, vec![4, 6, 8]);
        assert!(iter.is_end(&tree).unwrap());

        let mut stops = Vec::new();
        while tree.backward_to_tag_toggle(&mut iter, tag).unwrap() {
            stops.push(iter.char_offset(&tree).unwrap());
        }
        assert_eq!(stops, vec![8, 6, 4, 2]);
        assert!(iter.is_start(&tree).unwrap());
    }

    #[test]
    fn test_remove_tag_clears_document() {
        let mut tree = tree_with("hello\nworld");
        let tag = tree.create_tag("t", Style::NONE).unwrap();
        tag_range(&mut tree, tag, 1, 9, true);
        tree.remove_tag(tag).unwrap();
        assert_eq!(tree.tag(tag), Err(Error::TagNotFound));
        assert_eq!(tree.lookup_tag("t"), None);
        assert!(tree.nodes[tree.root].summaries.is_empty());
        let iter = tree.start_iter();
        assert_eq!(tree.has_tag(&iter, tag), Err(Error::TagNotFound));
        assert!(tree.tags_at(&iter).unwrap().is_empty());
    }

    #[test]
    fn test_remove_all_tags() {
        let mut tree = tree_with("abcdef");
        let a = tree.create_tag("a", Style::NONE).unwrap();
        let b = tree.create_anonymous_tag(Style::NONE);
        tag_range(&mut tree, a, 0, 6, true);
        tag_range(&mut tree, b, 2, 4, true);
        let start = tree.iter_at_char(1).unwrap();
        let end = tree.iter_at_char(5).unwrap();
        tree.remove_all_tags(&start, &end).unwrap();
        assert_eq!(tagged(&tree, a), "#....#");
        assert_eq!(tagged(&tree, b), "......");
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let mut tree = tree_with("abc");
        let tag = tree.create_tag("t", Style::NONE).unwrap();
        tree.remove_tag(tag).unwrap();
        let start = tree.start_iter();
        let end = tree.end_iter();
        assert_eq!(tree.apply_tag(&start, &end, tag, true), Err(Error::TagNotFound));
        assert_eq!(
            tree.tag_intersects_range(tag, &start, &end),
            Err(Error::TagNotFound)
        );
    }
}
