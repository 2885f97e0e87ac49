//! The tree itself: structure, counts, text mutation and rebalancing.
//!
//! Every mutation follows the same shape: splice segment chains, collect
//! the level-0 nodes whose children changed, rebalance them, then recompute
//! aggregates (line and char counts, tag summaries, per-view layout) once
//! for every node on the affected paths, lowest level first.

use crate::config::TreeOptions;
use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_event, emit_log};
use crate::pool::Pool;
use crate::text::iter::TextIter;
use crate::text::line::Line;
use crate::text::mark::Mark;
use crate::text::node::{Children, Node, TagSummary};
use crate::text::segment::{MarkSegment, Segment};
use crate::text::tag::TagTable;
use crate::text::view::{LineViewData, ViewEntry, ViewId};
use crate::text::{LineId, MarkId, NodeId, TagId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Name of the insertion point mark.
pub const INSERT_MARK_NAME: &str = "insert";
/// Name of the selection bound mark.
pub const SELECTION_BOUND_MARK_NAME: &str = "selection_bound";

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// A rich-text document stored as a B-tree of lines.
///
/// A fresh tree holds one empty line. Every line ends with a newline; the
/// newline of the last line is hidden from offsets, so an empty document
/// has [`char_count`](Self::char_count) 0 and
/// [`line_count`](Self::line_count) 1.
///
/// # Examples
///
/// ```
/// use textbtree::TextBTree;
///
/// let mut tree = TextBTree::new();
/// let mut at = tree.start_iter();
/// tree.insert_text(&mut at, "hello\nworld").unwrap();
///
/// assert_eq!(tree.line_count(), 2);
/// assert_eq!(tree.iter_at_line_char(1, 0).unwrap().char_offset(&tree).unwrap(), 6);
/// assert_eq!(tree.text(), "hello\nworld");
/// ```
pub struct TextBTree {
    pub(crate) id: u64,
    pub(crate) options: TreeOptions,
    pub(crate) root: NodeId,
    pub(crate) nodes: Pool<Node>,
    pub(crate) lines: Pool<Line>,
    /// Content-free line after the last real line.
    pub(crate) last_line: LineId,
    pub(crate) marks: Pool<Mark>,
    pub(crate) mark_names: HashMap<String, MarkId>,
    pub(crate) insert_mark: MarkId,
    pub(crate) selection_bound_mark: MarkId,
    pub(crate) tags: TagTable,
    pub(crate) views: HashMap<ViewId, ViewEntry>,
    pub(crate) chars_changed_stamp: u64,
    pub(crate) segments_changed_stamp: u64,
    /// Set while a layout callback runs.
    pub(crate) in_callback: bool,
}

impl fmt::Debug for TextBTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBTree")
            .field("lines", &self.line_count())
            .field("chars", &self.char_count())
            .field("height", &(self.nodes[self.root].level + 1))
            .field("tags", &self.tags.len())
            .field("marks", &self.marks.len())
            .field("views", &self.views.len())
            .finish_non_exhaustive()
    }
}

impl Default for TextBTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBTree {
    /// Create an empty document with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    /// Create an empty document.
    #[must_use]
    pub fn with_options(options: TreeOptions) -> Self {
        let mut nodes = Pool::new();
        let mut lines = Pool::new();
        let mut marks = Pool::new();

        let root = nodes.alloc(Node::leaf(None));
        let first = lines.alloc(Line::new(root, Vec::new()));
        let last_line = lines.alloc(Line::new(root, Vec::new()));

        let insert_mark = marks.alloc(Mark::special(INSERT_MARK_NAME, first, true));
        let selection_bound_mark =
            marks.alloc(Mark::special(SELECTION_BOUND_MARK_NAME, first, false));
        lines[first].segments = vec![
            Segment::Mark(MarkSegment {
                mark: insert_mark,
                left_gravity: false,
            }),
            Segment::Mark(MarkSegment {
                mark: selection_bound_mark,
                left_gravity: false,
            }),
            Segment::text("\n"),
        ];
        nodes[root].children = Children::Lines(vec![first, last_line]);

        let mut mark_names = HashMap::new();
        mark_names.insert(INSERT_MARK_NAME.to_string(), insert_mark);
        mark_names.insert(SELECTION_BOUND_MARK_NAME.to_string(), selection_bound_mark);

        let mut tree = Self {
            id: NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            options,
            root,
            nodes,
            lines,
            last_line,
            marks,
            mark_names,
            insert_mark,
            selection_bound_mark,
            tags: TagTable::default(),
            views: HashMap::new(),
            chars_changed_stamp: 0,
            segments_changed_stamp: 0,
            in_callback: false,
        };
        tree.recompute_node(root);
        tree
    }

    /// Options the tree was built with.
    #[must_use]
    pub const fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Number of lines, excluding the internal sentinel.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.nodes[self.root].num_lines - 1
    }

    /// Number of characters, excluding the hidden final newline.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.nodes[self.root].num_chars - 1
    }

    /// Tree height; a tree whose root holds lines has height 1.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.nodes[self.root].level + 1
    }

    /// Whole document text, without the hidden final newline.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = String::new();
        let mut line = self.first_line();
        while line != self.last_line {
            for segment in &self.lines[line].segments {
                if let Segment::CharRun(run) = segment {
                    text.push_str(run.as_str());
                }
            }
            match self.next_line(line) {
                Some(next) => line = next,
                None => break,
            }
        }
        text.pop();
        text
    }

    /// Text between two iterators, in either order.
    pub fn get_text(&self, start: &TextIter, end: &TextIter) -> Result<String> {
        let (start, end) = self.ordered(start, end)?;
        if start.line == end.line {
            let text = self.lines[start.line].text();
            return Ok(text[start.byte_index..end.byte_index].to_string());
        }
        let mut text = self.lines[start.line].text().split_off(start.byte_index);
        let mut line = self.next_line(start.line);
        while let Some(current) = line {
            if current == end.line {
                break;
            }
            text.push_str(&self.lines[current].text());
            line = self.next_line(current);
        }
        let last = self.lines[end.line].text();
        text.push_str(&last[..end.byte_index]);
        Ok(text)
    }

    /// Text of one line, including its newline unless it is the last line.
    pub fn line_text(&self, line_number: usize) -> Result<String> {
        let line = self.line_at(line_number).ok_or(Error::OutOfRange {
            what: "line",
            index: line_number,
            len: self.line_count(),
        })?;
        let mut text = self.lines[line].text();
        if line_number + 1 == self.line_count() {
            text.pop();
        }
        Ok(text)
    }

    /// Insert `text` at `iter`. On return `iter` points just past the
    /// inserted text.
    ///
    /// Marks and toggles at the insertion point end up before the new text
    /// when they have left gravity and after it otherwise.
    pub fn insert_text(&mut self, iter: &mut TextIter, text: &str) -> Result<()> {
        self.ensure_mutable()?;
        let at = self.resolve(iter)?;
        if text.is_empty() {
            *iter = at;
            return Ok(());
        }

        let start_line = at.line;
        let mut line = start_line;
        let mut index = self.lines[line].split_at(at.byte_index);
        let mut dirty = vec![self.lines[line].parent];
        let mut new_lines = 0usize;

        for chunk in text.split_inclusive('\n') {
            self.lines[line].segments.insert(index, Segment::text(chunk));
            index += 1;
            if chunk.ends_with('\n') {
                let tail = self.lines[line].segments.split_off(index);
                line = self.insert_line(line, tail);
                dirty.push(self.lines[line].parent);
                index = 0;
                new_lines += 1;
            }
        }

        self.lines[start_line].canonicalize();
        if line != start_line {
            self.lines[line].canonicalize();
        }
        self.chars_changed();
        self.fixup(dirty);
        self.invalidate_lines(start_line, line);

        let inserted = text.chars().count();
        let end_offset = at.char_offset + inserted;
        *iter = self.iter_at_char(end_offset)?;
        emit_event(
            "insert-text",
            &format!(
                "offset={} chars={inserted} lines={new_lines}",
                at.char_offset
            ),
        );
        self.after_mutation();
        Ok(())
    }

    /// Delete the text between two iterators, in either order. Both
    /// iterators end up at the deletion point.
    ///
    /// Marks and toggles inside the range survive and are relinked at the
    /// deletion point, left-gravity ones first.
    pub fn delete_range(&mut self, start: &mut TextIter, end: &mut TextIter) -> Result<()> {
        self.ensure_mutable()?;
        let (s, e) = self.ordered(start, end)?;
        if s.char_offset == e.char_offset {
            *start = s;
            *end = s;
            return Ok(());
        }

        let start_line = s.line;
        self.invalidate_lines(start_line, start_line);

        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut keep = |segment: Segment| match segment {
            Segment::CharRun(_) => {}
            other if other.left_gravity() => left.push(other),
            other => right.push(other),
        };

        let mut dirty = vec![self.lines[start_line].parent];
        if s.line == e.line {
            let line = &mut self.lines[start_line];
            let from = line.split_at(s.byte_index);
            let to = line.split_at(e.byte_index);
            let removed: Vec<Segment> = line.segments.drain(from..to).collect();
            removed.into_iter().for_each(&mut keep);
            let line = &mut self.lines[start_line];
            let survivors = left.into_iter().chain(right);
            line.segments.splice(from..from, survivors);
        } else {
            let from = self.lines[start_line].split_at(s.byte_index);
            let tail = self.lines[start_line].segments.split_off(from);
            tail.into_iter().for_each(&mut keep);

            let mut doomed = Vec::new();
            let mut cursor = self.next_line(start_line);
            while let Some(current) = cursor {
                if current == e.line {
                    break;
                }
                doomed.push(current);
                cursor = self.next_line(current);
            }
            for &line in &doomed {
                let segments = std::mem::take(&mut self.lines[line].segments);
                segments.into_iter().for_each(&mut keep);
            }

            let to = self.lines[e.line].split_at(e.byte_index);
            let rest = self.lines[e.line].segments.split_off(to);
            let head = std::mem::take(&mut self.lines[e.line].segments);
            head.into_iter().for_each(&mut keep);
            doomed.push(e.line);

            let line = &mut self.lines[start_line];
            line.segments.extend(left);
            line.segments.extend(right);
            line.segments.extend(rest);
            let moved: Vec<MarkId> = line.marks().collect();
            for mark in moved {
                self.marks[mark].line = start_line;
            }

            self.carry_view_heights(start_line, &doomed);
            for line in doomed {
                dirty.push(self.unlink_line(line));
                self.lines.free(line);
            }
        }

        self.lines[start_line].canonicalize();
        self.chars_changed();
        self.fixup(dirty);

        *start = self.iter_at_char(s.char_offset)?;
        *end = *start;
        emit_event(
            "delete-range",
            &format!(
                "offset={} chars={}",
                s.char_offset,
                e.char_offset - s.char_offset
            ),
        );
        self.after_mutation();
        Ok(())
    }

    /// Fold the cached heights of lines being merged away into the
    /// surviving line, which stays invalid.
    fn carry_view_heights(&mut self, survivor: LineId, doomed: &[LineId]) {
        let views: Vec<ViewId> = self.views.keys().copied().collect();
        for view in views {
            let mut width = 0;
            let mut height: i32 = 0;
            for &line in doomed {
                if let Some(data) = self.lines[line].views.get(&view) {
                    width = width.max(data.width);
                    height = height.saturating_add(data.height);
                }
            }
            if height > 0 || width > 0 {
                let data = self.lines[survivor].views.entry(view).or_default();
                data.width = data.width.max(width);
                data.height = data.height.saturating_add(height);
                data.valid = false;
            }
        }
    }

    /// Link a new line holding `segments` right after `after`.
    pub(crate) fn insert_line(&mut self, after: LineId, segments: Vec<Segment>) -> LineId {
        let parent = self.lines[after].parent;
        let line = self.lines.alloc(Line::new(parent, segments));
        let moved: Vec<MarkId> = self.lines[line].marks().collect();
        for mark in moved {
            self.marks[mark].line = line;
        }
        let position = self.line_position(after);
        if let Children::Lines(lines) = &mut self.nodes[parent].children {
            lines.insert(position + 1, line);
        }
        line
    }

    /// Unlink a line from its parent, returning the parent.
    fn unlink_line(&mut self, line: LineId) -> NodeId {
        let parent = self.lines[line].parent;
        if let Children::Lines(lines) = &mut self.nodes[parent].children {
            lines.retain(|l| *l != line);
        }
        parent
    }

    /// Remove one segment from a line and restore the chain's canonical
    /// form. Toggle removal is reflected in the ancestors' summaries.
    pub(crate) fn remove_segment(&mut self, line: LineId, index: usize) -> Segment {
        let segment = self.lines[line].segments.remove(index);
        if let Some((tag, on)) = segment.toggle() {
            let parent = self.lines[line].parent;
            if on {
                self.adjust_toggle_count(parent, tag, -1, 0);
            } else {
                self.adjust_toggle_count(parent, tag, 0, -1);
            }
        }
        self.cleanup_line(line);
        self.segments_changed();
        segment
    }

    /// Canonicalize a line, adjusting summaries for any toggles cancelled.
    pub(crate) fn cleanup_line(&mut self, line: LineId) {
        let before = self.lines[line].toggle_counts();
        self.lines[line].canonicalize();
        let after = self.lines[line].toggle_counts();
        let parent = self.lines[line].parent;
        for (tag, (on, off)) in before {
            let (now_on, now_off) = after.get(&tag).copied().unwrap_or_default();
            if (on, off) != (now_on, now_off) {
                self.adjust_toggle_count(
                    parent,
                    tag,
                    i64::from(now_on) - i64::from(on),
                    i64::from(now_off) - i64::from(off),
                );
            }
        }
    }

    pub(crate) fn chars_changed(&mut self) {
        self.chars_changed_stamp += 1;
        self.segments_changed_stamp += 1;
    }

    pub(crate) fn segments_changed(&mut self) {
        self.segments_changed_stamp += 1;
    }

    pub(crate) fn ensure_mutable(&self) -> Result<()> {
        if self.in_callback {
            emit_log(LogLevel::Warn, "mutation rejected: layout callback running");
            return Err(Error::ReentrantMutation);
        }
        Ok(())
    }

    pub(crate) fn after_mutation(&self) {
        if self.options.checks_enabled() {
            if let Err(violation) = self.check() {
                panic!("text tree corrupted: {violation}");
            }
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub(crate) fn first_line(&self) -> LineId {
        self.first_line_under(self.root).unwrap_or(self.last_line)
    }

    pub(crate) fn first_line_under(&self, mut node: NodeId) -> Option<LineId> {
        loop {
            match &self.nodes[node].children {
                Children::Lines(lines) => return lines.first().copied(),
                Children::Nodes(nodes) => node = *nodes.first()?,
            }
        }
    }

    pub(crate) fn last_line_under(&self, mut node: NodeId) -> Option<LineId> {
        loop {
            match &self.nodes[node].children {
                Children::Lines(lines) => return lines.last().copied(),
                Children::Nodes(nodes) => node = *nodes.last()?,
            }
        }
    }

    /// The last line holding text.
    pub(crate) fn last_real_line(&self) -> LineId {
        self.prev_line(self.last_line).unwrap_or(self.last_line)
    }

    pub(crate) fn line_position(&self, line: LineId) -> usize {
        let parent = self.lines[line].parent;
        let position = self.nodes[parent]
            .lines()
            .iter()
            .position(|l| *l == line);
        debug_assert!(position.is_some(), "line {line:?} missing from its parent");
        position.unwrap_or(0)
    }

    fn node_position(&self, parent: NodeId, node: NodeId) -> usize {
        let position = self.nodes[parent]
            .child_nodes()
            .iter()
            .position(|n| *n == node);
        debug_assert!(position.is_some(), "node {node:?} missing from {parent:?}");
        position.unwrap_or(0)
    }

    pub(crate) fn next_line(&self, line: LineId) -> Option<LineId> {
        let parent = self.lines[line].parent;
        let siblings = self.nodes[parent].lines();
        let position = self.line_position(line);
        if let Some(next) = siblings.get(position + 1) {
            return Some(*next);
        }
        let mut node = parent;
        loop {
            let up = self.nodes[node].parent?;
            let position = self.node_position(up, node);
            if let Some(next) = self.nodes[up].child_nodes().get(position + 1) {
                return self.first_line_under(*next);
            }
            node = up;
        }
    }

    pub(crate) fn prev_line(&self, line: LineId) -> Option<LineId> {
        let parent = self.lines[line].parent;
        let position = self.line_position(line);
        if position > 0 {
            return Some(self.nodes[parent].lines()[position - 1]);
        }
        let mut node = parent;
        loop {
            let up = self.nodes[node].parent?;
            let position = self.node_position(up, node);
            if position > 0 {
                return self.last_line_under(self.nodes[up].child_nodes()[position - 1]);
            }
            node = up;
        }
    }

    /// Zero-based number of a line.
    pub(crate) fn line_number(&self, line: LineId) -> usize {
        let parent = self.lines[line].parent;
        let mut number = self.line_position(line);
        let mut node = parent;
        while let Some(up) = self.nodes[node].parent {
            for &sibling in self.nodes[up].child_nodes() {
                if sibling == node {
                    break;
                }
                number += self.nodes[sibling].num_lines;
            }
            node = up;
        }
        number
    }

    /// Line by number, descending by per-node line counts. The sentinel is
    /// never returned.
    pub(crate) fn line_at(&self, number: usize) -> Option<LineId> {
        if number >= self.line_count() {
            return None;
        }
        let mut remaining = number;
        let mut node = self.root;
        loop {
            match &self.nodes[node].children {
                Children::Lines(lines) => return lines.get(remaining).copied(),
                Children::Nodes(children) => {
                    let mut next = None;
                    for &child in children {
                        let count = self.nodes[child].num_lines;
                        if remaining < count {
                            next = Some(child);
                            break;
                        }
                        remaining -= count;
                    }
                    node = next?;
                }
            }
        }
    }

    /// Global offset of a line's first character.
    pub(crate) fn line_char_start(&self, line: LineId) -> usize {
        let parent = self.lines[line].parent;
        let mut offset = 0;
        for &sibling in self.nodes[parent].lines() {
            if sibling == line {
                break;
            }
            offset += self.lines[sibling].char_len();
        }
        let mut node = parent;
        while let Some(up) = self.nodes[node].parent {
            for &sibling in self.nodes[up].child_nodes() {
                if sibling == node {
                    break;
                }
                offset += self.nodes[sibling].num_chars;
            }
            node = up;
        }
        offset
    }

    /// Line containing a global char offset, with that line's start offset.
    pub(crate) fn line_at_char(&self, offset: usize) -> Option<(LineId, usize)> {
        let mut remaining = offset;
        let mut start = 0;
        let mut node = self.root;
        loop {
            match &self.nodes[node].children {
                Children::Lines(lines) => {
                    for &line in lines {
                        let len = self.lines[line].char_len();
                        if remaining < len {
                            return Some((line, start));
                        }
                        remaining -= len;
                        start += len;
                    }
                    return None;
                }
                Children::Nodes(children) => {
                    let mut next = None;
                    for &child in children {
                        let len = self.nodes[child].num_chars;
                        if remaining < len {
                            next = Some(child);
                            break;
                        }
                        remaining -= len;
                        start += len;
                    }
                    node = next?;
                }
            }
        }
    }

    /// Document order of two (line, byte) positions.
    pub(crate) fn compare_positions(&self, a: (LineId, usize), b: (LineId, usize)) -> Ordering {
        if a.0 == b.0 {
            return a.1.cmp(&b.1);
        }
        self.line_number(a.0).cmp(&self.line_number(b.0))
    }

    // ------------------------------------------------------------------
    // Rebalancing and aggregates
    // ------------------------------------------------------------------

    /// Rebalance every dirty node, then recompute aggregates once for each
    /// node on the paths from the touched nodes to the root.
    pub(crate) fn fixup(&mut self, dirty: Vec<NodeId>) {
        let mut touched = Vec::new();
        for node in dirty {
            self.rebalance(node, &mut touched);
        }
        self.recompute_paths(touched);
    }

    pub(crate) fn recompute_paths(&mut self, from: Vec<NodeId>) {
        let mut seen = HashSet::new();
        for node in from {
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if !self.nodes.contains(current) || !seen.insert(current) {
                    break;
                }
                cursor = self.nodes[current].parent;
            }
        }
        let mut order: Vec<NodeId> = seen.into_iter().collect();
        order.sort_by_key(|node| self.nodes[*node].level);
        for node in order {
            self.recompute_node(node);
        }
    }

    /// Recompute a node's aggregates from its children.
    pub(crate) fn recompute_node(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let mut num_lines = 0;
        let mut num_chars = 0;
        let mut summaries: HashMap<TagId, TagSummary> = HashMap::new();
        let mut views: HashMap<ViewId, LineViewData> = self
            .views
            .keys()
            .map(|view| (*view, LineViewData::EMPTY_VALID))
            .collect();

        match &node.children {
            Children::Lines(lines) => {
                for &line in lines {
                    let line = &self.lines[line];
                    num_lines += 1;
                    num_chars += line.char_len();
                    for (tag, (on, off)) in line.toggle_counts() {
                        summaries
                            .entry(tag)
                            .or_default()
                            .add(i64::from(on), i64::from(off));
                    }
                    for (view, total) in &mut views {
                        total.absorb(line.views.get(view).copied().unwrap_or_default());
                    }
                }
            }
            Children::Nodes(children) => {
                for &child in children {
                    let child = &self.nodes[child];
                    num_lines += child.num_lines;
                    num_chars += child.num_chars;
                    for (tag, summary) in &child.summaries {
                        let total = summaries.entry(*tag).or_default();
                        total.toggles += summary.toggles;
                        total.balance += summary.balance;
                    }
                    for (view, total) in &mut views {
                        total.absorb(child.view_data(*view));
                    }
                }
            }
        }
        summaries.retain(|_, summary| summary.toggles > 0);

        let node = &mut self.nodes[id];
        node.num_lines = num_lines;
        node.num_chars = num_chars;
        node.summaries = summaries;
        node.views = views;
    }

    fn rebalance(&mut self, node: NodeId, touched: &mut Vec<NodeId>) {
        let min = self.options.min_children();
        let max = self.options.max_children();
        let mut node = node;
        loop {
            if !self.nodes.contains(node) {
                return;
            }
            touched.push(node);

            if self.nodes[node].num_children() > max {
                node = self.split_node(node, min, max, touched);
            }

            while self.nodes[node].num_children() < min {
                let Some(parent) = self.nodes[node].parent else {
                    if self.nodes[node].level > 0 && self.nodes[node].num_children() == 1 {
                        match self.collapse_root(node) {
                            Some(child) => {
                                node = child;
                                continue;
                            }
                            None => break,
                        }
                    }
                    break;
                };
                if self.nodes[parent].num_children() < 2 {
                    self.rebalance(parent, touched);
                    continue;
                }
                node = self.merge_with_sibling(node, parent, max, touched);
            }

            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => return,
            }
        }
    }

    /// Split `node` until no piece exceeds `max`, growing a new root when
    /// needed. Returns the last piece.
    fn split_node(
        &mut self,
        mut node: NodeId,
        min: usize,
        max: usize,
        touched: &mut Vec<NodeId>,
    ) -> NodeId {
        loop {
            let parent = match self.nodes[node].parent {
                Some(parent) => parent,
                None => {
                    let level = self.nodes[node].level + 1;
                    let root = self.nodes.alloc(Node::with_children(
                        None,
                        level,
                        Children::Nodes(vec![node]),
                    ));
                    self.nodes[node].parent = Some(root);
                    self.root = root;
                    touched.push(root);
                    emit_log(LogLevel::Debug, &format!("tree grew to height {}", level + 1));
                    root
                }
            };
            let level = self.nodes[node].level;
            let tail = self.nodes[node].children.split_off(min);
            let sibling = self
                .nodes
                .alloc(Node::with_children(Some(parent), level, tail));
            self.adopt_children(sibling);
            let position = self.node_position(parent, node);
            if let Children::Nodes(children) = &mut self.nodes[parent].children {
                children.insert(position + 1, sibling);
            }
            touched.push(sibling);
            emit_log(
                LogLevel::Debug,
                &format!("split level-{level} node {node:?} into {sibling:?}"),
            );
            if self.nodes[sibling].num_children() <= max {
                return sibling;
            }
            node = sibling;
        }
    }

    /// Merge `node` with a neighbour, or share children evenly when the
    /// union would overflow. Returns the surviving left node.
    fn merge_with_sibling(
        &mut self,
        node: NodeId,
        parent: NodeId,
        max: usize,
        touched: &mut Vec<NodeId>,
    ) -> NodeId {
        let siblings = self.nodes[parent].child_nodes();
        let position = self.node_position(parent, node);
        let (left, right) = if position + 1 < siblings.len() {
            (node, siblings[position + 1])
        } else {
            (siblings[position - 1], node)
        };

        let moved = self.nodes[right].children.take();
        self.nodes[left].children.append(moved);
        let total = self.nodes[left].num_children();
        if total <= max {
            if let Children::Nodes(children) = &mut self.nodes[parent].children {
                children.retain(|child| *child != right);
            }
            self.nodes.free(right);
            emit_log(
                LogLevel::Debug,
                &format!("merged node {right:?} into {left:?}"),
            );
        } else {
            let back = self.nodes[left].children.split_off(total.div_ceil(2));
            self.nodes[right].children = back;
            self.adopt_children(right);
            touched.push(right);
        }
        self.adopt_children(left);
        touched.push(left);
        left
    }

    /// Replace a root that has a single child node by that child.
    fn collapse_root(&mut self, root: NodeId) -> Option<NodeId> {
        let child = *self.nodes[root].child_nodes().first()?;
        self.nodes[child].parent = None;
        self.root = child;
        self.nodes.free(root);
        emit_log(
            LogLevel::Debug,
            &format!("tree shrank to height {}", self.nodes[child].level + 1),
        );
        Some(child)
    }

    fn adopt_children(&mut self, node: NodeId) {
        match &self.nodes[node].children {
            Children::Lines(lines) => {
                for &line in lines {
                    self.lines[line].parent = node;
                }
            }
            Children::Nodes(children) => {
                let children = children.clone();
                for child in children {
                    self.nodes[child].parent = Some(node);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsistencyChecks;

    fn small_tree() -> TextBTree {
        TextBTree::with_options(
            TreeOptions::new()
                .with_min_children(2)
                .with_consistency_checks(ConsistencyChecks::Always),
        )
    }

    fn insert_at(tree: &mut TextBTree, offset: usize, text: &str) {
        let mut at = tree.iter_at_char(offset).unwrap();
        tree.insert_text(&mut at, text).unwrap();
    }

    fn delete(tree: &mut TextBTree, from: usize, to: usize) {
        let mut start = tree.iter_at_char(from).unwrap();
        let mut end = tree.iter_at_char(to).unwrap();
        tree.delete_range(&mut start, &mut end).unwrap();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "missing from its parent")]
    fn test_detached_line_position_is_loud() {
        let mut tree = small_tree();
        insert_at(&mut tree, 0, "a\nb\nc\nd");
        let first = tree.first_line();
        let other_leaf = tree.lines[tree.last_line].parent;
        assert_ne!(tree.lines[first].parent, other_leaf);
        tree.lines[first].parent = other_leaf;
        let _ = tree.line_position(first);
    }

    #[test]
    fn test_empty_tree() {
        let tree = TextBTree::new();
        assert_eq!(tree.line_count(), 1);
        assert_eq!(tree.char_count(), 0);
        assert_eq!(tree.text(), "");
        assert_eq!(tree.height(), 1);
        tree.check().unwrap();
    }

    #[test]
    fn test_insert_moves_iter_past_text() {
        let mut tree = TextBTree::new();
        let mut at = tree.start_iter();
        tree.insert_text(&mut at, "hello\nworld").unwrap();
        assert_eq!(tree.line_count(), 2);
        assert_eq!(tree.char_count(), 11);
        assert_eq!(at.char_offset(&tree).unwrap(), 11);
        assert_eq!(tree.line_text(0).unwrap(), "hello\n");
        assert_eq!(tree.line_text(1).unwrap(), "world");
    }

    #[test]
    fn test_insert_in_middle_of_run() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "held");
        insert_at(&mut tree, 2, "llo wor");
        assert_eq!(tree.text(), "hello world");
        // The split halves merge back around the new text.
        let line = tree.first_line();
        assert_eq!(tree.lines[line].segments[0], Segment::text("hello world"));
    }

    #[test]
    fn test_insert_trailing_newline() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "a\n");
        assert_eq!(tree.line_count(), 2);
        assert_eq!(tree.text(), "a\n");
        assert_eq!(tree.line_text(1).unwrap(), "");
    }

    #[test]
    fn test_get_text_across_lines() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "one\ntwo\nthree");
        let start = tree.iter_at_char(2).unwrap();
        let end = tree.iter_at_char(10).unwrap();
        assert_eq!(tree.get_text(&start, &end).unwrap(), "e\ntwo\nth");
        assert_eq!(tree.get_text(&end, &start).unwrap(), "e\ntwo\nth");
    }

    #[test]
    fn test_delete_within_line() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "hello world");
        delete(&mut tree, 5, 11);
        assert_eq!(tree.text(), "hello");
    }

    #[test]
    fn test_delete_across_lines_merges() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "one\ntwo\nthree\nfour");
        delete(&mut tree, 2, 10);
        assert_eq!(tree.text(), "onree\nfour");
        assert_eq!(tree.line_count(), 2);
    }

    #[test]
    fn test_delete_sets_both_iters() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "abcdef");
        let mut start = tree.iter_at_char(4).unwrap();
        let mut end = tree.iter_at_char(1).unwrap();
        tree.delete_range(&mut start, &mut end).unwrap();
        assert_eq!(tree.text(), "aef");
        assert_eq!(start.char_offset(&tree).unwrap(), 1);
        assert_eq!(end.char_offset(&tree).unwrap(), 1);
    }

    #[test]
    fn test_delete_everything() {
        let mut tree = TextBTree::new();
        insert_at(&mut tree, 0, "a\nb\nc\n");
        let mut start = tree.start_iter();
        let mut end = tree.end_iter();
        tree.delete_range(&mut start, &mut end).unwrap();
        assert_eq!(tree.text(), "");
        assert_eq!(tree.line_count(), 1);
    }

    #[test]
    fn test_many_lines_grow_and_shrink() {
        let mut tree = small_tree();
        for i in 0..200 {
            let end = tree.char_count();
            insert_at(&mut tree, end, &format!("line {i}\n"));
        }
        assert_eq!(tree.line_count(), 201);
        assert!(tree.height() > 3);
        for number in [0, 57, 200] {
            let line = tree.line_at(number).unwrap();
            assert_eq!(tree.line_number(line), number);
        }

        let mut start = tree.iter_at_line(3).unwrap();
        let mut end = tree.iter_at_line(190).unwrap();
        tree.delete_range(&mut start, &mut end).unwrap();
        assert_eq!(tree.line_count(), 14);
        assert_eq!(tree.line_text(3).unwrap(), "line 190\n");

        let mut start = tree.start_iter();
        let mut end = tree.end_iter();
        tree.delete_range(&mut start, &mut end).unwrap();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.line_count(), 1);
    }

    #[test]
    fn test_line_text_out_of_range() {
        let tree = TextBTree::new();
        assert_eq!(
            tree.line_text(1),
            Err(Error::OutOfRange {
                what: "line",
                index: 1,
                len: 1
            })
        );
    }

    #[test]
    fn test_reentrant_mutation_rejected() {
        let mut tree = TextBTree::new();
        tree.in_callback = true;
        let mut at = tree.start_iter();
        assert_eq!(tree.insert_text(&mut at, "x"), Err(Error::ReentrantMutation));
        tree.in_callback = false;
        tree.insert_text(&mut at, "x").unwrap();
        assert_eq!(tree.text(), "x");
    }

    #[test]
    fn test_trees_have_distinct_ids() {
        let a = TextBTree::new();
        let b = TextBTree::new();
        assert_ne!(a.id, b.id);
    }
}
