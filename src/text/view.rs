//! Per-view line dimension cache and the budgeted validator.
//!
//! Every registered view keeps a [`LineViewData`] per line. Nodes hold the
//! aggregate for each view (widest line, summed heights, valid only when
//! every line below is), so [`TextBTree::is_valid`] is answered at the
//! root and the first invalid line is found by descending only into
//! invalid subtrees.

use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_event, emit_log};
use crate::text::iter::TextIter;
use crate::text::layout::LineLayout;
use crate::text::line::LineContent;
use crate::text::node::Children;
use crate::text::{LineId, NodeId, TextBTree};
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

/// Identity of a view, chosen by the rendering layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Cached size of a line (or, on a node, of a subtree) in one view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineViewData {
    pub width: i32,
    pub height: i32,
    pub valid: bool,
}

impl LineViewData {
    /// Aggregate of nothing: zero-sized and valid.
    pub const EMPTY_VALID: Self = Self {
        width: 0,
        height: 0,
        valid: true,
    };

    pub(crate) fn absorb(&mut self, other: Self) {
        self.width = self.width.max(other.width);
        self.height = self.height.saturating_add(other.height);
        self.valid &= other.valid;
    }
}

/// Outcome of one [`TextBTree::validate`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidateResult {
    /// Top of the first validated line.
    pub y: i32,
    /// Cached height of the validated lines before the call.
    pub old_height: i32,
    /// Height of the validated lines now.
    pub new_height: i32,
    /// Number of lines laid out.
    pub lines: usize,
}

pub(crate) struct ViewEntry {
    pub(crate) layout: Box<dyn LineLayout>,
}

impl fmt::Debug for ViewEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewEntry").finish_non_exhaustive()
    }
}

impl TextBTree {
    /// Register a view. All of its lines start out invalid.
    pub fn add_view(&mut self, view: ViewId, layout: impl LineLayout + 'static) -> Result<()> {
        self.ensure_mutable()?;
        if self.views.contains_key(&view) {
            return Err(Error::ViewAlreadyRegistered(view));
        }
        self.views.insert(
            view,
            ViewEntry {
                layout: Box::new(layout),
            },
        );
        let sentinel = self.last_line;
        self.lines[sentinel]
            .views
            .insert(view, LineViewData::EMPTY_VALID);

        let mut order: Vec<(u32, NodeId)> = self
            .nodes
            .iter()
            .map(|(id, node)| (node.level, id))
            .collect();
        order.sort();
        for (_, node) in order {
            self.recompute_node_view(node, view);
        }
        emit_event("view-added", &format!("view={}", view.0));
        Ok(())
    }

    /// Unregister a view and drop every cache entry it owns.
    pub fn remove_view(&mut self, view: ViewId) -> Result<()> {
        self.ensure_mutable()?;
        if self.views.remove(&view).is_none() {
            return Err(Error::ViewNotRegistered(view));
        }
        for line in self.lines.values_mut() {
            line.views.remove(&view);
        }
        for node in self.nodes.values_mut() {
            node.views.remove(&view);
        }
        emit_event("view-removed", &format!("view={}", view.0));
        Ok(())
    }

    /// Registered views, in no particular order.
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.views.keys().copied()
    }

    /// Invalidate the lines spanned by `[start, end]` in every view.
    ///
    /// With `cursors_only`, cached sizes are kept and each view's layout
    /// is only told which lines need their cursors redrawn.
    pub fn invalidate_region(
        &mut self,
        start: &TextIter,
        end: &TextIter,
        cursors_only: bool,
    ) -> Result<()> {
        self.ensure_mutable()?;
        let (s, e) = self.ordered(start, end)?;
        if cursors_only {
            let first = self.line_number(s.line);
            let last = self.line_number(e.line);
            self.notify_cursors(first..=last);
        } else {
            self.invalidate_lines(s.line, e.line);
        }
        Ok(())
    }

    /// Whether every line has a valid size in `view`.
    pub fn is_valid(&self, view: ViewId) -> Result<bool> {
        self.require_view(view)?;
        Ok(self.nodes[self.root].view_data(view).valid)
    }

    /// Lay out invalid lines of `view`, starting at the first one, until
    /// `max_pixels` worth of height has been produced or the run of
    /// invalid lines ends. The line that exhausts the budget is completed,
    /// and at least one line is laid out per call. Returns `None` when the
    /// view was already valid.
    pub fn validate(&mut self, view: ViewId, max_pixels: i32) -> Result<Option<ValidateResult>> {
        self.ensure_mutable()?;
        self.require_view(view)?;
        let Some((first, y)) = self.first_invalid_line(view) else {
            return Ok(None);
        };

        let mut result = ValidateResult {
            y,
            old_height: 0,
            new_height: 0,
            lines: 0,
        };
        let mut remaining = max_pixels;
        let mut leaves = Vec::new();
        let mut line = first;
        loop {
            let (old, new) = self.layout_line(view, line);
            result.old_height = result.old_height.saturating_add(old.height);
            result.new_height = result.new_height.saturating_add(new.height);
            result.lines += 1;
            leaves.push(self.lines[line].parent);

            remaining = remaining.saturating_sub(new.height);
            if remaining <= 0 {
                break;
            }
            match self.next_line(line) {
                Some(next) if next != self.last_line && !self.line_is_valid(next, view) => {
                    line = next;
                }
                _ => break,
            }
        }
        self.recompute_view_paths(view, leaves);
        emit_log(
            LogLevel::Debug,
            &format!(
                "validated {} line(s) of view {} at y={}: {} -> {}",
                result.lines, view.0, result.y, result.old_height, result.new_height
            ),
        );
        Ok(Some(result))
    }

    /// Lay out one line of `view` if it is invalid.
    pub fn validate_line(&mut self, view: ViewId, line_number: usize) -> Result<()> {
        self.ensure_mutable()?;
        self.require_view(view)?;
        let line = self.line_at(line_number).ok_or(Error::OutOfRange {
            what: "line",
            index: line_number,
            len: self.line_count(),
        })?;
        if !self.line_is_valid(line, view) {
            self.layout_line(view, line);
            let parent = self.lines[line].parent;
            self.recompute_view_paths(view, vec![parent]);
        }
        Ok(())
    }

    /// Width of the widest line and total height of `view`, counting the
    /// last known size of invalid lines.
    pub fn view_size(&self, view: ViewId) -> Result<(i32, i32)> {
        self.require_view(view)?;
        let data = self.nodes[self.root].view_data(view);
        Ok((data.width, data.height))
    }

    /// Cached size of one line in `view`.
    pub fn line_view_data(&self, view: ViewId, line_number: usize) -> Result<LineViewData> {
        self.require_view(view)?;
        let line = self.line_at(line_number).ok_or(Error::OutOfRange {
            what: "line",
            index: line_number,
            len: self.line_count(),
        })?;
        Ok(self.lines[line].views.get(&view).copied().unwrap_or_default())
    }

    /// The line covering pixel row `y` of `view`, with that line's top.
    /// `None` when `y` is outside `0..height`.
    pub fn line_at_y(&self, view: ViewId, y: i32) -> Result<Option<(usize, i32)>> {
        self.require_view(view)?;
        if y < 0 || y >= self.nodes[self.root].view_data(view).height {
            return Ok(None);
        }
        let mut remaining = y;
        let mut top = 0;
        let mut number = 0;
        let mut node = self.root;
        loop {
            match &self.nodes[node].children {
                Children::Lines(lines) => {
                    for &line in lines {
                        let height = self.lines[line].views.get(&view).map_or(0, |d| d.height);
                        if remaining < height {
                            return Ok(Some((number, top)));
                        }
                        remaining -= height;
                        top = top.saturating_add(height);
                        number += 1;
                    }
                    return Ok(None);
                }
                Children::Nodes(children) => {
                    let mut next = None;
                    for &child in children {
                        let child_node = &self.nodes[child];
                        let height = child_node.view_data(view).height;
                        if remaining < height {
                            next = Some(child);
                            break;
                        }
                        remaining -= height;
                        top = top.saturating_add(height);
                        number += child_node.num_lines;
                    }
                    let Some(next) = next else {
                        return Ok(None);
                    };
                    node = next;
                }
            }
        }
    }

    /// Top of a line in `view`.
    pub fn find_line_top(&self, view: ViewId, line_number: usize) -> Result<i32> {
        self.require_view(view)?;
        let line = self.line_at(line_number).ok_or(Error::OutOfRange {
            what: "line",
            index: line_number,
            len: self.line_count(),
        })?;
        let parent = self.lines[line].parent;
        let mut top = 0i32;
        for &sibling in self.nodes[parent].lines() {
            if sibling == line {
                break;
            }
            let height = self.lines[sibling].views.get(&view).map_or(0, |d| d.height);
            top = top.saturating_add(height);
        }
        let mut node = parent;
        while let Some(up) = self.nodes[node].parent {
            for &sibling in self.nodes[up].child_nodes() {
                if sibling == node {
                    break;
                }
                top = top.saturating_add(self.nodes[sibling].view_data(view).height);
            }
            node = up;
        }
        Ok(top)
    }

    /// Mark `first..=last` invalid in every view and propagate upward.
    pub(crate) fn invalidate_lines(&mut self, first: LineId, last: LineId) {
        if self.views.is_empty() {
            return;
        }
        let views: Vec<_> = self.views.keys().copied().collect();
        let mut leaves = Vec::new();
        let mut line = first;
        loop {
            if line == self.last_line {
                break;
            }
            for &view in &views {
                self.lines[line].views.entry(view).or_default().valid = false;
            }
            let parent = self.lines[line].parent;
            if leaves.last() != Some(&parent) {
                leaves.push(parent);
            }
            if line == last {
                break;
            }
            match self.next_line(line) {
                Some(next) => line = next,
                None => break,
            }
        }
        for leaf in leaves {
            for &view in &views {
                let mut cursor = Some(leaf);
                while let Some(node) = cursor {
                    let data = self.nodes[node].views.entry(view).or_default();
                    if !data.valid {
                        break;
                    }
                    data.valid = false;
                    cursor = self.nodes[node].parent;
                }
            }
        }
    }

    /// Tell every view's layout that cursors on these lines changed.
    pub(crate) fn notify_cursors(&mut self, lines: RangeInclusive<usize>) {
        for entry in self.views.values_mut() {
            entry.layout.invalidate_cursors(lines.clone());
        }
    }

    fn require_view(&self, view: ViewId) -> Result<()> {
        if self.views.contains_key(&view) {
            Ok(())
        } else {
            Err(Error::ViewNotRegistered(view))
        }
    }

    fn line_is_valid(&self, line: LineId, view: ViewId) -> bool {
        self.lines[line].views.get(&view).is_some_and(|d| d.valid)
    }

    /// First invalid line of `view` and the summed height above it.
    fn first_invalid_line(&self, view: ViewId) -> Option<(LineId, i32)> {
        let mut node = self.root;
        let mut y = 0;
        if self.nodes[node].view_data(view).valid {
            return None;
        }
        loop {
            match &self.nodes[node].children {
                Children::Lines(lines) => {
                    for &line in lines {
                        let data = self.lines[line].views.get(&view).copied().unwrap_or_default();
                        if !data.valid {
                            return Some((line, y));
                        }
                        y = y.saturating_add(data.height);
                    }
                    return None;
                }
                Children::Nodes(children) => {
                    let mut next = None;
                    for &child in children {
                        let data = self.nodes[child].view_data(view);
                        if !data.valid {
                            next = Some(child);
                            break;
                        }
                        y = y.saturating_add(data.height);
                    }
                    node = next?;
                }
            }
        }
    }

    /// Run the view's layout on one line and store the result. Returns the
    /// old and new cache entries.
    fn layout_line(&mut self, view: ViewId, line: LineId) -> (LineViewData, LineViewData) {
        let old = self.lines[line].views.get(&view).copied().unwrap_or_default();
        let Some(entry) = self.views.get_mut(&view) else {
            return (old, old);
        };
        self.in_callback = true;
        let size = entry
            .layout
            .wrap(&LineContent::new(&self.lines[line].segments));
        self.in_callback = false;
        let new = LineViewData {
            width: size.width,
            height: size.height,
            valid: true,
        };
        self.lines[line].views.insert(view, new);
        (old, new)
    }

    /// Recompute one view's aggregate on every node above `leaves`.
    fn recompute_view_paths(&mut self, view: ViewId, leaves: Vec<NodeId>) {
        let mut seen = HashSet::new();
        for leaf in leaves {
            let mut cursor = Some(leaf);
            while let Some(node) = cursor {
                if !seen.insert(node) {
                    break;
                }
                cursor = self.nodes[node].parent;
            }
        }
        let mut order: Vec<NodeId> = seen.into_iter().collect();
        order.sort_by_key(|node| self.nodes[*node].level);
        for node in order {
            self.recompute_node_view(node, view);
        }
    }

    fn recompute_node_view(&mut self, id: NodeId, view: ViewId) {
        let mut total = LineViewData::EMPTY_VALID;
        match &self.nodes[id].children {
            Children::Lines(lines) => {
                for &line in lines {
                    total.absorb(self.lines[line].views.get(&view).copied().unwrap_or_default());
                }
            }
            Children::Nodes(children) => {
                for &child in children {
                    total.absorb(self.nodes[child].view_data(view));
                }
            }
        }
        self.nodes[id].views.insert(view, total);
    }
}
