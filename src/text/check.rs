//! Consistency checking and a readable dump of the tree.

use crate::error::InvariantViolation;
use crate::text::line::Line;
use crate::text::node::{Children, TagSummary};
use crate::text::segment::Segment;
use crate::text::view::LineViewData;
use crate::text::{LineId, MarkId, NodeId, TagId, TextBTree};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

type CheckResult = std::result::Result<(), InvariantViolation>;

fn fail(message: String) -> CheckResult {
    Err(InvariantViolation(message))
}

impl TextBTree {
    /// Verify every structural invariant of the tree.
    ///
    /// This walks the whole document, so it is meant for tests and for the
    /// post-mutation checks enabled by
    /// [`ConsistencyChecks`](crate::ConsistencyChecks).
    pub fn check(&self) -> CheckResult {
        let root = &self.nodes[self.root];
        if root.parent.is_some() {
            return fail(format!("root {:?} has a parent", self.root));
        }
        if self.last_line_under(self.root) != Some(self.last_line) {
            return fail("sentinel is not the last line".to_string());
        }
        let mut seen_marks = HashSet::new();
        self.check_node(self.root, &mut seen_marks)?;

        if seen_marks.len() != self.marks.len() {
            return fail(format!(
                "{} marks live, {} linked",
                self.marks.len(),
                seen_marks.len()
            ));
        }
        for (name, mark) in &self.mark_names {
            if self.marks.get(*mark).and_then(|m| m.name()) != Some(name.as_str()) {
                return fail(format!("mark name {name:?} maps to {mark:?}"));
            }
        }
        for (tag, summary) in &root.summaries {
            if summary.balance != 0 {
                return fail(format!("tag {tag:?} has balance {}", summary.balance));
            }
        }
        self.check_toggle_order()
    }

    fn check_node(&self, id: NodeId, seen_marks: &mut HashSet<MarkId>) -> CheckResult {
        let node = &self.nodes[id];
        let count = node.num_children();
        let max = self.options.max_children();
        if count > max {
            return fail(format!("node {id:?} has {count} children, max {max}"));
        }
        if node.parent.is_some() && count < self.options.min_children() {
            return fail(format!("node {id:?} has {count} children"));
        }
        if node.parent.is_none() && node.level > 0 && count < 2 {
            return fail(format!("root {id:?} has a single child"));
        }

        let mut num_lines = 0;
        let mut num_chars = 0;
        let mut summaries: HashMap<TagId, TagSummary> = HashMap::new();
        let mut views: HashMap<_, _> = self
            .views
            .keys()
            .map(|view| (*view, LineViewData::EMPTY_VALID))
            .collect();

        match &node.children {
            Children::Lines(lines) => {
                if node.level != 0 {
                    return fail(format!("node {id:?} holds lines at level {}", node.level));
                }
                for &line_id in lines {
                    let Some(line) = self.lines.get(line_id) else {
                        return fail(format!("node {id:?} links freed line {line_id:?}"));
                    };
                    if line.parent != id {
                        return fail(format!("line {line_id:?} has the wrong parent"));
                    }
                    self.check_line(line_id, line, seen_marks)?;
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
                for &child_id in children {
                    let Some(child) = self.nodes.get(child_id) else {
                        return fail(format!("node {id:?} links freed node {child_id:?}"));
                    };
                    if child.parent != Some(id) {
                        return fail(format!("node {child_id:?} has the wrong parent"));
                    }
                    if child.level + 1 != node.level {
                        return fail(format!("node {child_id:?} is at the wrong level"));
                    }
                    self.check_node(child_id, seen_marks)?;
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

        if (num_lines, num_chars) != (node.num_lines, node.num_chars) {
            return fail(format!(
                "node {id:?} counts {} lines {} chars, children hold {num_lines} and {num_chars}",
                node.num_lines, node.num_chars
            ));
        }
        if let Some((tag, _)) = node.summaries.iter().find(|(_, s)| s.toggles == 0) {
            return fail(format!("node {id:?} keeps an empty summary for {tag:?}"));
        }
        if summaries != node.summaries {
            return fail(format!("node {id:?} tag summaries are stale"));
        }
        if views != node.views {
            return fail(format!("node {id:?} view aggregates are stale"));
        }
        Ok(())
    }

    fn check_line(&self, id: LineId, line: &Line, seen_marks: &mut HashSet<MarkId>) -> CheckResult {
        if id == self.last_line {
            if !line.segments.is_empty() {
                return fail("sentinel line has content".to_string());
            }
            for view in self.views.keys() {
                if line.views.get(view) != Some(&LineViewData::EMPTY_VALID) {
                    return fail(format!("sentinel is not valid in view {}", view.0));
                }
            }
            return Ok(());
        }

        if !line.ends_with_newline() {
            return fail(format!("line {id:?} does not end with a newline"));
        }
        let text = line.text();
        if text.find('\n') != Some(text.len() - 1) {
            return fail(format!("line {id:?} holds an inner newline"));
        }
        if !line.is_canonical() {
            return fail(format!("line {id:?} is not canonical"));
        }
        if line.views.keys().any(|view| !self.views.contains_key(view)) {
            return fail(format!("line {id:?} caches an unregistered view"));
        }

        for segment in &line.segments {
            match segment {
                Segment::Mark(mark_segment) => {
                    let Some(mark) = self.marks.get(mark_segment.mark) else {
                        return fail(format!("line {id:?} links a freed mark"));
                    };
                    if mark.line != id {
                        return fail(format!("mark {:?} points at the wrong line", mark_segment.mark));
                    }
                    if mark.left_gravity() != mark_segment.left_gravity {
                        return fail(format!("mark {:?} gravity mismatch", mark_segment.mark));
                    }
                    if !seen_marks.insert(mark_segment.mark) {
                        return fail(format!("mark {:?} linked twice", mark_segment.mark));
                    }
                }
                Segment::ToggleOn(tag) | Segment::ToggleOff(tag) => {
                    if self.tags.get(*tag).is_err() {
                        return fail(format!("line {id:?} toggles a removed tag"));
                    }
                }
                Segment::CharRun(_) => {}
            }
        }
        Ok(())
    }

    /// Toggles of each tag alternate on, off, ... in document order.
    fn check_toggle_order(&self) -> CheckResult {
        let mut on: HashSet<TagId> = HashSet::new();
        let mut line = Some(self.first_line());
        while let Some(current) = line {
            for (tag, is_on) in self.lines[current].segments.iter().filter_map(Segment::toggle) {
                if on.contains(&tag) == is_on {
                    return fail(format!(
                        "tag {tag:?} toggled {} twice in a row",
                        if is_on { "on" } else { "off" }
                    ));
                }
                if is_on {
                    on.insert(tag);
                } else {
                    on.remove(&tag);
                }
            }
            line = self.next_line(current);
        }
        match on.iter().next() {
            Some(tag) => fail(format!("tag {tag:?} is never toggled off")),
            None => Ok(()),
        }
    }

    /// Indented dump of the tree: one line per node and per text line,
    /// with segments shown as `"text"`, `+tag`, `-tag` and `<mark>`.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id];
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            out,
            "{indent}node level={} lines={} chars={}",
            node.level, node.num_lines, node.num_chars
        );
        match &node.children {
            Children::Nodes(children) => {
                for &child in children {
                    self.dump_node(child, depth + 1, out);
                }
            }
            Children::Lines(lines) => {
                for &line in lines {
                    let _ = write!(out, "{indent}  line");
                    if line == self.last_line {
                        out.push_str(" (end)");
                    }
                    for segment in &self.lines[line].segments {
                        out.push(' ');
                        out.push_str(&self.describe_segment(segment));
                    }
                    out.push('\n');
                }
            }
        }
    }

    fn describe_segment(&self, segment: &Segment) -> String {
        let tag_name = |tag: &TagId| {
            self.tags
                .get(*tag)
                .ok()
                .and_then(|t| t.name().map(str::to_string))
                .unwrap_or_else(|| format!("{tag:?}"))
        };
        match segment {
            Segment::CharRun(run) => format!("{:?}", run.as_str()),
            Segment::ToggleOn(tag) => format!("+{}", tag_name(tag)),
            Segment::ToggleOff(tag) => format!("-{}", tag_name(tag)),
            Segment::Mark(mark) => {
                let name = self
                    .marks
                    .get(mark.mark)
                    .and_then(|m| m.name().map(str::to_string))
                    .unwrap_or_else(|| format!("{:?}", mark.mark));
                let side = if mark.left_gravity { "L" } else { "R" };
                format!("<{name}:{side}>")
            }
        }
    }
}
