//! Tree nodes and their aggregates.

use crate::text::view::{LineViewData, ViewId};
use crate::text::{LineId, NodeId, TagId};
use std::collections::HashMap;

/// Per-tag toggle aggregate of a subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TagSummary {
    /// Number of toggle segments of the tag in the subtree.
    pub(crate) toggles: u32,
    /// Toggle-ons minus toggle-offs.
    pub(crate) balance: i32,
}

impl TagSummary {
    pub(crate) fn add(&mut self, on: i64, off: i64) {
        let toggles = u32::try_from(i64::from(self.toggles) + on + off);
        let balance = i32::try_from(i64::from(self.balance) + on - off);
        debug_assert!(
            toggles.is_ok() && balance.is_ok(),
            "tag summary {self:?} out of range after adding {on} on, {off} off"
        );
        self.toggles = toggles.unwrap_or(0);
        self.balance = balance.unwrap_or(0);
    }
}

#[derive(Debug)]
pub(crate) enum Children {
    Lines(Vec<LineId>),
    Nodes(Vec<NodeId>),
}

impl Children {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Lines(lines) => lines.len(),
            Self::Nodes(nodes) => nodes.len(),
        }
    }

    pub(crate) fn split_off(&mut self, at: usize) -> Self {
        match self {
            Self::Lines(lines) => Self::Lines(lines.split_off(at)),
            Self::Nodes(nodes) => Self::Nodes(nodes.split_off(at)),
        }
    }

    /// Append `other`, which must hold the same kind of children.
    pub(crate) fn append(&mut self, other: Self) {
        match (self, other) {
            (Self::Lines(lines), Self::Lines(mut more)) => lines.append(&mut more),
            (Self::Nodes(nodes), Self::Nodes(mut more)) => nodes.append(&mut more),
            _ => debug_assert!(false, "mixed child kinds"),
        }
    }

    pub(crate) fn take(&mut self) -> Self {
        match self {
            Self::Lines(lines) => Self::Lines(std::mem::take(lines)),
            Self::Nodes(nodes) => Self::Nodes(std::mem::take(nodes)),
        }
    }
}

/// A B-tree node. Level-0 nodes own lines, higher levels own nodes.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) level: u32,
    pub(crate) children: Children,
    pub(crate) num_lines: usize,
    pub(crate) num_chars: usize,
    pub(crate) summaries: HashMap<TagId, TagSummary>,
    /// Aggregated layout per view: widest child, summed heights, and valid
    /// only if every child is.
    pub(crate) views: HashMap<ViewId, LineViewData>,
}

impl Node {
    pub(crate) fn leaf(parent: Option<NodeId>) -> Self {
        Self::with_children(parent, 0, Children::Lines(Vec::new()))
    }

    pub(crate) fn with_children(parent: Option<NodeId>, level: u32, children: Children) -> Self {
        Self {
            parent,
            level,
            children,
            num_lines: 0,
            num_chars: 0,
            summaries: HashMap::new(),
            views: HashMap::new(),
        }
    }

    pub(crate) fn num_children(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn lines(&self) -> &[LineId] {
        match &self.children {
            Children::Lines(lines) => lines,
            Children::Nodes(_) => &[],
        }
    }

    pub(crate) fn child_nodes(&self) -> &[NodeId] {
        match &self.children {
            Children::Nodes(nodes) => nodes,
            Children::Lines(_) => &[],
        }
    }

    /// Whether the subtree holds any toggle of `tag`.
    pub(crate) fn has_toggles(&self, tag: TagId) -> bool {
        self.summaries.contains_key(&tag)
    }

    pub(crate) fn view_data(&self, view: ViewId) -> LineViewData {
        self.views.get(&view).copied().unwrap_or_default()
    }
}
