//! Lines: segment chains hanging off level-0 nodes.

use crate::text::segment::{CharRun, Segment};
use crate::text::view::{LineViewData, ViewId};
use crate::text::{MarkId, NodeId, TagId};
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct Line {
    pub(crate) parent: NodeId,
    pub(crate) segments: Vec<Segment>,
    /// Cached layout per registered view. A missing entry means never laid
    /// out, which counts as invalid.
    pub(crate) views: HashMap<ViewId, LineViewData>,
}

impl Line {
    pub(crate) fn new(parent: NodeId, segments: Vec<Segment>) -> Self {
        Self {
            parent,
            segments,
            views: HashMap::new(),
        }
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.segments.iter().map(Segment::byte_len).sum()
    }

    pub(crate) fn char_len(&self) -> usize {
        self.segments.iter().map(Segment::char_len).sum()
    }

    pub(crate) fn text(&self) -> String {
        let mut text = String::with_capacity(self.byte_len());
        for segment in &self.segments {
            if let Segment::CharRun(run) = segment {
                text.push_str(run.as_str());
            }
        }
        text
    }

    /// Index of the segment holding `byte` and the offset into it. Zero-width
    /// segments at `byte` come before the returned index. Past the last
    /// byte, returns `(segments.len(), 0)`.
    pub(crate) fn locate_byte(&self, byte: usize) -> (usize, usize) {
        let mut remaining = byte;
        for (index, segment) in self.segments.iter().enumerate() {
            let len = segment.byte_len();
            if len > remaining {
                return (index, remaining);
            }
            remaining -= len;
        }
        (self.segments.len(), 0)
    }

    pub(crate) fn byte_to_char(&self, byte: usize) -> usize {
        let mut remaining = byte;
        let mut chars = 0;
        for segment in &self.segments {
            let Segment::CharRun(run) = segment else {
                continue;
            };
            if run.byte_len() > remaining {
                return chars + run.as_str()[..remaining].chars().count();
            }
            remaining -= run.byte_len();
            chars += run.char_count();
        }
        chars
    }

    pub(crate) fn char_to_byte(&self, char_offset: usize) -> Option<usize> {
        let mut remaining = char_offset;
        let mut bytes = 0;
        for segment in &self.segments {
            let Segment::CharRun(run) = segment else {
                continue;
            };
            if run.char_count() > remaining {
                let (offset, _) = run.as_str().char_indices().nth(remaining)?;
                return Some(bytes + offset);
            }
            remaining -= run.char_count();
            bytes += run.byte_len();
        }
        (remaining == 0).then_some(bytes)
    }

    pub(crate) fn is_char_boundary(&self, byte: usize) -> bool {
        let (index, offset) = self.locate_byte(byte);
        match self.segments.get(index) {
            Some(Segment::CharRun(run)) => run.as_str().is_char_boundary(offset),
            _ => offset == 0,
        }
    }

    /// Index at which a segment inserted at `byte` belongs, splitting the
    /// character run that straddles `byte` if there is one.
    ///
    /// Among zero-width segments already at `byte`, the new segment goes
    /// after those with left gravity and before the first with right
    /// gravity.
    pub(crate) fn split_at(&mut self, byte: usize) -> usize {
        let mut remaining = byte;
        let mut index = 0;
        while index < self.segments.len() {
            let len = self.segments[index].byte_len();
            if len > remaining {
                if remaining == 0 {
                    return index;
                }
                if let Segment::CharRun(run) = &mut self.segments[index] {
                    let tail = run.split_off(remaining);
                    self.segments.insert(index + 1, Segment::CharRun(tail));
                }
                return index + 1;
            }
            if len == 0 && remaining == 0 && !self.segments[index].left_gravity() {
                return index;
            }
            remaining -= len;
            index += 1;
        }
        index
    }

    /// Restore the canonical chain: adjacent runs merged, no empty runs and
    /// no toggle pair of one tag with only zero-width segments between.
    pub(crate) fn canonicalize(&mut self) {
        loop {
            let mut changed = false;

            let mut index = 0;
            while index < self.segments.len() {
                let empty = matches!(&self.segments[index], Segment::CharRun(run) if run.byte_len() == 0);
                if empty {
                    self.segments.remove(index);
                    changed = true;
                    continue;
                }
                let merge = matches!(
                    (&self.segments[index], self.segments.get(index + 1)),
                    (Segment::CharRun(_), Some(Segment::CharRun(_)))
                );
                if merge {
                    if let Segment::CharRun(next) = self.segments.remove(index + 1) {
                        if let Segment::CharRun(run) = &mut self.segments[index] {
                            run.push_run(&next);
                        }
                    }
                    changed = true;
                } else {
                    index += 1;
                }
            }

            if let Some((first, second)) = self.cancelling_pair() {
                self.segments.remove(second);
                self.segments.remove(first);
                changed = true;
            }

            if !changed {
                break;
            }
        }
    }

    /// Whether [`canonicalize`](Self::canonicalize) would leave the chain
    /// unchanged.
    pub(crate) fn is_canonical(&self) -> bool {
        let runs_ok = self.segments.iter().enumerate().all(|(index, segment)| match segment {
            Segment::CharRun(run) => {
                run.byte_len() > 0
                    && !matches!(self.segments.get(index + 1), Some(Segment::CharRun(_)))
            }
            _ => true,
        });
        runs_ok && self.cancelling_pair().is_none()
    }

    fn cancelling_pair(&self) -> Option<(usize, usize)> {
        for (index, segment) in self.segments.iter().enumerate() {
            let Some((tag, on)) = segment.toggle() else {
                continue;
            };
            for (offset, later) in self.segments[index + 1..].iter().enumerate() {
                if !later.is_zero_width() {
                    break;
                }
                if later.toggle() == Some((tag, !on)) {
                    return Some((index, index + 1 + offset));
                }
            }
        }
        None
    }

    /// Byte positions of the toggles of `tag`, in order.
    pub(crate) fn toggle_positions(&self, tag: TagId) -> impl Iterator<Item = usize> + '_ {
        let mut byte = 0;
        self.segments.iter().filter_map(move |segment| {
            let at = byte;
            byte += segment.byte_len();
            match segment.toggle() {
                Some((t, _)) if t == tag => Some(at),
                _ => None,
            }
        })
    }

    /// Per tag, the number of (on, off) toggles in the line.
    pub(crate) fn toggle_counts(&self) -> HashMap<TagId, (u32, u32)> {
        let mut counts: HashMap<TagId, (u32, u32)> = HashMap::new();
        for (tag, on) in self.segments.iter().filter_map(Segment::toggle) {
            let entry = counts.entry(tag).or_default();
            if on {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
        counts
    }

    /// Segment index and byte position of a mark.
    pub(crate) fn mark_position(&self, mark: MarkId) -> Option<(usize, usize)> {
        let mut byte = 0;
        for (index, segment) in self.segments.iter().enumerate() {
            if matches!(segment, Segment::Mark(m) if m.mark == mark) {
                return Some((index, byte));
            }
            byte += segment.byte_len();
        }
        None
    }

    pub(crate) fn marks(&self) -> impl Iterator<Item = MarkId> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Mark(m) => Some(m.mark),
            _ => None,
        })
    }

    pub(crate) fn ends_with_newline(&self) -> bool {
        matches!(
            self.segments.last(),
            Some(Segment::CharRun(run)) if run.as_str().ends_with('\n')
        )
    }
}

/// A line's content as handed to a [`LineLayout`](crate::LineLayout).
#[derive(Clone, Copy, Debug)]
pub struct LineContent<'a> {
    segments: &'a [Segment],
}

impl<'a> LineContent<'a> {
    pub(crate) const fn new(segments: &'a [Segment]) -> Self {
        Self { segments }
    }

    /// The full segment chain, toggles and marks included.
    #[must_use]
    pub const fn segments(&self) -> &'a [Segment] {
        self.segments
    }

    /// The line's text without its terminating newline.
    #[must_use]
    pub fn text(&self) -> Cow<'a, str> {
        let mut runs = self.segments.iter().filter_map(|segment| match segment {
            Segment::CharRun(run) => Some(run),
            _ => None,
        });
        let text = match (runs.next(), runs.next()) {
            (None, _) => Cow::Borrowed(""),
            (Some(run), None) => Cow::Borrowed(run.as_str()),
            (Some(first), Some(second)) => {
                let mut owned = String::from(first.as_str());
                owned.push_str(second.as_str());
                runs.for_each(|run: &CharRun| owned.push_str(run.as_str()));
                Cow::Owned(owned)
            }
        };
        match text {
            Cow::Borrowed(s) => Cow::Borrowed(s.strip_suffix('\n').unwrap_or(s)),
            Cow::Owned(mut s) => {
                if s.ends_with('\n') {
                    s.pop();
                }
                Cow::Owned(s)
            }
        }
    }

    /// Characters in the line, excluding the terminating newline.
    #[must_use]
    pub fn char_count(&self) -> usize {
        let total: usize = self.segments.iter().map(Segment::char_len).sum();
        total.saturating_sub(1)
    }
}
