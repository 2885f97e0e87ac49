//! Marks: named, gravity-aware anchors that follow the text around them.

use crate::error::{Error, Result};
use crate::event::emit_event;
use crate::text::iter::TextIter;
use crate::text::segment::{MarkSegment, Segment};
use crate::text::{LineId, MarkId, TextBTree};

/// A mark's definition. Its position lives in the segment chain of
/// `line`; use [`TextBTree::iter_at_mark`] to get an iterator there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    name: Option<String>,
    pub(crate) line: LineId,
    left_gravity: bool,
    visible: bool,
    deletable: bool,
}

impl Mark {
    pub(crate) const fn new(name: Option<String>, line: LineId, left_gravity: bool) -> Self {
        Self {
            name,
            line,
            left_gravity,
            visible: false,
            deletable: true,
        }
    }

    /// One of the tree's built-in marks: right gravity, never deletable.
    pub(crate) fn special(name: &str, line: LineId, visible: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            line,
            left_gravity: false,
            visible,
            deletable: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the mark stays before text inserted at its position.
    #[must_use]
    pub const fn left_gravity(&self) -> bool {
        self.left_gravity
    }

    /// Whether views draw the mark as a cursor.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn is_deletable(&self) -> bool {
        self.deletable
    }

    fn label(&self, id: MarkId) -> String {
        self.name.clone().unwrap_or_else(|| format!("{id:?}"))
    }
}

impl TextBTree {
    /// Create or move a mark.
    ///
    /// The mark is `existing` if given, else the mark called `name` if one
    /// exists. A found mark is moved to `at` and keeps its gravity.
    /// Otherwise a new mark is created there, unless `must_exist` is set.
    pub fn set_mark(
        &mut self,
        existing: Option<MarkId>,
        name: Option<&str>,
        left_gravity: bool,
        at: &TextIter,
        must_exist: bool,
    ) -> Result<MarkId> {
        self.ensure_mutable()?;
        let at = self.resolve(at)?;
        let found = match existing {
            Some(mark) if self.marks.contains(mark) => Some(mark),
            Some(mark) => return Err(Error::MarkNotFound(format!("{mark:?}"))),
            None => name.and_then(|name| self.mark_names.get(name).copied()),
        };

        let (mark, old_line) = match found {
            Some(mark) => {
                let old_line = self.marks[mark].line;
                if let Some((index, _)) = self.lines[old_line].mark_position(mark) {
                    self.remove_segment(old_line, index);
                }
                (mark, Some(old_line))
            }
            None if must_exist => {
                return Err(Error::MarkNotFound(
                    name.unwrap_or("<anonymous>").to_string(),
                ));
            }
            None => {
                let mark = self
                    .marks
                    .alloc(Mark::new(name.map(str::to_string), at.line, left_gravity));
                if let Some(name) = name {
                    self.mark_names.insert(name.to_string(), mark);
                }
                (mark, None)
            }
        };

        let segment = Segment::Mark(MarkSegment {
            mark,
            left_gravity: self.marks[mark].left_gravity,
        });
        let index = self.lines[at.line].split_at(at.byte_index);
        self.lines[at.line].segments.insert(index, segment);
        self.marks[mark].line = at.line;
        self.segments_changed();

        if self.marks[mark].visible {
            if let Some(old_line) = old_line {
                let old = self.line_number(old_line);
                self.notify_cursors(old..=old);
            }
            let new = self.line_number(at.line);
            self.notify_cursors(new..=new);
        }
        emit_event(
            "mark-set",
            &format!(
                "mark={} offset={}",
                self.marks[mark].label(mark),
                at.char_offset
            ),
        );
        self.after_mutation();
        Ok(mark)
    }

    /// Create a mark at `at`, or move the existing mark called `name`.
    pub fn create_mark(
        &mut self,
        name: Option<&str>,
        at: &TextIter,
        left_gravity: bool,
    ) -> Result<MarkId> {
        self.set_mark(None, name, left_gravity, at, false)
    }

    /// Move an existing mark to `at`.
    pub fn move_mark(&mut self, mark: MarkId, at: &TextIter) -> Result<()> {
        self.set_mark(Some(mark), None, false, at, true).map(|_| ())
    }

    /// Move the mark called `name` to `at`.
    pub fn move_mark_by_name(&mut self, name: &str, at: &TextIter) -> Result<()> {
        self.set_mark(None, Some(name), false, at, true).map(|_| ())
    }

    /// Delete a mark. The insert and selection-bound marks cannot be
    /// deleted.
    pub fn remove_mark(&mut self, mark: MarkId) -> Result<()> {
        self.ensure_mutable()?;
        let found = self
            .marks
            .get(mark)
            .ok_or_else(|| Error::MarkNotFound(format!("{mark:?}")))?;
        let label = found.label(mark);
        if !found.deletable {
            return Err(Error::MarkNotDeletable(label));
        }
        let line = found.line;
        let visible = found.visible;
        if let Some((index, _)) = self.lines[line].mark_position(mark) {
            self.remove_segment(line, index);
        }
        if let Some(removed) = self.marks.free(mark) {
            if let Some(name) = removed.name {
                self.mark_names.remove(&name);
            }
        }
        if visible {
            let number = self.line_number(line);
            self.notify_cursors(number..=number);
        }
        emit_event("mark-deleted", &format!("mark={label}"));
        self.after_mutation();
        Ok(())
    }

    /// Delete the mark called `name`.
    pub fn remove_mark_by_name(&mut self, name: &str) -> Result<()> {
        let mark = self
            .mark_by_name(name)
            .ok_or_else(|| Error::MarkNotFound(name.to_string()))?;
        self.remove_mark(mark)
    }

    #[must_use]
    pub fn mark_by_name(&self, name: &str) -> Option<MarkId> {
        self.mark_names.get(name).copied()
    }

    pub fn mark(&self, mark: MarkId) -> Result<&Mark> {
        self.marks
            .get(mark)
            .ok_or_else(|| Error::MarkNotFound(format!("{mark:?}")))
    }

    pub fn mark_name(&self, mark: MarkId) -> Result<Option<&str>> {
        Ok(self.mark(mark)?.name())
    }

    pub fn mark_left_gravity(&self, mark: MarkId) -> Result<bool> {
        Ok(self.mark(mark)?.left_gravity())
    }

    /// Number of live marks, the two built-in ones included.
    #[must_use]
    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    /// The insertion point.
    #[must_use]
    pub const fn insert_mark(&self) -> MarkId {
        self.insert_mark
    }

    /// The other end of the selection.
    #[must_use]
    pub const fn selection_bound_mark(&self) -> MarkId {
        self.selection_bound_mark
    }

    /// Show or hide a mark as a cursor.
    pub fn set_mark_visible(&mut self, mark: MarkId, visible: bool) -> Result<()> {
        self.ensure_mutable()?;
        let found = self
            .marks
            .get_mut(mark)
            .ok_or_else(|| Error::MarkNotFound(format!("{mark:?}")))?;
        if found.visible == visible {
            return Ok(());
        }
        found.visible = visible;
        let line = found.line;
        let number = self.line_number(line);
        self.notify_cursors(number..=number);
        Ok(())
    }

    /// Move the insert and selection-bound marks to `at`, leaving an empty
    /// selection.
    pub fn place_cursor(&mut self, at: &TextIter) -> Result<()> {
        self.select_range(at, at)
    }

    /// Move the insert mark to `insert` and the selection bound to `bound`.
    pub fn select_range(&mut self, insert: &TextIter, bound: &TextIter) -> Result<()> {
        let insert = self.resolve(insert)?;
        let bound = self.resolve(bound)?;
        self.move_mark(self.insert_mark, &insert)?;
        // Moving a mark only bumps the segments stamp, so `bound` still
        // resolves to the same place.
        self.move_mark(self.selection_bound_mark, &bound)
    }

    /// The selection as an ordered pair, or `None` when it is empty.
    pub fn selection_bounds(&self) -> Result<Option<(TextIter, TextIter)>> {
        let insert = self.iter_at_mark(self.insert_mark)?;
        let bound = self.iter_at_mark(self.selection_bound_mark)?;
        if insert == bound {
            return Ok(None);
        }
        self.ordered(&insert, &bound).map(Some)
    }
}
