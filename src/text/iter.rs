//! Iterators: stamped positions in a tree.
//!
//! A [`TextIter`] caches where it points (line, byte, segment) together with
//! the tree's two change stamps at the time it was made. Every accessor
//! compares the stamps first:
//!
//! - both match: the cache is used as is ([`IterState::Fresh`]);
//! - only the segments stamp moved (marks or toggles were spliced): the
//!   line and offsets still hold, only the segment index is recomputed;
//! - the chars stamp moved (text was inserted or deleted): the position is
//!   re-derived from the iterator's [`IterOrigin`] ([`IterState::Stale`]),
//!   or the accessor fails with [`Error::InvalidIterator`] when the origin
//!   no longer exists ([`IterState::Invalid`]).
//!
//! Iterators are never patched in place by mutations.

use crate::error::{Error, Result};
use crate::text::TextBTree;
use crate::text::segment::Segment;
use crate::text::{LineId, MarkId};
use std::cmp::Ordering;

/// What an iterator was built from, and is re-resolved from when stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterOrigin {
    /// A global character offset.
    Char(usize),
    /// A line number and character offset within the line.
    LineChar { line: usize, offset: usize },
    /// A line number and byte offset within the line.
    LineByte { line: usize, byte: usize },
    /// A mark's current position.
    Mark(MarkId),
}

/// Freshness of an iterator relative to its tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterState {
    /// Stamps match; the cached position is current.
    Fresh,
    /// Stamps differ but the origin still resolves.
    Stale,
    /// The origin no longer exists (or the iterator belongs to another tree).
    Invalid,
}

/// A position in a [`TextBTree`].
///
/// Iterators are plain values: copying one is free and the tree never
/// tracks them. Two iterators compare equal when they point at the same
/// place of the same tree, whatever their origin.
#[derive(Clone, Copy, Debug)]
pub struct TextIter {
    pub(crate) tree: u64,
    pub(crate) line: LineId,
    /// Byte offset within the line.
    pub(crate) byte_index: usize,
    /// Character offset within the line.
    pub(crate) line_char: usize,
    /// Global character offset.
    pub(crate) char_offset: usize,
    /// Index of the segment holding the character at the position.
    pub(crate) segment: usize,
    pub(crate) segment_offset: usize,
    pub(crate) chars_stamp: u64,
    pub(crate) segments_stamp: u64,
    pub(crate) origin: IterOrigin,
}

impl PartialEq for TextIter {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree && self.line == other.line && self.byte_index == other.byte_index
    }
}

impl Eq for TextIter {}

impl TextIter {
    /// What the iterator re-resolves from.
    #[must_use]
    pub const fn origin(&self) -> IterOrigin {
        self.origin
    }

    /// Global character offset.
    pub fn char_offset(&self, tree: &TextBTree) -> Result<usize> {
        Ok(tree.resolve(self)?.char_offset)
    }

    /// Zero-based line number.
    pub fn line(&self, tree: &TextBTree) -> Result<usize> {
        let iter = tree.resolve(self)?;
        Ok(tree.line_number(iter.line))
    }

    /// Character offset within the line.
    pub fn line_offset(&self, tree: &TextBTree) -> Result<usize> {
        Ok(tree.resolve(self)?.line_char)
    }

    /// Byte offset within the line.
    pub fn line_index(&self, tree: &TextBTree) -> Result<usize> {
        Ok(tree.resolve(self)?.byte_index)
    }

    /// Character at the position, `None` at the end of the document.
    pub fn char(&self, tree: &TextBTree) -> Result<Option<char>> {
        let iter = tree.resolve(self)?;
        if iter.char_offset == tree.char_count() {
            return Ok(None);
        }
        Ok(match tree.lines[iter.line].segments.get(iter.segment) {
            Some(Segment::CharRun(run)) => run.as_str()[iter.segment_offset..].chars().next(),
            _ => None,
        })
    }

    /// Whether the iterator is at offset 0.
    pub fn is_start(&self, tree: &TextBTree) -> Result<bool> {
        Ok(self.char_offset(tree)? == 0)
    }

    /// Whether the iterator is at the end of the document.
    pub fn is_end(&self, tree: &TextBTree) -> Result<bool> {
        Ok(self.char_offset(tree)? == tree.char_count())
    }

    /// Move one character forward. Returns `false` (and stays put) at the
    /// end.
    pub fn forward_char(&mut self, tree: &TextBTree) -> Result<bool> {
        self.forward_chars(tree, 1)
    }

    /// Move one character back. Returns `false` (and stays put) at the
    /// start.
    pub fn backward_char(&mut self, tree: &TextBTree) -> Result<bool> {
        self.backward_chars(tree, 1)
    }

    /// Move `count` characters forward, stopping at the end. Returns
    /// whether the iterator moved.
    pub fn forward_chars(&mut self, tree: &TextBTree, count: usize) -> Result<bool> {
        let current = self.char_offset(tree)?;
        let target = current.saturating_add(count).min(tree.char_count());
        *self = tree.iter_at_char(target)?;
        Ok(target != current)
    }

    /// Move `count` characters back, stopping at the start. Returns
    /// whether the iterator moved.
    pub fn backward_chars(&mut self, tree: &TextBTree, count: usize) -> Result<bool> {
        let current = self.char_offset(tree)?;
        let target = current.saturating_sub(count);
        *self = tree.iter_at_char(target)?;
        Ok(target != current)
    }

    /// Move to the start of the next line. On the last line, moves to the
    /// end and returns `false`.
    pub fn forward_line(&mut self, tree: &TextBTree) -> Result<bool> {
        let line = self.line(tree)?;
        if line + 1 < tree.line_count() {
            *self = tree.iter_at_line(line + 1)?;
            Ok(true)
        } else {
            *self = tree.end_iter();
            Ok(false)
        }
    }
}

impl TextBTree {
    /// Iterator at offset 0.
    #[must_use]
    pub fn start_iter(&self) -> TextIter {
        self.build_iter(self.first_line(), 0, 0, 0, IterOrigin::Char(0))
    }

    /// Iterator just before the hidden final newline.
    #[must_use]
    pub fn end_iter(&self) -> TextIter {
        let line = self.last_real_line();
        let byte = self.lines[line].byte_len().saturating_sub(1);
        let count = self.char_count();
        let line_char = self.lines[line].char_len().saturating_sub(1);
        self.build_iter(line, byte, line_char, count, IterOrigin::Char(count))
    }

    /// Iterator at a global character offset (`0..=char_count()`).
    pub fn iter_at_char(&self, offset: usize) -> Result<TextIter> {
        let count = self.char_count();
        let out_of_range = Error::OutOfRange {
            what: "char offset",
            index: offset,
            len: count,
        };
        if offset > count {
            return Err(out_of_range);
        }
        let (line, start) = self.line_at_char(offset).ok_or_else(|| out_of_range.clone())?;
        let line_char = offset - start;
        let byte = self.lines[line]
            .char_to_byte(line_char)
            .ok_or(out_of_range)?;
        Ok(self.build_iter(line, byte, line_char, offset, IterOrigin::Char(offset)))
    }

    /// Iterator at a character offset within a line. The offset may equal
    /// the line's length (the position of its newline).
    pub fn iter_at_line_char(&self, line_number: usize, offset: usize) -> Result<TextIter> {
        let line = self.real_line(line_number)?;
        let len = self.lines[line].char_len() - 1;
        if offset > len {
            return Err(Error::OutOfRange {
                what: "char in line",
                index: offset,
                len,
            });
        }
        let byte = self.lines[line]
            .char_to_byte(offset)
            .ok_or(Error::OutOfRange {
                what: "char in line",
                index: offset,
                len,
            })?;
        let char_offset = self.line_char_start(line) + offset;
        Ok(self.build_iter(
            line,
            byte,
            offset,
            char_offset,
            IterOrigin::LineChar {
                line: line_number,
                offset,
            },
        ))
    }

    /// Iterator at a byte offset within a line. The offset must fall on a
    /// character boundary.
    pub fn iter_at_line_byte(&self, line_number: usize, byte: usize) -> Result<TextIter> {
        let line = self.real_line(line_number)?;
        let len = self.lines[line].byte_len() - 1;
        if byte > len {
            return Err(Error::OutOfRange {
                what: "byte in line",
                index: byte,
                len,
            });
        }
        if !self.lines[line].is_char_boundary(byte) {
            return Err(Error::OutOfRange {
                what: "byte in line (not a char boundary)",
                index: byte,
                len,
            });
        }
        Ok(self.make_iter(
            line,
            byte,
            Some(IterOrigin::LineByte {
                line: line_number,
                byte,
            }),
        ))
    }

    /// Iterator at the start of a line.
    pub fn iter_at_line(&self, line_number: usize) -> Result<TextIter> {
        self.iter_at_line_char(line_number, 0)
    }

    /// Iterator at a mark. It keeps following the mark when re-resolved.
    pub fn iter_at_mark(&self, mark: MarkId) -> Result<TextIter> {
        let not_found = || Error::MarkNotFound(format!("{mark:?}"));
        let line = self.marks.get(mark).ok_or_else(not_found)?.line;
        let (_, byte) = self.lines[line]
            .mark_position(mark)
            .ok_or_else(not_found)?;
        Ok(self.make_iter(line, byte, Some(IterOrigin::Mark(mark))))
    }

    /// Re-derive an iterator if it is stale.
    pub fn resolve(&self, iter: &TextIter) -> Result<TextIter> {
        if iter.tree != self.id {
            return Err(Error::InvalidIterator);
        }
        if iter.chars_stamp == self.chars_changed_stamp {
            if iter.segments_stamp == self.segments_changed_stamp {
                return Ok(*iter);
            }
            if !matches!(iter.origin, IterOrigin::Mark(_)) && self.lines.contains(iter.line) {
                let (segment, segment_offset) = self.lines[iter.line].locate_byte(iter.byte_index);
                return Ok(TextIter {
                    segment,
                    segment_offset,
                    segments_stamp: self.segments_changed_stamp,
                    ..*iter
                });
            }
        }
        self.resolve_origin(iter.origin)
    }

    /// Bring an iterator up to date in place, returning the state it was in.
    pub fn refresh(&self, iter: &mut TextIter) -> Result<IterState> {
        let state = self.iter_state(iter);
        *iter = self.resolve(iter)?;
        Ok(state)
    }

    /// Freshness of an iterator.
    #[must_use]
    pub fn iter_state(&self, iter: &TextIter) -> IterState {
        if iter.tree != self.id {
            return IterState::Invalid;
        }
        if iter.chars_stamp == self.chars_changed_stamp
            && iter.segments_stamp == self.segments_changed_stamp
        {
            return IterState::Fresh;
        }
        match self.resolve(iter) {
            Ok(_) => IterState::Stale,
            Err(_) => IterState::Invalid,
        }
    }

    /// Document order of two iterators.
    pub fn compare(&self, a: &TextIter, b: &TextIter) -> Result<Ordering> {
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        Ok(a.char_offset.cmp(&b.char_offset))
    }

    /// Resolve two iterators and return them in document order.
    pub(crate) fn ordered(&self, a: &TextIter, b: &TextIter) -> Result<(TextIter, TextIter)> {
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        if a.char_offset <= b.char_offset {
            Ok((a, b))
        } else {
            Ok((b, a))
        }
    }

    fn resolve_origin(&self, origin: IterOrigin) -> Result<TextIter> {
        let resolved = match origin {
            IterOrigin::Char(offset) => self.iter_at_char(offset),
            IterOrigin::LineChar { line, offset } => self.iter_at_line_char(line, offset),
            IterOrigin::LineByte { line, byte } => self.iter_at_line_byte(line, byte),
            IterOrigin::Mark(mark) => self.iter_at_mark(mark),
        };
        resolved.map_err(|_| Error::InvalidIterator)
    }

    fn real_line(&self, line_number: usize) -> Result<LineId> {
        self.line_at(line_number).ok_or(Error::OutOfRange {
            what: "line",
            index: line_number,
            len: self.line_count(),
        })
    }

    /// Iterator at a byte of a line; `origin` defaults to the resulting
    /// global char offset.
    pub(crate) fn make_iter(
        &self,
        line: LineId,
        byte_index: usize,
        origin: Option<IterOrigin>,
    ) -> TextIter {
        let line_char = self.lines[line].byte_to_char(byte_index);
        let char_offset = self.line_char_start(line) + line_char;
        self.build_iter(
            line,
            byte_index,
            line_char,
            char_offset,
            origin.unwrap_or(IterOrigin::Char(char_offset)),
        )
    }

    fn build_iter(
        &self,
        line: LineId,
        byte_index: usize,
        line_char: usize,
        char_offset: usize,
        origin: IterOrigin,
    ) -> TextIter {
        let (segment, segment_offset) = self.lines[line].locate_byte(byte_index);
        TextIter {
            tree: self.id,
            line,
            byte_index,
            line_char,
            char_offset,
            segment,
            segment_offset,
            chars_stamp: self.chars_changed_stamp,
            segments_stamp: self.segments_changed_stamp,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(text: &str) -> TextBTree {
        let mut tree = TextBTree::new();
        let mut at = tree.start_iter();
        tree.insert_text(&mut at, text).unwrap();
        tree
    }

    #[test]
    fn test_iter_at_char_round_trip() {
        let tree = tree_with("héllo\nwörld\n\nend");
        for offset in 0..=tree.char_count() {
            let iter = tree.iter_at_char(offset).unwrap();
            assert_eq!(iter.char_offset(&tree).unwrap(), offset);
            let again = tree.iter_at_char(iter.char_offset(&tree).unwrap()).unwrap();
            assert_eq!(again, iter);
        }
        assert!(matches!(
            tree.iter_at_char(tree.char_count() + 1),
            Err(Error::OutOfRange { what: "char offset", .. })
        ));
    }

    #[test]
    fn test_line_addressing() {
        let tree = tree_with("héllo\nwörld");
        let iter = tree.iter_at_line_char(1, 2).unwrap();
        assert_eq!(iter.char_offset(&tree).unwrap(), 8);
        assert_eq!(iter.line(&tree).unwrap(), 1);
        assert_eq!(iter.line_offset(&tree).unwrap(), 2);
        assert_eq!(iter.line_index(&tree).unwrap(), 3);
        assert_eq!(iter.char(&tree).unwrap(), Some('r'));

        let by_byte = tree.iter_at_line_byte(0, 3).unwrap();
        assert_eq!(by_byte.line_offset(&tree).unwrap(), 2);
        assert!(tree.iter_at_line_byte(0, 2).is_err());
        assert!(tree.iter_at_line_char(0, 6).is_err());
        assert!(tree.iter_at_line_char(0, 5).is_ok());
        assert!(tree.iter_at_line(2).is_err());
    }

    #[test]
    fn test_start_and_end() {
        let tree = tree_with("ab\ncd");
        let start = tree.start_iter();
        let end = tree.end_iter();
        assert!(start.is_start(&tree).unwrap());
        assert!(end.is_end(&tree).unwrap());
        assert_eq!(end.char_offset(&tree).unwrap(), 5);
        assert_eq!(end.char(&tree).unwrap(), None);
        assert_eq!(tree.iter_at_char(5).unwrap(), end);
    }

    #[test]
    fn test_navigation() {
        let tree = tree_with("ab\ncd");
        let mut iter = tree.start_iter();
        assert!(iter.forward_char(&tree).unwrap());
        assert!(iter.forward_chars(&tree, 10).unwrap());
        assert!(iter.is_end(&tree).unwrap());
        assert!(!iter.forward_char(&tree).unwrap());
        assert!(iter.backward_chars(&tree, 3).unwrap());
        assert_eq!(iter.char(&tree).unwrap(), Some('\n'));

        let mut iter = tree.start_iter();
        assert!(iter.forward_line(&tree).unwrap());
        assert_eq!(iter.char_offset(&tree).unwrap(), 3);
        assert!(!iter.forward_line(&tree).unwrap());
        assert!(iter.is_end(&tree).unwrap());
        assert!(!tree.start_iter().backward_char(&tree).unwrap());
    }

    #[test]
    fn test_stale_iter_reresolves_from_origin() {
        let mut tree = tree_with("hello world");
        let by_char = tree.iter_at_char(6).unwrap();
        let by_line = tree.iter_at_line_char(0, 6).unwrap();
        assert_eq!(tree.iter_state(&by_char), IterState::Fresh);

        let mut at = tree.start_iter();
        tree.insert_text(&mut at, "say ").unwrap();

        assert_eq!(tree.iter_state(&by_char), IterState::Stale);
        assert_eq!(by_char.char(&tree).unwrap(), Some('l'));
        assert_eq!(by_line.char_offset(&tree).unwrap(), 6);
        assert_eq!(by_char.origin(), IterOrigin::Char(6));
    }

    #[test]
    fn test_iter_becomes_invalid_when_origin_gone() {
        let mut tree = tree_with("hello world");
        let mut iter = tree.iter_at_char(11).unwrap();
        let mut start = tree.iter_at_char(5).unwrap();
        let mut end = tree.end_iter();
        tree.delete_range(&mut start, &mut end).unwrap();
        assert_eq!(tree.iter_state(&iter), IterState::Invalid);
        assert_eq!(iter.char_offset(&tree), Err(Error::InvalidIterator));
        assert_eq!(tree.refresh(&mut iter), Err(Error::InvalidIterator));
    }

    #[test]
    fn test_segments_only_change_keeps_position() {
        let mut tree = tree_with("hello");
        let mut iter = tree.iter_at_char(3).unwrap();
        let at = tree.iter_at_char(3).unwrap();
        tree.create_mark(Some("m"), &at, true).unwrap();
        assert_eq!(tree.iter_state(&iter), IterState::Stale);
        assert_eq!(tree.refresh(&mut iter).unwrap(), IterState::Stale);
        assert_eq!(tree.iter_state(&iter), IterState::Fresh);
        assert_eq!(iter.char(&tree).unwrap(), Some('l'));
    }

    #[test]
    fn test_iter_from_other_tree_is_invalid() {
        let a = tree_with("abc");
        let b = tree_with("abc");
        let iter = a.start_iter();
        assert_eq!(b.iter_state(&iter), IterState::Invalid);
        assert_eq!(b.resolve(&iter), Err(Error::InvalidIterator));
    }

    #[test]
    fn test_compare() {
        let tree = tree_with("abc");
        let a = tree.iter_at_char(1).unwrap();
        let b = tree.iter_at_char(2).unwrap();
        assert_eq!(tree.compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(tree.compare(&b, &a).unwrap(), Ordering::Greater);
        assert_eq!(tree.compare(&a, &a).unwrap(), Ordering::Equal);
    }
}
