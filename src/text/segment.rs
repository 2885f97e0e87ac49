//! Segments: the pieces a line is made of.
//!
//! A line is an ordered chain of character runs and zero-width segments
//! (tag toggles and marks). Only character runs occupy bytes.

use crate::text::{MarkId, TagId};

/// A run of UTF-8 text inside one line.
///
/// A run never contains a `'\n'` except as its last character, and only the
/// last run of a line may end with one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharRun {
    text: String,
    char_count: usize,
}

impl CharRun {
    /// Create a run from text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_count = text.chars().count();
        Self { text, char_count }
    }

    /// The run's text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    /// Length in characters.
    #[must_use]
    pub const fn char_count(&self) -> usize {
        self.char_count
    }

    /// Split at a byte offset (a char boundary), keeping the head.
    pub(crate) fn split_off(&mut self, byte: usize) -> Self {
        let tail = Self::new(self.text.split_off(byte));
        self.char_count -= tail.char_count;
        tail
    }

    pub(crate) fn push_run(&mut self, other: &Self) {
        self.text.push_str(&other.text);
        self.char_count += other.char_count;
    }
}

/// A mark's presence in a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkSegment {
    /// The mark this segment stands for.
    pub mark: MarkId,
    /// Copied from the mark so splitting needs no table lookup.
    pub left_gravity: bool,
}

/// One element of a line's segment chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Text.
    CharRun(CharRun),
    /// The tag starts applying here.
    ToggleOn(TagId),
    /// The tag stops applying here.
    ToggleOff(TagId),
    /// A named or anonymous position.
    Mark(MarkSegment),
}

impl Segment {
    /// Shorthand for a character run segment.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::CharRun(CharRun::new(text))
    }

    /// Bytes occupied by the segment.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Self::CharRun(run) => run.byte_len(),
            _ => 0,
        }
    }

    /// Characters occupied by the segment.
    #[must_use]
    pub const fn char_len(&self) -> usize {
        match self {
            Self::CharRun(run) => run.char_count(),
            _ => 0,
        }
    }

    /// Whether the segment sticks to the text before it when text is
    /// inserted at its position.
    ///
    /// Toggle-offs and left marks do; toggle-ons and right marks don't.
    /// Character runs report `false` but are never asked.
    #[must_use]
    pub const fn left_gravity(&self) -> bool {
        match self {
            Self::ToggleOff(_) => true,
            Self::Mark(mark) => mark.left_gravity,
            Self::CharRun(_) | Self::ToggleOn(_) => false,
        }
    }

    /// The tag and direction of a toggle segment.
    #[must_use]
    pub const fn toggle(&self) -> Option<(TagId, bool)> {
        match self {
            Self::ToggleOn(tag) => Some((*tag, true)),
            Self::ToggleOff(tag) => Some((*tag, false)),
            _ => None,
        }
    }

    /// Whether the segment occupies no bytes.
    #[must_use]
    pub const fn is_zero_width(&self) -> bool {
        !matches!(self, Self::CharRun(_))
    }
}
