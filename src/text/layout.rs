//! Line layout: the callback a view uses to size its lines.
//!
//! A view registers a [`LineLayout`] with
//! [`TextBTree::add_view`](crate::TextBTree::add_view). The tree calls it
//! for each line it validates and caches the returned [`LineSize`].
//! [`CellLayout`] is a ready-made implementation for cell-based terminals.

use crate::text::line::LineContent;
use crate::unicode::{WidthMethod, clusters};
use std::ops::{Range, RangeInclusive};

/// Size of one laid-out line, in the view's units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineSize {
    pub width: i32,
    pub height: i32,
}

impl LineSize {
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Computes line dimensions for one view.
///
/// Implementations must not expect to touch the tree: it is locked against
/// mutation while a layout call runs.
pub trait LineLayout {
    /// Lay out one line.
    fn wrap(&mut self, line: &LineContent<'_>) -> LineSize;

    /// Cursor-only invalidation of the given line numbers. The cached line
    /// sizes stay valid.
    fn invalidate_cursors(&mut self, _lines: RangeInclusive<usize>) {}
}

impl<F> LineLayout for F
where
    F: FnMut(&LineContent<'_>) -> LineSize,
{
    fn wrap(&mut self, line: &LineContent<'_>) -> LineSize {
        self(line)
    }
}

/// Text wrapping mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    /// No wrapping - lines extend beyond the wrap width.
    #[default]
    None,
    /// Wrap at character boundaries.
    Char,
    /// Wrap at word boundaries.
    Word,
}

/// One visual row of a wrapped line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualRow {
    /// Bytes of the line text shown on this row.
    pub bytes: Range<usize>,
    /// Cells used by the row.
    pub width: usize,
    /// Whether the row continues the previous one.
    pub is_wrap: bool,
}

/// Cell-grid layout: widths in terminal cells, heights in rows times
/// `row_height`.
#[derive(Clone, Debug)]
pub struct CellLayout {
    wrap_mode: WrapMode,
    wrap_width: Option<usize>,
    tab_width: usize,
    width_method: WidthMethod,
    row_height: i32,
}

impl Default for CellLayout {
    fn default() -> Self {
        Self {
            wrap_mode: WrapMode::None,
            wrap_width: None,
            tab_width: 4,
            width_method: WidthMethod::default(),
            row_height: 1,
        }
    }
}

impl CellLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wrapping mode.
    #[must_use]
    pub fn wrap_mode(mut self, mode: WrapMode) -> Self {
        self.wrap_mode = mode;
        self
    }

    /// Set the wrap width in cells. Zero disables wrapping.
    #[must_use]
    pub fn wrap_width(mut self, width: usize) -> Self {
        self.wrap_width = (width > 0).then_some(width);
        self
    }

    /// Set the tab stop distance.
    #[must_use]
    pub fn tab_width(mut self, width: usize) -> Self {
        self.tab_width = width.max(1);
        self
    }

    #[must_use]
    pub fn width_method(mut self, method: WidthMethod) -> Self {
        self.width_method = method;
        self
    }

    /// Height charged per visual row.
    #[must_use]
    pub fn row_height(mut self, height: i32) -> Self {
        self.row_height = height.max(1);
        self
    }

    fn effective_wrap_width(&self) -> Option<usize> {
        if self.wrap_mode == WrapMode::None {
            None
        } else {
            self.wrap_width
        }
    }

    /// Split one line of text (without its newline) into visual rows.
    #[must_use]
    pub fn rows(&self, text: &str) -> Vec<VisualRow> {
        let full_width = || {
            let mut col = 0;
            for cluster in clusters(text, self.width_method) {
                col += cluster.width_at(col, self.tab_width);
            }
            col
        };
        let Some(wrap_width) = self.effective_wrap_width() else {
            return vec![VisualRow {
                bytes: 0..text.len(),
                width: full_width(),
                is_wrap: false,
            }];
        };
        if text.is_empty() {
            return vec![VisualRow {
                bytes: 0..0,
                width: 0,
                is_wrap: false,
            }];
        }

        let word = self.wrap_mode == WrapMode::Word;
        let clusters: Vec<_> = clusters(text, self.width_method).collect();
        let mut rows = Vec::new();
        let mut start_byte = 0usize;
        let mut current_width = 0usize;
        // Width up to the end of the last non-whitespace cluster of the row.
        let mut content_width = 0usize;
        // (break byte, row width without trailing whitespace, index of the
        // next cluster)
        let mut last_break: Option<(usize, usize, usize)> = None;
        let mut i = 0usize;

        while i < clusters.len() {
            let cluster = clusters[i];
            let mut width = cluster.width_at(current_width, self.tab_width);
            if cluster.is_tab {
                // A tab stops at the wrap edge.
                width = width.min(wrap_width.saturating_sub(current_width));
            }

            if word && cluster.is_whitespace {
                last_break = Some((cluster.end(), content_width, i + 1));
            }

            if current_width + width > wrap_width && current_width > 0 {
                let (break_byte, break_width, break_index) = if word {
                    last_break.unwrap_or((cluster.byte_offset, current_width, i))
                } else {
                    (cluster.byte_offset, current_width, i)
                };
                rows.push(VisualRow {
                    bytes: start_byte..break_byte,
                    width: break_width,
                    is_wrap: start_byte > 0,
                });

                start_byte = break_byte;
                current_width = 0;
                content_width = 0;
                last_break = None;
                i = break_index;

                if word {
                    while let Some(next) = clusters.get(i) {
                        if !next.is_whitespace {
                            break;
                        }
                        start_byte = next.end();
                        i += 1;
                    }
                }
                continue;
            }

            current_width += width;
            if !cluster.is_whitespace {
                content_width = current_width;
            }
            i += 1;
        }

        if start_byte < text.len() || rows.is_empty() {
            rows.push(VisualRow {
                bytes: start_byte..text.len(),
                width: current_width,
                is_wrap: start_byte > 0,
            });
        }
        rows
    }
}

impl LineLayout for CellLayout {
    fn wrap(&mut self, line: &LineContent<'_>) -> LineSize {
        let rows = self.rows(&line.text());
        let width = rows.iter().map(|row| row.width).max().unwrap_or(0);
        let count = i32::try_from(rows.len()).unwrap_or(i32::MAX);
        LineSize {
            width: i32::try_from(width).unwrap_or(i32::MAX),
            height: count.saturating_mul(self.row_height),
        }
    }
}
