//! Appearance carried by tags.
//!
//! - [`TextAttributes`]: bitflags for bold, italic, underline and friends
//! - [`Style`]: optional colors plus attributes, attached to a
//!   [`TextTag`](crate::TextTag)
//!
//! The tree never interprets a style. It only layers the styles of the tags
//! active at a position, lowest priority first, in
//! [`TextBTree::style_at`](crate::TextBTree::style_at).
//!
//! # Examples
//!
//! ```
//! use textbtree::{Color, Style, TextAttributes};
//!
//! let keyword = Style::fg(Color::Indexed(4)).with_bold();
//! let error = Style::underline().with_fg(Color::Rgb(255, 0, 0));
//!
//! // The upper layer wins for colors, attributes accumulate.
//! let both = keyword.merge(error);
//! assert_eq!(both.fg, Some(Color::Rgb(255, 0, 0)));
//! assert!(both.attributes.contains(TextAttributes::BOLD | TextAttributes::UNDERLINE));
//! ```

use bitflags::bitflags;

bitflags! {
    /// Attributes a tag switches on. Layering only ever adds attributes.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct TextAttributes: u8 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const BLINK         = 1 << 4;
        /// Foreground and background swapped.
        const INVERSE       = 1 << 5;
        const HIDDEN        = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

/// A terminal color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    /// Entry of the 256-color palette.
    Indexed(u8),
    /// Truecolor.
    Rgb(u8, u8, u8),
}

/// Colors and attributes of one tag.
///
/// A color left at `None` lets lower-priority tags (or the view's default)
/// show through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attributes: TextAttributes,
}

impl Style {
    /// A style that changes nothing when layered.
    pub const NONE: Self = Self {
        fg: None,
        bg: None,
        attributes: TextAttributes::empty(),
    };

    #[must_use]
    pub const fn fg(color: Color) -> Self {
        Self::NONE.with_fg(color)
    }

    #[must_use]
    pub const fn bg(color: Color) -> Self {
        Self::NONE.with_bg(color)
    }

    #[must_use]
    pub const fn bold() -> Self {
        Self::NONE.with_attributes(TextAttributes::BOLD)
    }

    #[must_use]
    pub const fn italic() -> Self {
        Self::NONE.with_attributes(TextAttributes::ITALIC)
    }

    #[must_use]
    pub const fn underline() -> Self {
        Self::NONE.with_attributes(TextAttributes::UNDERLINE)
    }

    #[must_use]
    pub const fn with_fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    #[must_use]
    pub const fn with_bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    #[must_use]
    pub const fn with_attributes(mut self, attributes: TextAttributes) -> Self {
        self.attributes = self.attributes.union(attributes);
        self
    }

    #[must_use]
    pub const fn with_bold(self) -> Self {
        self.with_attributes(TextAttributes::BOLD)
    }

    #[must_use]
    pub const fn with_italic(self) -> Self {
        self.with_attributes(TextAttributes::ITALIC)
    }

    /// Whether layering this style would change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Layer `upper` on top of `self`: its colors replace ours where set,
    /// attributes are combined.
    #[must_use]
    pub fn merge(self, upper: Self) -> Self {
        Self {
            fg: upper.fg.or(self.fg),
            bg: upper.bg.or(self.bg),
            attributes: self.attributes | upper.attributes,
        }
    }

    /// Layer `styles` in order, the last one on top.
    #[must_use]
    pub fn layered(styles: impl IntoIterator<Item = Self>) -> Self {
        styles.into_iter().fold(Self::NONE, Self::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_lower_colors_and_adds_attributes() {
        let lower = Style::fg(Color::Indexed(1)).with_bold();
        let upper = Style::bg(Color::Indexed(4)).with_italic();

        let merged = lower.merge(upper);

        assert_eq!(merged.fg, Some(Color::Indexed(1)));
        assert_eq!(merged.bg, Some(Color::Indexed(4)));
        assert_eq!(merged.attributes, TextAttributes::BOLD | TextAttributes::ITALIC);
    }

    #[test]
    fn test_upper_color_wins() {
        let lower = Style::fg(Color::Rgb(1, 2, 3));
        let upper = Style::fg(Color::Rgb(9, 9, 9));
        assert_eq!(lower.merge(upper).fg, Some(Color::Rgb(9, 9, 9)));
        assert_eq!(upper.merge(Style::NONE).fg, Some(Color::Rgb(9, 9, 9)));
    }

    #[test]
    fn test_layered_order() {
        let styles = [
            Style::fg(Color::Indexed(1)),
            Style::underline(),
            Style::fg(Color::Indexed(2)),
        ];
        let style = Style::layered(styles);
        assert_eq!(style.fg, Some(Color::Indexed(2)));
        assert!(style.attributes.contains(TextAttributes::UNDERLINE));
        assert_eq!(Style::layered([]), Style::NONE);
    }

    #[test]
    fn test_empty() {
        assert!(Style::NONE.is_empty());
        assert!(Style::default().is_empty());
        assert!(!Style::bold().is_empty());
        assert!(!Style::bg(Color::Indexed(0)).is_empty());
    }
}
