//! Grapheme cluster iteration with cell widths.

use crate::unicode::width::{WidthMethod, cluster_width};
use unicode_segmentation::UnicodeSegmentation;

/// One grapheme cluster of a measured string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cluster {
    /// Byte offset of the cluster in the measured string.
    pub byte_offset: usize,
    /// Byte length of the cluster.
    pub byte_len: usize,
    /// Cells the cluster occupies. Zero for a tab, whose width depends on
    /// the column it lands on (see [`Cluster::width_at`]).
    pub width: usize,
    /// Whether the cluster is a horizontal tab.
    pub is_tab: bool,
    /// Whether the cluster is whitespace (a word-wrap break opportunity).
    pub is_whitespace: bool,
}

impl Cluster {
    /// Cells occupied when the cluster starts at `col`.
    #[must_use]
    pub fn width_at(&self, col: usize, tab_width: usize) -> usize {
        if self.is_tab {
            let tab_width = tab_width.max(1);
            tab_width - (col % tab_width)
        } else {
            self.width
        }
    }

    /// Byte offset just past the cluster.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.byte_offset + self.byte_len
    }
}

/// Iterate over the extended grapheme clusters of `s`.
pub fn clusters(s: &str, method: WidthMethod) -> impl Iterator<Item = Cluster> + '_ {
    s.grapheme_indices(true).map(move |(byte_offset, grapheme)| {
        let is_tab = grapheme == "\t";
        Cluster {
            byte_offset,
            byte_len: grapheme.len(),
            width: if is_tab {
                0
            } else {
                cluster_width(grapheme, method)
            },
            is_tab,
            is_whitespace: grapheme.chars().all(char::is_whitespace),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clusters_ascii() {
        let widths: Vec<_> = clusters("hello", WidthMethod::WcWidth)
            .map(|c| c.width)
            .collect();
        assert_eq!(widths, vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_clusters_emoji_sequence_is_one() {
        assert_eq!(clusters("👨‍👩‍👧", WidthMethod::WcWidth).count(), 1);
    }

    #[test]
    fn test_clusters_combining() {
        let c: Vec<_> = clusters("e\u{0301}x", WidthMethod::WcWidth).collect();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].byte_len, 3);
        assert_eq!(c[0].end(), 3);
        assert_eq!(c[1].byte_offset, 3);
    }

    #[test]
    fn test_tab_width_depends_on_column() {
        let tab = clusters("\t", WidthMethod::WcWidth).next().unwrap();
        assert!(tab.is_tab);
        assert!(tab.is_whitespace);
        assert_eq!(tab.width_at(0, 4), 4);
        assert_eq!(tab.width_at(2, 4), 2);
        assert_eq!(tab.width_at(3, 0), 1);
    }
}
