//! Cell widths of grapheme clusters.

use unicode_width::UnicodeWidthStr;

/// How East Asian ambiguous-width characters are measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WidthMethod {
    /// One cell, as most terminals using wcwidth do.
    #[default]
    WcWidth,
    /// Two cells, the CJK-locale reading of Unicode East Asian Width.
    Unicode,
}

/// Cells taken by one grapheme cluster. Clusters holding a control
/// character take none.
#[must_use]
pub fn cluster_width(grapheme: &str, method: WidthMethod) -> usize {
    if grapheme.len() == 1 {
        let byte = grapheme.as_bytes()[0];
        return usize::from((0x20..0x7f).contains(&byte));
    }
    if grapheme.chars().any(char::is_control) {
        return 0;
    }
    match method {
        WidthMethod::WcWidth => grapheme.width(),
        WidthMethod::Unicode => grapheme.width_cjk(),
    }
}
