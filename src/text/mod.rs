//! The text engine: a B-tree of lines holding segment chains.
//!
//! Key types:
//!
//! - [`TextBTree`]: the document, its tag table, marks and view caches
//! - [`TextIter`]: a position that re-resolves itself after edits
//! - [`Segment`]: the units of a line (text runs, tag toggles, marks)
//! - [`LineLayout`] / [`CellLayout`]: per-view line sizing
//!
//! # Examples
//!
//! ```
//! use textbtree::{CellLayout, Style, TextBTree, ViewId, WrapMode};
//!
//! let mut tree = TextBTree::new();
//! let mut at = tree.start_iter();
//! tree.insert_text(&mut at, "some bold text").unwrap();
//!
//! let bold = tree.create_tag("bold", Style::bold()).unwrap();
//! let start = tree.iter_at_char(5).unwrap();
//! let end = tree.iter_at_char(9).unwrap();
//! tree.apply_tag(&start, &end, bold, true).unwrap();
//! assert!(tree.has_tag(&tree.iter_at_char(6).unwrap(), bold).unwrap());
//!
//! let view = ViewId(1);
//! let layout = CellLayout::new().wrap_mode(WrapMode::Char).wrap_width(5);
//! tree.add_view(view, layout).unwrap();
//! tree.validate(view, 100).unwrap();
//! assert_eq!(tree.view_size(view).unwrap(), (5, 3));
//! ```

mod btree;
mod check;
mod iter;
mod layout;
mod line;
mod mark;
mod node;
mod segment;
mod tag;
mod tagging;
mod view;

use crate::pool::Handle;

pub use btree::{INSERT_MARK_NAME, SELECTION_BOUND_MARK_NAME, TextBTree};
pub use iter::{IterOrigin, IterState, TextIter};
pub use layout::{CellLayout, LineLayout, LineSize, VisualRow, WrapMode};
pub use line::LineContent;
pub use mark::Mark;
pub use segment::{CharRun, MarkSegment, Segment};
pub use tag::TextTag;
pub use view::{LineViewData, ValidateResult, ViewId};

pub(crate) use line::Line;
pub(crate) use node::Node;

pub(crate) type NodeId = Handle<Node>;
pub(crate) type LineId = Handle<Line>;
/// Handle to a mark of one tree.
pub type MarkId = Handle<Mark>;
/// Handle to a tag of one tree.
pub type TagId = Handle<TextTag>;
