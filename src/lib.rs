//! `textbtree` - rich-text document storage for editors and terminal UIs.
//!
//! A balanced tree of lines whose leaves hold segment chains (text runs,
//! tag toggles, marks). Counts and per-tag toggle summaries kept on every
//! node make conversions between line, byte and character addressing, tag
//! queries and toggle searches logarithmic. Any number of views can cache
//! per-line sizes and revalidate them incrementally on a pixel budget.
//!
//! # Example
//!
//! ```
//! use textbtree::TextBTree;
//!
//! let mut tree = TextBTree::new();
//! let mut at = tree.start_iter();
//! tree.insert_text(&mut at, "hello world").unwrap();
//!
//! // A left-gravity mark stays put when text is inserted at its position.
//! let five = tree.iter_at_char(5).unwrap();
//! let mark = tree.create_mark(Some("anchor"), &five, true).unwrap();
//! let mut at = tree.iter_at_char(5).unwrap();
//! tree.insert_text(&mut at, ",").unwrap();
//!
//! assert_eq!(tree.text(), "hello, world");
//! assert_eq!(tree.iter_at_mark(mark).unwrap().char_offset(&tree).unwrap(), 5);
//! ```

// Crate-level lint configuration
#![allow(clippy::module_name_repetitions)] // TextTag, TextIter etc read better in full
#![allow(clippy::missing_errors_doc)] // Error cases are listed on Error
#![allow(clippy::missing_panics_doc)] // Panics only on corrupted trees
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::must_use_candidate)] // Accessors are marked where it matters
#![allow(clippy::return_self_not_must_use)] // Builders follow the options style
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::significant_drop_tightening)] // Callback locks are short-lived
#![allow(clippy::redundant_pub_crate)] // pub(crate) marks engine internals

pub mod config;
pub mod error;
pub mod event;
pub mod pool;
pub mod style;
pub mod text;
pub mod unicode;

// Re-export core types at crate root
pub use config::{ConsistencyChecks, TreeOptions};
pub use error::{Error, InvariantViolation, Result};
pub use event::{
    LogLevel, clear_event_callback, clear_log_callback, emit_event, emit_log,
    set_event_callback, set_log_callback,
};
pub use pool::{Handle, Pool, PoolStats};
pub use style::{Color, Style, TextAttributes};
pub use text::{
    CellLayout, CharRun, INSERT_MARK_NAME, IterOrigin, IterState, LineContent, LineLayout,
    LineSize, LineViewData, Mark, MarkId, MarkSegment, SELECTION_BOUND_MARK_NAME, Segment, TagId,
    TextBTree, TextIter, TextTag, ValidateResult, ViewId, VisualRow, WrapMode,
};
pub use unicode::WidthMethod;
