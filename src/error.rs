//! Error types for text tree operations.

use crate::text::ViewId;
use std::fmt;

/// Result type alias for text tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for text tree operations.
///
/// Every variant is a caller-visible logic error: the tree is in-memory and
/// deterministic, so nothing here is transient or worth retrying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The iterator is stale and could not be re-resolved from its origin
    /// (its mark was removed, its offset no longer exists, or it belongs to
    /// another tree).
    InvalidIterator,
    /// An offset or line number lies beyond the document bounds.
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// The tag id does not name a tag in this tree's tag table.
    TagNotFound,
    /// A tag with this name already exists.
    DuplicateTag(String),
    /// The view was never registered (or has been removed).
    ViewNotRegistered(ViewId),
    /// The view id is already in use.
    ViewAlreadyRegistered(ViewId),
    /// No mark with this name (or handle) exists.
    MarkNotFound(String),
    /// The insertion point and selection bound can only be moved.
    MarkNotDeletable(String),
    /// A mutator was invoked while the tree was calling out to a layout.
    ReentrantMutation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIterator => write!(f, "iterator is stale and cannot be re-resolved"),
            Self::OutOfRange { what, index, len } => {
                write!(f, "{what} {index} out of range (limit {len})")
            }
            Self::TagNotFound => write!(f, "tag not found in tag table"),
            Self::DuplicateTag(name) => write!(f, "tag `{name}` already exists"),
            Self::ViewNotRegistered(view) => write!(f, "view {} is not registered", view.0),
            Self::ViewAlreadyRegistered(view) => {
                write!(f, "view {} is already registered", view.0)
            }
            Self::MarkNotFound(name) => write!(f, "no mark `{name}` exists"),
            Self::MarkNotDeletable(name) => write!(f, "can't delete special mark `{name}`"),
            Self::ReentrantMutation => {
                write!(f, "tree mutated from inside a layout callback")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Description of a broken structural invariant, reported by
/// [`TextBTree::check`](crate::TextBTree::check).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation(pub String);

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invariant violated: {}", self.0)
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::OutOfRange {
            what: "line",
            index: 10,
            len: 3,
        };
        assert_eq!(err.to_string(), "line 10 out of range (limit 3)");

        let err = Error::ViewNotRegistered(ViewId(7));
        assert!(err.to_string().contains("view 7"));

        let err = Error::MarkNotDeletable("insert".to_string());
        assert!(err.to_string().contains("`insert`"));
    }

    #[test]
    fn test_invariant_violation_display() {
        let violation = InvariantViolation("node 3 has 1 child".to_string());
        assert_eq!(violation.to_string(), "invariant violated: node 3 has 1 child");
    }
}
