//! Tree construction options.

/// When the full structural consistency check runs after a mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsistencyChecks {
    /// Never run it automatically; callers may still invoke
    /// [`TextBTree::check`](crate::TextBTree::check).
    Never,
    /// Run it after every mutation in builds with `debug_assertions`.
    #[default]
    DebugOnly,
    /// Run it after every mutation, release builds included.
    Always,
}

/// Options for a [`TextBTree`](crate::TextBTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Minimum fan-out of every non-root node. The maximum is always twice
    /// this value.
    pub min_children: usize,
    /// Automatic consistency checking policy.
    pub consistency_checks: ConsistencyChecks,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            min_children: 6,
            consistency_checks: ConsistencyChecks::DebugOnly,
        }
    }
}

impl TreeOptions {
    /// Smallest fan-out that keeps split and merge well defined.
    pub const MIN_FANOUT: usize = 2;

    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum fan-out (clamped to at least 2).
    #[must_use]
    pub fn with_min_children(mut self, min_children: usize) -> Self {
        self.min_children = min_children.max(Self::MIN_FANOUT);
        self
    }

    /// Set the consistency checking policy.
    #[must_use]
    pub fn with_consistency_checks(mut self, checks: ConsistencyChecks) -> Self {
        self.consistency_checks = checks;
        self
    }

    /// Minimum fan-out of a non-root node.
    #[must_use]
    pub fn min_children(&self) -> usize {
        self.min_children.max(Self::MIN_FANOUT)
    }

    /// Maximum fan-out of any node.
    #[must_use]
    pub fn max_children(&self) -> usize {
        self.min_children() * 2
    }

    /// Whether mutations should run the consistency check.
    #[must_use]
    pub fn checks_enabled(&self) -> bool {
        match self.consistency_checks {
            ConsistencyChecks::Never => false,
            ConsistencyChecks::DebugOnly => cfg!(debug_assertions),
            ConsistencyChecks::Always => true,
        }
    }
}
