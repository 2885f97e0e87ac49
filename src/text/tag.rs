//! Tag table: named formatting ranges and their priorities.

use crate::error::{Error, Result};
use crate::pool::Pool;
use crate::style::Style;
use crate::text::TagId;
use std::collections::HashMap;

/// A formatting tag.
///
/// A tag has no extent of its own; where it applies is recorded by toggle
/// segments in the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextTag {
    name: Option<String>,
    priority: usize,
    style: Style,
}

impl TextTag {
    pub(crate) const fn new(name: Option<String>, priority: usize, style: Style) -> Self {
        Self {
            name,
            priority,
            style,
        }
    }

    /// The tag's name, `None` for anonymous tags.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Position in the table's total order; higher wins.
    #[must_use]
    pub const fn priority(&self) -> usize {
        self.priority
    }

    /// Appearance of tagged text.
    #[must_use]
    pub const fn style(&self) -> Style {
        self.style
    }
}

/// Set of tags known to one tree.
///
/// Priorities always form the dense range `0..len`.
#[derive(Debug, Default)]
pub(crate) struct TagTable {
    tags: Pool<TextTag>,
    names: HashMap<String, TagId>,
}

impl TagTable {
    pub(crate) fn create(&mut self, name: Option<&str>, style: Style) -> Result<TagId> {
        if let Some(name) = name {
            if self.names.contains_key(name) {
                return Err(Error::DuplicateTag(name.to_string()));
            }
        }
        let priority = self.tags.len();
        let id = self
            .tags
            .alloc(TextTag::new(name.map(str::to_string), priority, style));
        if let Some(name) = name {
            self.names.insert(name.to_string(), id);
        }
        Ok(id)
    }

    pub(crate) fn get(&self, id: TagId) -> Result<&TextTag> {
        self.tags.get(id).ok_or(Error::TagNotFound)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<TagId> {
        self.names.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.tags.len()
    }

    pub(crate) fn set_style(&mut self, id: TagId, style: Style) -> Result<()> {
        self.tags.get_mut(id).ok_or(Error::TagNotFound)?.style = style;
        Ok(())
    }

    /// Move a tag to `priority` (clamped to the table), shifting the tags in
    /// between by one.
    pub(crate) fn set_priority(&mut self, id: TagId, priority: usize) -> Result<()> {
        let old = self.get(id)?.priority;
        let priority = priority.min(self.tags.len().saturating_sub(1));
        if priority == old {
            return Ok(());
        }
        for tag in self.tags.values_mut() {
            if priority < old && (priority..old).contains(&tag.priority) {
                tag.priority += 1;
            } else if priority > old && (old + 1..=priority).contains(&tag.priority) {
                tag.priority -= 1;
            }
        }
        self.tags[id].priority = priority;
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: TagId) -> Result<TextTag> {
        let tag = self.tags.free(id).ok_or(Error::TagNotFound)?;
        for other in self.tags.values_mut() {
            if other.priority > tag.priority {
                other.priority -= 1;
            }
        }
        if let Some(name) = &tag.name {
            self.names.remove(name);
        }
        Ok(tag)
    }

    /// Sort ids by ascending priority.
    pub(crate) fn sort_by_priority(&self, ids: &mut [TagId]) {
        ids.sort_by_key(|id| self.tags.get(*id).map_or(0, |tag| tag.priority));
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = TagId> + '_ {
        self.tags.iter().map(|(id, _)| id)
    }
}
