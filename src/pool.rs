//! Generational slot pool backing the tree's nodes, lines, marks and tags.
//!
//! Slots are recycled through a free-list. Each slot carries a generation
//! counter that is bumped on reuse, so a [`Handle`] that outlived its value
//! is detected instead of silently aliasing whatever took the slot.
//!
//! # Usage
//!
//! ```
//! use textbtree::pool::Pool;
//!
//! let mut pool = Pool::new();
//! let a = pool.alloc("first");
//! assert_eq!(pool.get(a), Some(&"first"));
//!
//! pool.free(a);
//! let b = pool.alloc("second");
//! assert!(pool.get(a).is_none()); // same slot, newer generation
//! assert_eq!(pool[b], "second");
//! ```
//!
//! # Invariants
//!
//! - A handle is live iff its slot is occupied and generations match
//! - `get`/`get_mut`/`free` on a dead handle are no-ops returning `None`
//! - Indexing with a dead handle panics; the tree only indexes handles it
//!   owns a live reference to

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Typed handle to a value stored in a [`Pool`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            marker: PhantomData,
        }
    }

    /// Slot index of this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would require `T: Clone` etc.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)?;
        if self.generation > 0 {
            write!(f, "v{}", self.generation)?;
        }
        Ok(())
    }
}

/// Statistics about pool utilization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of slots ever created (occupied or free).
    pub total_slots: usize,
    /// Number of occupied slots.
    pub active_slots: usize,
    /// Number of free slots awaiting reuse.
    pub free_slots: usize,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Generational arena with O(1) alloc, free and lookup.
#[derive(Clone, Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    active: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    /// Create an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            active: 0,
        }
    }

    /// Store a value, reusing a freed slot when one is available.
    pub fn alloc(&mut self, value: T) -> Handle<T> {
        self.active += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        assert!(index < u32::MAX, "pool exhausted");
        self.slots.push(Slot {
            value: Some(value),
            generation: 0,
        });
        Handle::new(index, 0)
    }

    /// Remove a value, returning it if the handle was live.
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        self.free_list.push(handle.index);
        self.active -= 1;
        Some(value)
    }

    /// Get a value by handle.
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable value by handle.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether the handle refers to a live value.
    #[must_use]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.active
    }

    /// Whether the pool holds no live values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Iterate over live values with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let index = u32::try_from(index).ok()?;
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index, slot.generation), value))
        })
    }

    /// Iterate mutably over live values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    /// Utilization statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_slots: self.slots.len(),
            active_slots: self.active,
            free_slots: self.free_list.len(),
        }
    }
}

impl<T> Index<Handle<T>> for Pool<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("stale pool handle {handle:?}"),
        }
    }
}

impl<T> IndexMut<Handle<T>> for Pool<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("stale pool handle {handle:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_new() {
        let pool: Pool<u8> = Pool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn test_alloc_and_get() {
        let mut pool = Pool::new();
        let a = pool.alloc(10);
        let b = pool.alloc(20);
        assert_eq!(pool.get(a), Some(&10));
        assert_eq!(pool[b], 20);
        assert_eq!(pool.len(), 2);
        pool[a] += 1;
        assert_eq!(pool[a], 11);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut pool = Pool::new();
        let a = pool.alloc("a");
        assert_eq!(pool.free(a), Some("a"));
        let b = pool.alloc("b");
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(pool.get(a).is_none());
        assert!(!pool.contains(a));
        assert!(pool.contains(b));
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut pool = Pool::new();
        let a = pool.alloc(1);
        assert!(pool.free(a).is_some());
        assert!(pool.free(a).is_none());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.stats().free_slots, 1);
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut pool = Pool::new();
        let a = pool.alloc('a');
        let b = pool.alloc('b');
        let c = pool.alloc('c');
        pool.free(b);
        let live: Vec<_> = pool.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(live, vec![(a, 'a'), (c, 'c')]);
    }

    #[test]
    #[should_panic(expected = "stale pool handle")]
    fn test_index_with_stale_handle_panics() {
        let mut pool = Pool::new();
        let a = pool.alloc(1);
        pool.free(a);
        let _ = pool[a];
    }

    #[test]
    fn test_handle_debug() {
        let mut pool = Pool::new();
        let a = pool.alloc(());
        assert_eq!(format!("{a:?}"), "#0");
        pool.free(a);
        let b = pool.alloc(());
        assert_eq!(format!("{b:?}"), "#0v1");
    }
}
