//! Fixed-capacity slab of resident layer slots.
//!
//! The resident set is backed by a 2D array texture with a fixed number
//! of layers; this allocator hands out and reclaims the layer indices.
//! It owns only the free/used bookkeeping; the backing resource itself
//! belongs to the graphics collaborator behind
//! [`SlotBackend`](crate::store::SlotBackend).

/// Opaque identifier of one resident layer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

impl LayerId {
    /// Returns the raw layer index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer {}", self.0)
    }
}

/// Slab allocator over `[0, capacity)` layer indices.
///
/// At most `capacity` slots are handed out simultaneously and no index is
/// handed out twice before a matching [`free`](Self::free). Callers must
/// treat the returned ids as opaque: no ordering is guaranteed.
#[derive(Debug)]
pub struct LayerAllocator {
    free: Vec<u32>,
    used: Vec<bool>,
}

impl LayerAllocator {
    /// Creates an allocator with `capacity` slots, all free.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            free: (0..capacity).rev().collect(),
            used: vec![false; capacity as usize],
        }
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.used.len() as u32
    }

    /// Number of slots currently handed out.
    #[must_use]
    pub fn in_use(&self) -> u32 {
        self.capacity() - self.free.len() as u32
    }

    /// Hands out a free slot, or `None` when the slab is exhausted.
    pub fn allocate(&mut self) -> Option<LayerId> {
        let index = self.free.pop()?;
        self.used[index as usize] = true;
        Some(LayerId(index))
    }

    /// Reclaims a slot, making it immediately reusable.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already free: a double free indicates a
    /// double-eviction bug in the cache and silently ignoring it would
    /// corrupt slot ownership.
    pub fn free(&mut self, id: LayerId) {
        assert!(
            self.used[id.0 as usize],
            "double free of resident {id}"
        );
        self.used[id.0 as usize] = false;
        self.free.push(id.0);
    }

    /// Whether a slot is currently free.
    #[must_use]
    pub fn is_free(&self, id: LayerId) -> bool {
        !self.used[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_capacity_bound() {
        let mut alloc = LayerAllocator::new(4);
        let mut held = Vec::new();
        while let Some(id) = alloc.allocate() {
            held.push(id);
        }
        assert_eq!(held.len(), 4);
        assert_eq!(alloc.in_use(), 4);
        assert!(alloc.allocate().is_none());
    }

    #[test]
    fn test_ids_unique_while_held() {
        let mut alloc = LayerAllocator::new(8);
        let ids: Vec<_> = (0..8).filter_map(|_| alloc.allocate()).collect();
        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_freed_slot_is_reusable() {
        let mut alloc = LayerAllocator::new(1);
        let id = alloc.allocate().expect("one slot free");
        assert!(alloc.allocate().is_none());
        alloc.free(id);
        assert!(alloc.allocate().is_some());
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        let mut alloc = LayerAllocator::new(2);
        let id = alloc.allocate().expect("slot free");
        alloc.free(id);
        alloc.free(id);
    }

    proptest! {
        /// For any interleaving of allocs and frees, the in-use count
        /// never exceeds capacity and no id is held twice.
        #[test]
        fn prop_no_overlap_under_any_sequence(ops in prop::collection::vec(any::<bool>(), 0..200)) {
            let mut alloc = LayerAllocator::new(8);
            let mut held: Vec<LayerId> = Vec::new();

            for op in ops {
                if op {
                    if let Some(id) = alloc.allocate() {
                        prop_assert!(!held.contains(&id), "id handed out twice");
                        held.push(id);
                    } else {
                        prop_assert_eq!(held.len(), 8);
                    }
                } else if let Some(id) = held.pop() {
                    alloc.free(id);
                }
                prop_assert!(alloc.in_use() <= alloc.capacity());
                prop_assert_eq!(alloc.in_use() as usize, held.len());
            }
        }
    }
}
