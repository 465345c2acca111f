//! Generation-checked slot storage.
//!
//! A [`SparseSet`] hands out [`IndexSlot`]s when values are pushed. Every slot
//! carries a generation counter that is bumped when the slot is freed, so an
//! index that outlived its value is detected instead of silently aliasing
//! whatever was stored in the slot afterwards.

use std::num::NonZeroU64;

use crate::profiling::profile_function;

/// Packed `(generation, index)` pair identifying one slot of a [`SparseSet`].
///
/// The index is stored off-by-one so the packed value is never zero, which
/// keeps `Option<IndexSlot>` the same size as `IndexSlot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexSlot(NonZeroU64);

impl IndexSlot {
    /// # Panics
    ///
    /// Panics if `idx` is `u32::MAX`, which has no off-by-one encoding.
    pub fn new(generation: u32, idx: u32) -> Self {
        assert!(idx < u32::MAX, "slot index {} out of range", idx);
        let packed = ((generation as u64) << 32) | (idx as u64 + 1);
        // idx + 1 fits in the low 32 bits and is at least 1.
        match NonZeroU64::new(packed) {
            Some(value) => Self(value),
            None => unreachable!("packed index slot is never zero"),
        }
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        ((self.0.get() & u32::MAX as u64) - 1) as u32
    }
}

struct Entry<T> {
    generation: u32,
    data: Option<T>,
}

/// Growable pool of values addressed by generation-checked [`IndexSlot`]s.
pub struct SparseSet<T> {
    vec: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseSet<T> {
    pub const fn new() -> Self {
        Self {
            vec: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value, reusing a freed slot when one is available.
    pub fn push(&mut self, data: T) -> IndexSlot {
        profile_function!();
        self.len += 1;
        if let Some(idx) = self.free.pop() {
            let entry = &mut self.vec[idx as usize];
            entry.data = Some(data);
            IndexSlot::new(entry.generation, idx)
        } else {
            let Ok(idx) = u32::try_from(self.vec.len()) else {
                panic!("SparseSet is full");
            };
            self.vec.push(Entry {
                generation: 0,
                data: Some(data),
            });
            IndexSlot::new(0, idx)
        }
    }

    /// Returns `true` if `idx` refers to a live value.
    pub fn contains(&self, idx: IndexSlot) -> bool {
        self.try_get(idx).is_some()
    }

    /// # Panics
    ///
    /// Panics if the slot was freed or never existed.
    pub fn get(&self, idx: IndexSlot) -> &T {
        profile_function!();
        let entry = self.entry(idx);
        match entry.data.as_ref() {
            Some(data) => data,
            None => panic!("invalid generation, use after free!"),
        }
    }

    /// # Panics
    ///
    /// Panics if the slot was freed or never existed.
    pub fn get_mut(&mut self, idx: IndexSlot) -> &mut T {
        profile_function!();
        let entry = self.entry_mut(idx);
        match entry.data.as_mut() {
            Some(data) => data,
            None => panic!("invalid generation, use after free!"),
        }
    }

    pub fn try_get(&self, idx: IndexSlot) -> Option<&T> {
        self.vec
            .get(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
            .and_then(|entry| entry.data.as_ref())
    }

    pub fn try_get_mut(&mut self, idx: IndexSlot) -> Option<&mut T> {
        self.vec
            .get_mut(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
            .and_then(|entry| entry.data.as_mut())
    }

    /// Free the slot and return its value.
    ///
    /// # Panics
    ///
    /// Panics if the slot was already freed or never existed.
    pub fn remove(&mut self, idx: IndexSlot) -> T {
        profile_function!();
        let index = idx.index();
        let entry = self.entry_mut(idx);
        let Some(data) = entry.data.take() else {
            panic!("invalid generation, use after free!");
        };
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        data
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.vec.iter().filter_map(|entry| entry.data.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.vec.iter_mut().filter_map(|entry| entry.data.as_mut())
    }

    /// Iterate over live values together with their current slots.
    pub fn iter_with_slots(&self) -> impl Iterator<Item = (IndexSlot, &T)> {
        self.vec.iter().enumerate().filter_map(|(idx, entry)| {
            entry
                .data
                .as_ref()
                .map(|data| (IndexSlot::new(entry.generation, idx as u32), data))
        })
    }

    /// Collect the slots of all live values.
    pub fn slots(&self) -> Vec<IndexSlot> {
        self.iter_with_slots().map(|(slot, _)| slot).collect()
    }

    fn entry(&self, idx: IndexSlot) -> &Entry<T> {
        let Some(entry) = self.vec.get(idx.index() as usize) else {
            panic!("index {} out of bounds", idx.index());
        };
        assert_eq!(
            entry.generation,
            idx.generation(),
            "invalid generation, use after free!"
        );
        entry
    }

    fn entry_mut(&mut self, idx: IndexSlot) -> &mut Entry<T> {
        let Some(entry) = self.vec.get_mut(idx.index() as usize) else {
            panic!("index {} out of bounds", idx.index());
        };
        assert_eq!(
            entry.generation,
            idx.generation(),
            "invalid generation, use after free!"
        );
        entry
    }
}

static_assertions::assert_eq_size!(IndexSlot, Option<IndexSlot>);
