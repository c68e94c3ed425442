// src/arena.rs

//! Generational slot arena
//!
//! Index-stable storage for broker records. A [`Key`] names one slot and one
//! generation of that slot, so a key held past its record's removal never
//! aliases whatever reuses the slot later.
//!
//! # Design
//!
//! - `insert` is O(1) amortized (free list of vacated slots)
//! - `remove`, `get`, `get_mut` are O(1)
//! - Slots can be *reserved* before their value exists, which lets the
//!   registry hand a stable identity to a backend that is still building
//!   the record

use alloc::vec::Vec;

/// Handle to one generation of one arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    index: usize,
    generation: u32,
}

impl Key {
    /// Slot index
    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Generation of the slot this key was issued for
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

enum Entry<T> {
    /// Available for reuse
    Vacant {
        generation: u32,
        next_free: Option<usize>,
    },
    /// Key issued, value not yet stored
    Reserved { generation: u32 },
    Occupied { generation: u32, value: T },
}

impl<T> Entry<T> {
    const fn generation(&self) -> u32 {
        match self {
            Entry::Vacant { generation, .. }
            | Entry::Reserved { generation }
            | Entry::Occupied { generation, .. } => *generation,
        }
    }
}

/// Generational slot arena
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<usize>,
    /// Occupied slots
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Create an empty arena
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Issue a key whose value will be stored later with [`Arena::fill`]
    pub fn reserve(&mut self) -> Key {
        // The free list only ever links vacant entries
        if let Some(index) = self.free_head {
            if let Entry::Vacant {
                generation,
                next_free,
            } = self.entries[index]
            {
                self.free_head = next_free;
                self.entries[index] = Entry::Reserved { generation };
                return Key { index, generation };
            }
        }

        let index = self.entries.len();
        self.entries.push(Entry::Reserved { generation: 0 });
        Key {
            index,
            generation: 0,
        }
    }

    /// Store the value for a reserved key
    ///
    /// Returns the value back if `key` is not currently reserved.
    pub fn fill(&mut self, key: Key, value: T) -> Result<(), T> {
        match self.entries.get(key.index) {
            Some(Entry::Reserved { generation }) if *generation == key.generation => {
                self.entries[key.index] = Entry::Occupied {
                    generation: key.generation,
                    value,
                };
                self.len += 1;
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Give back a reserved key that will never be filled
    pub fn release(&mut self, key: Key) -> bool {
        match self.entries.get(key.index) {
            Some(Entry::Reserved { generation }) if *generation == key.generation => {
                self.vacate(key.index);
                true
            }
            _ => false,
        }
    }

    /// Insert a value, returning its key
    pub fn insert(&mut self, value: T) -> Key {
        let key = self.reserve();
        self.entries[key.index] = Entry::Occupied {
            generation: key.generation,
            value,
        };
        self.len += 1;
        key
    }

    /// Remove and return the value stored under `key`
    pub fn remove(&mut self, key: Key) -> Option<T> {
        match self.entries.get(key.index) {
            Some(Entry::Occupied { generation, .. }) if *generation == key.generation => {}
            _ => return None,
        }
        self.len -= 1;
        match self.vacate(key.index) {
            Entry::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn get(&self, key: Key) -> Option<&T> {
        match self.entries.get(key.index) {
            Some(Entry::Occupied { generation, value }) if *generation == key.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.entries.get_mut(key.index) {
            Some(Entry::Occupied { generation, value }) if *generation == key.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Iterate over occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (Key, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    Key {
                        index,
                        generation: *generation,
                    },
                    value,
                )),
                _ => None,
            })
    }

    /// Turn slot `index` vacant, bumping its generation, and return what it held
    fn vacate(&mut self, index: usize) -> Entry<T> {
        let generation = self.entries[index].generation().wrapping_add(1);
        let old = core::mem::replace(
            &mut self.entries[index],
            Entry::Vacant {
                generation,
                next_free: self.free_head,
            },
        );
        self.free_head = Some(index);
        old
    }
}

impl<T> core::fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("slots", &self.entries.len())
            .finish()
    }
}
