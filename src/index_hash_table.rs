use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashSet, FxHasher};

use crate::error::{Error, Result};

/// Read-only hash table mapping a fixed key set to dense indexes
///
/// The table is built once from a list of unique keys, the index of a key
/// is its position in that list. Slots are resolved with linear probing at
/// construction time and never change afterwards, so lookups can be shared
/// between threads without any locking.
#[derive(Clone)]
pub struct IndexHashTable<T> {
    keys: Vec<T>,
    slots: Vec<Option<u32>>,
}

impl<T: Hash + Eq> IndexHashTable<T> {
    /// Build the table from `keys` and a load factor in `(0, 1]`
    ///
    /// The slot array holds `ceil(keys.len() / load_factor)` entries.
    pub fn new(keys: Vec<T>, load_factor: f64) -> Result<Self> {
        if !(load_factor > 0.0 && load_factor <= 1.0) {
            return Err(Error::config("load factor must be in (0, 1]"));
        }
        if u32::try_from(keys.len()).is_err() {
            return Err(Error::invalid_input("too many keys for an index table"));
        }

        let capacity = ((keys.len() as f64 / load_factor).ceil() as usize).max(1);
        let mut slots = vec![None; capacity];
        let mut seen = FxHashSet::default();
        for (index, key) in keys.iter().enumerate() {
            if !seen.insert(key) {
                return Err(Error::invalid_input("index table keys must be unique"));
            }
            let mut slot = slot_for(key, capacity);
            while slots[slot].is_some() {
                slot = (slot + 1) % capacity;
            }
            slots[slot] = Some(index as u32);
        }

        Ok(Self { keys, slots })
    }

    /// Look up the index of `key`, `None` if it was never inserted
    ///
    /// Probing visits each slot at most once, so a missing key whose probe
    /// path runs through a completely full table is still reported missing.
    pub fn get<Q>(&self, key: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let capacity = self.slots.len();
        let mut slot = slot_for(key, capacity);
        for _ in 0..capacity {
            let index = self.slots[slot]? as usize;
            if self.keys[index].borrow() == key {
                return Some(index);
            }
            slot = (slot + 1) % capacity;
        }
        None
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<T> IndexHashTable<T> {
    /// Number of keys in the table
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// All keys ordered by their index
    pub fn keys(&self) -> &[T] {
        &self.keys
    }

    /// Key stored at `index`
    pub fn key(&self, index: usize) -> Option<&T> {
        self.keys.get(index)
    }
}

impl<T: fmt::Debug> fmt::Debug for IndexHashTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHashTable")
            .field("len", &self.keys.len())
            .field("capacity", &self.slots.len())
            .finish()
    }
}

fn slot_for<Q: Hash + ?Sized>(key: &Q, capacity: usize) -> usize {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % capacity as u64) as usize
}
