//! Fact index: key tuple → collection of fact handles.
//!
//! Every bucket of a type memory keeps two indexes, a main index of committed
//! facts and a delta index of facts inserted since the last commit. Merging
//! moves the delta into the main index and empties the delta.
//!
//! Keys whose handle set becomes empty are not removed eagerly. They stay in
//! the index (and in any beta memory rows that reference them) until
//! [`FactIndex::compact`] is called; readers treat an empty key as absent.

use std::collections::{BTreeMap, HashMap};

use ember_foundation::FactHandle;

use crate::key::MemoryKey;

/// One key and the handles stored under it.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    key: MemoryKey,
    /// Handles keyed by fact id, so iteration is ordered by fact id.
    handles: BTreeMap<u64, FactHandle>,
}

impl IndexEntry {
    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &MemoryKey {
        &self.key
    }

    /// Returns true if at least one handle is stored under the key.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Iterates handles ordered by fact id.
    pub fn handles(&self) -> impl Iterator<Item = FactHandle> + '_ {
        self.handles.values().copied()
    }

    /// Returns the number of handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if there are no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Index from memory keys to fact handles.
#[derive(Clone, Debug, Default)]
pub struct FactIndex {
    slots: HashMap<MemoryKey, usize>,
    entries: Vec<IndexEntry>,
}

impl FactIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index with room for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Adds a handle under `key`.
    ///
    /// Returns true if the key was not present before (including the case of
    /// a key that was present but had become empty).
    pub fn insert(&mut self, key: MemoryKey, handle: FactHandle) -> bool {
        let slot = match self.slots.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.entries.push(IndexEntry {
                    key: key.clone(),
                    handles: BTreeMap::new(),
                });
                self.slots.insert(key, slot);
                slot
            }
        };
        let entry = &mut self.entries[slot];
        let was_empty = entry.handles.is_empty();
        entry.handles.insert(handle.id, handle);
        was_empty
    }

    /// Removes a handle from under `key`.
    ///
    /// Returns true if the handle (with matching version) was present. The
    /// key itself stays in the index even when its handle set empties.
    pub fn remove(&mut self, key: &MemoryKey, handle: FactHandle) -> bool {
        let Some(&slot) = self.slots.get(key) else {
            return false;
        };
        let handles = &mut self.entries[slot].handles;
        if handles.get(&handle.id) == Some(&handle) {
            handles.remove(&handle.id);
            true
        } else {
            false
        }
    }

    /// Returns the entry for `key`, if any.
    #[must_use]
    pub fn entry(&self, key: &MemoryKey) -> Option<&IndexEntry> {
        self.slots.get(key).map(|&slot| &self.entries[slot])
    }

    /// Iterates the handles stored under `key` (empty if absent).
    pub fn lookup(&self, key: &MemoryKey) -> impl Iterator<Item = FactHandle> + '_ {
        self.entry(key).into_iter().flat_map(IndexEntry::handles)
    }

    /// Returns true if `key` has at least one handle.
    #[must_use]
    pub fn has_live(&self, key: &MemoryKey) -> bool {
        self.entry(key).is_some_and(IndexEntry::is_live)
    }

    /// Iterates entries in first-insertion order, including empty ones.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Iterates keys that currently have handles, in first-insertion order.
    pub fn live_keys(&self) -> impl Iterator<Item = &MemoryKey> {
        self.entries
            .iter()
            .filter(|e| e.is_live())
            .map(IndexEntry::key)
    }

    /// Returns the number of keys, including empty ones.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the total number of handles.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.entries.iter().map(IndexEntry::len).sum()
    }

    /// Returns true if no handle is stored under any key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(IndexEntry::is_empty)
    }

    /// Moves every handle of `other` into `self` and empties `other`.
    ///
    /// Handles already present are not duplicated, so merging the same
    /// content twice leaves `self` unchanged the second time. Keys new to
    /// `self` are appended in `other`'s order.
    pub fn merge(&mut self, other: &mut FactIndex) {
        for entry in other.entries.drain(..) {
            for handle in entry.handles.into_values() {
                self.insert(entry.key.clone(), handle);
            }
        }
        other.slots.clear();
    }

    /// Removes every key and handle.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.entries.clear();
    }

    /// Drops keys with no handles. Returns the number of keys dropped.
    pub fn compact(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(IndexEntry::is_live);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            self.slots.clear();
            for (slot, entry) in self.entries.iter().enumerate() {
                self.slots.insert(entry.key.clone(), slot);
            }
        }
        dropped
    }
}
