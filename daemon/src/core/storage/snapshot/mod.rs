mod changes;

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

use bytes::Bytes;

pub use changes::Changes;

/// Snapshot is a transactional batch of changes that can be committed or rolled back.
///
/// Besides the pending writes per column, it keeps the read set: every key
/// loaded from disk for a conditional write, with the value observed at that time.
/// A commit is only valid if all of them are still unchanged on disk.
#[derive(Debug)]
pub struct Snapshot<C: Hash + Eq> {
    /// Pending changes organized by column
    pub trees: HashMap<C, Changes>,
    /// Disk values observed by tracked reads, keyed by column and key
    pub reads: HashMap<(C, Bytes), Option<Bytes>>,
}

impl<C: Hash + Eq + Clone> Default for Snapshot<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Hash + Eq + Clone> Snapshot<C> {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            reads: HashMap::new(),
        }
    }

    /// Insert a key-value pair into our snapshot.
    /// Returns the previous pending value.
    pub fn put<K: Into<Bytes>, V: Into<Bytes>>(
        &mut self,
        column: C,
        key: K,
        value: V,
    ) -> Option<Bytes> {
        self.trees.entry(column).or_default().insert(key, value)
    }

    /// Get a value written by our snapshot.
    /// None means the disk holds the current value.
    pub fn get<K: AsRef<[u8]>>(&self, column: &C, key: K) -> Option<&Bytes> {
        self.trees.get(column)?.get(key)
    }

    /// Record the value observed on disk for a key.
    /// The latest observation wins, as only the last read of a key can have
    /// led to a write.
    pub fn record_read<K: Into<Bytes>>(&mut self, column: C, key: K, value: Option<Bytes>) {
        self.reads.insert((column, key.into()), value);
    }

    /// Merge our pending writes of a column into the entries read from disk
    /// for the same prefix.
    pub fn merge_prefix(
        &self,
        column: &C,
        prefix: &[u8],
        entries: &mut BTreeMap<Bytes, Bytes>,
    ) {
        if let Some(changes) = self.trees.get(column) {
            for (key, value) in changes.with_prefix(prefix) {
                entries.insert(key.clone(), value.clone());
            }
        }
    }

    /// Whether the snapshot would write anything
    pub fn has_changes(&self) -> bool {
        self.trees.values().any(|changes| !changes.writes.is_empty())
    }
}
