use std::collections::{btree_map::IntoIter, BTreeMap};

use bytes::Bytes;

/// Changes represents a batch of pending writes for a single column,
/// kept in memory before they are applied to disk.
#[derive(Clone, Debug, Default)]
pub struct Changes {
    pub writes: BTreeMap<Bytes, Bytes>,
}

impl Changes {
    /// Set a key to a new value.
    /// Returns the previous pending value if any.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<Bytes>
    where
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        self.writes.insert(key.into(), value.into())
    }

    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&Bytes> {
        self.writes.get(key.as_ref())
    }

    /// Pending writes whose key starts with the prefix
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a Bytes, &'a Bytes)> + 'a {
        self.writes
            .range(Bytes::copy_from_slice(prefix)..)
            .take_while(move |(k, _)| k.starts_with(prefix))
    }
}

impl IntoIterator for Changes {
    type Item = (Bytes, Bytes);
    type IntoIter = IntoIter<Bytes, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}
