use std::collections::HashSet;
use std::hash::Hash;

/// Set of keys already emitted during one extraction run.
///
/// Owned by the extractor that fills it and dropped with it; nothing here
/// outlives a run.
#[derive(Debug, Clone)]
pub struct DedupIndex<K> {
    seen: HashSet<K>,
}

impl<K: Eq + Hash> Default for DedupIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> DedupIndex<K> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Records `key`, returning true only on its first sighting.
    pub fn first_sighting(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
