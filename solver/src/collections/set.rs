use std::marker::PhantomData;

/// A set of handles, backed by a bitset over their indices.
#[derive(Clone)]
pub struct RefSet<K> {
    set: bit_set::BitSet,
    _phantom: PhantomData<K>,
}

impl<K: Into<usize>> RefSet<K> {
    pub fn new() -> RefSet<K> {
        RefSet {
            set: Default::default(),
            _phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Adds `k` to the set, returning true if it was not already present.
    pub fn insert(&mut self, k: K) -> bool {
        self.set.insert(k.into())
    }

    /// Removes `k` from the set, returning true if it was present.
    pub fn remove(&mut self, k: K) -> bool {
        self.set.remove(k.into())
    }

    pub fn clear(&mut self) {
        self.set.clear()
    }

    pub fn contains(&self, k: K) -> bool {
        self.set.contains(k.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = K> + '_
    where
        K: From<usize>,
    {
        self.set.iter().map(K::from)
    }
}

impl<K: Into<usize>> Default for RefSet<K> {
    fn default() -> Self {
        Self::new()
    }
}
