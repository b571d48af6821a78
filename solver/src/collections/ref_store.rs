use itertools::Itertools;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A handle that can be converted to and from a dense index.
pub trait Ref: Into<usize> + From<usize> + Copy + PartialEq {}

impl<X> Ref for X where X: Into<usize> + From<usize> + Copy + PartialEq {}

/// Declares a new handle type, backed by a `NonZeroU32` so that `Option<Handle>` fits in 32 bits.
///
/// The generated type converts from/to `usize` and `u32` and can directly index a `Vec`.
#[macro_export]
macro_rules! create_ref_type {
    ($type_name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        pub struct $type_name(std::num::NonZeroU32);

        impl $type_name {
            pub const fn to_u32(self) -> u32 {
                self.0.get() - 1
            }
            pub const fn from_u32(u: u32) -> Self {
                match std::num::NonZeroU32::new(u + 1) {
                    Some(id) => $type_name(id),
                    None => panic!("handle overflow"),
                }
            }
        }
        impl From<usize> for $type_name {
            fn from(u: usize) -> Self {
                Self::from_u32(u as u32)
            }
        }
        impl From<$type_name> for usize {
            fn from(v: $type_name) -> Self {
                v.to_u32() as usize
            }
        }
        impl From<u32> for $type_name {
            fn from(u: u32) -> Self {
                Self::from_u32(u)
            }
        }
        impl From<$type_name> for u32 {
            fn from(v: $type_name) -> Self {
                v.to_u32()
            }
        }
        impl std::fmt::Debug for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", stringify!($type_name), self.to_u32())
            }
        }

        impl<V> std::ops::Index<$type_name> for Vec<V> {
            type Output = V;

            fn index(&self, index: $type_name) -> &Self::Output {
                &self[usize::from(index)]
            }
        }
        impl<V> std::ops::IndexMut<$type_name> for Vec<V> {
            fn index_mut(&mut self, index: $type_name) -> &mut Self::Output {
                &mut self[usize::from(index)]
            }
        }
    };
}

/// A vector whose indices are handles of type `K`.
///
/// Keys are allocated densely: the n-th pushed value has key `K::from(n)`.
#[derive(Clone, PartialEq, Eq)]
pub struct RefVec<K, V> {
    values: Vec<V>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefVec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RefVec<K, V> {
    pub fn new() -> Self {
        RefVec {
            values: Vec::new(),
            phantom: PhantomData,
        }
    }

    /// Grows the vector (if needed) so that `key` is a valid index, filling new slots with `value_gen()`.
    pub fn fill_with(&mut self, key: K, value_gen: impl Fn() -> V)
    where
        K: Ref,
    {
        let index: usize = key.into();
        while self.values.len() <= index {
            self.values.push(value_gen());
        }
    }

    pub fn contains(&self, k: K) -> bool
    where
        K: Into<usize>,
    {
        k.into() < self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: V) -> K
    where
        K: From<usize>,
    {
        self.values.push(value);
        K::from(self.values.len() - 1)
    }

    pub fn get(&self, k: K) -> Option<&V>
    where
        K: Into<usize>,
    {
        self.values.get(k.into())
    }

    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: From<usize>,
    {
        (0..self.values.len()).map(K::from)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.values.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)>
    where
        K: From<usize>,
    {
        self.values.iter().enumerate().map(|(i, v)| (K::from(i), v))
    }
}

impl<K: Into<usize>, V> Index<K> for RefVec<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        &self.values[index.into()]
    }
}

impl<K: Into<usize>, V> IndexMut<K> for RefVec<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.values[index.into()]
    }
}

impl<K, V> FromIterator<V> for RefVec<K, V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        RefVec {
            values: iter.into_iter().collect(),
            phantom: PhantomData,
        }
    }
}

impl<K: Ref + Debug, V: Debug> Debug for RefVec<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.entries().map(|(k, v)| format!("{k:?}: {v:?}")).format(", "))
    }
}

/// A sparse map from handles to values, backed by a vector of optional values.
///
/// Clearing the map keeps the allocated capacity which makes it suitable as a scratch structure.
#[derive(Clone)]
pub struct RefMap<K, V> {
    entries: Vec<Option<V>>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefMap<K, V> {
    fn default() -> Self {
        RefMap {
            entries: Vec::new(),
            phantom: PhantomData,
        }
    }
}

impl<K: Ref, V> RefMap<K, V> {
    pub fn insert(&mut self, k: K, v: V) {
        let index = k.into();
        if self.entries.len() <= index {
            self.entries.resize_with(index + 1, || None);
        }
        self.entries[index] = Some(v);
    }

    /// Removes all elements from the map.
    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = None);
    }

    pub fn remove(&mut self, k: K) -> Option<V> {
        self.entries.get_mut(k.into()).and_then(|e| e.take())
    }

    pub fn contains(&self, k: K) -> bool {
        self.get(k).is_some()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        self.entries.get(k.into()).and_then(|e| e.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.as_ref().map(|v| (K::from(idx), v)))
    }
}

impl<K: Ref, V> FromIterator<(K, V)> for RefMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut m = RefMap::default();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

impl<K: Ref + Debug, V: Debug> Debug for RefMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.entries().map(|(k, v)| format!("{k:?} -> {v:?}")).format(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::create_ref_type!(Key);

    #[test]
    fn handles_are_dense() {
        let mut v: RefVec<Key, &str> = RefVec::new();
        let a = v.push("a");
        let b = v.push("b");
        assert_eq!(usize::from(a), 0);
        assert_eq!(usize::from(b), 1);
        assert_eq!(v[b], "b");
        assert_eq!(v.keys().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(format!("{a:?}"), "Key0");
        assert_eq!(std::mem::size_of::<Option<Key>>(), 4);
    }

    #[test]
    fn fill_and_lookup() {
        let mut v: RefVec<Key, u32> = RefVec::new();
        v.fill_with(Key::from(3usize), || 7);
        assert_eq!(v.len(), 4);
        assert!(v.contains(Key::from(3usize)));
        assert!(!v.contains(Key::from(4usize)));
        assert_eq!(v.get(Key::from(9usize)), None);
    }

    #[test]
    fn sparse_map() {
        let mut m: RefMap<Key, i32> = RefMap::default();
        m.insert(Key::from(5usize), -1);
        m.insert(Key::from(1usize), 4);
        assert_eq!(m.get(Key::from(5usize)), Some(&-1));
        assert!(!m.contains(Key::from(2usize)));
        assert_eq!(m.entries().count(), 2);
        assert_eq!(m.remove(Key::from(1usize)), Some(4));
        m.clear();
        assert_eq!(m.entries().count(), 0);
    }
}
