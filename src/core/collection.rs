//! Insertion-ordered keyed container.
//!
//! `OrderedMap` is the mutable builder over an `IndexMap`: lookups by key
//! are O(1) while iteration follows insertion order (or the order left by
//! the last `sort_by`). `freeze` turns it into a `FrozenMap`, a cheap-to-clone
//! read-only view. Record context uses the pair: a builder while the span
//! runs, a frozen view once it stops.
//!
//! Both serialize as JSON objects in iteration order, which is what the
//! snapshot relies on to keep its `records` map sorted on the wire.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

/// Mutable insertion-ordered map
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: IndexMap<K, V>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get_mut(key)
    }

    /// Insert or replace. A replaced value keeps its original position.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Insert only when the key is absent
    pub fn add(&mut self, key: K, value: V) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        self.entries.entry(key).or_insert_with(make)
    }

    /// Remove `key`, keeping the order of the remaining entries
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.shift_remove(key)
    }

    /// Remove and return the last entry
    pub fn pop(&mut self) -> Option<(K, V)> {
        self.entries.pop()
    }

    /// Merge entries from `items`. With `replace_existing = false`, keys
    /// already present are left untouched.
    pub fn merge<I>(&mut self, items: I, replace_existing: bool)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in items {
            if replace_existing {
                self.entries.insert(key, value);
            } else {
                self.entries.entry(key).or_insert(value);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stable sort of the entries by value
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        self.entries.sort_by(|_, a, _, b| compare(a, b));
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, K, V> {
        self.entries.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, K, V> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> indexmap::map::ValuesMut<'_, K, V> {
        self.entries.values_mut()
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.entries.last()
    }

    /// Seal the map into a read-only view
    pub fn freeze(self) -> FrozenMap<K, V> {
        FrozenMap(Arc::new(self))
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = indexmap::map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Equal when both hold the same entries in the same order
impl<K: PartialEq, V: PartialEq> PartialEq for OrderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl<K: Serialize, V: Serialize> Serialize for OrderedMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedMap<K, V>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IndexMap::deserialize(deserializer).map(|entries| Self { entries })
    }
}

/// Read-only view over a frozen `OrderedMap`
#[derive(Debug)]
pub struct FrozenMap<K, V>(Arc<OrderedMap<K, V>>);

impl<K, V> Clone for FrozenMap<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> Default for FrozenMap<K, V> {
    fn default() -> Self {
        Self(Arc::new(OrderedMap::default()))
    }
}

impl<K: Eq + Hash + Clone, V: Clone> FrozenMap<K, V> {
    /// Copy the entries back into a mutable builder
    pub fn to_builder(&self) -> OrderedMap<K, V> {
        (*self.0).clone()
    }
}

impl<K, V> Deref for FrozenMap<K, V> {
    type Target = OrderedMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for FrozenMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<K: Serialize, V: Serialize> Serialize for FrozenMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
