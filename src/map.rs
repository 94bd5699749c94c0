use crate::raw;
use crate::raw::table::Slot;

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::error::Error;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

const DEFAULT_CAPACITY: usize = 16;
const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// A copy-on-write hash map.
///
/// Reads never block and never observe a partially applied write: they
/// operate on an immutable table snapshot published by the last successful
/// writer. Writes derive a new table from the snapshot they observed and
/// publish it atomically; if another writer published first, the operation
/// fails with [`ConcurrentModified`] and is never retried internally.
/// Callers that must succeed under contention loop:
///
/// ```
/// use tandem::CowHashMap;
///
/// let map = CowHashMap::new();
/// loop {
///     if map.insert("key", 1).is_ok() {
///         break;
///     }
/// }
/// ```
///
/// Reference access and iteration go through [`CowHashMap::pin`], which
/// captures a snapshot; everything read through it reflects that snapshot
/// even while other threads keep writing.
pub struct CowHashMap<K, V, S = RandomState> {
    pub(crate) raw: raw::CowMap<K, V, S>,
}

/// The error returned when a write detected that another writer published
/// a new table first. The losing operation had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrentModified;

impl fmt::Display for ConcurrentModified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the map was concurrently modified by another writer")
    }
}

impl Error for ConcurrentModified {}

impl<K, V> CowHashMap<K, V> {
    /// Creates an empty map with the default capacity (16) and load
    /// factor (0.75).
    pub fn new() -> CowHashMap<K, V> {
        CowHashMap::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty map with at least the given capacity. The actual
    /// capacity is the next power of two.
    pub fn with_capacity(capacity: usize) -> CowHashMap<K, V> {
        CowHashMap::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Returns a builder for a map with a custom capacity, load factor,
    /// or hasher.
    pub fn builder() -> CowHashMapBuilder<K, V> {
        CowHashMapBuilder {
            capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            hasher: RandomState::new(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> CowHashMap<K, V, S> {
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> CowHashMap<K, V, S> {
        CowHashMap {
            raw: raw::CowMap::new(capacity, DEFAULT_LOAD_FACTOR, hasher),
        }
    }

    /// The number of entries in the current snapshot.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slot-array capacity of the current snapshot.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Captures the current snapshot. All reads through the returned
    /// [`Pinned`] are bound to it: later writes are invisible, and its
    /// `len()` reflects capture time.
    pub fn pin(&self) -> Pinned<'_, K, V, S> {
        Pinned {
            table: self.raw.snapshot(),
            raw: &self.raw,
        }
    }
}

impl<K, V, S> CowHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.raw.snapshot();
        table.entry(self.raw.hash(key), key).is_some()
    }

    /// Returns a clone of the value for `key`. Use [`CowHashMap::pin`] to
    /// read by reference.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let table = self.raw.snapshot();
        table.entry(self.raw.hash(key), key).map(|e| e.1.clone())
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// Fails with [`ConcurrentModified`] if another writer published a new
    /// table between this writer's snapshot read and its publish attempt;
    /// the map is unchanged in that case.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>, ConcurrentModified>
    where
        V: Clone,
    {
        Ok(self.raw.insert_entry(key, value)?.map(|e| e.1.clone()))
    }

    /// Inserts a batch of entries atomically: either the whole batch lands
    /// in one published table, or the operation fails and nothing changes.
    ///
    /// Entries equal to what the map already holds are skipped; if the
    /// whole batch is a no-op, nothing is published and concurrent writers
    /// cannot fail this call.
    pub fn insert_all<I>(&self, entries: I) -> Result<(), ConcurrentModified>
    where
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        self.raw.insert_entries(entries.into_iter().collect())
    }

    /// Removes a key, returning the value it held.
    ///
    /// Removing an absent key publishes nothing and returns `Ok(None)`.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>, ConcurrentModified>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        Ok(self.raw.remove_entry(key)?.map(|e| e.1.clone()))
    }

    /// Removes a batch of keys with at most one publication. Returns
    /// whether anything was removed.
    pub fn remove_all<'a, Q, I>(&self, keys: I) -> Result<bool, ConcurrentModified>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        self.raw.remove_entries(keys)
    }

    /// Publishes an empty table of the same capacity.
    pub fn clear(&self) -> Result<(), ConcurrentModified> {
        self.raw.clear()
    }
}

impl<K, V> Default for CowHashMap<K, V> {
    fn default() -> Self {
        CowHashMap::new()
    }
}

impl<K, V, S> fmt::Debug for CowHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pinned = self.pin();
        f.debug_map().entries(pinned.iter()).finish()
    }
}

impl<K, V, S> PartialEq for CowHashMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        let ours = self.pin();
        let theirs = other.pin();

        ours.len() == theirs.len() && ours.iter().all(|(k, v)| theirs.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for CowHashMap<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> FromIterator<(K, V)> for CowHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = CowHashMap::with_capacity_and_hasher(DEFAULT_CAPACITY, S::default());
        for (key, value) in iter {
            // The map is exclusively owned here, so publication cannot race.
            let _ = map.raw.insert_entry(key, value);
        }
        map
    }
}

/// A builder for a [`CowHashMap`].
pub struct CowHashMapBuilder<K, V, S = RandomState> {
    capacity: usize,
    load_factor: f64,
    hasher: S,
    _kv: PhantomData<(K, V)>,
}

impl<K, V, S> CowHashMapBuilder<K, V, S> {
    /// The initial capacity, rounded up to a power of two.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// The load factor. Growth is triggered once the occupied portion of
    /// the table would exceed `capacity * load_factor`.
    ///
    /// [`build`](CowHashMapBuilder::build) panics if the load factor is
    /// not positive and finite.
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn hasher<S2>(self, hasher: S2) -> CowHashMapBuilder<K, V, S2> {
        CowHashMapBuilder {
            capacity: self.capacity,
            load_factor: self.load_factor,
            hasher,
            _kv: PhantomData,
        }
    }

    pub fn build(self) -> CowHashMap<K, V, S> {
        assert!(
            self.load_factor.is_finite() && self.load_factor > 0.0,
            "illegal load factor: {}",
            self.load_factor
        );

        CowHashMap {
            raw: raw::CowMap::new(self.capacity, self.load_factor, self.hasher),
        }
    }
}

/// A snapshot view of a [`CowHashMap`], captured by [`CowHashMap::pin`].
///
/// All reads reflect the table at capture time. References returned by
/// [`get`](Pinned::get) and the iterators stay valid for the life of the
/// snapshot, even if the map has since been rewritten.
pub struct Pinned<'map, K, V, S> {
    table: Arc<raw::table::Table<K, V>>,
    raw: &'map raw::CowMap<K, V, S>,
}

impl<K, V, S> Pinned<'_, K, V, S> {
    /// The number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.table.len
    }

    pub fn is_empty(&self) -> bool {
        self.table.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.table.slots.iter(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { iter: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { iter: self.iter() }
    }
}

impl<K, V, S> Pinned<'_, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.raw.hash(key);
        self.table.entry(hash, key).map(|entry| &entry.1)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.raw.hash(key);
        self.table.entry(hash, key).map(|entry| (&entry.0, &entry.1))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<'pin, K, V, S> IntoIterator for &'pin Pinned<'_, K, V, S> {
    type Item = (&'pin K, &'pin V);
    type IntoIter = Iter<'pin, K, V>;

    fn into_iter(self) -> Iter<'pin, K, V> {
        self.iter()
    }
}

impl<K, V, S> fmt::Debug for Pinned<'_, K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An iterator over a snapshot's entries.
pub struct Iter<'pin, K, V> {
    slots: std::slice::Iter<'pin, Slot<K, V>>,
}

impl<'pin, K, V> Iterator for Iter<'pin, K, V> {
    type Item = (&'pin K, &'pin V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.slots.next()? {
                Slot::Occupied(entry) => return Some((&entry.0, &entry.1)),
                _ => continue,
            }
        }
    }
}

/// An iterator over a snapshot's keys.
pub struct Keys<'pin, K, V> {
    iter: Iter<'pin, K, V>,
}

impl<'pin, K, V> Iterator for Keys<'pin, K, V> {
    type Item = &'pin K;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(k, _)| k)
    }
}

/// An iterator over a snapshot's values.
pub struct Values<'pin, K, V> {
    iter: Iter<'pin, K, V>,
}

impl<'pin, K, V> Iterator for Values<'pin, K, V> {
    type Item = &'pin V;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(_, v)| v)
    }
}
