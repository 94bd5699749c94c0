use std::borrow::Borrow;
use std::sync::Arc;

/// A single slot in the open-addressed array.
///
/// Removal never shifts probe chains. A removed slot becomes a `Tombstone`
/// that lookups probe past, so a key whose probe chain runs through the
/// removed slot remains reachable. Tombstones are dropped wholesale on the
/// next rehash.
pub(crate) enum Slot<K, V> {
    Vacant,
    Tombstone,
    Occupied(Arc<(K, V)>),
}

impl<K, V> Clone for Slot<K, V> {
    fn clone(&self) -> Self {
        match self {
            Slot::Vacant => Slot::Vacant,
            Slot::Tombstone => Slot::Tombstone,
            Slot::Occupied(entry) => Slot::Occupied(entry.clone()),
        }
    }
}

/// An immutable hash-table snapshot.
///
/// Once constructed a table is never mutated in place; every write to the
/// map produces a new table derived from the previous one. Readers therefore
/// observe a consistent snapshot without synchronization.
pub(crate) struct Table<K, V> {
    /// The open-addressed slot array. Always a power-of-two length.
    pub(crate) slots: Box<[Slot<K, V>]>,

    /// The number of occupied slots.
    pub(crate) len: usize,

    /// Occupied plus tombstoned slots. Compared against the growth
    /// threshold so tombstone build-up forces a rehash instead of
    /// degrading probe chains.
    pub(crate) used: usize,
}

/// The result of probing a slot array for a key.
pub(crate) enum Probe {
    /// The key is present at this index.
    Hit(usize),

    /// The key is absent. `insert_at` is the first tombstone on the probe
    /// path, or the vacant slot that terminated it.
    Miss { insert_at: usize },
}

impl<K, V> Table<K, V> {
    /// Creates an empty table with the given power-of-two capacity.
    pub(crate) fn with_capacity(capacity: usize) -> Table<K, V> {
        debug_assert!(capacity.is_power_of_two());

        Table {
            slots: empty_slots(capacity),
            len: 0,
            used: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn probe<Q>(&self, hash: u64, key: &Q) -> Probe
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        probe(&self.slots, hash, key)
    }

    /// Returns the entry for `key`, if present.
    pub(crate) fn entry<Q>(&self, hash: u64, key: &Q) -> Option<&Arc<(K, V)>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self.probe(hash, key) {
            Probe::Hit(i) => match &self.slots[i] {
                Slot::Occupied(entry) => Some(entry),
                _ => unreachable!(),
            },
            Probe::Miss { .. } => None,
        }
    }

    /// Iterates over occupied entries in slot order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Arc<(K, V)>> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        })
    }
}

/// Allocates `capacity` vacant slots.
pub(crate) fn empty_slots<K, V>(capacity: usize) -> Box<[Slot<K, V>]> {
    (0..capacity).map(|_| Slot::Vacant).collect()
}

/// Probes `slots` for `key` with linear probing.
///
/// The index sequence is `hash & (len - 1)`, advancing by one and wrapping.
/// A vacant slot terminates the probe; tombstones are skipped but the first
/// one seen is remembered as the preferred insertion point.
pub(crate) fn probe<K, V, Q>(slots: &[Slot<K, V>], hash: u64, key: &Q) -> Probe
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    let mask = slots.len() - 1;
    let mut i = (hash as usize) & mask;
    let mut tombstone = None;

    for _ in 0..slots.len() {
        match &slots[i] {
            Slot::Vacant => {
                return Probe::Miss {
                    insert_at: tombstone.unwrap_or(i),
                }
            }
            Slot::Tombstone => {
                if tombstone.is_none() {
                    tombstone = Some(i);
                }
            }
            Slot::Occupied(entry) => {
                if entry.0.borrow() == key {
                    return Probe::Hit(i);
                }
            }
        }

        i = (i + 1) & mask;
    }

    // The growth threshold keeps `used` strictly below capacity, so a full
    // scan without a vacant slot means every non-matching slot is occupied
    // or tombstoned; the first tombstone is then the insertion point.
    Probe::Miss {
        insert_at: tombstone.expect("open-addressed table has no free slot"),
    }
}
