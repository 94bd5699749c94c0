pub(crate) mod table;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::mem;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use self::table::{empty_slots, probe, Probe, Slot, Table};
use crate::map::ConcurrentModified;

/// The copy-on-write hash map core.
///
/// A single atomically swappable handle holds the current [`Table`]
/// snapshot. Readers load the handle without locking. Writers read the
/// handle once, derive a candidate table from that snapshot outside any
/// lock, then publish it under the `publishing` mutex with an identity
/// check against the snapshot they started from. If another writer
/// published in the meantime the check fails and the whole operation
/// reports [`ConcurrentModified`]; retrying is the caller's decision.
pub(crate) struct CowMap<K, V, S> {
    /// The current table snapshot.
    current: ArcSwap<Table<K, V>>,

    /// Serializes the publish step. Only the identity check and the swap
    /// run under this lock.
    publishing: Mutex<()>,

    build_hasher: S,

    /// Growth is triggered once `used` would exceed `capacity * load_factor`.
    load_factor: f64,
}

impl<K, V, S> CowMap<K, V, S> {
    pub(crate) fn new(capacity: usize, load_factor: f64, build_hasher: S) -> CowMap<K, V, S> {
        let capacity = capacity.next_power_of_two().max(1);

        CowMap {
            current: ArcSwap::from_pointee(Table::with_capacity(capacity)),
            publishing: Mutex::new(()),
            build_hasher,
            load_factor,
        }
    }

    /// Returns the current table snapshot.
    pub(crate) fn snapshot(&self) -> Arc<Table<K, V>> {
        self.current.load_full()
    }

    pub(crate) fn len(&self) -> usize {
        self.current.load().len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.current.load().capacity()
    }

    fn threshold(&self, capacity: usize) -> usize {
        (capacity as f64 * self.load_factor) as usize
    }

    /// Publishes `next` if the current table is still the snapshot the
    /// writer derived it from.
    fn publish(
        &self,
        expected: &Arc<Table<K, V>>,
        slots: Vec<Slot<K, V>>,
        len: usize,
        used: usize,
    ) -> Result<(), ConcurrentModified> {
        let next = Table {
            slots: slots.into_boxed_slice(),
            len,
            used,
        };

        let _publishing = self.publishing.lock().unwrap();

        let current = self.current.load();
        if !Arc::ptr_eq(&current, expected) {
            return Err(ConcurrentModified);
        }

        self.current.store(Arc::new(next));
        Ok(())
    }
}

impl<K, V, S> CowMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub(crate) fn hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        self.build_hasher.hash_one(key)
    }

    pub(crate) fn insert_entry(
        &self,
        key: K,
        value: V,
    ) -> Result<Option<Arc<(K, V)>>, ConcurrentModified> {
        let t = self.snapshot();
        let (mut slots, mut len, mut used) = self.grown(&t, 1);
        let hash = self.hash(&key);

        let prev = match probe(&slots, hash, &key) {
            Probe::Hit(i) => {
                match mem::replace(&mut slots[i], Slot::Occupied(Arc::new((key, value)))) {
                    Slot::Occupied(entry) => Some(entry),
                    _ => unreachable!(),
                }
            }
            Probe::Miss { insert_at } => {
                if !matches!(slots[insert_at], Slot::Tombstone) {
                    used += 1;
                }
                slots[insert_at] = Slot::Occupied(Arc::new((key, value)));
                len += 1;
                None
            }
        };

        self.publish(&t, slots, len, used)?;
        Ok(prev)
    }

    /// Installs a whole batch into one candidate table with a single
    /// publication. Entries whose value compares equal to the stored one
    /// are skipped and do not count as a change.
    pub(crate) fn insert_entries(&self, entries: Vec<(K, V)>) -> Result<(), ConcurrentModified>
    where
        V: PartialEq,
    {
        if entries.is_empty() {
            return Ok(());
        }

        let t = self.snapshot();
        let (mut slots, mut len, mut used) = self.grown(&t, entries.len());
        let mut changed = false;

        for (key, value) in entries {
            let hash = self.hash(&key);
            match probe(&slots, hash, &key) {
                Probe::Hit(i) => {
                    let same = match &slots[i] {
                        Slot::Occupied(entry) => entry.1 == value,
                        _ => unreachable!(),
                    };
                    if !same {
                        slots[i] = Slot::Occupied(Arc::new((key, value)));
                        changed = true;
                    }
                }
                Probe::Miss { insert_at } => {
                    if !matches!(slots[insert_at], Slot::Tombstone) {
                        used += 1;
                    }
                    slots[insert_at] = Slot::Occupied(Arc::new((key, value)));
                    len += 1;
                    changed = true;
                }
            }
        }

        if changed {
            self.publish(&t, slots, len, used)?;
        }
        Ok(())
    }

    pub(crate) fn remove_entry<Q>(
        &self,
        key: &Q,
    ) -> Result<Option<Arc<(K, V)>>, ConcurrentModified>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let t = self.snapshot();
        let hash = self.hash(key);

        match t.probe(hash, key) {
            Probe::Miss { .. } => Ok(None),
            Probe::Hit(i) => {
                let mut slots = t.slots.to_vec();
                let prev = match mem::replace(&mut slots[i], Slot::Tombstone) {
                    Slot::Occupied(entry) => entry,
                    _ => unreachable!(),
                };
                self.publish(&t, slots, t.len - 1, t.used)?;
                Ok(Some(prev))
            }
        }
    }

    /// Batch removal with at most one publication. The slot array is
    /// copied lazily on the first hit, so an all-miss batch publishes
    /// nothing at all.
    pub(crate) fn remove_entries<'a, Q, I>(&self, keys: I) -> Result<bool, ConcurrentModified>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let t = self.snapshot();
        let mut slots: Option<Vec<Slot<K, V>>> = None;
        let mut removed = 0;

        for key in keys {
            let hash = self.hash(key);
            let hit = match &slots {
                Some(slots) => probe(slots, hash, key),
                None => t.probe(hash, key),
            };

            if let Probe::Hit(i) = hit {
                let slots = slots.get_or_insert_with(|| t.slots.to_vec());
                slots[i] = Slot::Tombstone;
                removed += 1;
            }
        }

        match slots {
            Some(slots) => {
                self.publish(&t, slots, t.len - removed, t.used)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn clear(&self) -> Result<(), ConcurrentModified> {
        let t = self.snapshot();
        let slots = empty_slots(t.capacity()).into_vec();
        self.publish(&t, slots, 0, 0)
    }

    /// Returns a mutable copy of the snapshot's slots, grown and rehashed
    /// if `additional` more entries would push `used` past the threshold.
    ///
    /// Rehashing drops tombstones, so the target capacity is sized from
    /// the live count; a tombstone-heavy table may rehash at its current
    /// capacity.
    fn grown(&self, t: &Table<K, V>, additional: usize) -> (Vec<Slot<K, V>>, usize, usize) {
        let trigger = t.used + additional;
        let capacity = t.capacity();

        if trigger <= self.threshold(capacity) && trigger < capacity {
            return (t.slots.to_vec(), t.len, t.used);
        }

        let needed = t.len + additional;
        let mut new_capacity = capacity;
        while needed > self.threshold(new_capacity) || needed >= new_capacity {
            new_capacity = new_capacity.checked_mul(2).expect("capacity overflow");
        }

        let mut slots = empty_slots(new_capacity).into_vec();
        for entry in t.entries() {
            let hash = self.hash(&entry.0);
            if let Probe::Miss { insert_at } = probe(&slots, hash, &entry.0) {
                slots[insert_at] = Slot::Occupied(entry.clone());
            }
        }

        (slots, t.len, t.len)
    }
}
