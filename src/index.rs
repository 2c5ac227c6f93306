//! Identity index: a separately chained hash table keyed by identity.
//!
//! Entries live in a slab addressed by [`EntryId`]; buckets and chain links
//! only store ids. A resize rethreads the chains into a larger bucket table
//! without moving any entry, so ids held by the rank tree stay valid.

use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;
use tracing::debug;

use crate::entry::UserEntry;
use crate::error::{LeaderboardError, Result};
use crate::tree::NodeId;
use crate::Config;

/// Stable handle to an entry owned by an [`IdentityIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of [`IdentityIndex::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    /// The identity was new; a chain node was appended.
    Inserted(EntryId),
    /// The identity existed with a different score; the tree must re-key it.
    Rescored { id: EntryId, previous: i64 },
    /// The identity existed with the same score (the name may have changed).
    Unchanged { id: EntryId, renamed: bool },
}

impl Upsert {
    #[inline]
    pub fn id(self) -> EntryId {
        match self {
            Upsert::Inserted(id) | Upsert::Rescored { id, .. } | Upsert::Unchanged { id, .. } => id,
        }
    }

    /// The score before the update, only when it changed.
    #[inline]
    pub fn previous_score(self) -> Option<i64> {
        match self {
            Upsert::Rescored { previous, .. } => Some(previous),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct Slot {
    entry: UserEntry,
    next: Option<EntryId>,
}

/// Hash index from identity key to [`UserEntry`].
///
/// Iteration order is unspecified and changes across resizes.
#[derive(Clone, Debug)]
pub struct IdentityIndex {
    buckets: Vec<Option<EntryId>>,
    slots: Vec<Option<Slot>>,
    free: Vec<EntryId>,
    len: usize,
    max_load_factor: f64,
}

impl IdentityIndex {
    /// Index sized for `expected` identities with the default [`Config`].
    pub fn new(expected: usize) -> Self {
        Self::with_config(expected, &Config::default())
    }

    pub fn with_config(expected: usize, config: &Config) -> Self {
        let capacity = ((expected as f64) * config.capacity_headroom).ceil() as usize;
        let capacity = capacity.max(1);
        Self {
            buckets: vec![None; capacity],
            slots: Vec::with_capacity(expected),
            free: Vec::new(),
            len: 0,
            max_load_factor: config.max_load_factor,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Live entries per bucket.
    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    #[inline]
    fn bucket_of(&self, identity: &str, capacity: usize) -> usize {
        (FxBuildHasher.hash_one(identity) % capacity as u64) as usize
    }

    #[inline]
    fn slot(&self, id: EntryId) -> &Slot {
        self.slots[id.idx()]
            .as_ref()
            .expect("entry id refers to a removed entry")
    }

    #[inline]
    fn slot_mut(&mut self, id: EntryId) -> &mut Slot {
        self.slots[id.idx()]
            .as_mut()
            .expect("entry id refers to a removed entry")
    }

    /// Entry behind a live id.
    ///
    /// # Panics
    /// Panics if `id` was removed from this index.
    #[inline]
    pub fn get(&self, id: EntryId) -> &UserEntry {
        &self.slot(id).entry
    }

    /// Records the rank tree node now holding `id`.
    #[inline]
    pub(crate) fn attach(&mut self, id: EntryId, node: NodeId) {
        self.slot_mut(id).entry.node = node;
    }

    /// Finds the id stored for `identity`, if any.
    pub fn find(&self, identity: &str) -> Option<EntryId> {
        let mut cur = self.buckets[self.bucket_of(identity, self.buckets.len())];
        while let Some(id) = cur {
            let slot = self.slot(id);
            if slot.entry.identity() == identity {
                return Some(id);
            }
            cur = slot.next;
        }
        None
    }

    pub fn lookup(&self, identity: &str) -> Result<&UserEntry> {
        self.find(identity)
            .map(|id| self.get(id))
            .ok_or_else(|| LeaderboardError::UnknownIdentity(identity.to_owned()))
    }

    /// Inserts `entry`, or overwrites name and score of the entry already
    /// stored under its identity.
    pub fn insert(&mut self, entry: UserEntry) -> Upsert {
        if let Some(id) = self.find(entry.identity()) {
            let existing = &mut self.slot_mut(id).entry;
            let renamed = existing.display_name() != entry.display_name();
            let previous = existing.absorb(entry);
            return if previous == existing.score() {
                Upsert::Unchanged { id, renamed }
            } else {
                Upsert::Rescored { id, previous }
            };
        }

        let bucket = self.bucket_of(entry.identity(), self.buckets.len());
        let slot = Slot {
            entry,
            next: self.buckets[bucket],
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.idx()] = Some(slot);
                id
            }
            None => {
                let raw = u32::try_from(self.slots.len()).expect("identity index exceeds u32 ids");
                self.slots.push(Some(slot));
                EntryId(raw)
            }
        };
        self.buckets[bucket] = Some(id);
        self.len += 1;

        self.check_load();
        Upsert::Inserted(id)
    }

    /// Unlinks and returns the entry stored for `identity`.
    pub fn remove(&mut self, identity: &str) -> Result<UserEntry> {
        let bucket = self.bucket_of(identity, self.buckets.len());
        let mut prev: Option<EntryId> = None;
        let mut cur = self.buckets[bucket];
        while let Some(id) = cur {
            let next = self.slot(id).next;
            if self.slot(id).entry.identity() == identity {
                match prev {
                    Some(p) => self.slot_mut(p).next = next,
                    None => self.buckets[bucket] = next,
                }
                let slot = self.slots[id.idx()]
                    .take()
                    .expect("chained id must be live");
                self.free.push(id);
                self.len -= 1;
                return Ok(slot.entry);
            }
            prev = Some(id);
            cur = next;
        }
        Err(LeaderboardError::UnknownIdentity(identity.to_owned()))
    }

    /// All live entries, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &UserEntry)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (EntryId(i as u32), &s.entry)))
    }

    fn check_load(&mut self) {
        if self.load_factor() > self.max_load_factor {
            self.resize(self.buckets.len() * 2);
        }
    }

    fn resize(&mut self, capacity: usize) {
        let old_capacity = self.buckets.len();
        let mut buckets: Vec<Option<EntryId>> = vec![None; capacity];
        for i in 0..self.slots.len() {
            let Some(slot) = self.slots[i].as_ref() else {
                continue;
            };
            let bucket = self.bucket_of(slot.entry.identity(), capacity);
            let id = EntryId(i as u32);
            self.slot_mut(id).next = buckets[bucket];
            buckets[bucket] = Some(id);
        }
        self.buckets = buckets;
        debug!(
            from = old_capacity,
            to = capacity,
            len = self.len,
            "identity index resized"
        );
    }
}
