// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Normalized in-memory store for one client session.
//!
//! Transactions live once in an entity table keyed by id; list entries only
//! hold ids and are resolved on read. Every change to an entry is queued in a
//! per-key change set which the session drains to notify subscribers.
//!
//! Fetches are two-phase so overlapping requests can complete in any order:
//! [`Cache::begin_fetch`] hands out a [`FetchTicket`] stamped with the key's
//! current generation, and [`Cache::complete_fetch`] refuses results whose
//! generation was bumped in between by an invalidation or an eviction.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};

use crate::error::{Error, Result};
use crate::models::{CategoryStat, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    TransactionList,
    CategoryStatistics,
}

impl QueryKind {
    pub fn key(self, user_id: &str) -> QueryKey {
        QueryKey {
            kind: self,
            user_id: user_id.to_string(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QueryKind::TransactionList => "transaction-list",
            QueryKind::CategoryStatistics => "category-statistics",
        }
    }
}

/// Identity of a cacheable read: the query plus the user it is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub user_id: String,
}

impl QueryKey {
    pub fn transactions(user_id: &str) -> Self {
        QueryKind::TransactionList.key(user_id)
    }

    pub fn statistics(user_id: &str) -> Self {
        QueryKind::CategoryStatistics.key(user_id)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.name(), self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Transactions(Vec<Transaction>),
    Statistics(Vec<CategoryStat>),
}

impl QueryData {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryData::Transactions(_) => QueryKind::TransactionList,
            QueryData::Statistics(_) => QueryKind::CategoryStatistics,
        }
    }
}

/// A fetch result plus the entity ids it is known to depend on.
///
/// Transaction lists always know their members. Statistics only do when they
/// were derived locally from a list; a server aggregate leaves `members` empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub data: QueryData,
    pub members: Option<HashSet<String>>,
}

impl From<QueryData> for Fetched {
    fn from(data: QueryData) -> Self {
        Fetched {
            data,
            members: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Absent,
    Loading,
    Fresh,
    Stale,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub freshness: Freshness,
    pub data: Option<QueryData>,
    pub error: Option<Error>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub revision: u64,
}

#[derive(Debug)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
    epoch: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Accepted,
    Discarded,
    Failed(Error),
}

#[derive(Debug)]
enum Stored {
    Transactions(Vec<String>),
    Statistics(Vec<CategoryStat>),
}

#[derive(Debug)]
struct Slot {
    stored: Option<Stored>,
    freshness: Freshness,
    error: Option<Error>,
    fetched_at: Option<DateTime<Utc>>,
    members: HashSet<String>,
    revision: u64,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            stored: None,
            freshness: Freshness::Absent,
            error: None,
            fetched_at: None,
            members: HashSet::new(),
            revision: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Cache {
    entities: HashMap<String, Transaction>,
    slots: HashMap<QueryKey, Slot>,
    // Survives eviction so tickets issued before an eviction stay outdated.
    generations: HashMap<QueryKey, u64>,
    // Outstanding tickets per key and generation. Kept apart from the slot so
    // a ticket from before an eviction never counts against the next fetch.
    in_flight: HashMap<(QueryKey, u64), usize>,
    mutations: HashMap<String, usize>,
    epoch: u64,
    revisions: u64,
    changed: Vec<QueryKey>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, key: &QueryKey) -> CacheEntry {
        match self.slots.get(key) {
            Some(slot) => CacheEntry {
                key: key.clone(),
                freshness: slot.freshness,
                data: slot.stored.as_ref().map(|s| self.resolve(s)),
                error: slot.error.clone(),
                fetched_at: slot.fetched_at,
                revision: slot.revision,
            },
            None => CacheEntry {
                key: key.clone(),
                freshness: Freshness::Absent,
                data: None,
                error: None,
                fetched_at: None,
                revision: 0,
            },
        }
    }

    fn resolve(&self, stored: &Stored) -> QueryData {
        match stored {
            Stored::Transactions(ids) => QueryData::Transactions(
                ids.iter()
                    .filter_map(|id| self.entities.get(id).cloned())
                    .collect(),
            ),
            Stored::Statistics(stats) => QueryData::Statistics(stats.clone()),
        }
    }

    pub fn freshness(&self, key: &QueryKey) -> Freshness {
        self.slots
            .get(key)
            .map(|s| s.freshness)
            .unwrap_or(Freshness::Absent)
    }

    pub fn revision(&self, key: &QueryKey) -> u64 {
        self.slots.get(key).map(|s| s.revision).unwrap_or(0)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Borrowed statistics of `key`, without cloning them out of the entry.
    pub fn statistics(&self, key: &QueryKey) -> Option<&[CategoryStat]> {
        match self.slots.get(key).and_then(|s| s.stored.as_ref()) {
            Some(Stored::Statistics(stats)) => Some(stats),
            _ => None,
        }
    }

    pub fn entity(&self, id: &str) -> Option<&Transaction> {
        self.entities.get(id)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.slots.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stores a result as the key's current value, marking it fresh unless a
    /// mutation for the same user is still in flight.
    pub fn write(&mut self, key: &QueryKey, fetched: impl Into<Fetched>) -> Result<()> {
        let Fetched { data, members } = fetched.into();
        if data.kind() != key.kind {
            let msg = format!("{} result written to {}", data.kind().name(), key);
            error!("{}", msg);
            return Err(Error::State(msg));
        }

        let (stored, members) = match data {
            QueryData::Transactions(list) => {
                let ids: Vec<String> = list.iter().map(|t| t.id.clone()).collect();
                for t in list {
                    self.entities.insert(t.id.clone(), t);
                }
                let listed: HashSet<String> = ids.iter().cloned().collect();
                (Stored::Transactions(ids), listed)
            }
            QueryData::Statistics(stats) => (Stored::Statistics(stats), members.unwrap_or_default()),
        };

        let freshness = if self.mutation_in_flight(&key.user_id) {
            Freshness::Stale
        } else {
            Freshness::Fresh
        };
        self.revisions += 1;
        let revision = self.revisions;

        let slot = self.slots.entry(key.clone()).or_insert_with(Slot::empty);
        slot.stored = Some(stored);
        slot.members = members;
        slot.freshness = freshness;
        slot.error = None;
        slot.fetched_at = Some(Utc::now());
        slot.revision = revision;

        debug!("cache write {} -> {:?} (revision {})", key, freshness, revision);
        self.touch(key);
        Ok(())
    }

    /// Flags the entry as outdated while keeping its last value for display.
    /// Always bumps the key's generation so fetches already in flight are
    /// refused on arrival.
    pub fn mark_stale(&mut self, key: &QueryKey) {
        *self.generations.entry(key.clone()).or_insert(0) += 1;
        let changed = match self.slots.get_mut(key) {
            Some(slot) if slot.freshness != Freshness::Stale => {
                slot.freshness = Freshness::Stale;
                true
            }
            _ => false,
        };
        if changed {
            debug!("cache stale {}", key);
            self.touch(key);
        }
    }

    pub fn fail(&mut self, key: &QueryKey, err: Error) {
        let slot = self.slots.entry(key.clone()).or_insert_with(Slot::empty);
        slot.freshness = Freshness::Failed;
        slot.error = Some(err);
        debug!("cache failed {}", key);
        self.touch(key);
    }

    /// Drops the entity and every entry whose fetch included it.
    pub fn evict_by_entity_id(&mut self, id: &str) -> Vec<QueryKey> {
        self.entities.remove(id);
        let mut evicted: Vec<QueryKey> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.members.contains(id))
            .map(|(key, _)| key.clone())
            .collect();
        evicted.sort();
        for key in &evicted {
            self.slots.remove(key);
            *self.generations.entry(key.clone()).or_insert(0) += 1;
            debug!("cache evict {} (contained {})", key, id);
            self.touch(key);
        }
        evicted
    }

    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchTicket {
        let generation = self.generation(key);
        *self.in_flight.entry((key.clone(), generation)).or_insert(0) += 1;
        let slot = self.slots.entry(key.clone()).or_insert_with(Slot::empty);
        let changed = slot.freshness != Freshness::Loading;
        slot.freshness = Freshness::Loading;
        if changed {
            self.touch(key);
        }
        FetchTicket {
            key: key.clone(),
            generation,
            epoch: self.epoch,
        }
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<Fetched>,
    ) -> Result<Completion> {
        self.check_epoch(&ticket)?;
        self.release(&ticket);
        let key = ticket.key;

        if ticket.generation != self.generation(&key) {
            warn!("discarding superseded fetch of {}", key);
            self.settle(&key);
            return Ok(Completion::Discarded);
        }

        match outcome {
            Ok(fetched) => {
                if let Err(e) = self.write(&key, fetched) {
                    self.settle(&key);
                    return Err(e);
                }
                Ok(Completion::Accepted)
            }
            Err(e) => {
                warn!("fetch of {} failed: {}", key, e);
                self.fail(&key, e.clone());
                Ok(Completion::Failed(e))
            }
        }
    }

    /// Gives up on a ticket without looking at its result.
    pub fn discard(&mut self, ticket: FetchTicket) {
        if ticket.epoch != self.epoch {
            return;
        }
        self.release(&ticket);
        debug!("cache discard fetch of {}", ticket.key);
        self.settle(&ticket.key);
    }

    // A key left loading with nothing in flight falls back to stale, or to
    // absent when it never held a value.
    fn settle(&mut self, key: &QueryKey) {
        let pending = self.pending_fetches(key);
        let (changed, remove) = match self.slots.get_mut(key) {
            Some(slot) if pending == 0 && slot.freshness == Freshness::Loading => {
                if slot.stored.is_some() {
                    slot.freshness = Freshness::Stale;
                    (true, false)
                } else {
                    (true, true)
                }
            }
            _ => (false, false),
        };
        if remove {
            self.slots.remove(key);
        }
        if changed {
            self.touch(key);
        }
    }

    fn release(&mut self, ticket: &FetchTicket) {
        let id = (ticket.key.clone(), ticket.generation);
        if let Some(n) = self.in_flight.get_mut(&id) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.in_flight.remove(&id);
            }
        }
    }

    /// Tickets of the key's current generation that have not come back yet.
    pub fn pending_fetches(&self, key: &QueryKey) -> usize {
        self.in_flight
            .get(&(key.clone(), self.generation(key)))
            .copied()
            .unwrap_or(0)
    }

    fn check_epoch(&self, ticket: &FetchTicket) -> Result<()> {
        if ticket.epoch != self.epoch {
            let msg = format!("fetch of {} was issued before the cache was reset", ticket.key);
            error!("{}", msg);
            return Err(Error::State(msg));
        }
        Ok(())
    }

    fn generation(&self, key: &QueryKey) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    pub fn begin_mutation(&mut self, user_id: &str) {
        *self.mutations.entry(user_id.to_string()).or_insert(0) += 1;
    }

    pub fn end_mutation(&mut self, user_id: &str) {
        if let Some(n) = self.mutations.get_mut(user_id) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.mutations.remove(user_id);
            }
        }
    }

    pub fn mutation_in_flight(&self, user_id: &str) -> bool {
        self.mutations.contains_key(user_id)
    }

    /// Forgets every entry and entity. Tickets issued before the reset fail
    /// with [`Error::State`] when completed.
    pub fn reset(&mut self) {
        let keys = self.keys();
        self.entities.clear();
        self.slots.clear();
        self.generations.clear();
        self.in_flight.clear();
        self.mutations.clear();
        self.epoch += 1;
        for key in &keys {
            self.touch(key);
        }
        debug!("cache reset ({} entries dropped)", keys.len());
    }

    fn touch(&mut self, key: &QueryKey) {
        if !self.changed.contains(key) {
            self.changed.push(key.clone());
        }
    }

    /// Drains the keys changed since the last call, in first-change order.
    pub fn take_changed(&mut self) -> Vec<QueryKey> {
        std::mem::take(&mut self.changed)
    }
}
