// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::fmt;

use crate::cache::{CacheEntry, Freshness, QueryData, QueryKey};
use crate::error::Error;
use crate::models::{CategoryStat, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Error,
}

/// What a subscriber renders. `stale` is set whenever `data` is a
/// last-known-good value rather than a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub key: QueryKey,
    pub phase: Phase,
    pub data: Option<QueryData>,
    pub error: Option<Error>,
    pub stale: bool,
}

impl View {
    pub fn transactions(&self) -> Option<&[Transaction]> {
        match &self.data {
            Some(QueryData::Transactions(list)) => Some(list),
            _ => None,
        }
    }

    pub fn statistics(&self) -> Option<&[CategoryStat]> {
        match &self.data {
            Some(QueryData::Statistics(stats)) => Some(stats),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready && !self.stale
    }
}

impl From<CacheEntry> for View {
    fn from(entry: CacheEntry) -> Self {
        let has_data = entry.data.is_some();
        let phase = match entry.freshness {
            Freshness::Failed => Phase::Error,
            Freshness::Fresh | Freshness::Stale if has_data => Phase::Ready,
            _ => Phase::Loading,
        };
        View {
            key: entry.key,
            phase,
            stale: has_data && entry.freshness != Freshness::Fresh,
            data: entry.data,
            error: entry.error,
        }
    }
}

type Callback = Box<dyn FnMut(&View)>;

struct Subscriber {
    key: QueryKey,
    callback: Callback,
    last: Option<View>,
}

impl Subscriber {
    // Skips delivery when the subscriber already saw an identical view.
    fn deliver(&mut self, view: &View) -> bool {
        if self.last.as_ref() == Some(view) {
            return false;
        }
        (self.callback)(view);
        self.last = Some(view.clone());
        true
    }
}

/// Registry of view callbacks keyed by query.
#[derive(Default)]
pub struct Binder {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, key: QueryKey, callback: F) -> SubscriptionId
    where
        F: FnMut(&View) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.insert(
            id,
            Subscriber {
                key,
                callback: Box::new(callback),
                last: None,
            },
        );
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn has_subscribers(&self, key: &QueryKey) -> bool {
        self.subscribers.values().any(|s| &s.key == key)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.subscribers.values().map(|s| s.key.clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Delivers `view` to every subscriber of `view.key`. Returns how many
    /// callbacks actually ran.
    pub fn notify(&mut self, view: &View) -> usize {
        self.subscribers
            .values_mut()
            .filter(|s| s.key == view.key)
            .map(|s| s.deliver(view))
            .filter(|delivered| *delivered)
            .count()
    }

    pub fn notify_one(&mut self, id: SubscriptionId, view: &View) -> bool {
        match self.subscribers.get_mut(&id) {
            Some(s) if s.key == view.key => s.deliver(view),
            _ => false,
        }
    }
}
