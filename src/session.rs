// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! One signed-in user's view of the remote data.
//!
//! A [`Session`] owns the cache and the subscription registry, so dropping it
//! drops every cached value and callback. All reads, writes and notifications
//! go through `&mut self`; overlapping gateway requests are modelled with the
//! two-phase `begin_*`/`complete_*` calls, which the blocking helpers
//! ([`Session::refresh`], [`Session::mutate`], ...) simply run back to back.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::binder::{Binder, SubscriptionId, View};
use crate::cache::{Cache, Completion, FetchTicket, Fetched, Freshness, QueryData, QueryKey, QueryKind};
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::invalidation::{self, Change, Mutation};
use crate::models::{AuthUser, Transaction, TransactionInput};
use crate::stats::{self, ChartData, ChartMemo};

#[derive(Debug)]
pub struct PendingFetch {
    ticket: FetchTicket,
    origin: Option<SubscriptionId>,
}

impl PendingFetch {
    pub fn key(&self) -> &QueryKey {
        self.ticket.key()
    }
}

#[derive(Debug)]
pub struct PendingMutation {
    user_id: String,
    change: Change,
}

impl PendingMutation {
    pub fn change(&self) -> &Change {
        &self.change
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Saved(Transaction),
    Deleted(String),
}

/// A confirmed mutation and the keys it left stale.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub outcome: Outcome,
    pub invalidated: Vec<QueryKey>,
}

pub struct Session<G> {
    gateway: G,
    user: AuthUser,
    cache: Cache,
    binder: Binder,
    charts: HashMap<QueryKey, ChartMemo>,
}

impl<G: Gateway> Session<G> {
    pub fn new(gateway: G, user: AuthUser) -> Self {
        Session {
            gateway,
            user,
            cache: Cache::new(),
            binder: Binder::new(),
            charts: HashMap::new(),
        }
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn transactions_key(&self) -> QueryKey {
        QueryKey::transactions(&self.user.id)
    }

    pub fn statistics_key(&self) -> QueryKey {
        QueryKey::statistics(&self.user.id)
    }

    /// Registers `callback` for `key` and immediately hands it the current
    /// view. Nothing is fetched; see [`Session::watch`].
    pub fn subscribe<F>(&mut self, key: QueryKey, callback: F) -> SubscriptionId
    where
        F: FnMut(&View) + 'static,
    {
        let id = self.binder.subscribe(key.clone(), callback);
        let view = self.read(&key);
        self.binder.notify_one(id, &view);
        id
    }

    /// Subscribes and loads the key unless it is already fresh. A failed
    /// load is reported through the view, not as an error.
    pub fn watch<F>(&mut self, key: QueryKey, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(&View) + 'static,
    {
        let id = self.subscribe(key.clone(), callback);
        if self.cache.freshness(&key) != Freshness::Fresh {
            let pending = self.begin_fetch(&key, Some(id));
            let outcome = self.fetch(&key);
            self.complete_fetch(pending, outcome)?;
        }
        Ok(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.binder.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.binder.len()
    }

    pub fn read(&self, key: &QueryKey) -> View {
        View::from(self.cache.read(key))
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.cache.entity(id)
    }

    /// Cache-first read: only goes to the gateway when the entry is not fresh.
    pub fn load(&mut self, key: &QueryKey) -> Result<View> {
        if self.cache.freshness(key) == Freshness::Fresh {
            return Ok(self.read(key));
        }
        self.refresh(key)
    }

    pub fn refresh(&mut self, key: &QueryKey) -> Result<View> {
        let failures = self.refetch(std::slice::from_ref(key))?;
        if let Some((_, e)) = failures.into_iter().next() {
            return Err(e);
        }
        Ok(self.read(key))
    }

    /// Fetches `keys` as one batch: all of them turn loading together and all
    /// results are committed before subscribers hear about any of them, so a
    /// refreshed list is never shown next to an old aggregate.
    ///
    /// Returns the keys whose fetch failed.
    pub fn refetch(&mut self, keys: &[QueryKey]) -> Result<Vec<(QueryKey, Error)>> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let pending: Vec<PendingFetch> = ordered.iter().map(|k| self.start(k, None)).collect();
        self.flush();

        let mut lists: HashMap<String, Vec<Transaction>> = HashMap::new();
        let outcomes: Vec<Result<Fetched>> = pending
            .iter()
            .map(|p| self.fetch_with(p.key(), &mut lists))
            .collect();

        let mut failures = Vec::new();
        let mut state_error = None;
        for (p, outcome) in pending.into_iter().zip(outcomes) {
            let key = p.key().clone();
            match self.settle(p, outcome) {
                Ok(Completion::Failed(e)) => failures.push((key, e)),
                Ok(_) => {}
                Err(e) => {
                    state_error.get_or_insert(e);
                }
            }
        }
        self.flush();

        match state_error {
            Some(e) => Err(e),
            None => Ok(failures),
        }
    }

    /// Re-fetches every subscribed key that is absent, stale or failed. This
    /// is how fetches discarded as superseded get re-issued.
    pub fn sync(&mut self) -> Result<()> {
        let keys: Vec<QueryKey> = self
            .binder
            .keys()
            .into_iter()
            .filter(|k| {
                matches!(
                    self.cache.freshness(k),
                    Freshness::Absent | Freshness::Stale | Freshness::Failed
                )
            })
            .collect();
        if keys.is_empty() {
            return Ok(());
        }
        match self.refetch(&keys)?.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        }
    }

    /// Runs the gateway call for `key` without touching the cache.
    pub fn fetch(&self, key: &QueryKey) -> Result<Fetched> {
        self.fetch_with(key, &mut HashMap::new())
    }

    // Statistics prefer the server aggregate. Without one they are derived
    // from the list fetched in the same batch, the fresh cached list, or a
    // new list fetch, in that order.
    fn fetch_with(
        &self,
        key: &QueryKey,
        lists: &mut HashMap<String, Vec<Transaction>>,
    ) -> Result<Fetched> {
        match key.kind {
            QueryKind::TransactionList => {
                let list = self.gateway.list_transactions(&key.user_id)?;
                lists.insert(key.user_id.clone(), list.clone());
                Ok(QueryData::Transactions(list).into())
            }
            QueryKind::CategoryStatistics => {
                if let Some(server) = self.gateway.category_statistics(&key.user_id)? {
                    return Ok(QueryData::Statistics(server).into());
                }
                let list = match lists.get(&key.user_id) {
                    Some(list) => list.clone(),
                    None => self.source_list(&key.user_id)?,
                };
                let members: HashSet<String> = list.iter().map(|t| t.id.clone()).collect();
                Ok(Fetched {
                    data: QueryData::Statistics(stats::aggregate(&list)),
                    members: Some(members),
                })
            }
        }
    }

    fn source_list(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let entry = self.cache.read(&QueryKey::transactions(user_id));
        if entry.freshness == Freshness::Fresh {
            if let Some(QueryData::Transactions(list)) = entry.data {
                return Ok(list);
            }
        }
        self.gateway.list_transactions(user_id)
    }

    /// First half of a fetch. `origin` ties the request to a subscription;
    /// if that subscription is gone by the time the result arrives, the
    /// result is dropped.
    pub fn begin_fetch(&mut self, key: &QueryKey, origin: Option<SubscriptionId>) -> PendingFetch {
        let pending = self.start(key, origin);
        self.flush();
        pending
    }

    pub fn complete_fetch(
        &mut self,
        pending: PendingFetch,
        outcome: Result<Fetched>,
    ) -> Result<Completion> {
        let completion = self.settle(pending, outcome);
        self.flush();
        completion
    }

    fn start(&mut self, key: &QueryKey, origin: Option<SubscriptionId>) -> PendingFetch {
        PendingFetch {
            ticket: self.cache.begin_fetch(key),
            origin,
        }
    }

    fn settle(&mut self, pending: PendingFetch, outcome: Result<Fetched>) -> Result<Completion> {
        // A departed origin is already out of the binder; the result is only
        // dropped when nobody else watches the key.
        if let Some(origin) = pending.origin {
            let key = pending.ticket.key();
            if !self.binder.is_active(origin) && !self.binder.has_subscribers(key) {
                debug!("subscriber of {} went away, dropping result", key);
                self.cache.discard(pending.ticket);
                return Ok(Completion::Discarded);
            }
        }
        self.cache.complete_fetch(pending.ticket, outcome)
    }

    /// First half of a mutation: local validation, then classification of
    /// the change against the cached version of the record.
    pub fn begin_mutation(&mut self, mutation: &Mutation) -> Result<PendingMutation> {
        if let Mutation::Save(input) = mutation {
            if let Err(e) = input.validate() {
                warn!("rejected before dispatch: {}", e);
                return Err(e);
            }
        }
        let previous = match mutation {
            Mutation::Save(TransactionInput { id: Some(id), .. }) => self.cache.entity(id),
            _ => None,
        };
        let change = Change::classify(mutation, previous);
        let user_id = mutation.user_id().to_string();
        self.cache.begin_mutation(&user_id);
        Ok(PendingMutation { user_id, change })
    }

    /// Second half of a mutation. On success the invalidation policy runs
    /// before this returns; on failure the affected keys are marked stale so
    /// the next read re-syncs, except for validation errors, which mean the
    /// server changed nothing.
    pub fn complete_mutation(
        &mut self,
        pending: PendingMutation,
        outcome: Result<Outcome>,
    ) -> Result<Applied> {
        self.cache.end_mutation(&pending.user_id);
        let result = match outcome {
            Ok(outcome) => {
                let invalidated =
                    invalidation::apply(&mut self.cache, &pending.user_id, &pending.change);
                info!("{:?} applied for {}", pending.change, pending.user_id);
                Ok(Applied {
                    outcome,
                    invalidated,
                })
            }
            Err(e) => {
                warn!("mutation {:?} failed: {}", pending.change, e);
                if !matches!(e, Error::Validation(_)) {
                    invalidation::apply_failed(&mut self.cache, &pending.user_id, &pending.change);
                }
                Err(e)
            }
        };
        self.flush();
        result
    }

    /// Performs the gateway call, applies the invalidation policy and
    /// refetches the invalidated keys before returning.
    pub fn mutate(&mut self, mutation: Mutation) -> Result<Outcome> {
        let pending = self.begin_mutation(&mutation)?;
        let outcome = match &mutation {
            Mutation::Save(input) => self.gateway.save_transaction(input).map(Outcome::Saved),
            Mutation::Delete { id, .. } => self
                .gateway
                .delete_transaction(id)
                .map(|()| Outcome::Deleted(id.clone())),
        };
        let applied = self.complete_mutation(pending, outcome)?;
        for (key, e) in self.refetch(&applied.invalidated)? {
            warn!("refetch of {} after mutation failed: {}", key, e);
        }
        Ok(applied.outcome)
    }

    pub fn save(&mut self, input: TransactionInput) -> Result<Transaction> {
        match self.mutate(Mutation::Save(input))? {
            Outcome::Saved(t) => Ok(t),
            Outcome::Deleted(id) => Err(Error::State(format!(
                "save answered with a delete of {}",
                id
            ))),
        }
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.mutate(Mutation::Delete {
            user_id: self.user.id.clone(),
            id: id.to_string(),
        })?;
        Ok(())
    }

    /// Chart for a statistics key, rebuilt only when the entry's revision
    /// moved since the last call.
    pub fn chart(&mut self, key: &QueryKey) -> Option<&ChartData> {
        let revision = self.cache.revision(key);
        let stats = self.cache.statistics(key)?;
        Some(self.charts.entry(key.clone()).or_default().get(revision, stats))
    }

    pub fn chart_computations(&self, key: &QueryKey) -> usize {
        self.charts.get(key).map(ChartMemo::computations).unwrap_or(0)
    }

    /// Forgets everything cached, as on logout. Subscribers stay registered
    /// and see their keys go back to loading.
    pub fn reset(&mut self) {
        self.cache.reset();
        self.charts.clear();
        info!("session cache reset for {}", self.user.id);
        self.flush();
    }

    fn flush(&mut self) {
        for key in self.cache.take_changed() {
            if !self.binder.has_subscribers(&key) {
                continue;
            }
            let view = View::from(self.cache.read(&key));
            let n = self.binder.notify(&view);
            debug!("notified {} subscribers of {}", n, key);
        }
    }
}
