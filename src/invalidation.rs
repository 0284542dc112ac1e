// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Which cached queries a mutation makes untrustworthy.
//!
//! | change                              | invalidates                      |
//! |-------------------------------------|----------------------------------|
//! | created                             | transaction-list, category-statistics |
//! | updated, amount or category changed | transaction-list, category-statistics |
//! | updated, other fields only          | transaction-list                 |
//! | deleted                             | transaction-list, category-statistics |

use log::debug;

use crate::cache::{Cache, QueryKey, QueryKind};
use crate::models::{Transaction, TransactionInput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Save(TransactionInput),
    Delete { user_id: String, id: String },
}

impl Mutation {
    pub fn user_id(&self) -> &str {
        match self {
            Mutation::Save(input) => &input.user_id,
            Mutation::Delete { user_id, .. } => user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Created,
    Updated { aggregate: bool },
    Deleted { id: String },
}

const LIST_AND_STATISTICS: &[QueryKind] =
    &[QueryKind::TransactionList, QueryKind::CategoryStatistics];
const LIST_ONLY: &[QueryKind] = &[QueryKind::TransactionList];

impl Change {
    /// `previous` is the cached version of the record being updated, if any.
    pub fn classify(mutation: &Mutation, previous: Option<&Transaction>) -> Change {
        match mutation {
            Mutation::Save(input) if input.is_create() => Change::Created,
            Mutation::Save(input) => Change::Updated {
                aggregate: affects_aggregate(previous, input),
            },
            Mutation::Delete { id, .. } => Change::Deleted { id: id.clone() },
        }
    }

    pub fn invalidates(&self) -> &'static [QueryKind] {
        match self {
            Change::Created => LIST_AND_STATISTICS,
            Change::Updated { aggregate: true } => LIST_AND_STATISTICS,
            Change::Updated { aggregate: false } => LIST_ONLY,
            Change::Deleted { .. } => LIST_AND_STATISTICS,
        }
    }
}

/// An update moves a category total only through its amount or its category.
/// Without the previous version at hand it has to be assumed that it does.
pub fn affects_aggregate(previous: Option<&Transaction>, next: &TransactionInput) -> bool {
    match previous {
        Some(p) => p.amount != next.amount || p.category != next.category,
        None => true,
    }
}

pub fn plan(user_id: &str, change: &Change) -> Vec<QueryKey> {
    change
        .invalidates()
        .iter()
        .map(|kind| kind.key(user_id))
        .collect()
}

/// Applies a confirmed mutation to the cache and returns the keys that need a
/// refetch. Deletes also evict the record and every entry that listed it.
pub fn apply(cache: &mut Cache, user_id: &str, change: &Change) -> Vec<QueryKey> {
    if let Change::Deleted { id } = change {
        cache.evict_by_entity_id(id);
    }
    mark(cache, user_id, change)
}

/// A failed mutation leaves entities alone but still marks its keys stale:
/// the server may or may not have applied it.
pub fn apply_failed(cache: &mut Cache, user_id: &str, change: &Change) -> Vec<QueryKey> {
    mark(cache, user_id, change)
}

fn mark(cache: &mut Cache, user_id: &str, change: &Change) -> Vec<QueryKey> {
    let keys = plan(user_id, change);
    for key in &keys {
        cache.mark_stale(key);
    }
    debug!("{:?} invalidated {} keys for {}", change, keys.len(), user_id);
    keys
}
