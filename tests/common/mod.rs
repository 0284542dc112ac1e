// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use spendsync::binder::View;
use spendsync::gateway::Gateway;
use spendsync::models::{
    AuthUser, Category, CategoryStat, PaymentType, Transaction, TransactionInput,
};
use spendsync::stats;
use spendsync::{Error, Result};

pub const USER: &str = "u-1";

/// In-memory stand-in for the remote service. Counts calls and can be told
/// to fail the next ones.
#[derive(Debug, Default)]
pub struct FakeGateway {
    rows: RefCell<Vec<Transaction>>,
    next_id: Cell<u32>,
    no_server_stats: bool,
    failures: RefCell<Vec<Error>>,
    read_failures: RefCell<Vec<Error>>,
    pub list_calls: Cell<usize>,
    pub stats_calls: Cell<usize>,
    pub save_calls: Cell<usize>,
    pub delete_calls: Cell<usize>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server that answers the statistics call with `None`.
    pub fn without_server_stats() -> Self {
        FakeGateway {
            no_server_stats: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, user_id: &str, category: Category, amount: &str) -> Transaction {
        let t = input(user_id, category, amount).into_transaction(self.allocate_id());
        self.rows.borrow_mut().push(t.clone());
        t
    }

    pub fn fail_next(&self, err: Error) {
        self.failures.borrow_mut().push(err);
    }

    /// Like [`FakeGateway::fail_next`] but only list and statistics calls
    /// consume it.
    pub fn fail_next_read(&self, err: Error) {
        self.read_failures.borrow_mut().push(err);
    }

    pub fn rows(&self, user_id: &str) -> Vec<Transaction> {
        self.rows
            .borrow()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        format!("f-{}", n)
    }

    fn check(&self) -> Result<()> {
        take_first(&self.failures)
    }

    fn check_read(&self) -> Result<()> {
        self.check()?;
        take_first(&self.read_failures)
    }
}

fn take_first(queue: &RefCell<Vec<Error>>) -> Result<()> {
    let mut queue = queue.borrow_mut();
    if queue.is_empty() {
        return Ok(());
    }
    Err(queue.remove(0))
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl Gateway for FakeGateway {
    fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        bump(&self.list_calls);
        self.check_read()?;
        Ok(self.rows(user_id))
    }

    fn category_statistics(&self, user_id: &str) -> Result<Option<Vec<CategoryStat>>> {
        bump(&self.stats_calls);
        self.check_read()?;
        if self.no_server_stats {
            return Ok(None);
        }
        Ok(Some(stats::aggregate(&self.rows(user_id))))
    }

    fn save_transaction(&self, input: &TransactionInput) -> Result<Transaction> {
        bump(&self.save_calls);
        self.check()?;
        input.validate()?;
        let mut rows = self.rows.borrow_mut();
        match &input.id {
            None => {
                let t = input.clone().into_transaction(self.allocate_id());
                rows.push(t.clone());
                Ok(t)
            }
            Some(id) => {
                let slot = rows
                    .iter_mut()
                    .find(|t| &t.id == id && t.user_id == input.user_id)
                    .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))?;
                *slot = input.clone().into_transaction(id.clone());
                Ok(slot.clone())
            }
        }
    }

    fn delete_transaction(&self, id: &str) -> Result<()> {
        bump(&self.delete_calls);
        self.check()?;
        let mut rows = self.rows.borrow_mut();
        let before = rows.len();
        rows.retain(|t| t.id != id);
        if rows.len() == before {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }
}

pub fn user() -> AuthUser {
    AuthUser::new(USER)
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn input(user_id: &str, category: Category, amount: &str) -> TransactionInput {
    TransactionInput {
        id: None,
        user_id: user_id.to_string(),
        category,
        amount: dec(amount),
        location: None,
        date: date("2024-03-01"),
        payment_type: PaymentType::Card,
        description: format!("{} {}", category, amount),
    }
}

pub fn transaction(id: &str, user_id: &str, category: Category, amount: &str) -> Transaction {
    input(user_id, category, amount).into_transaction(id.to_string())
}

pub fn stat(category: Category, amount: &str) -> CategoryStat {
    CategoryStat {
        category,
        total_amount: dec(amount),
    }
}

pub type Recorded = Rc<RefCell<Vec<View>>>;

/// A subscriber callback that keeps every view it is handed.
pub fn recorder() -> (Recorded, impl FnMut(&View) + 'static) {
    let seen: Recorded = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |v: &View| sink.borrow_mut().push(v.clone()))
}
