// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Saving,
    Expense,
    Investment,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Saving,
        Category::Expense,
        Category::Investment,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Saving => "saving",
            Category::Expense => "expense",
            Category::Investment => "investment",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Validation(format!("unknown category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Card => "card",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentType::Cash),
            "card" => Ok(PaymentType::Card),
            _ => Err(Error::Validation(format!("unknown payment type '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub category: Category,
    pub amount: Decimal,
    pub location: Option<String>,
    pub date: NaiveDate,
    pub payment_type: PaymentType,
    pub description: String,
}

/// Payload of a create-or-update call. `id: None` creates a new record,
/// `Some(id)` replaces every attribute of the existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub category: Category,
    pub amount: Decimal,
    pub location: Option<String>,
    pub date: NaiveDate,
    pub payment_type: PaymentType,
    pub description: String,
}

impl TransactionInput {
    pub fn validate(&self) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must not be negative, got {}",
                self.amount
            )));
        }
        if self.user_id.trim().is_empty() {
            return Err(Error::Validation("user id is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation("description is required".into()));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(Error::Validation("transaction id must not be blank".into()));
            }
        }
        Ok(())
    }

    pub fn is_create(&self) -> bool {
        self.id.is_none()
    }

    /// Builds the record a gateway would return for this input under `id`.
    pub fn into_transaction(self, id: String) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            category: self.category,
            amount: self.amount,
            location: self.location.filter(|l| !l.trim().is_empty()),
            date: self.date,
            payment_type: self.payment_type,
            description: self.description,
        }
    }
}

impl From<&Transaction> for TransactionInput {
    fn from(t: &Transaction) -> Self {
        TransactionInput {
            id: Some(t.id.clone()),
            user_id: t.user_id.clone(),
            category: t.category,
            amount: t.amount,
            location: t.location.clone(),
            date: t.date,
            payment_type: t.payment_type,
            description: t.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub category: Category,
    pub total_amount: Decimal,
}

/// Identity of the signed-in user. Supplied from outside, never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub profile_picture: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        AuthUser {
            name: id.clone(),
            id,
            profile_picture: None,
        }
    }
}
