// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::time::Duration;

use log::debug;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{CategoryStat, Transaction, TransactionInput};
use crate::utils::http_client;

/// The remote source of truth. Every call may fail and none of them are
/// transactional with one another.
pub trait Gateway {
    fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>>;

    /// `Ok(None)` when this gateway has no server-side aggregate; the caller
    /// then derives statistics from the transaction list.
    fn category_statistics(&self, user_id: &str) -> Result<Option<Vec<CategoryStat>>>;

    /// Creates when `input.id` is `None`, replaces the record otherwise.
    fn save_transaction(&self, input: &TransactionInput) -> Result<Transaction>;

    fn delete_transaction(&self, id: &str) -> Result<()>;
}

impl<G: Gateway + ?Sized> Gateway for Box<G> {
    fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        (**self).list_transactions(user_id)
    }

    fn category_statistics(&self, user_id: &str) -> Result<Option<Vec<CategoryStat>>> {
        (**self).category_statistics(user_id)
    }

    fn save_transaction(&self, input: &TransactionInput) -> Result<Transaction> {
        (**self).save_transaction(input)
    }

    fn delete_transaction(&self, id: &str) -> Result<()> {
        (**self).delete_transaction(id)
    }
}

impl<G: Gateway + ?Sized> Gateway for &G {
    fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        (**self).list_transactions(user_id)
    }

    fn category_statistics(&self, user_id: &str) -> Result<Option<Vec<CategoryStat>>> {
        (**self).category_statistics(user_id)
    }

    fn save_transaction(&self, input: &TransactionInput) -> Result<Transaction> {
        (**self).save_transaction(input)
    }

    fn delete_transaction(&self, id: &str) -> Result<()> {
        (**self).delete_transaction(id)
    }
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    ok: bool,
}

/// JSON-over-HTTP gateway. Session cookies or tokens are the HTTP client's
/// business, not this type's.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::blocking::Client,
    base: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::Validation(format!("invalid gateway url '{}': {}", base_url, e)))?;
        Ok(HttpGateway {
            client: http_client(timeout)?,
            base,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Validation(format!("gateway url '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl Gateway for HttpGateway {
    fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let url = self.endpoint(&["users", user_id, "transactions"])?;
        debug!("GET {}", url);
        let resp = self.client.get(url).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    fn category_statistics(&self, user_id: &str) -> Result<Option<Vec<CategoryStat>>> {
        let url = self.endpoint(&["users", user_id, "statistics"])?;
        debug!("GET {}", url);
        let resp = self.client.get(url).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("server has no statistics endpoint, deriving locally");
            return Ok(None);
        }
        let resp = resp.error_for_status()?;
        Ok(Some(resp.json()?))
    }

    fn save_transaction(&self, input: &TransactionInput) -> Result<Transaction> {
        let req = match &input.id {
            None => {
                let url = self.endpoint(&["transactions"])?;
                debug!("POST {}", url);
                self.client.post(url)
            }
            Some(id) => {
                let url = self.endpoint(&["transactions", id])?;
                debug!("PUT {}", url);
                self.client.put(url)
            }
        };
        let resp = req.json(input).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    fn delete_transaction(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["transactions", id])?;
        debug!("DELETE {}", url);
        let resp = self.client.delete(url).send()?.error_for_status()?;
        let body: DeleteResponse = resp.json()?;
        if body.ok {
            Ok(())
        } else {
            Err(Error::NotFound(format!("transaction {}", id)))
        }
    }
}
