// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the gateway, the cache and the session.
///
/// Values are `Clone` because a failed cache entry keeps its error around so
/// views can keep rendering it next to the last-known-good data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Gateway unreachable, timed out, or answered with a server error.
    #[error("Network error: {0}")]
    Network(String),
    /// Caller-supplied input was rejected, locally or by the gateway.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// The target of a mutation no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Internal bookkeeping went wrong. Never expected in a correct program.
    #[error("Inconsistent cache state: {0}")]
    State(String),
}

impl Error {
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let what = e
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "request".to_string());
        match e.status() {
            Some(StatusCode::NOT_FOUND) => Error::NotFound(what),
            Some(StatusCode::BAD_REQUEST) | Some(StatusCode::UNPROCESSABLE_ENTITY) => {
                Error::Validation(format!("{} rejected by server", what))
            }
            _ => Error::Network(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("transaction".into()),
            other => Error::Network(format!("local store: {}", other)),
        }
    }
}
