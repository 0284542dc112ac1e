// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! A local stand-in for the remote service, backed by SQLite. Used for
//! offline work and as the gateway behind the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use directories::ProjectDirs;
use log::debug;
use once_cell::sync::Lazy;
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::models::{Category, CategoryStat, PaymentType, Transaction, TransactionInput};
use crate::stats;

pub(crate) static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Spendsync", "spendsync"));

pub fn db_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("spendsync.sqlite"))
}

const COLUMNS: &str = "id, user_id, category, amount, location, date, payment_type, description";

#[derive(Debug)]
pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        init_schema(&conn)?;
        Ok(SqliteGateway { conn })
    }

    pub fn find(&self, id: &str) -> Result<Transaction> {
        let sql = format!("SELECT {} FROM transactions WHERE id=?1", COLUMNS);
        self.conn
            .query_row(&sql, params![id], read_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))
    }

    fn insert(&self, input: &TransactionInput) -> Result<String> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO transactions(id, user_id, category, amount, location, date, payment_type, description)
             VALUES ('', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                input.user_id,
                input.category.as_str(),
                input.amount.to_string(),
                input.location,
                input.date.to_string(),
                input.payment_type.as_str(),
                input.description,
            ],
        )?;
        let seq = tx.last_insert_rowid();
        let id = format!("tx-{}", seq);
        tx.execute(
            "UPDATE transactions SET id=?1 WHERE seq=?2",
            params![id, seq],
        )?;
        tx.commit()?;
        Ok(id)
    }

    fn update(&self, id: &str, input: &TransactionInput) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE transactions
             SET category=?1, amount=?2, location=?3, date=?4, payment_type=?5, description=?6
             WHERE id=?7 AND user_id=?8",
            params![
                input.category.as_str(),
                input.amount.to_string(),
                input.location,
                input.date.to_string(),
                input.payment_type.as_str(),
                input.description,
                id,
                input.user_id,
            ],
        )?;
        if n == 0 {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS transactions(
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        category TEXT NOT NULL,
        amount TEXT NOT NULL,
        location TEXT,
        date TEXT NOT NULL,
        payment_type TEXT NOT NULL,
        description TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_id ON transactions(id);
    CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
    "#,
    )
    .context("Failed to initialize schema")?;
    Ok(())
}

fn conversion_error<E>(col: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e))
}

fn read_row(r: &Row<'_>) -> rusqlite::Result<Transaction> {
    let category: String = r.get(2)?;
    let amount: String = r.get(3)?;
    let date: String = r.get(5)?;
    let payment_type: String = r.get(6)?;
    Ok(Transaction {
        id: r.get(0)?,
        user_id: r.get(1)?,
        category: category
            .parse::<Category>()
            .map_err(|e| conversion_error(2, e))?,
        amount: amount
            .parse::<Decimal>()
            .map_err(|e| conversion_error(3, e))?,
        location: r.get(4)?,
        date: date
            .parse::<NaiveDate>()
            .map_err(|e| conversion_error(5, e))?,
        payment_type: payment_type
            .parse::<PaymentType>()
            .map_err(|e| conversion_error(6, e))?,
        description: r.get(7)?,
    })
}

impl Gateway for SqliteGateway {
    fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id=?1 ORDER BY seq",
            COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], read_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn category_statistics(&self, user_id: &str) -> Result<Option<Vec<CategoryStat>>> {
        // Amounts are TEXT decimals; SUM() in SQLite would go through floats.
        let list = self.list_transactions(user_id)?;
        Ok(Some(stats::aggregate(&list)))
    }

    fn save_transaction(&self, input: &TransactionInput) -> Result<Transaction> {
        input.validate()?;
        let id = match &input.id {
            Some(id) => {
                self.update(id, input)?;
                id.clone()
            }
            None => self.insert(input)?,
        };
        debug!("saved {} for {}", id, input.user_id);
        self.find(&id)
    }

    fn delete_transaction(&self, id: &str) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM transactions WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        debug!("deleted {}", id);
        Ok(())
    }
}
