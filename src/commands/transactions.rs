// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use serde::Serialize;

use super::required;
use crate::gateway::Gateway;
use crate::models::{Category, PaymentType, Transaction, TransactionInput};
use crate::session::Session;
use crate::utils::{fmt_amount, maybe_print_json, parse_date, parse_decimal, pretty_table};

pub fn handle<G: Gateway>(session: &mut Session<G>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(session, sub)?,
        Some(("add", sub)) => add(session, sub)?,
        Some(("edit", sub)) => edit(session, sub)?,
        Some(("delete", sub)) => delete(session, sub)?,
        _ => {}
    }
    Ok(())
}

fn list<G: Gateway>(session: &mut Session<G>, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let key = session.transactions_key();
    let view = session.load(&key)?;
    let data = rows(view.transactions().unwrap_or(&[]), sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        if data.is_empty() {
            println!("No transaction history found.");
            return Ok(());
        }
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.date.clone(),
                    r.category.clone(),
                    r.amount.clone(),
                    r.payment_type.clone(),
                    r.location.clone(),
                    r.description.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Date", "Category", "Amount", "Payment", "Location", "Description"],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TransactionRow {
    pub id: String,
    pub date: String,
    pub category: String,
    pub amount: String,
    pub payment_type: String,
    pub location: String,
    pub description: String,
}

/// Newest first, filtered by `--category` and cut at `--limit`.
pub fn rows(transactions: &[Transaction], sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let category = sub
        .get_one::<String>("category")
        .map(|c| c.parse::<Category>())
        .transpose()?;
    let limit = sub.get_one::<usize>("limit").copied();

    let mut selected: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| category.is_none_or(|c| t.category == c))
        .collect();
    selected.sort_by(|a, b| b.date.cmp(&a.date));
    if let Some(limit) = limit {
        selected.truncate(limit);
    }

    Ok(selected
        .into_iter()
        .map(|t| TransactionRow {
            id: t.id.clone(),
            date: t.date.to_string(),
            category: t.category.to_string(),
            amount: t.amount.to_string(),
            payment_type: t.payment_type.to_string(),
            location: t.location.clone().unwrap_or_else(|| "N/A".to_string()),
            description: t.description.clone(),
        })
        .collect())
}

fn add<G: Gateway>(session: &mut Session<G>, sub: &clap::ArgMatches) -> Result<()> {
    let input = TransactionInput {
        id: None,
        user_id: session.user().id.clone(),
        category: required(sub, "category")?.parse()?,
        amount: parse_decimal(required(sub, "amount")?)?,
        location: sub
            .get_one::<String>("location")
            .filter(|l| !l.trim().is_empty())
            .cloned(),
        date: parse_date(required(sub, "date")?)?,
        payment_type: required(sub, "payment")?.parse()?,
        description: required(sub, "description")?.to_string(),
    };
    let saved = session.save(input)?;
    println!(
        "Recorded {} {} on {} ({})",
        saved.category,
        fmt_amount(&saved.amount),
        saved.date,
        saved.id
    );
    Ok(())
}

/// Applies the flags given on the command line on top of `current`.
pub fn edited_input(current: &Transaction, sub: &clap::ArgMatches) -> Result<TransactionInput> {
    let mut input = TransactionInput::from(current);
    if let Some(c) = sub.get_one::<String>("category") {
        input.category = c.parse::<Category>()?;
    }
    if let Some(a) = sub.get_one::<String>("amount") {
        input.amount = parse_decimal(a)?;
    }
    if let Some(d) = sub.get_one::<String>("date") {
        input.date = parse_date(d)?;
    }
    if let Some(p) = sub.get_one::<String>("payment") {
        input.payment_type = p.parse::<PaymentType>()?;
    }
    if let Some(d) = sub.get_one::<String>("description") {
        input.description = d.clone();
    }
    if let Some(l) = sub.get_one::<String>("location") {
        input.location = Some(l.clone()).filter(|l| !l.trim().is_empty());
    }
    Ok(input)
}

fn edit<G: Gateway>(session: &mut Session<G>, sub: &clap::ArgMatches) -> Result<()> {
    let id = required(sub, "id")?;
    let key = session.transactions_key();
    session.load(&key)?;
    let current = session
        .transaction(id)
        .cloned()
        .with_context(|| format!("Transaction '{}' not found", id))?;
    let saved = session.save(edited_input(&current, sub)?)?;
    println!(
        "Updated {}: {} {} on {}",
        saved.id,
        saved.category,
        fmt_amount(&saved.amount),
        saved.date
    );
    Ok(())
}

fn delete<G: Gateway>(session: &mut Session<G>, sub: &clap::ArgMatches) -> Result<()> {
    let id = required(sub, "id")?;
    session
        .delete(id)
        .with_context(|| format!("Failed to delete transaction '{}'", id))?;
    println!("Deleted transaction {}", id);
    Ok(())
}
