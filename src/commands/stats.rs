// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};

use crate::gateway::Gateway;
use crate::session::Session;
use crate::stats::total;
use crate::utils::{fmt_amount, maybe_print_json, pretty_table};

pub fn handle_stats<G: Gateway>(session: &mut Session<G>, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let key = session.statistics_key();
    let view = session.load(&key)?;
    let stats = view.statistics().unwrap_or(&[]);
    if maybe_print_json(json_flag, jsonl_flag, &stats)? {
        return Ok(());
    }
    if stats.is_empty() {
        println!("No statistics yet.");
        return Ok(());
    }
    let mut rows: Vec<Vec<String>> = stats
        .iter()
        .map(|s| vec![s.category.to_string(), fmt_amount(&s.total_amount)])
        .collect();
    rows.push(vec!["total".to_string(), fmt_amount(&total(stats))]);
    println!("{}", pretty_table(&["Category", "Total"], rows));
    Ok(())
}

pub fn handle_chart<G: Gateway>(session: &mut Session<G>, sub: &clap::ArgMatches) -> Result<()> {
    let key = session.statistics_key();
    session.load(&key)?;
    let chart = match session.chart(&key) {
        Some(chart) if !chart.is_empty() => chart,
        _ => {
            println!("No statistics yet.");
            return Ok(());
        }
    };
    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(chart)?);
        return Ok(());
    }
    let dataset = chart.datasets.first().context("Chart has no dataset")?;
    let rows: Vec<Vec<String>> = chart
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            vec![
                label.clone(),
                dataset.data.get(i).map(fmt_amount).unwrap_or_default(),
                dataset.background_color.get(i).cloned().unwrap_or_default(),
                dataset.border_color.get(i).cloned().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Category", "Amount", "Background", "Border"], rows)
    );
    Ok(())
}
