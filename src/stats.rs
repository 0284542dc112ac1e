// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Category, CategoryStat, Transaction};

/// Sums `amount` per category, one stat per distinct category in the order
/// categories first appear in `transactions`.
pub fn aggregate(transactions: &[Transaction]) -> Vec<CategoryStat> {
    let mut index: HashMap<Category, usize> = HashMap::new();
    let mut out: Vec<CategoryStat> = Vec::new();
    for t in transactions {
        match index.get(&t.category) {
            Some(&i) => out[i].total_amount += t.amount,
            None => {
                index.insert(t.category, out.len());
                out.push(CategoryStat {
                    category: t.category,
                    total_amount: t.amount,
                });
            }
        }
    }
    out
}

pub fn total(stats: &[CategoryStat]) -> Decimal {
    stats
        .iter()
        .fold(Decimal::ZERO, |acc, s| acc + s.total_amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPair {
    pub background: &'static str,
    pub border: &'static str,
}

pub const DEFAULT_COLOR: ColorPair = ColorPair {
    background: "rgba(201, 203, 207)",
    border: "rgba(201, 203, 207)",
};

const PALETTE: [(Category, ColorPair); 3] = [
    (
        Category::Saving,
        ColorPair {
            background: "rgba(75, 192, 192)",
            border: "rgba(75, 192, 192)",
        },
    ),
    (
        Category::Expense,
        ColorPair {
            background: "rgba(255, 99, 132)",
            border: "rgba(255, 99, 132)",
        },
    ),
    (
        Category::Investment,
        ColorPair {
            background: "rgba(54, 162, 235)",
            border: "rgba(54, 162, 235)",
        },
    ),
];

pub fn color_for(category: Category) -> ColorPair {
    PALETTE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, colors)| *colors)
        .unwrap_or(DEFAULT_COLOR)
}

/// Doughnut chart input, shaped the way the web client hands it to chart.js.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<Decimal>,
    pub background_color: Vec<String>,
    pub border_color: Vec<String>,
    pub border_width: u32,
    pub border_radius: u32,
    pub spacing: u32,
    pub cutout: u32,
}

impl ChartData {
    pub fn from_stats(stats: &[CategoryStat]) -> Self {
        let mut dataset = ChartDataset {
            label: "$".to_string(),
            data: Vec::with_capacity(stats.len()),
            background_color: Vec::with_capacity(stats.len()),
            border_color: Vec::with_capacity(stats.len()),
            border_width: 1,
            border_radius: 30,
            spacing: 10,
            cutout: 130,
        };
        let mut labels = Vec::with_capacity(stats.len());
        for s in stats {
            let colors = color_for(s.category);
            labels.push(s.category.to_string());
            dataset.data.push(s.total_amount);
            dataset.background_color.push(colors.background.to_string());
            dataset.border_color.push(colors.border.to_string());
        }
        ChartData {
            labels,
            datasets: vec![dataset],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Chart series cached against the revision of the statistics entry it was
/// built from. Reads with an unchanged revision never recompute.
#[derive(Debug, Default)]
pub struct ChartMemo {
    revision: Option<u64>,
    chart: ChartData,
    computations: usize,
}

impl ChartMemo {
    pub fn get(&mut self, revision: u64, stats: &[CategoryStat]) -> &ChartData {
        if self.revision != Some(revision) {
            self.computations += 1;
            self.revision = Some(revision);
            self.chart = ChartData::from_stats(stats);
        }
        &self.chart
    }

    pub fn computations(&self) -> usize {
        self.computations
    }
}
