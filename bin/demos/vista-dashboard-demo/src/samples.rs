// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Built-in datasets for trying the dashboard without a file.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use polars::prelude::*;

const GENERAL_DAYS: usize = 150;
const PRODUCTS: [&str; 3] = ["Product A", "Product B", "Product C"];
const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sample {
    /// Five yearly balance-sheet figures.
    Finance,
    /// 150 days of sales by product and region.
    General,
}
impl Sample {
    pub fn name(self) -> &'static str {
        match self {
            Sample::Finance => "finance sample",
            Sample::General => "general sample",
        }
    }
    pub fn frame(self) -> Result<DataFrame> {
        let frame = match self {
            Sample::Finance => finance(),
            Sample::General => general(),
        };
        frame.with_context(|| format!("cannot build the {}", self.name()))
    }
}

fn finance() -> Result<DataFrame> {
    Ok(df!(
        "Year" => [2020i32, 2021, 2022, 2023, 2024],
        "Revenue (M€)" => [150.0, 180.0, 210.0, 195.0, 230.0],
        "Net income (M€)" => [12.0, 18.0, 25.0, 22.0, 30.0],
        "Total assets (M€)" => [200.0, 220.0, 250.0, 260.0, 280.0],
        "Equity (M€)" => [100.0, 110.0, 130.0, 140.0, 160.0],
        "Financial debt (M€)" => [80.0, 90.0, 100.0, 95.0, 100.0],
    )?)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// Deterministic stand-ins for random draws, so runs are reproducible.
fn general() -> Result<DataFrame> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("invalid sample start date")?;
    let dates: Vec<NaiveDate> = start.iter_days().take(GENERAL_DAYS).collect();
    let sales: Vec<f64> = (0..GENERAL_DAYS)
        .map(|i| {
            let t = i as f64;
            round_to(1200.0 + 400.0 * (t * 0.7).sin() + 60.0 * (t * 0.13).cos(), 2)
        })
        .collect();
    let products: Vec<&str> = (0..GENERAL_DAYS)
        .map(|i| PRODUCTS[(i * 7 + i / 5) % PRODUCTS.len()])
        .collect();
    let regions: Vec<&str> = (0..GENERAL_DAYS)
        .map(|i| REGIONS[(i * 3 + i / 4) % REGIONS.len()])
        .collect();
    let customers: Vec<i64> = (0..GENERAL_DAYS).map(|i| 20 + (i as i64 * 37) % 280).collect();
    let satisfaction: Vec<f64> = (0..GENERAL_DAYS)
        .map(|i| round_to(3.5 + ((i * 13) % 16) as f64 / 10.0, 1))
        .collect();
    Ok(df!(
        "Date" => dates,
        "Sales (€)" => sales,
        "Product" => products,
        "Region" => regions,
        "Customers" => customers,
        "Satisfaction" => satisfaction,
    )?)
}
