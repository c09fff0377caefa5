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

//! Plain-text renderings for terminals and logs.

use crate::dataset::{Schema, SemanticType};
use crate::error::Notice;
use crate::stats::{
    CorrelationMatrix, DatasetKpis, FrequencyTable, QualityReport, StatValue, SummaryTable,
    TemporalSummary,
};

/// Compact magnitude: `1.2M`, `3.4K`, `12`.
pub fn format_number(value: f64) -> String {
    if value.abs() >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value.abs() >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{value:.0}")
    }
}

fn stat(value: StatValue) -> String {
    match value {
        StatValue::Number(v) => format!("{v:.3}"),
        StatValue::Undefined => "n/a".to_string(),
    }
}

pub fn schema_report(schema: &Schema) -> String {
    let mut report = String::new();
    report.push_str("Dataset Schema\n==============\n");
    report.push_str(&format!("Total Columns: {}\n", schema.fields.len()));
    for semantic_type in [
        SemanticType::Numeric,
        SemanticType::Categorical,
        SemanticType::Datetime,
        SemanticType::Other,
    ] {
        report.push_str(&format!(
            "  - {}: {}\n",
            semantic_type,
            schema.count_of(semantic_type)
        ));
    }
    for field in &schema.fields {
        report.push_str(&format!(
            "{} ({}, confidence: {:.2})\n",
            field.name, field.semantic_type, field.confidence
        ));
    }
    report
}

/// One row per column, statistics as columns, three decimals.
pub fn summary_report(table: &SummaryTable) -> String {
    let mut report = String::new();
    report.push_str("Numeric Summary\n===============\n");
    let Some(first) = table.values().next() else {
        return report;
    };
    let headers: Vec<String> = first.as_map().keys().cloned().collect();
    let name_width = table.keys().map(String::len).max().unwrap_or(0).max(6);
    report.push_str(&format!("{:<name_width$}", "column"));
    for h in &headers {
        report.push_str(&format!(" {h:>12}"));
    }
    report.push('\n');
    for (name, summary) in table {
        report.push_str(&format!("{name:<name_width$}"));
        for value in summary.as_map().values() {
            report.push_str(&format!(" {:>12}", stat(*value)));
        }
        report.push('\n');
    }
    report
}

pub fn frequency_report(table: &FrequencyTable) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "Breakdown of {} ({} distinct, {} non-null)\n",
        table.column, table.distinct, table.non_null
    ));
    for entry in &table.entries {
        report.push_str(&format!(
            "  {:<24} {:>8} {:>7.2}%\n",
            entry.value, entry.count, entry.percent
        ));
    }
    report
}

pub fn quality_report(quality: &QualityReport) -> String {
    let mut report = String::new();
    report.push_str("Data Quality\n============\n");
    for row in &quality.rows {
        report.push_str(&format!(
            "  {:<24} missing {:>6} ({:>6.2}%)  duplicates {}\n",
            row.column, row.missing, row.missing_pct, row.duplicate_rows
        ));
    }
    report.push_str(&format!(
        "Overall missing rate: {:.2}%\n",
        quality.mean_missing_pct
    ));
    report.push_str(&format!("Duplicate rows: {}\n", quality.duplicate_rows));
    report.push_str(&format!(
        "Mean completeness: {:.2}%\n",
        quality.completeness_pct
    ));
    report
}

pub fn correlation_report(matrix: &CorrelationMatrix) -> String {
    let mut report = String::new();
    report.push_str(&format!("{} correlation\n", matrix.method));
    let width = matrix.columns.iter().map(String::len).max().unwrap_or(0).max(8);
    report.push_str(&" ".repeat(width));
    for c in &matrix.columns {
        report.push_str(&format!(" {c:>width$}"));
    }
    report.push('\n');
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        report.push_str(&format!("{name:<width$}"));
        for value in row {
            report.push_str(&format!(" {:>width$}", stat(*value)));
        }
        report.push('\n');
    }
    report
}

pub fn temporal_report(summary: &TemporalSummary) -> String {
    format!(
        "Temporal analysis on {}\n  Total span (days): {}\n  Distinct dates: {}\n  From {} to {}\n",
        summary.column, summary.span_days, summary.distinct_dates, summary.first, summary.last
    )
}

pub fn kpi_report(kpis: &DatasetKpis) -> String {
    let mut report = String::new();
    report.push_str("Key Indicators\n==============\n");
    report.push_str(&format!(
        "  Observations: {}\n",
        format_number(kpis.observations as f64)
    ));
    report.push_str(&format!("  Variables: {}\n", kpis.variables));
    report.push_str(&format!(
        "  Mean completeness: {:.2}%\n",
        kpis.mean_completeness_pct
    ));
    report.push_str(&format!("  Data density: {:.2}%\n", kpis.density_pct));
    report.push_str(&format!("  Duplicate rows: {}\n", kpis.duplicate_rows));
    report
}

pub fn notices_report(notices: &[&Notice]) -> String {
    notices.iter().map(|n| format!("{n}\n")).collect()
}
