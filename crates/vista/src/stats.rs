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

//! Descriptive statistics over a typed [`Dataset`].
//!
//! Moments use sample (n - 1) normalisation, percentiles interpolate
//! linearly between order statistics, and skewness/kurtosis are the adjusted
//! Fisher-Pearson estimators. Anything that cannot be computed is reported as
//! [`StatValue::Undefined`] rather than NaN or infinity.

use crate::config::SummaryConfig;
use crate::dataset::{Column, Dataset, SemanticType};
use crate::error::{Notice, NoticeKind, Outcome, Severity};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// A statistic, or the marker that it cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StatValue {
    Number(f64),
    #[default]
    Undefined,
}
impl StatValue {
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => StatValue::Number(v),
            _ => StatValue::Undefined,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Number(v) => Some(*v),
            StatValue::Undefined => None,
        }
    }
    pub fn is_undefined(&self) -> bool {
        matches!(self, StatValue::Undefined)
    }
}
impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatValue::Number(v) => serializer.serialize_f64(*v),
            StatValue::Undefined => serializer.serialize_none(),
        }
    }
}
impl<'de> Deserialize<'de> for StatValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(StatValue::from_option(Option::<f64>::deserialize(deserializer)?))
    }
}
impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(v) => match f.precision() {
                Some(p) => write!(f, "{v:.p$}"),
                None => write!(f, "{v}"),
            },
            StatValue::Undefined => f.write_str("n/a"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: StatValue,
    pub std: StatValue,
    pub min: StatValue,
    /// Keyed by label, e.g. `"25%"`, in configured order.
    pub percentiles: IndexMap<String, StatValue>,
    pub max: StatValue,
    pub mode: StatValue,
    pub skewness: StatValue,
    pub kurtosis: StatValue,
    pub variance: StatValue,
    pub cv_pct: StatValue,
    pub gini: StatValue,
}
impl NumericSummary {
    /// Statistic name to value, in display order.
    pub fn as_map(&self) -> IndexMap<String, StatValue> {
        let mut map = IndexMap::new();
        map.insert("count".to_string(), StatValue::Number(self.count as f64));
        map.insert("mean".to_string(), self.mean);
        map.insert("std".to_string(), self.std);
        map.insert("min".to_string(), self.min);
        for (label, value) in &self.percentiles {
            map.insert(label.clone(), *value);
        }
        map.insert("max".to_string(), self.max);
        map.insert("mode".to_string(), self.mode);
        map.insert("skewness".to_string(), self.skewness);
        map.insert("kurtosis".to_string(), self.kurtosis);
        map.insert("variance".to_string(), self.variance);
        map.insert("cv (%)".to_string(), self.cv_pct);
        map.insert("gini".to_string(), self.gini);
        map
    }
    pub fn percentile(&self, label: &str) -> StatValue {
        self.percentiles.get(label).copied().unwrap_or_default()
    }
}

pub type SummaryTable = IndexMap<String, NumericSummary>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GiniResult {
    pub value: StatValue,
    pub negatives_coerced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
    /// Share of non-null values, 0 to 100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub column: String,
    pub entries: Vec<FrequencyEntry>,
    pub non_null: usize,
    pub distinct: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRow {
    pub column: String,
    pub missing: usize,
    pub missing_pct: f64,
    /// Dataset-wide count, repeated on every row.
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub rows: Vec<QualityRow>,
    pub duplicate_rows: usize,
    pub mean_missing_pct: f64,
    pub completeness_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}
impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationMethod::Pearson => f.write_str("Pearson"),
            CorrelationMethod::Spearman => f.write_str("Spearman"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    /// Row-major, `values[i][j]` pairs `columns[i]` with `columns[j]`.
    pub values: Vec<Vec<StatValue>>,
}
impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<StatValue> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSummary {
    pub column: String,
    pub span_days: i64,
    pub distinct_dates: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetKpis {
    pub observations: usize,
    pub variables: usize,
    pub mean_completeness_pct: f64,
    pub density_pct: f64,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub outliers: usize,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator).
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Linear interpolation between closest ranks; `sorted` must be ascending.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Most frequent value; the smallest one when several tie.
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        let v = if v == 0.0 { 0.0 } else { v };
        counts.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
        .map(|(v, _)| v)
}

fn central_moments(values: &[f64]) -> Option<(f64, f64, f64, f64)> {
    let n = values.len() as f64;
    let m = mean(values)?;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Some((m, m2 / n, m3 / n, m4 / n))
}

fn is_degenerate(m: f64, m2: f64) -> bool {
    m2 <= 1e-14 * (1.0 + m * m)
}

/// Adjusted Fisher-Pearson skewness; needs at least three values and
/// non-zero spread.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let (m, m2, m3, _) = central_moments(values)?;
    if is_degenerate(m, m2) {
        return None;
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Adjusted excess kurtosis; needs at least four values and non-zero spread.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let (m, m2, _, m4) = central_moments(values)?;
    if is_degenerate(m, m2) {
        return None;
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

pub fn coefficient_of_variation(std: Option<f64>, mean: Option<f64>, epsilon: f64) -> StatValue {
    match (std, mean) {
        (Some(s), Some(m)) if m.abs() >= epsilon => StatValue::from_option(Some(s / m * 100.0)),
        _ => StatValue::Undefined,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Gini concentration index, rounded to four decimals.
///
/// Negative inputs are replaced by their absolute value and flagged.
pub fn gini(values: &[f64]) -> GiniResult {
    let negatives_coerced = values.iter().any(|v| *v < 0.0);
    if negatives_coerced {
        warn!("Gini computed on absolute values, negative inputs coerced");
    }
    let mut xs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    xs.sort_by(f64::total_cmp);
    let total: f64 = xs.iter().sum();
    let value = if xs.is_empty() || total <= 0.0 {
        StatValue::Undefined
    } else {
        let n = xs.len() as f64;
        let weighted: f64 = xs
            .iter()
            .enumerate()
            .map(|(i, x)| (i + 1) as f64 * x)
            .sum();
        let g = 2.0 * weighted / (n * total) - (n + 1.0) / n;
        StatValue::from_option(Some(round_to(g, 4)))
    };
    GiniResult {
        value,
        negatives_coerced,
    }
}

/// Quartiles, IQR fences and the number of values outside them.
pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    let s = sorted(values);
    let q1 = percentile(&s, 0.25)?;
    let median = percentile(&s, 0.5)?;
    let q3 = percentile(&s, 0.75)?;
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;
    let outliers = s
        .iter()
        .filter(|v| **v < lower_fence || **v > upper_fence)
        .count();
    Some(BoxSummary {
        q1,
        median,
        q3,
        iqr,
        lower_fence,
        upper_fence,
        outliers,
    })
}

/// Pearson coefficient over the given pairs; undefined with fewer than two
/// pairs or when either side is constant.
pub fn pearson(pairs: &[(f64, f64)]) -> StatValue {
    if pairs.len() < 2 {
        return StatValue::Undefined;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return StatValue::Undefined;
    }
    StatValue::from_option(Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)))
}

/// 1-based ranks with ties sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

pub fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect()
}

pub fn correlate(x: &[Option<f64>], y: &[Option<f64>], method: CorrelationMethod) -> StatValue {
    let pairs = complete_pairs(x, y);
    match method {
        CorrelationMethod::Pearson => pearson(&pairs),
        CorrelationMethod::Spearman => {
            let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let ranked: Vec<(f64, f64)> = average_ranks(&xs)
                .into_iter()
                .zip(average_ranks(&ys))
                .collect();
            pearson(&ranked)
        }
    }
}

/// Top-N value counts of any column, ordered by count then first
/// appearance.
pub fn frequency_table(column: &Column, top_n: usize) -> FrequencyTable {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for i in 0..column.len() {
        if let Some(value) = column.display_at(i) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    let non_null: usize = counts.values().sum();
    let distinct = counts.len();
    let mut entries: Vec<FrequencyEntry> = counts
        .into_iter()
        .map(|(value, count)| FrequencyEntry {
            value,
            count,
            percent: if non_null > 0 {
                count as f64 / non_null as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    // stable: equal counts keep first-encountered order
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(top_n);
    FrequencyTable {
        column: column.name().to_string(),
        entries,
        non_null,
        distinct,
    }
}

fn percentile_label(p: f64) -> String {
    let pct = p * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}%", pct.round() as i64)
    } else {
        format!("{pct}%")
    }
}

struct ColumnOutcome {
    summary: NumericSummary,
    notices: Vec<Notice>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummarizer {
    config: SummaryConfig,
}
impl StatsSummarizer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: SummaryConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    fn summarize_column(&self, column: &Column) -> ColumnOutcome {
        let values = column.numeric_values();
        let name = column.name();
        let mut notices = Vec::new();
        let s = sorted(&values);
        let percentiles = self
            .config
            .percentiles
            .iter()
            .map(|&p| (percentile_label(p), StatValue::from_option(percentile(&s, p))))
            .collect();
        if values.is_empty() {
            notices.push(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                format!("Column '{name}' has no non-null values"),
            ));
            return ColumnOutcome {
                summary: NumericSummary {
                    count: 0,
                    mean: StatValue::Undefined,
                    std: StatValue::Undefined,
                    min: StatValue::Undefined,
                    percentiles,
                    max: StatValue::Undefined,
                    mode: StatValue::Undefined,
                    skewness: StatValue::Undefined,
                    kurtosis: StatValue::Undefined,
                    variance: StatValue::Undefined,
                    cv_pct: StatValue::Undefined,
                    gini: StatValue::Undefined,
                },
                notices,
            };
        }
        let m = mean(&values);
        let sd = std_dev(&values);
        let cv_pct = coefficient_of_variation(sd, m, self.config.cv_mean_epsilon);
        if cv_pct.is_undefined() && sd.is_some() {
            notices.push(Notice::banner(
                Severity::Info,
                format!("Coefficient of variation of '{name}' is undefined (mean is zero)"),
            ));
        }
        let gini = gini(&values);
        if gini.negatives_coerced {
            notices.push(Notice::banner(
                Severity::Warning,
                format!("Gini index of '{name}' is computed on absolute values (negative values coerced)"),
            ));
        }
        ColumnOutcome {
            summary: NumericSummary {
                count: values.len(),
                mean: StatValue::from_option(m),
                std: StatValue::from_option(sd),
                min: StatValue::from_option(s.first().copied()),
                percentiles,
                max: StatValue::from_option(s.last().copied()),
                mode: StatValue::from_option(mode(&values)),
                skewness: StatValue::from_option(skewness(&values)),
                kurtosis: StatValue::from_option(kurtosis(&values)),
                variance: StatValue::from_option(variance(&values)),
                cv_pct,
                gini: gini.value,
            },
            notices,
        }
    }

    /// Moments, percentiles, mode, dispersion and Gini for every numeric
    /// column, in column order.
    pub fn numeric_summary(&self, dataset: &Dataset) -> Outcome<SummaryTable> {
        let numeric = dataset.numeric_columns();
        if numeric.is_empty() {
            return Outcome::not_computable(Notice::info(
                NoticeKind::NonNumericInput,
                "No numeric columns detected",
            ));
        }
        let results: Vec<(String, ColumnOutcome)> = numeric
            .par_iter()
            .map(|c| (c.name().to_string(), self.summarize_column(c)))
            .collect();
        let mut table = SummaryTable::with_capacity(results.len());
        let mut notices = Vec::new();
        for (name, outcome) in results {
            notices.extend(outcome.notices);
            table.insert(name, outcome.summary);
        }
        debug!("Summarised {} numeric columns", table.len());
        Outcome::with_notices(table, notices)
    }

    pub fn categorical_summary(
        &self,
        dataset: &Dataset,
        top_n: usize,
    ) -> Outcome<IndexMap<String, FrequencyTable>> {
        let categorical = dataset.categorical_columns();
        if categorical.is_empty() {
            return Outcome::not_computable(Notice::info(
                NoticeKind::InsufficientColumns,
                "No categorical columns detected",
            ));
        }
        let tables = categorical
            .into_iter()
            .map(|c| (c.name().to_string(), frequency_table(c, top_n)))
            .collect();
        Outcome::computed(tables)
    }

    /// Per-column missing counts plus the dataset-wide duplicate count.
    pub fn quality_report(&self, dataset: &Dataset) -> Outcome<QualityReport> {
        let rows = dataset.row_count();
        if rows == 0 || dataset.column_count() == 0 {
            return Outcome::not_computable(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                "Dataset has no rows",
            ));
        }
        let duplicate_rows = dataset.duplicate_row_count();
        let quality_rows: Vec<QualityRow> = dataset
            .columns()
            .iter()
            .map(|c| {
                let missing = c.null_count();
                QualityRow {
                    column: c.name().to_string(),
                    missing,
                    missing_pct: missing as f64 / rows as f64 * 100.0,
                    duplicate_rows,
                }
            })
            .collect();
        let mean_missing_pct =
            quality_rows.iter().map(|r| r.missing_pct).sum::<f64>() / quality_rows.len() as f64;
        Outcome::computed(QualityReport {
            rows: quality_rows,
            duplicate_rows,
            mean_missing_pct,
            completeness_pct: 100.0 - mean_missing_pct,
        })
    }

    /// Pairwise-complete correlation matrix across all numeric columns.
    pub fn correlation(
        &self,
        dataset: &Dataset,
        method: CorrelationMethod,
    ) -> Outcome<CorrelationMatrix> {
        let numeric = dataset.numeric_columns();
        if numeric.len() < 2 {
            return Outcome::not_computable(Notice::info(
                NoticeKind::InsufficientColumns,
                "Not enough numeric columns for correlation (at least 2 required)",
            ));
        }
        let series: Vec<&[Option<f64>]> = numeric.iter().filter_map(|c| c.as_numeric()).collect();
        let k = series.len();
        let mut values = vec![vec![StatValue::Undefined; k]; k];
        for i in 0..k {
            for j in i..k {
                let r = if i == j {
                    let present = series[i].iter().flatten().copied().collect::<Vec<_>>();
                    match variance(&present) {
                        Some(v) if v > 0.0 => StatValue::Number(1.0),
                        _ => StatValue::Undefined,
                    }
                } else {
                    correlate(series[i], series[j], method)
                };
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        Outcome::computed(CorrelationMatrix {
            method,
            columns: numeric.iter().map(|c| c.name().to_string()).collect(),
            values,
        })
    }

    /// Span and distinct dates of the leftmost datetime column.
    pub fn temporal_summary(&self, dataset: &Dataset) -> Outcome<TemporalSummary> {
        let Some(column) = dataset.first_of(SemanticType::Datetime) else {
            return Outcome::not_computable(Notice::info(
                NoticeKind::InsufficientColumns,
                "Temporal analysis not applicable: no datetime column detected",
            ));
        };
        let stamps: Vec<NaiveDateTime> = column
            .as_datetime()
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default();
        let (Some(first), Some(last)) = (stamps.iter().min(), stamps.iter().max()) else {
            return Outcome::not_computable(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                format!("Datetime column '{}' has no values", column.name()),
            ));
        };
        let distinct_dates = stamps.iter().map(|s| s.date()).collect::<HashSet<_>>().len();
        Outcome::computed(TemporalSummary {
            column: column.name().to_string(),
            span_days: (*last - *first).num_days(),
            distinct_dates,
            first: *first,
            last: *last,
        })
    }

    pub fn kpi_summary(&self, dataset: &Dataset) -> DatasetKpis {
        let rows = dataset.row_count();
        let cols = dataset.column_count();
        let cells = rows * cols;
        let present: usize = dataset.columns().iter().map(Column::non_null_count).sum();
        let mean_completeness_pct = if rows == 0 || cols == 0 {
            0.0
        } else {
            dataset
                .columns()
                .iter()
                .map(|c| c.non_null_count() as f64 / rows as f64)
                .sum::<f64>()
                / cols as f64
                * 100.0
        };
        DatasetKpis {
            observations: rows,
            variables: cols,
            mean_completeness_pct,
            density_pct: if cells == 0 {
                0.0
            } else {
                present as f64 / cells as f64 * 100.0
            },
            duplicate_rows: dataset.duplicate_row_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sample_moments_use_n_minus_one() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(mean(&v).unwrap(), 5.0));
        assert!(close(variance(&v).unwrap(), 32.0 / 7.0));
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&s, 0.5).unwrap(), 2.5));
        assert!(close(percentile(&s, 0.25).unwrap(), 1.75));
        assert!(close(percentile(&s, 0.0).unwrap(), 1.0));
        assert!(close(percentile(&s, 1.0).unwrap(), 4.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn mode_prefers_smallest_on_ties() {
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(mode(&[5.0, 5.0, 1.0]), Some(5.0));
    }

    #[test]
    fn skewness_matches_adjusted_estimator() {
        // reference value from the adjusted Fisher-Pearson formula
        let s = skewness(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert!((s - 2.2324).abs() < 1e-3, "got {s}");
        assert_eq!(skewness(&[1.0, 2.0]), None);
        assert_eq!(skewness(&[4.0, 4.0, 4.0]), None);
    }

    #[test]
    fn kurtosis_needs_four_values() {
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), None);
        let k = kurtosis(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((k + 1.2).abs() < 1e-9, "got {k}");
    }

    #[test]
    fn gini_edge_cases() {
        assert_eq!(gini(&[]).value, StatValue::Undefined);
        assert_eq!(gini(&[0.0, 0.0]).value, StatValue::Undefined);
        assert_eq!(gini(&[3.0, 3.0, 3.0]).value, StatValue::Number(0.0));
        assert_eq!(gini(&[0.0, 0.0, 0.0, 10.0]).value, StatValue::Number(0.75));
        let coerced = gini(&[-1.0, 2.0]);
        assert!(coerced.negatives_coerced);
        assert_eq!(coerced.value, gini(&[1.0, 2.0]).value);
    }

    #[test]
    fn cv_is_undefined_near_zero_mean() {
        assert!(coefficient_of_variation(Some(1.0), Some(0.0), 1e-12).is_undefined());
        assert_eq!(
            coefficient_of_variation(Some(2.0), Some(4.0), 1e-12),
            StatValue::Number(50.0)
        );
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn pearson_is_undefined_for_constant_side() {
        assert!(pearson(&[(1.0, 2.0), (2.0, 2.0), (3.0, 2.0)]).is_undefined());
        assert!(pearson(&[(1.0, 2.0)]).is_undefined());
        assert_eq!(pearson(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]), StatValue::Number(1.0));
    }

    #[test]
    fn box_summary_counts_outliers() {
        let b = box_summary(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert!(close(b.q1, 2.0));
        assert!(close(b.q3, 4.0));
        assert_eq!(b.outliers, 1);
    }

    #[test]
    fn stat_value_serialises_undefined_as_null() {
        let json = serde_json::to_string(&vec![StatValue::Number(1.5), StatValue::Undefined]).unwrap();
        assert_eq!(json, "[1.5,null]");
    }

    proptest! {
        #[test]
        fn percentiles_are_monotone(values in prop::collection::vec(-1e6f64..1e6, 1..200)) {
            let s = sorted(&values);
            let ps = [0.05, 0.10, 0.25, 0.50, 0.75, 0.90, 0.95];
            let qs: Vec<f64> = ps.iter().map(|p| percentile(&s, *p).unwrap()).collect();
            for w in qs.windows(2) {
                prop_assert!(w[0] <= w[1] + 1e-9);
            }
        }

        #[test]
        fn gini_is_scale_invariant(
            values in prop::collection::vec(1.0f64..1e4, 2..100),
            k in 0.5f64..100.0,
        ) {
            let scaled: Vec<f64> = values.iter().map(|v| v * k).collect();
            let a = gini(&values).value.as_f64().unwrap();
            let b = gini(&scaled).value.as_f64().unwrap();
            // both are rounded to 4 decimals, so allow one unit of rounding
            prop_assert!((a - b).abs() <= 1.0001e-4);
        }

        #[test]
        fn gini_of_constant_values_is_zero(v in 0.1f64..1e6, n in 1usize..50) {
            prop_assert_eq!(gini(&vec![v; n]).value, StatValue::Number(0.0));
        }
    }
}
