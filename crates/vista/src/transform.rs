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

//! Row filters and the one-shot cleaning pass. Both return a new dataset.

use crate::dataset::{Column, ColumnValues, Dataset};
use crate::error::{Notice, NoticeKind, Outcome, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum RowFilter {
    /// Inclusive numeric range.
    Range { column: String, min: f64, max: f64 },
    /// Keeps rows whose value, as text, is one of `values`.
    OneOf { column: String, values: Vec<String> },
}
impl RowFilter {
    pub fn column(&self) -> &str {
        match self {
            RowFilter::Range { column, .. } | RowFilter::OneOf { column, .. } => column,
        }
    }
}

/// Applies every filter in turn. Rows with a null in a filtered column are
/// dropped.
pub fn filter_rows(dataset: &Dataset, filters: &[RowFilter]) -> Outcome<Dataset> {
    let mut keep = vec![true; dataset.row_count()];
    let mut notices = Vec::new();
    for filter in filters {
        let Some(column) = dataset.column(filter.column()) else {
            notices.push(Notice::missing_column(filter.column()));
            continue;
        };
        match filter {
            RowFilter::Range { min, max, .. } => {
                let Some(values) = column.as_numeric() else {
                    notices.push(Notice::warning(
                        NoticeKind::NonNumericInput,
                        format!("Range filter skipped: column '{}' is not numeric", column.name()),
                    ));
                    continue;
                };
                for (flag, value) in keep.iter_mut().zip(values) {
                    *flag &= value.is_some_and(|v| v >= *min && v <= *max);
                }
            }
            RowFilter::OneOf { values, .. } => {
                let allowed: HashSet<&str> = values.iter().map(String::as_str).collect();
                for (row, flag) in keep.iter_mut().enumerate() {
                    *flag &= column
                        .display_at(row)
                        .is_some_and(|v| allowed.contains(v.as_str()));
                }
            }
        }
    }
    let rows: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(i, k)| k.then_some(i))
        .collect();
    debug!("{} rows after filtering", rows.len());
    if rows.is_empty() && dataset.row_count() > 0 {
        notices.push(Notice::info(
            NoticeKind::EmptyAfterFiltering,
            "No rows match the current filters",
        ));
    }
    Outcome::with_notices(dataset.take_rows(&rows), notices)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    pub drop_duplicates: bool,
    pub drop_empty_columns: bool,
    pub fill_missing: bool,
    pub numeric_fill: f64,
    pub text_fill: String,
}
impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            drop_duplicates: true,
            drop_empty_columns: true,
            fill_missing: true,
            numeric_fill: 0.0,
            text_fill: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningReport {
    pub dataset: Dataset,
    pub duplicates_removed: usize,
    pub columns_removed: Vec<String>,
    pub cells_filled: usize,
}

fn fill(column: &Column, options: &CleaningOptions) -> (Column, usize) {
    let filled = column.null_count();
    let values = match column.values() {
        ColumnValues::Numeric(v) => ColumnValues::Numeric(
            v.iter().map(|x| Some(x.unwrap_or(options.numeric_fill))).collect(),
        ),
        ColumnValues::Categorical(v) => ColumnValues::Categorical(
            v.iter()
                .map(|x| Some(x.clone().unwrap_or_else(|| options.text_fill.clone())))
                .collect(),
        ),
        ColumnValues::Other(v) => ColumnValues::Other(
            v.iter()
                .map(|x| Some(x.clone().unwrap_or_else(|| options.text_fill.clone())))
                .collect(),
        ),
        // there is no neutral timestamp, leave gaps in place
        ColumnValues::Datetime(_) => return (column.clone(), 0),
    };
    (Column::new(column.name(), values), filled)
}

pub fn clean(dataset: &Dataset, options: &CleaningOptions) -> Outcome<CleaningReport> {
    let mut current = dataset.clone();
    let mut duplicates_removed = 0;
    if options.drop_duplicates {
        let duplicates: HashSet<usize> = current.duplicate_row_indices().into_iter().collect();
        duplicates_removed = duplicates.len();
        let rows: Vec<usize> = (0..current.row_count())
            .filter(|i| !duplicates.contains(i))
            .collect();
        current = current.take_rows(&rows);
    }
    let mut columns_removed = Vec::new();
    if options.drop_empty_columns {
        columns_removed = current
            .columns()
            .iter()
            .filter(|c| c.non_null_count() == 0)
            .map(|c| c.name().to_string())
            .collect();
        let names: Vec<&str> = columns_removed.iter().map(String::as_str).collect();
        current = current.without_columns(&names);
    }
    let mut cells_filled = 0;
    if options.fill_missing {
        let (columns, counts): (Vec<Column>, Vec<usize>) =
            current.columns().iter().map(|c| fill(c, options)).unzip();
        cells_filled = counts.iter().sum();
        // fill keeps names and lengths, so the rebuild cannot fail
        if let Ok(filled) = current.replace_columns(columns) {
            current = filled;
        }
    }
    info!(
        "Cleaning removed {} duplicate rows and {} empty columns",
        duplicates_removed,
        columns_removed.len()
    );
    let mut notices = vec![Notice::banner(
        Severity::Info,
        format!("Cleaning: {duplicates_removed} duplicate rows removed"),
    )];
    if current.is_empty() {
        notices.push(Notice::info(
            NoticeKind::EmptyAfterFiltering,
            "Dataset is empty after cleaning",
        ));
    }
    Outcome::with_notices(
        CleaningReport {
            dataset: current,
            duplicates_removed,
            columns_removed,
            cells_filled,
        },
        notices,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::numeric("price", [Some(10.0), Some(25.0), None, Some(40.0), Some(10.0)]),
            Column::categorical("city", [Some("Paris"), Some("Lyon"), Some("Nice"), None, Some("Paris")]),
            Column::numeric("empty", [None, None, None, None, None]),
        ])
        .expect("dataset")
    }

    #[test]
    fn range_filter_is_inclusive_and_drops_nulls() {
        let out = filter_rows(
            &sample(),
            &[RowFilter::Range {
                column: "price".into(),
                min: 10.0,
                max: 25.0,
            }],
        );
        assert_eq!(out.value().map(Dataset::row_count), Some(3));
    }

    #[test]
    fn filters_combine_and_report_missing_columns() {
        let out = filter_rows(
            &sample(),
            &[
                RowFilter::OneOf {
                    column: "city".into(),
                    values: vec!["Paris".into()],
                },
                RowFilter::Range {
                    column: "ghost".into(),
                    min: 0.0,
                    max: 1.0,
                },
            ],
        );
        assert_eq!(out.value().map(Dataset::row_count), Some(2));
        assert!(out.notices()[0].is(NoticeKind::MissingColumn));
    }

    #[test]
    fn empty_result_is_flagged() {
        let out = filter_rows(
            &sample(),
            &[RowFilter::Range {
                column: "price".into(),
                min: 1000.0,
                max: 2000.0,
            }],
        );
        assert!(out.is_computed());
        assert!(out
            .notices()
            .iter()
            .any(|n| n.is(NoticeKind::EmptyAfterFiltering)));
    }

    #[test]
    fn clean_mirrors_default_pipeline() {
        let out = clean(&sample(), &CleaningOptions::default());
        let report = out.value().expect("cleaned");
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.columns_removed, vec!["empty".to_string()]);
        assert_eq!(report.dataset.row_count(), 4);
        assert_eq!(report.dataset.column_count(), 2);
        let city = report.dataset.column("city").expect("city");
        assert_eq!(city.display_at(3).as_deref(), Some("0"));
        assert_eq!(report.dataset.column("price").and_then(|c| c.number_at(2)), Some(0.0));
        assert_eq!(sample().row_count(), 5);
    }
}
