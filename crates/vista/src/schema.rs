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

//! Semantic type inference.
//!
//! Runs once when a dataset enters the core. Typed polars columns map
//! directly; string columns are sampled and classified by how many of their
//! values parse as numbers or timestamps.

use crate::config::InferenceConfig;
use crate::dataset::{Column, ColumnValues, Dataset, FieldInfo, Schema, SemanticType};
use crate::error::{DatasetError, DatasetResult};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

/// Parses a timestamp with the first matching format. Date-only formats
/// resolve to midnight.
pub fn parse_temporal(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let value = value.trim();
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(value, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

/// Leading-zero integer codes such as `007` or `01234`.
fn is_zero_padded(value: &str) -> bool {
    let digits = value.trim().trim_start_matches(['+', '-']);
    let mut chars = digits.chars();
    chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn normalise_blanks(raw: &[Option<String>]) -> Vec<Option<String>> {
    raw.iter()
        .map(|v| v.as_ref().filter(|s| !s.trim().is_empty()).cloned())
        .collect()
}

fn text_to(values: Vec<Option<String>>, target: SemanticType, formats: &[String]) -> ColumnValues {
    match target {
        SemanticType::Numeric => ColumnValues::Numeric(
            values
                .iter()
                .map(|v| v.as_deref().and_then(parse_number))
                .collect(),
        ),
        SemanticType::Datetime => ColumnValues::Datetime(
            values
                .iter()
                .map(|v| v.as_deref().and_then(|s| parse_temporal(s, formats)))
                .collect(),
        ),
        SemanticType::Categorical => ColumnValues::Categorical(values),
        SemanticType::Other => ColumnValues::Other(values),
    }
}

/// Classifies a raw text column and converts it to its typed form.
pub fn infer_text_column(
    name: &str,
    raw: &[Option<String>],
    config: &InferenceConfig,
) -> (Column, FieldInfo) {
    let values = normalise_blanks(raw);
    if let Some(&forced) = config.overrides.get(name) {
        return finish(name, text_to(values, forced, &config.temporal_formats), forced, 1.0);
    }
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    if present.is_empty() {
        // all-null columns behave like an empty numeric column downstream
        return finish(name, text_to(values, SemanticType::Numeric, &[]), SemanticType::Numeric, 0.0);
    }
    let total = present.len() as f64;
    let numeric_share = present.iter().filter(|v| parse_number(v).is_some()).count() as f64 / total;
    let padded = present.iter().any(|v| is_zero_padded(v));
    if numeric_share >= config.type_confidence_threshold && !padded {
        return finish(
            name,
            text_to(values, SemanticType::Numeric, &[]),
            SemanticType::Numeric,
            numeric_share,
        );
    }
    if padded && numeric_share >= config.type_confidence_threshold {
        debug!("Column '{}' holds zero-padded codes, keeping it categorical", name);
    }
    let temporal_share = present
        .iter()
        .filter(|v| parse_temporal(v, &config.temporal_formats).is_some())
        .count() as f64
        / total;
    if temporal_share >= config.type_confidence_threshold {
        return finish(
            name,
            text_to(values, SemanticType::Datetime, &config.temporal_formats),
            SemanticType::Datetime,
            temporal_share,
        );
    }
    let confidence = 1.0 - numeric_share.max(temporal_share);
    finish(name, ColumnValues::Categorical(values), SemanticType::Categorical, confidence)
}

fn finish(
    name: &str,
    values: ColumnValues,
    semantic_type: SemanticType,
    confidence: f64,
) -> (Column, FieldInfo) {
    (
        Column::new(name, values),
        FieldInfo {
            name: name.to_string(),
            semantic_type,
            confidence,
        },
    )
}

fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let as_text = series.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn convert_series(series: &Series, config: &InferenceConfig) -> PolarsResult<(Column, FieldInfo)> {
    let name = series.name().to_string();
    let forced = config.overrides.get(&name).copied();
    let typed = match series.dtype() {
        DataType::Float64 | DataType::Int64 | DataType::Float32 | DataType::Int32
        | DataType::UInt32 | DataType::UInt64 => {
            let as_float = series.cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = as_float.f64()?.into_iter().collect();
            Some((ColumnValues::Numeric(values), SemanticType::Numeric))
        }
        DataType::Date | DataType::Datetime(_, _) => {
            let values = string_values(series)?
                .iter()
                .map(|v| v.as_deref().and_then(|s| parse_temporal(s, &config.temporal_formats)))
                .collect();
            Some((ColumnValues::Datetime(values), SemanticType::Datetime))
        }
        DataType::Boolean => Some((ColumnValues::Other(string_values(series)?), SemanticType::Other)),
        _ => None,
    };
    Ok(match (typed, forced) {
        (Some((values, semantic_type)), None) => finish(&name, values, semantic_type, 1.0),
        (Some(_), Some(target)) => finish(&name, retyped(series, target, config)?, target, 1.0),
        (None, _) => infer_text_column(&name, &string_values(series)?, config),
    })
}

fn retyped(
    series: &Series,
    target: SemanticType,
    config: &InferenceConfig,
) -> PolarsResult<ColumnValues> {
    if target == SemanticType::Numeric {
        let as_float = series.cast(&DataType::Float64)?;
        return Ok(ColumnValues::Numeric(as_float.f64()?.into_iter().collect()));
    }
    let text = normalise_blanks(&string_values(series)?);
    Ok(text_to(text, target, &config.temporal_formats))
}

impl Dataset {
    /// Converts a polars frame into a typed dataset, inferring each column's
    /// semantic type once.
    pub fn from_dataframe(df: &DataFrame, config: &InferenceConfig) -> DatasetResult<Self> {
        let mut columns = Vec::with_capacity(df.width());
        let mut fields = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let (converted, field) =
                convert_series(series, config).map_err(|source| DatasetError::Conversion {
                    column: series.name().to_string(),
                    source,
                })?;
            debug!(
                "Column '{}' inferred as {} (confidence {:.2})",
                field.name, field.semantic_type, field.confidence
            );
            columns.push(converted);
            fields.push(field);
        }
        Dataset::with_schema(columns, Schema { fields })
    }

    /// Builds a dataset from raw text columns, e.g. cells read by a host
    /// that does not use polars.
    pub fn from_text_columns<N>(
        raw: Vec<(N, Vec<Option<String>>)>,
        config: &InferenceConfig,
    ) -> DatasetResult<Self>
    where
        N: AsRef<str>,
    {
        let (columns, fields): (Vec<Column>, Vec<FieldInfo>) = raw
            .iter()
            .map(|(name, values)| infer_text_column(name.as_ref(), values, config))
            .unzip();
        Dataset::with_schema(columns, Schema { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn raw(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn numeric_text_becomes_numeric() {
        let (column, field) = infer_text_column("x", &raw(&["1", "2.5", "", "-3"]), &InferenceConfig::default());
        assert_eq!(field.semantic_type, SemanticType::Numeric);
        assert_eq!(column.numeric_values(), vec![1.0, 2.5, -3.0]);
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn zero_padded_codes_stay_categorical() {
        let (_, field) = infer_text_column("zip", &raw(&["007", "010", "123"]), &InferenceConfig::default());
        assert_eq!(field.semantic_type, SemanticType::Categorical);
    }

    #[test]
    fn dates_are_detected() {
        let (column, field) = infer_text_column(
            "when",
            &raw(&["2024-01-01", "2024-01-05", "2024-02-01 10:30:00"]),
            &InferenceConfig::default(),
        );
        assert_eq!(field.semantic_type, SemanticType::Datetime);
        assert_eq!(column.non_null_count(), 3);
    }

    #[test]
    fn mostly_text_is_categorical() {
        let (_, field) = infer_text_column("c", &raw(&["a", "b", "1", "c", "d"]), &InferenceConfig::default());
        assert_eq!(field.semantic_type, SemanticType::Categorical);
        assert!((field.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn overrides_win() {
        let config = InferenceConfig {
            overrides: HashMap::from([("year".to_string(), SemanticType::Categorical)]),
            ..Default::default()
        };
        let (_, field) = infer_text_column("year", &raw(&["2020", "2021"]), &config);
        assert_eq!(field.semantic_type, SemanticType::Categorical);
        assert_eq!(field.confidence, 1.0);
    }

    #[test]
    fn converts_typed_dataframe() {
        let df = df!(
            "price" => [1.5f64, 2.0, 3.5],
            "qty" => [1i64, 2, 3],
            "label" => ["a", "b", "a"],
            "amount" => ["10", "20", "30"],
            "flag" => [true, false, true],
        )
        .expect("frame");
        let ds = Dataset::from_dataframe(&df, &InferenceConfig::default()).expect("dataset");
        let types: Vec<SemanticType> = ds.schema().fields.iter().map(|f| f.semantic_type).collect();
        assert_eq!(
            types,
            vec![
                SemanticType::Numeric,
                SemanticType::Numeric,
                SemanticType::Categorical,
                SemanticType::Numeric,
                SemanticType::Other,
            ]
        );
        assert_eq!(ds.row_count(), 3);
    }
}
