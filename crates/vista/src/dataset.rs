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

use crate::error::{DatasetError, DatasetResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Datetime,
    Other,
}
impl SemanticType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Numeric)
    }
    pub fn is_categorical(&self) -> bool {
        matches!(self, SemanticType::Categorical)
    }
    pub fn is_datetime(&self) -> bool {
        matches!(self, SemanticType::Datetime)
    }
}
impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Categorical => "categorical",
            SemanticType::Datetime => "datetime",
            SemanticType::Other => "other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    Datetime(Vec<Option<NaiveDateTime>>),
    Other(Vec<Option<String>>),
}

/// A single cell as handed to the rendering host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}
impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Number(u64),
    Text(&'a str),
    Timestamp(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
}
impl Column {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        let values = match values {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(
                v.into_iter()
                    .map(|opt| opt.filter(|x| !x.is_nan()))
                    .collect(),
            ),
            other => other,
        };
        Self {
            name: name.into(),
            values,
        }
    }
    pub fn numeric<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        Self::new(name, ColumnValues::Numeric(values.into_iter().collect()))
    }
    /// Dense numeric column without nulls.
    pub fn from_values<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self::numeric(name, values.into_iter().map(Some))
    }
    pub fn categorical<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self::new(
            name,
            ColumnValues::Categorical(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }
    pub fn datetime<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<NaiveDateTime>>,
    {
        Self::new(name, ColumnValues::Datetime(values.into_iter().collect()))
    }
    pub fn other<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self::new(
            name,
            ColumnValues::Other(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn values(&self) -> &ColumnValues {
        &self.values
    }
    pub fn semantic_type(&self) -> SemanticType {
        match self.values {
            ColumnValues::Numeric(_) => SemanticType::Numeric,
            ColumnValues::Categorical(_) => SemanticType::Categorical,
            ColumnValues::Datetime(_) => SemanticType::Datetime,
            ColumnValues::Other(_) => SemanticType::Other,
        }
    }
    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical(v) | ColumnValues::Other(v) => v.len(),
            ColumnValues::Datetime(v) => v.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn is_null(&self, index: usize) -> bool {
        match &self.values {
            ColumnValues::Numeric(v) => v.get(index).is_none_or(Option::is_none),
            ColumnValues::Categorical(v) | ColumnValues::Other(v) => {
                v.get(index).is_none_or(Option::is_none)
            }
            ColumnValues::Datetime(v) => v.get(index).is_none_or(Option::is_none),
        }
    }
    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }
    pub fn non_null_count(&self) -> usize {
        self.len() - self.null_count()
    }
    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_datetime(&self) -> Option<&[Option<NaiveDateTime>]> {
        match &self.values {
            ColumnValues::Datetime(v) => Some(v),
            _ => None,
        }
    }
    /// Non-null numeric values in row order; empty for non-numeric columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.as_numeric()
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
    pub fn number_at(&self, index: usize) -> Option<f64> {
        self.as_numeric().and_then(|v| v.get(index).copied().flatten())
    }
    /// Text form of a cell, used for frequency tables and labels.
    pub fn display_at(&self, index: usize) -> Option<String> {
        match &self.values {
            ColumnValues::Numeric(v) => v.get(index).copied().flatten().map(format_f64),
            ColumnValues::Categorical(v) | ColumnValues::Other(v) => v.get(index).cloned().flatten(),
            ColumnValues::Datetime(v) => v.get(index).copied().flatten().map(|dt| dt.to_string()),
        }
    }
    pub fn cell(&self, index: usize) -> Cell {
        match &self.values {
            ColumnValues::Numeric(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Cell::Null, Cell::Number),
            ColumnValues::Categorical(v) | ColumnValues::Other(v) => v
                .get(index)
                .cloned()
                .flatten()
                .map_or(Cell::Null, Cell::Text),
            ColumnValues::Datetime(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Cell::Null, Cell::Timestamp),
        }
    }
    fn cell_key(&self, index: usize) -> CellKey<'_> {
        match &self.values {
            ColumnValues::Numeric(v) => match v.get(index).copied().flatten() {
                // -0.0 and 0.0 compare equal, so they must hash equal too
                Some(x) if x == 0.0 => CellKey::Number(0.0f64.to_bits()),
                Some(x) => CellKey::Number(x.to_bits()),
                None => CellKey::Null,
            },
            ColumnValues::Categorical(v) | ColumnValues::Other(v) => match v.get(index) {
                Some(Some(s)) => CellKey::Text(s.as_str()),
                _ => CellKey::Null,
            },
            ColumnValues::Datetime(v) => match v.get(index).copied().flatten() {
                Some(dt) => CellKey::Timestamp(dt.and_utc().timestamp_nanos_opt().unwrap_or(i64::MAX)),
                None => CellKey::Null,
            },
        }
    }
    pub fn take(&self, indices: &[usize]) -> Column {
        let values = match &self.values {
            ColumnValues::Numeric(v) => {
                ColumnValues::Numeric(indices.iter().map(|&i| v.get(i).copied().flatten()).collect())
            }
            ColumnValues::Categorical(v) => ColumnValues::Categorical(
                indices.iter().map(|&i| v.get(i).cloned().flatten()).collect(),
            ),
            ColumnValues::Datetime(v) => {
                ColumnValues::Datetime(indices.iter().map(|&i| v.get(i).copied().flatten()).collect())
            }
            ColumnValues::Other(v) => {
                ColumnValues::Other(indices.iter().map(|&i| v.get(i).cloned().flatten()).collect())
            }
        };
        Column {
            name: self.name.clone(),
            values,
        }
    }
}

pub(crate) fn format_f64(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub semantic_type: SemanticType,
    pub confidence: f64,
}

/// Typed schema, produced once per dataset by the inference pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldInfo>,
}
impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
    pub fn names_of(&self, semantic_type: SemanticType) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.semantic_type == semantic_type)
            .map(|f| f.name.as_str())
            .collect()
    }
    pub fn count_of(&self, semantic_type: SemanticType) -> usize {
        self.fields
            .iter()
            .filter(|f| f.semantic_type == semantic_type)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    schema: Schema,
    rows: usize,
}
impl Dataset {
    pub fn new(columns: Vec<Column>) -> DatasetResult<Self> {
        let schema = Schema {
            fields: columns
                .iter()
                .map(|c| FieldInfo {
                    name: c.name().to_string(),
                    semantic_type: c.semantic_type(),
                    confidence: 1.0,
                })
                .collect(),
        };
        Self::with_schema(columns, schema)
    }
    pub(crate) fn with_schema(columns: Vec<Column>, schema: Schema) -> DatasetResult<Self> {
        let rows = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != rows {
                return Err(DatasetError::LengthMismatch {
                    column: column.name().to_string(),
                    expected: rows,
                    found: column.len(),
                });
            }
            if !seen.insert(column.name()) {
                return Err(DatasetError::DuplicateColumn {
                    name: column.name().to_string(),
                });
            }
        }
        Ok(Self {
            columns,
            schema,
            rows,
        })
    }
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            schema: Schema::default(),
            rows: 0,
        }
    }
    pub fn row_count(&self) -> usize {
        self.rows
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }
    pub fn require(&self, name: &str) -> DatasetResult<&Column> {
        self.column(name).ok_or_else(|| DatasetError::ColumnNotFound {
            column: name.to_string(),
        })
    }
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }
    pub fn columns_of(&self, semantic_type: SemanticType) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.semantic_type() == semantic_type)
            .collect()
    }
    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns_of(SemanticType::Numeric)
    }
    pub fn categorical_columns(&self) -> Vec<&Column> {
        self.columns_of(SemanticType::Categorical)
    }
    /// Leftmost column of the given type.
    pub fn first_of(&self, semantic_type: SemanticType) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.semantic_type() == semantic_type)
    }
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            schema: self.schema.clone(),
            rows: indices.len(),
        }
    }
    pub fn without_columns(&self, names: &[&str]) -> Dataset {
        let keep: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| !names.contains(&c.name()))
            .cloned()
            .collect();
        let schema = Schema {
            fields: self
                .schema
                .fields
                .iter()
                .filter(|f| !names.contains(&f.name.as_str()))
                .cloned()
                .collect(),
        };
        Dataset {
            rows: if keep.is_empty() { 0 } else { self.rows },
            columns: keep,
            schema,
        }
    }
    pub(crate) fn replace_columns(&self, columns: Vec<Column>) -> DatasetResult<Dataset> {
        Dataset::with_schema(columns, self.schema.clone())
    }
    /// Indices of rows that repeat an earlier row exactly, across all columns.
    pub fn duplicate_row_indices(&self) -> Vec<usize> {
        let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(self.rows);
        (0..self.rows)
            .filter(|&row| {
                let key: Vec<CellKey<'_>> =
                    self.columns.iter().map(|c| c.cell_key(row)).collect();
                !seen.insert(key)
            })
            .collect()
    }
    pub fn duplicate_row_count(&self) -> usize {
        self.duplicate_row_indices().len()
    }
}
