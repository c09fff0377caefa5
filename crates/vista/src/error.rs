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

//! Error types and the notice taxonomy.
//!
//! Two kinds of failure exist in this crate. Boundary failures (building a
//! dataset, converting a polars frame, parsing configuration) are ordinary
//! `Err` values of [`VistaError`]. Analysis never fails that way: a summary or
//! chart that cannot be produced yields a [`Notice`] inside an [`Outcome`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VistaError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Duplicate column name: '{name}'")]
    DuplicateColumn { name: String },
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },
    #[error("Failed to convert column '{column}': {source}")]
    Conversion {
        column: String,
        #[source]
        source: polars::error::PolarsError,
    },
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidValue { field: String, value: String },
    #[error("Conflicting configuration options: {details}")]
    ConflictingOptions { details: String },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache capacity must be greater than 0")]
    ZeroCapacity,
}

pub type Result<T> = std::result::Result<T, VistaError>;
pub type DatasetResult<T> = std::result::Result<T, DatasetError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl VistaError {
    pub fn category(&self) -> &'static str {
        match self {
            VistaError::Dataset(_) => "Dataset",
            VistaError::Config(_) => "Configuration",
            VistaError::Cache(_) => "Cache",
            VistaError::Serialisation(_) => "Serialisation",
        }
    }
}

impl From<polars::error::PolarsError> for VistaError {
    fn from(err: polars::error::PolarsError) -> Self {
        VistaError::Dataset(DatasetError::Polars(err))
    }
}

/// How a host should present a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
        }
    }
}

/// Recoverable conditions met while summarising or dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    MissingColumn,
    InsufficientColumns,
    EmptyAfterFiltering,
    NonNumericInput,
    OutOfRangeSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    /// `None` for plain interpretation banners that are not a problem.
    pub kind: Option<NoticeKind>,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind: Some(kind),
            message: message.into(),
        }
    }
    pub fn info(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, message)
    }
    pub fn warning(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }
    pub fn banner(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind: None,
            message: message.into(),
        }
    }
    pub fn missing_column(column: &str) -> Self {
        Self::warning(
            NoticeKind::MissingColumn,
            format!("Column '{column}' not found in dataset"),
        )
    }
    pub fn is(&self, kind: NoticeKind) -> bool {
        self.kind == Some(kind)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.as_str(), self.message)
    }
}

/// Result of an analysis step: a value with any non-fatal notices, or a
/// single notice explaining why nothing could be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Computed { value: T, notices: Vec<Notice> },
    NotComputable { notice: Notice },
}

impl<T> Outcome<T> {
    pub fn computed(value: T) -> Self {
        Outcome::Computed {
            value,
            notices: Vec::new(),
        }
    }
    pub fn with_notices(value: T, notices: Vec<Notice>) -> Self {
        Outcome::Computed { value, notices }
    }
    pub fn not_computable(notice: Notice) -> Self {
        Outcome::NotComputable { notice }
    }
    pub fn is_computed(&self) -> bool {
        matches!(self, Outcome::Computed { .. })
    }
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Computed { value, .. } => Some(value),
            Outcome::NotComputable { .. } => None,
        }
    }
    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Computed { value, .. } => Some(value),
            Outcome::NotComputable { .. } => None,
        }
    }
    /// Every notice carried by this outcome, in emission order.
    pub fn notices(&self) -> Vec<&Notice> {
        match self {
            Outcome::Computed { notices, .. } => notices.iter().collect(),
            Outcome::NotComputable { notice } => vec![notice],
        }
    }
    pub fn rejection(&self) -> Option<&Notice> {
        match self {
            Outcome::Computed { .. } => None,
            Outcome::NotComputable { notice } => Some(notice),
        }
    }
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Computed { value, notices } => Outcome::Computed {
                value: f(value),
                notices,
            },
            Outcome::NotComputable { notice } => Outcome::NotComputable { notice },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_exposes_rejection_notice() {
        let outcome: Outcome<u32> =
            Outcome::not_computable(Notice::missing_column("price"));
        assert!(!outcome.is_computed());
        assert_eq!(outcome.value(), None);
        let notice = outcome.rejection().expect("rejected");
        assert!(notice.is(NoticeKind::MissingColumn));
        assert_eq!(notice.severity, Severity::Warning);
        assert!(notice.message.contains("price"));
    }

    #[test]
    fn map_keeps_notices() {
        let outcome = Outcome::with_notices(2, vec![Notice::banner(Severity::Info, "hi")]);
        let mapped = outcome.map(|v| v * 10);
        assert_eq!(mapped.value(), Some(&20));
        assert_eq!(mapped.notices().len(), 1);
    }

    #[test]
    fn notice_display_includes_severity() {
        let notice = Notice::info(NoticeKind::InsufficientColumns, "need two columns");
        assert_eq!(notice.to_string(), "[INFO] need two columns");
    }
}
