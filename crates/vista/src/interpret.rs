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

//! Plain-language readings of distributions, box plots and scatter pairs.

use crate::dataset::Column;
use crate::error::{Notice, Severity};
use crate::stats::{self, BoxSummary, StatValue};
use serde::{Deserialize, Serialize};
use std::fmt;

const SKEW_THRESHOLD: f64 = 0.5;
const WEAK_BELOW: f64 = 0.3;
const STRONG_ABOVE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewClass {
    Symmetric,
    RightSkewed,
    LeftSkewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorrelationStrength::Weak => "weak",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Strong => "strong",
        })
    }
}

impl fmt::Display for CorrelationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorrelationDirection::Positive => "positive",
            CorrelationDirection::Negative => "negative",
            CorrelationDirection::None => "no",
        })
    }
}

pub fn classify_skew(skewness: f64) -> SkewClass {
    if skewness.abs() < SKEW_THRESHOLD {
        SkewClass::Symmetric
    } else if skewness > 0.0 {
        SkewClass::RightSkewed
    } else {
        SkewClass::LeftSkewed
    }
}

pub fn classify_correlation(r: f64) -> (CorrelationStrength, CorrelationDirection) {
    let magnitude = r.abs();
    let strength = if magnitude < WEAK_BELOW {
        CorrelationStrength::Weak
    } else if magnitude <= STRONG_ABOVE {
        CorrelationStrength::Moderate
    } else {
        CorrelationStrength::Strong
    };
    let direction = if r > 0.0 {
        CorrelationDirection::Positive
    } else if r < 0.0 {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    };
    (strength, direction)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    Skew {
        skewness: f64,
        kurtosis: StatValue,
        class: SkewClass,
    },
    BoxPlot {
        summary: BoxSummary,
    },
    Correlation {
        r: f64,
        strength: CorrelationStrength,
        direction: CorrelationDirection,
    },
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpretation {
    pub finding: Finding,
    /// Messages for the host to display, in order.
    pub banners: Vec<Notice>,
}
impl Interpretation {
    fn unavailable(message: &str) -> Self {
        Self {
            finding: Finding::Unavailable,
            banners: vec![Notice::banner(Severity::Info, message)],
        }
    }
}

pub fn interpret_distribution(column: &Column) -> Interpretation {
    let values = column.numeric_values();
    if values.is_empty() {
        return Interpretation::unavailable(
            "Distribution not computable (non-numeric or empty column)",
        );
    }
    let Some(skewness) = stats::skewness(&values) else {
        return Interpretation::unavailable(
            "Skewness not computable (fewer than 3 values or no spread)",
        );
    };
    let class = classify_skew(skewness);
    let banner = match class {
        SkewClass::Symmetric => Notice::banner(Severity::Success, "Symmetric distribution"),
        SkewClass::RightSkewed => {
            Notice::banner(Severity::Warning, "Right-skewed distribution (positive tail)")
        }
        SkewClass::LeftSkewed => {
            Notice::banner(Severity::Warning, "Left-skewed distribution (negative tail)")
        }
    };
    Interpretation {
        finding: Finding::Skew {
            skewness,
            kurtosis: StatValue::from_option(stats::kurtosis(&values)),
            class,
        },
        banners: vec![banner],
    }
}

/// `None` for non-numeric or empty columns.
pub fn interpret_box(column: &Column) -> Option<Interpretation> {
    let summary = stats::box_summary(&column.numeric_values())?;
    let mut banners = vec![Notice::banner(
        Severity::Info,
        format!(
            "50% of values lie between {:.2} and {:.2}",
            summary.q1, summary.q3
        ),
    )];
    if summary.outliers > 0 {
        banners.push(Notice::banner(
            Severity::Warning,
            format!("{} outliers detected", summary.outliers),
        ));
    }
    Some(Interpretation {
        finding: Finding::BoxPlot { summary },
        banners,
    })
}

/// Pearson reading of two numeric columns over their complete pairs.
pub fn interpret_scatter(x: &Column, y: &Column) -> Option<Interpretation> {
    let pairs = stats::complete_pairs(x.as_numeric()?, y.as_numeric()?);
    if pairs.len() < 2 {
        return None;
    }
    let Some(r) = stats::pearson(&pairs).as_f64() else {
        return Some(Interpretation::unavailable(
            "Correlation not computable (one of the columns is constant)",
        ));
    };
    let (strength, direction) = classify_correlation(r);
    let mut label = format!("{strength} {direction} correlation");
    if let Some(first) = label.get(0..1) {
        label = first.to_uppercase() + &label[1..];
    }
    Some(Interpretation {
        finding: Finding::Correlation {
            r,
            strength,
            direction,
        },
        banners: vec![Notice::banner(
            Severity::Success,
            format!("{label} (r = {r:.3})"),
        )],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_boundaries() {
        assert_eq!(classify_skew(0.0), SkewClass::Symmetric);
        assert_eq!(classify_skew(0.49), SkewClass::Symmetric);
        assert_eq!(classify_skew(0.5), SkewClass::RightSkewed);
        assert_eq!(classify_skew(-0.5), SkewClass::LeftSkewed);
    }

    #[test]
    fn correlation_boundaries() {
        assert_eq!(classify_correlation(0.29).0, CorrelationStrength::Weak);
        assert_eq!(classify_correlation(0.3).0, CorrelationStrength::Moderate);
        assert_eq!(classify_correlation(-0.7).0, CorrelationStrength::Moderate);
        assert_eq!(classify_correlation(0.71).0, CorrelationStrength::Strong);
        assert_eq!(classify_correlation(0.0).1, CorrelationDirection::None);
        assert_eq!(classify_correlation(-0.2).1, CorrelationDirection::Negative);
    }

    #[test]
    fn right_skewed_column_warns() {
        let column = Column::from_values("v", [1.0, 2.0, 3.0, 4.0, 100.0]);
        let reading = interpret_distribution(&column);
        assert!(matches!(
            reading.finding,
            Finding::Skew {
                class: SkewClass::RightSkewed,
                ..
            }
        ));
        assert_eq!(reading.banners[0].severity, Severity::Warning);
    }

    #[test]
    fn text_column_is_unavailable() {
        let column = Column::categorical("c", [Some("a"), Some("b")]);
        assert_eq!(interpret_distribution(&column).finding, Finding::Unavailable);
        assert!(interpret_box(&column).is_none());
    }

    #[test]
    fn box_reports_outliers() {
        let column = Column::from_values("v", [1.0, 2.0, 3.0, 4.0, 100.0]);
        let reading = interpret_box(&column).expect("numeric");
        assert_eq!(reading.banners.len(), 2);
        assert_eq!(reading.banners[1].message, "1 outliers detected");
    }

    #[test]
    fn scatter_reading_names_strength_and_direction() {
        let x = Column::from_values("x", [1.0, 2.0, 3.0, 4.0]);
        let y = Column::from_values("y", [8.0, 6.0, 4.0, 2.0]);
        let reading = interpret_scatter(&x, &y).expect("pairs");
        assert_eq!(reading.banners[0].message, "Strong negative correlation (r = -1.000)");
    }
}
