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

//! Chart request validation and spec construction.
//!
//! [`ChartDispatcher::dispatch`] checks a [`ChartRequest`] against the
//! dataset, shapes the data subset the host needs to draw it, and stamps the
//! result with a key drawn from a shared [`KeySequence`]. Rejected requests
//! come back as a notice and never consume a key.

use crate::config::ChartConfig;
use crate::dataset::{Cell, Column, Dataset, SemanticType};
use crate::error::{Notice, NoticeKind, Outcome, Severity};
use crate::interpret::{self, Interpretation};
use crate::stats::{self, CorrelationMethod, StatValue, StatsSummarizer};
use crate::style::{ChartStyle, DisplayMode};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;
use tracing::{debug, warn};

/// Session-scoped source of chart key suffixes.
#[derive(Debug, Default)]
pub struct KeySequence {
    counter: AtomicU64,
}
impl KeySequence {
    pub fn new() -> Self {
        Self::default()
    }
    /// Increments and returns the new value in one atomic step.
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, atomic::Ordering::Relaxed) + 1
    }
    pub fn current(&self) -> u64 {
        self.counter.load(atomic::Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Distribution,
    Box,
    Violin,
    Density,
    Bar,
    Pie,
    Donut,
    Scatter,
    CorrelationHeatmap,
    PairMatrix,
    ParallelCoordinates,
    Radar,
    Gauge,
    Waterfall,
    LineEvolution,
}
impl ChartKind {
    pub const ALL: [ChartKind; 15] = [
        ChartKind::Distribution,
        ChartKind::Box,
        ChartKind::Violin,
        ChartKind::Density,
        ChartKind::Bar,
        ChartKind::Pie,
        ChartKind::Donut,
        ChartKind::Scatter,
        ChartKind::CorrelationHeatmap,
        ChartKind::PairMatrix,
        ChartKind::ParallelCoordinates,
        ChartKind::Radar,
        ChartKind::Gauge,
        ChartKind::Waterfall,
        ChartKind::LineEvolution,
    ];
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Distribution => "distribution",
            ChartKind::Box => "box",
            ChartKind::Violin => "violin",
            ChartKind::Density => "density",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Donut => "donut",
            ChartKind::Scatter => "scatter",
            ChartKind::CorrelationHeatmap => "correlation_heatmap",
            ChartKind::PairMatrix => "pair_matrix",
            ChartKind::ParallelCoordinates => "parallel_coordinates",
            ChartKind::Radar => "radar",
            ChartKind::Gauge => "gauge",
            ChartKind::Waterfall => "waterfall",
            ChartKind::LineEvolution => "line_evolution",
        }
    }
}
impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub label: String,
    pub value: f64,
}
impl WaterfallStep {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// What the user picked for one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSelection {
    Distribution {
        column: String,
    },
    Box {
        column: String,
        by: Option<String>,
    },
    Violin {
        column: String,
        by: Option<String>,
    },
    Density {
        column: String,
    },
    Bar {
        column: String,
    },
    Pie {
        column: String,
    },
    Donut {
        column: String,
    },
    Scatter {
        x: String,
        y: String,
        color: Option<String>,
        size: Option<String>,
    },
    CorrelationHeatmap,
    PairMatrix,
    ParallelCoordinates,
    Radar {
        columns: Vec<String>,
    },
    Gauge {
        value: f64,
        label: String,
    },
    Waterfall {
        steps: Vec<WaterfallStep>,
    },
    LineEvolution {
        x: String,
        y: String,
    },
}
impl ChartSelection {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSelection::Distribution { .. } => ChartKind::Distribution,
            ChartSelection::Box { .. } => ChartKind::Box,
            ChartSelection::Violin { .. } => ChartKind::Violin,
            ChartSelection::Density { .. } => ChartKind::Density,
            ChartSelection::Bar { .. } => ChartKind::Bar,
            ChartSelection::Pie { .. } => ChartKind::Pie,
            ChartSelection::Donut { .. } => ChartKind::Donut,
            ChartSelection::Scatter { .. } => ChartKind::Scatter,
            ChartSelection::CorrelationHeatmap => ChartKind::CorrelationHeatmap,
            ChartSelection::PairMatrix => ChartKind::PairMatrix,
            ChartSelection::ParallelCoordinates => ChartKind::ParallelCoordinates,
            ChartSelection::Radar { .. } => ChartKind::Radar,
            ChartSelection::Gauge { .. } => ChartKind::Gauge,
            ChartSelection::Waterfall { .. } => ChartKind::Waterfall,
            ChartSelection::LineEvolution { .. } => ChartKind::LineEvolution,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub selection: ChartSelection,
    pub display_mode: DisplayMode,
}
impl ChartRequest {
    pub fn new(selection: ChartSelection, display_mode: DisplayMode) -> Self {
        Self {
            selection,
            display_mode,
        }
    }
    pub fn kind(&self) -> ChartKind {
        self.selection.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Relative,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub name: String,
    pub values: Vec<f64>,
}

/// Data subset handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartData {
    Series {
        values: Vec<Cell>,
    },
    RawValues {
        values: Vec<f64>,
    },
    Curve {
        x: Vec<f64>,
        y: Vec<f64>,
    },
    Counts {
        labels: Vec<String>,
        counts: Vec<usize>,
    },
    Table {
        columns: IndexMap<String, Vec<Cell>>,
    },
    Matrix {
        labels: Vec<String>,
        values: Vec<Vec<StatValue>>,
    },
    Polar {
        axes: Vec<String>,
        profiles: Vec<Profile>,
    },
    Indicator {
        value: f64,
        reference: f64,
        range: [f64; 2],
    },
    Waterfall {
        labels: Vec<String>,
        values: Vec<f64>,
        measures: Vec<Measure>,
    },
}

/// Channel mapping and trace options; unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Encoding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hover: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histnorm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_outline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub data: ChartData,
    pub encoding: Encoding,
    pub style: ChartStyle,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOutput {
    pub spec: ChartSpec,
    pub interpretation: Option<Interpretation>,
}

/// Height class, resolved against [`ChartConfig`].
#[derive(Debug, Clone, Copy)]
enum Height {
    Standard,
    Compact,
    Matrix,
    Auto,
}

/// A validated request before it is given a key.
struct Shaped {
    title: String,
    data: ChartData,
    encoding: Encoding,
    height: Height,
    key_parts: Vec<String>,
    interpretation: Option<Interpretation>,
    notices: Vec<Notice>,
}
impl Shaped {
    fn new(title: String, data: ChartData, encoding: Encoding, height: Height) -> Self {
        Self {
            title,
            data,
            encoding,
            height,
            key_parts: Vec::new(),
            interpretation: None,
            notices: Vec::new(),
        }
    }
    fn keyed<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_parts = parts.into_iter().map(Into::into).collect();
        self
    }
    fn interpreted(mut self, interpretation: Option<Interpretation>) -> Self {
        self.interpretation = interpretation;
        self
    }
    fn noted(mut self, notices: Vec<Notice>) -> Self {
        self.notices.extend(notices);
        self
    }
}

type Shaping = std::result::Result<Shaped, Notice>;

fn lookup<'a>(dataset: &'a Dataset, name: &str) -> std::result::Result<&'a Column, Notice> {
    dataset.column(name).ok_or_else(|| Notice::missing_column(name))
}

fn or_none(name: Option<&str>) -> String {
    name.unwrap_or("none").to_string()
}

fn cell_cmp(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Cell::Number(x), Cell::Number(y)) => x.total_cmp(y),
        (Cell::Timestamp(x), Cell::Timestamp(y)) => x.cmp(y),
        (Cell::Text(x), Cell::Text(y)) => x.cmp(y),
        (Cell::Null, Cell::Null) => Ordering::Equal,
        (Cell::Null, _) => Ordering::Greater,
        (_, Cell::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Gaussian kernel density on an evenly spaced grid, Scott bandwidth.
/// `None` when the values have no spread.
pub fn gaussian_kde(values: &[f64], points: usize) -> Option<(Vec<f64>, Vec<f64>)> {
    let sd = stats::std_dev(values)?;
    if sd <= 0.0 || points < 2 {
        return None;
    }
    let n = values.len() as f64;
    let bandwidth = sd * n.powf(-0.2);
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let step = (hi - lo) / (points - 1) as f64;
    let grid: Vec<f64> = (0..points).map(|i| lo + step * i as f64).collect();
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let density = grid
        .par_iter()
        .map(|x| {
            values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect();
    Some((grid, density))
}

pub struct ChartDispatcher {
    config: ChartConfig,
    keys: Arc<KeySequence>,
}
impl ChartDispatcher {
    pub fn new(keys: Arc<KeySequence>) -> Self {
        Self::with_config(ChartConfig::default(), keys)
    }
    pub fn with_config(config: ChartConfig, keys: Arc<KeySequence>) -> Self {
        Self { config, keys }
    }
    pub fn config(&self) -> &ChartConfig {
        &self.config
    }
    pub fn keys(&self) -> &Arc<KeySequence> {
        &self.keys
    }

    /// Validates the request and builds its spec. Only accepted requests
    /// draw a key from the sequence.
    pub fn dispatch(&self, dataset: &Dataset, request: &ChartRequest) -> Outcome<ChartOutput> {
        let kind = request.kind();
        let shaped = match self.shape(dataset, &request.selection, request.display_mode) {
            Ok(shaped) => shaped,
            Err(notice) => {
                debug!("Rejected {} chart: {}", kind, notice.message);
                return Outcome::not_computable(notice);
            }
        };
        let mut key_base = vec![kind.as_str().to_string()];
        key_base.extend(shaped.key_parts);
        let key = format!("{}_{}", key_base.join("_"), self.keys.next());
        let height = match shaped.height {
            Height::Standard => Some(self.config.chart_height),
            Height::Compact => Some(self.config.compact_height),
            Height::Matrix => Some(self.config.matrix_height),
            Height::Auto => None,
        };
        let spec = ChartSpec {
            kind,
            title: shaped.title,
            data: shaped.data,
            encoding: shaped.encoding,
            style: ChartStyle::new(request.display_mode, height),
            key,
        };
        Outcome::with_notices(
            ChartOutput {
                spec,
                interpretation: shaped.interpretation,
            },
            shaped.notices,
        )
    }

    fn shape(&self, dataset: &Dataset, selection: &ChartSelection, mode: DisplayMode) -> Shaping {
        match selection {
            ChartSelection::Distribution { column } => self.distribution(dataset, column, mode),
            ChartSelection::Box { column, by } => {
                self.spread(dataset, ChartKind::Box, column, by.as_deref())
            }
            ChartSelection::Violin { column, by } => {
                self.spread(dataset, ChartKind::Violin, column, by.as_deref())
            }
            ChartSelection::Density { column } => self.density(dataset, column),
            ChartSelection::Bar { column } => self.counts(dataset, ChartKind::Bar, column, mode),
            ChartSelection::Pie { column } => self.counts(dataset, ChartKind::Pie, column, mode),
            ChartSelection::Donut { column } => self.counts(dataset, ChartKind::Donut, column, mode),
            ChartSelection::Scatter { x, y, color, size } => {
                self.scatter(dataset, x, y, color.as_deref(), size.as_deref(), mode)
            }
            ChartSelection::CorrelationHeatmap => self.heatmap(dataset),
            ChartSelection::PairMatrix => self.pair_matrix(dataset),
            ChartSelection::ParallelCoordinates => self.parallel(dataset),
            ChartSelection::Radar { columns } => self.radar(dataset, columns),
            ChartSelection::Gauge { value, label } => self.gauge(*value, label, mode),
            ChartSelection::Waterfall { steps } => self.waterfall(steps),
            ChartSelection::LineEvolution { x, y } => self.line(dataset, x, y),
        }
    }

    fn distribution(&self, dataset: &Dataset, name: &str, mode: DisplayMode) -> Shaping {
        let column = lookup(dataset, name)?;
        let values: Vec<Cell> = (0..column.len())
            .map(|i| column.cell(i))
            .filter(|c| !c.is_null())
            .collect();
        if values.is_empty() {
            return Err(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                format!("No valid data in column '{name}'"),
            ));
        }
        let encoding = Encoding {
            x: Some(name.to_string()),
            bins: Some(self.config.histogram_bins),
            histnorm: Some("probability density".to_string()),
            marginal: Some("violin".to_string()),
            opacity: Some(0.7),
            accent: Some(mode.palette().accent.to_string()),
            ..Default::default()
        };
        Ok(Shaped::new(
            format!("Distribution of {name}"),
            ChartData::Series { values },
            encoding,
            Height::Standard,
        )
        .keyed([name])
        .interpreted(Some(interpret::interpret_distribution(column))))
    }

    fn spread(&self, dataset: &Dataset, kind: ChartKind, name: &str, by: Option<&str>) -> Shaping {
        let column = lookup(dataset, name)?;
        let mut notices = Vec::new();
        let group = match by {
            Some(group) => match dataset.column(group) {
                Some(c) => Some(c),
                None => {
                    notices.push(Notice::warning(
                        NoticeKind::MissingColumn,
                        format!("Grouping column '{group}' not found, showing ungrouped chart"),
                    ));
                    None
                }
            },
            None => None,
        };
        let group_name = group.map(Column::name);
        let mut columns: IndexMap<String, Vec<Cell>> = IndexMap::new();
        columns.insert(name.to_string(), (0..column.len()).map(|i| column.cell(i)).collect());
        if let Some(g) = group {
            columns.insert(g.name().to_string(), (0..g.len()).map(|i| g.cell(i)).collect());
        }
        let label = if kind == ChartKind::Box { "Box plot" } else { "Violin plot" };
        let title = match group_name {
            Some(g) => format!("{label} of {name} by {g}"),
            None => format!("{label} of {name}"),
        };
        let encoding = Encoding {
            x: group_name.map(str::to_string),
            y: Some(name.to_string()),
            color: group_name.map(str::to_string),
            points: Some(if kind == ChartKind::Box { "outliers" } else { "all" }.to_string()),
            ..Default::default()
        };
        let interpretation = if kind == ChartKind::Box {
            interpret::interpret_box(column)
        } else {
            None
        };
        Ok(
            Shaped::new(title, ChartData::Table { columns }, encoding, Height::Standard)
                .keyed([name.to_string(), or_none(group_name)])
                .interpreted(interpretation)
                .noted(notices),
        )
    }

    fn density(&self, dataset: &Dataset, name: &str) -> Shaping {
        let column = lookup(dataset, name)?;
        let unavailable = || {
            Notice::info(
                NoticeKind::NonNumericInput,
                "Density is only available for numeric columns",
            )
        };
        if !column.semantic_type().is_numeric() {
            return Err(unavailable());
        }
        let values = column.numeric_values();
        if values.is_empty() {
            return Err(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                format!("Column '{name}' has no values to estimate a density from"),
            ));
        }
        let title = format!("Density of {name}");
        let encoding = Encoding {
            x: Some(name.to_string()),
            ..Default::default()
        };
        let shaped = match gaussian_kde(&values, self.config.density_points) {
            Some((x, y)) => Shaped::new(title, ChartData::Curve { x, y }, encoding, Height::Compact),
            None => {
                warn!("Column '{}' has no spread, density falls back to raw values", name);
                Shaped::new(title, ChartData::RawValues { values }, encoding, Height::Compact)
                    .noted(vec![Notice::banner(
                        Severity::Warning,
                        format!("Column '{name}' has no spread, showing raw values instead of a density"),
                    )])
            }
        };
        Ok(shaped.keyed([name]))
    }

    fn counts(&self, dataset: &Dataset, kind: ChartKind, name: &str, mode: DisplayMode) -> Shaping {
        let column = lookup(dataset, name)?;
        let top_n = if kind == ChartKind::Bar {
            self.config.bar_top_n
        } else {
            usize::MAX
        };
        let table = stats::frequency_table(column, top_n);
        let (labels, counts): (Vec<String>, Vec<usize>) = table
            .entries
            .into_iter()
            .map(|e| (e.value, e.count))
            .unzip();
        let data = ChartData::Counts { labels, counts };
        let shaped = match kind {
            ChartKind::Bar => Shaped::new(
                format!("Top {} of {name}", self.config.bar_top_n),
                data,
                Encoding {
                    x: Some(name.to_string()),
                    y: Some("Frequency".to_string()),
                    color_scale: Some(mode.palette().sequential_scale.to_string()),
                    ..Default::default()
                },
                Height::Standard,
            ),
            ChartKind::Donut => Shaped::new(
                format!("Breakdown of {name}"),
                data,
                Encoding {
                    hole: Some(0.4),
                    text_info: Some("percent+label".to_string()),
                    ..Default::default()
                },
                Height::Auto,
            ),
            _ => Shaped::new(
                format!("Breakdown of {name}"),
                data,
                Encoding::default(),
                Height::Auto,
            ),
        };
        Ok(shaped.keyed([name]))
    }

    fn scatter(
        &self,
        dataset: &Dataset,
        x: &str,
        y: &str,
        color: Option<&str>,
        size: Option<&str>,
        mode: DisplayMode,
    ) -> Shaping {
        let x_col = lookup(dataset, x)?;
        let y_col = lookup(dataset, y)?;
        let color_col = color.and_then(|c| {
            let found = dataset.column(c);
            if found.is_none() {
                debug!("Scatter color column '{}' not found, dropped", c);
            }
            found
        });
        let size_col = size.and_then(|s| match dataset.column(s) {
            Some(c) if c.semantic_type().is_numeric() => Some(c),
            Some(_) => {
                debug!("Scatter size column '{}' is not numeric, dropped", s);
                None
            }
            None => {
                debug!("Scatter size column '{}' not found, dropped", s);
                None
            }
        });
        let cells = |c: &Column| (0..c.len()).map(|i| c.cell(i)).collect::<Vec<_>>();
        let mut columns: IndexMap<String, Vec<Cell>> = IndexMap::new();
        columns.insert(x.to_string(), cells(x_col));
        columns.insert(y.to_string(), cells(y_col));
        if let Some(c) = color_col {
            columns.insert(c.name().to_string(), cells(c));
        }
        let mut hover = vec![x.to_string(), y.to_string()];
        hover.extend(color_col.map(|c| c.name().to_string()));
        hover.extend(size_col.map(|c| c.name().to_string()));
        let size_channel = size_col.map(|c| {
            columns.insert("marker_size".to_string(), self.marker_sizes(c));
            "marker_size".to_string()
        });
        let encoding = Encoding {
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            color: color_col.map(|c| c.name().to_string()),
            size: size_channel,
            hover,
            opacity: Some(0.7),
            marker_outline: Some(mode.palette().marker_outline.to_string()),
            ..Default::default()
        };
        let interpretation = interpret::interpret_scatter(x_col, y_col);
        Ok(Shaped::new(
            format!("{y} vs {x}"),
            ChartData::Table { columns },
            encoding,
            Height::Standard,
        )
        .keyed([
            x.to_string(),
            y.to_string(),
            or_none(color_col.map(Column::name)),
            or_none(size_col.map(Column::name)),
        ])
        .interpreted(interpretation))
    }

    /// Nulls take the column mean, everything is clipped below at 1; an
    /// all-null column gets the default marker size.
    fn marker_sizes(&self, column: &Column) -> Vec<Cell> {
        let values = column.as_numeric().unwrap_or_default();
        let fill = stats::mean(&column.numeric_values());
        values
            .iter()
            .map(|v| match (v, fill) {
                (_, None) => Cell::Number(self.config.default_marker_size),
                (Some(v), Some(_)) => Cell::Number(v.max(1.0)),
                (None, Some(m)) => Cell::Number(m.max(1.0)),
            })
            .collect()
    }

    fn numeric_table(dataset: &Dataset) -> (Vec<String>, IndexMap<String, Vec<Cell>>) {
        let numeric = dataset.numeric_columns();
        let names: Vec<String> = numeric.iter().map(|c| c.name().to_string()).collect();
        let columns = numeric
            .iter()
            .map(|c| (c.name().to_string(), (0..c.len()).map(|i| c.cell(i)).collect()))
            .collect();
        (names, columns)
    }

    fn require_numeric(dataset: &Dataset, minimum: usize, chart: &str) -> std::result::Result<(), Notice> {
        let found = dataset.numeric_columns().len();
        if found < minimum {
            return Err(Notice::info(
                NoticeKind::InsufficientColumns,
                format!("Not enough numeric columns for {chart} (at least {minimum} required, found {found})"),
            ));
        }
        Ok(())
    }

    fn heatmap(&self, dataset: &Dataset) -> Shaping {
        Self::require_numeric(dataset, 2, "the correlation heatmap")?;
        let matrix = match StatsSummarizer::new().correlation(dataset, CorrelationMethod::Pearson) {
            Outcome::Computed { value, .. } => value,
            Outcome::NotComputable { notice } => return Err(notice),
        };
        let encoding = Encoding {
            color_scale: Some("RdBu_r".to_string()),
            text_format: Some(".2f".to_string()),
            ..Default::default()
        };
        Ok(Shaped::new(
            "Correlation matrix".to_string(),
            ChartData::Matrix {
                labels: matrix.columns,
                values: matrix.values,
            },
            encoding,
            Height::Standard,
        ))
    }

    fn pair_matrix(&self, dataset: &Dataset) -> Shaping {
        Self::require_numeric(dataset, 2, "the pairwise matrix")?;
        let (names, columns) = Self::numeric_table(dataset);
        let encoding = Encoding {
            color: names.first().cloned(),
            dimensions: names,
            ..Default::default()
        };
        Ok(Shaped::new(
            "Pairplot of numeric variables".to_string(),
            ChartData::Table { columns },
            encoding,
            Height::Matrix,
        ))
    }

    fn parallel(&self, dataset: &Dataset) -> Shaping {
        Self::require_numeric(
            dataset,
            self.config.parallel_min_columns,
            "parallel coordinates",
        )?;
        let (names, columns) = Self::numeric_table(dataset);
        let encoding = Encoding {
            color: names.first().cloned(),
            dimensions: names,
            ..Default::default()
        };
        Ok(Shaped::new(
            "Parallel coordinates".to_string(),
            ChartData::Table { columns },
            encoding,
            Height::Auto,
        ))
    }

    fn radar(&self, dataset: &Dataset, selected: &[String]) -> Shaping {
        let (min, max) = (self.config.radar_min_columns, self.config.radar_max_columns);
        if selected.len() < min {
            return Err(Notice::warning(
                NoticeKind::InsufficientColumns,
                format!(
                    "Radar chart: minimum {min} required criteria, {} selected",
                    selected.len()
                ),
            ));
        }
        if selected.len() > max {
            return Err(Notice::warning(
                NoticeKind::OutOfRangeSelection,
                format!(
                    "Radar chart: maximum {max} criteria for readability, {} selected",
                    selected.len()
                ),
            ));
        }
        let mut axes = Vec::with_capacity(selected.len());
        for name in selected {
            let column = lookup(dataset, name)?;
            let values = column.as_numeric().ok_or_else(|| {
                Notice::warning(
                    NoticeKind::NonNumericInput,
                    format!("Radar criterion '{name}' is not numeric"),
                )
            })?;
            axes.push(values);
        }
        let profiles: Vec<Profile> = (0..dataset.row_count())
            .filter_map(|row| axes.iter().map(|a| a[row]).collect::<Option<Vec<f64>>>())
            .take(self.config.radar_profiles)
            .enumerate()
            .map(|(i, values)| Profile {
                name: format!("Profile {}", i + 1),
                values,
            })
            .collect();
        if profiles.is_empty() {
            return Err(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                "Radar chart: no row has a value for every selected criterion",
            ));
        }
        Ok(Shaped::new(
            "Radar chart - profile comparison".to_string(),
            ChartData::Polar {
                axes: selected.to_vec(),
                profiles,
            },
            Encoding::default(),
            Height::Auto,
        )
        .keyed(selected.iter().cloned()))
    }

    fn gauge(&self, value: f64, label: &str, mode: DisplayMode) -> Shaping {
        if value.is_nan() {
            return Err(Notice::warning(
                NoticeKind::OutOfRangeSelection,
                "Gauge value must be a number",
            ));
        }
        let (lo, hi) = (self.config.gauge_min, self.config.gauge_max);
        let clamped = value.max(lo).min(hi);
        let mut notices = Vec::new();
        if clamped != value {
            warn!("Gauge value {} clamped to {}", value, clamped);
            notices.push(Notice::warning(
                NoticeKind::OutOfRangeSelection,
                format!("Gauge value {value} is outside [{lo}, {hi}] and was clamped to {clamped}"),
            ));
        }
        Ok(Shaped::new(
            label.to_string(),
            ChartData::Indicator {
                value: clamped,
                reference: hi,
                range: [lo, hi],
            },
            Encoding {
                accent: Some(mode.palette().gauge_bar.to_string()),
                ..Default::default()
            },
            Height::Compact,
        )
        .noted(notices))
    }

    fn waterfall(&self, steps: &[WaterfallStep]) -> Shaping {
        let Some((total, deltas)) = steps.split_last() else {
            return Err(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                "Waterfall needs at least one step",
            ));
        };
        if steps.iter().any(|s| !s.value.is_finite()) {
            return Err(Notice::warning(
                NoticeKind::OutOfRangeSelection,
                "Waterfall values must be finite numbers",
            ));
        }
        let sum: f64 = deltas.iter().map(|s| s.value).sum();
        let tolerance = 1e-9 * sum.abs().max(total.value.abs()).max(1.0);
        if (sum - total.value).abs() > tolerance {
            return Err(Notice::warning(
                NoticeKind::OutOfRangeSelection,
                format!(
                    "Waterfall total {} does not match the sum of contributions {}",
                    total.value, sum
                ),
            ));
        }
        let mut measures = vec![Measure::Relative; deltas.len()];
        measures.push(Measure::Total);
        Ok(Shaped::new(
            "Waterfall - contribution".to_string(),
            ChartData::Waterfall {
                labels: steps.iter().map(|s| s.label.clone()).collect(),
                values: steps.iter().map(|s| s.value).collect(),
                measures,
            },
            Encoding::default(),
            Height::Auto,
        ))
    }

    fn line(&self, dataset: &Dataset, x: &str, y: &str) -> Shaping {
        let (Some(x_col), Some(y_col)) = (dataset.column(x), dataset.column(y)) else {
            return Err(Notice::warning(
                NoticeKind::MissingColumn,
                format!("Invalid selection for the evolution chart: '{x}' and '{y}' must both exist"),
            ));
        };
        if y_col.semantic_type() != SemanticType::Numeric {
            return Err(Notice::info(
                NoticeKind::NonNumericInput,
                format!("Column '{y}' must be numeric for the evolution chart"),
            ));
        }
        let mut rows: Vec<(Cell, Cell)> = (0..dataset.row_count())
            .map(|i| (x_col.cell(i), y_col.cell(i)))
            .filter(|(a, b)| !a.is_null() && !b.is_null())
            .collect();
        if rows.is_empty() {
            return Err(Notice::info(
                NoticeKind::EmptyAfterFiltering,
                "No data available for the evolution chart",
            ));
        }
        // text orderings (months, stages) are ordinal in row order
        if matches!(
            x_col.semantic_type(),
            SemanticType::Numeric | SemanticType::Datetime
        ) {
            rows.sort_by(|a, b| cell_cmp(&a.0, &b.0));
        }
        let (xs, ys): (Vec<Cell>, Vec<Cell>) = rows.into_iter().unzip();
        let mut columns = IndexMap::new();
        columns.insert(x.to_string(), xs);
        columns.insert(y.to_string(), ys);
        Ok(Shaped::new(
            format!("Evolution of {y} by {x}"),
            ChartData::Table { columns },
            Encoding {
                x: Some(x.to_string()),
                y: Some(y.to_string()),
                ..Default::default()
            },
            Height::Auto,
        )
        .keyed([x, y]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::from_values("a", [1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::from_values("b", [2.0, 4.0, 6.0, 8.0, 10.0]),
            Column::numeric("c", [Some(5.0), None, Some(1.0), Some(3.0), Some(2.0)]),
            Column::categorical("g", [Some("x"), Some("y"), Some("x"), None, Some("x")]),
        ])
        .expect("dataset")
    }

    fn dispatcher() -> ChartDispatcher {
        ChartDispatcher::new(Arc::new(KeySequence::new()))
    }

    fn request(selection: ChartSelection) -> ChartRequest {
        ChartRequest::new(selection, DisplayMode::Light)
    }

    #[test]
    fn key_sequence_increments_atomically() {
        let keys = KeySequence::new();
        assert_eq!(keys.next(), 1);
        assert_eq!(keys.next(), 2);
        assert_eq!(keys.current(), 2);
    }

    #[test]
    fn rejected_requests_do_not_consume_keys() {
        let d = dispatcher();
        let ds = dataset();
        let out = d.dispatch(&ds, &request(ChartSelection::Bar { column: "zzz".into() }));
        assert!(!out.is_computed());
        assert_eq!(d.keys().current(), 0);
        let out = d.dispatch(&ds, &request(ChartSelection::Bar { column: "g".into() }));
        assert_eq!(out.value().map(|o| o.spec.key.as_str()), Some("bar_g_1"));
    }

    #[test]
    fn box_key_records_missing_grouping() {
        let d = dispatcher();
        let out = d.dispatch(
            &dataset(),
            &request(ChartSelection::Box {
                column: "a".into(),
                by: Some("nope".into()),
            }),
        );
        let output = out.value().expect("degraded chart");
        assert_eq!(output.spec.key, "box_a_none_1");
        assert_eq!(out.notices().len(), 1);
        assert!(out.notices()[0].is(NoticeKind::MissingColumn));
        assert!(output.interpretation.is_some());
    }

    #[test]
    fn marker_sizes_fill_and_clip() {
        let d = dispatcher();
        let ds = Dataset::new(vec![
            Column::from_values("x", [1.0, 2.0, 3.0]),
            Column::from_values("y", [1.0, 2.0, 3.0]),
            Column::numeric("s", [Some(0.2), None, Some(5.0)]),
        ])
        .expect("dataset");
        let out = d.dispatch(
            &ds,
            &request(ChartSelection::Scatter {
                x: "x".into(),
                y: "y".into(),
                color: None,
                size: Some("s".into()),
            }),
        );
        let spec = &out.value().expect("scatter").spec;
        let ChartData::Table { columns } = &spec.data else {
            panic!("expected table data");
        };
        let sizes: Vec<f64> = columns["marker_size"].iter().filter_map(Cell::as_f64).collect();
        assert_eq!(sizes, vec![1.0, 2.6, 5.0]);
    }

    #[test]
    fn all_null_size_uses_default_marker() {
        let column = Column::numeric("s", [None, None]);
        let sizes = dispatcher().marker_sizes(&column);
        assert_eq!(sizes, vec![Cell::Number(10.0), Cell::Number(10.0)]);
    }

    #[test]
    fn kde_integrates_to_roughly_one() {
        let values: Vec<f64> = (0..200).map(f64::from).collect();
        let (x, y) = gaussian_kde(&values, 500).expect("spread");
        let step = x[1] - x[0];
        let area: f64 = y.iter().sum::<f64>() * step;
        // the grid stops at the data range, so a little mass is cut off
        assert!(area > 0.85 && area < 1.0, "area {area}");
        assert!(gaussian_kde(&[2.0, 2.0, 2.0], 500).is_none());
    }

    #[test]
    fn constant_density_falls_back_to_raw_values() {
        let ds = Dataset::new(vec![Column::from_values("k", [3.0, 3.0, 3.0])]).expect("dataset");
        let out = dispatcher().dispatch(&ds, &request(ChartSelection::Density { column: "k".into() }));
        let output = out.value().expect("fallback");
        assert!(matches!(output.spec.data, ChartData::RawValues { .. }));
        assert_eq!(out.notices()[0].severity, Severity::Warning);
        assert_eq!(output.spec.style.height, Some(500));
    }

    #[test]
    fn line_evolution_sorts_and_drops_nulls() {
        let ds = dataset();
        let out = dispatcher().dispatch(
            &ds,
            &request(ChartSelection::LineEvolution {
                x: "c".into(),
                y: "a".into(),
            }),
        );
        let spec = &out.value().expect("line").spec;
        let ChartData::Table { columns } = &spec.data else {
            panic!("expected table data");
        };
        let xs: Vec<f64> = columns["c"].iter().filter_map(Cell::as_f64).collect();
        let ys: Vec<f64> = columns["a"].iter().filter_map(Cell::as_f64).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0, 5.0]);
        assert_eq!(ys, vec![3.0, 5.0, 4.0, 1.0]);
    }

    #[test]
    fn line_evolution_keeps_row_order_for_text_axes() {
        let ds = Dataset::new(vec![
            Column::categorical(
                "month",
                [Some("Jan"), Some("Feb"), None, Some("Mar"), Some("Apr")],
            ),
            Column::from_values("sales", [10.0, 12.0, 9.0, 15.0, 11.0]),
        ])
        .expect("dataset");
        let out = dispatcher().dispatch(
            &ds,
            &request(ChartSelection::LineEvolution {
                x: "month".into(),
                y: "sales".into(),
            }),
        );
        let spec = &out.value().expect("line").spec;
        let ChartData::Table { columns } = &spec.data else {
            panic!("expected table data");
        };
        let months: Vec<Cell> = columns["month"].clone();
        assert_eq!(
            months,
            ["Jan", "Feb", "Mar", "Apr"]
                .map(|m| Cell::Text(m.to_string()))
                .to_vec()
        );
        let sales: Vec<f64> = columns["sales"].iter().filter_map(Cell::as_f64).collect();
        assert_eq!(sales, vec![10.0, 12.0, 15.0, 11.0]);
    }

    #[test]
    fn line_evolution_with_missing_column_is_rejected() {
        let out = dispatcher().dispatch(
            &dataset(),
            &request(ChartSelection::LineEvolution {
                x: "ghost".into(),
                y: "a".into(),
            }),
        );
        let notice = out.rejection().expect("rejected");
        assert!(notice.is(NoticeKind::MissingColumn));
        assert_eq!(notice.severity, Severity::Warning);
    }

    #[test]
    fn radar_takes_first_complete_rows() {
        let ds = Dataset::new(vec![
            Column::from_values("a", [1.0, 2.0, 3.0]),
            Column::numeric("b", [Some(1.0), None, Some(3.0)]),
            Column::from_values("c", [1.0, 2.0, 3.0]),
        ])
        .expect("dataset");
        let out = dispatcher().dispatch(
            &ds,
            &request(ChartSelection::Radar {
                columns: vec!["a".into(), "b".into(), "c".into()],
            }),
        );
        let ChartData::Polar { profiles, .. } = &out.value().expect("radar").spec.data else {
            panic!("expected polar data");
        };
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].name, "Profile 2");
        assert_eq!(profiles[1].values, vec![3.0, 3.0, 3.0]);
    }
}
