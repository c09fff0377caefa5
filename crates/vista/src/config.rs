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

use crate::dataset::SemanticType;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub inference: InferenceConfig,
    pub summary: SummaryConfig,
    pub charts: ChartConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub type_confidence_threshold: f64,
    pub temporal_formats: Vec<String>,
    /// Column name to forced semantic type.
    pub overrides: HashMap<String, SemanticType>,
}
impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            type_confidence_threshold: 0.8,
            temporal_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%SZ".to_string(),
                "%m/%d/%Y".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y%m%d".to_string(),
            ],
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub top_n: usize,
    pub percentiles: Vec<f64>,
    pub cv_mean_epsilon: f64,
}
impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            percentiles: vec![0.05, 0.10, 0.25, 0.50, 0.75, 0.90, 0.95],
            cv_mean_epsilon: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub bar_top_n: usize,
    pub histogram_bins: usize,
    pub density_points: usize,
    pub radar_min_columns: usize,
    pub radar_max_columns: usize,
    pub radar_profiles: usize,
    pub parallel_min_columns: usize,
    pub gauge_min: f64,
    pub gauge_max: f64,
    pub default_marker_size: f64,
    pub chart_height: u32,
    pub compact_height: u32,
    pub matrix_height: u32,
}
impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            bar_top_n: 15,
            histogram_bins: 50,
            density_points: 500,
            radar_min_columns: 3,
            radar_max_columns: 8,
            radar_profiles: 5,
            parallel_min_columns: 4,
            gauge_min: 0.0,
            gauge_max: 100.0,
            default_marker_size: 10.0,
            chart_height: 600,
            compact_height: 500,
            matrix_height: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub capacity: usize,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: 3600,
            capacity: 16,
        }
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

impl DashboardConfig {
    pub fn load_from_file(config_path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(config_path)?;
        let config: DashboardConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config/vista.toml")
    }

    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        Self::load_from_file(&config_path).unwrap_or_else(|e| {
            tracing::debug!("Using default dashboard configuration: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.inference.type_confidence_threshold;
        if threshold.is_nan() || threshold <= 0.0 || threshold > 1.0 {
            return Err(invalid("inference.type_confidence_threshold", threshold));
        }
        if self.summary.top_n == 0 {
            return Err(invalid("summary.top_n", 0));
        }
        if let Some(p) = self
            .summary
            .percentiles
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(invalid("summary.percentiles", p));
        }
        if self.summary.cv_mean_epsilon.is_nan() || self.summary.cv_mean_epsilon < 0.0 {
            return Err(invalid("summary.cv_mean_epsilon", self.summary.cv_mean_epsilon));
        }
        let charts = &self.charts;
        if charts.bar_top_n == 0 {
            return Err(invalid("charts.bar_top_n", 0));
        }
        if charts.histogram_bins == 0 {
            return Err(invalid("charts.histogram_bins", 0));
        }
        if charts.density_points < 2 {
            return Err(invalid("charts.density_points", charts.density_points));
        }
        if charts.radar_min_columns == 0 || charts.radar_min_columns > charts.radar_max_columns {
            return Err(ConfigError::ConflictingOptions {
                details: format!(
                    "radar_min_columns ({}) must be between 1 and radar_max_columns ({})",
                    charts.radar_min_columns, charts.radar_max_columns
                ),
            });
        }
        if charts.gauge_min >= charts.gauge_max {
            return Err(ConfigError::ConflictingOptions {
                details: format!(
                    "gauge_min ({}) must be below gauge_max ({})",
                    charts.gauge_min, charts.gauge_max
                ),
            });
        }
        if charts.default_marker_size.is_nan() || charts.default_marker_size <= 0.0 {
            return Err(invalid("charts.default_marker_size", charts.default_marker_size));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(ConfigError::ConflictingOptions {
                details: "cache is enabled but capacity is 0".to_string(),
            });
        }
        Ok(())
    }

    /// Fewer categories and a sparser density grid, with caching on.
    pub fn for_large_datasets() -> Self {
        Self {
            summary: SummaryConfig {
                top_n: 10,
                ..Default::default()
            },
            charts: ChartConfig {
                histogram_bins: 100,
                density_points: 200,
                ..Default::default()
            },
            cache: CacheConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn for_presentation() -> Self {
        Self {
            charts: ChartConfig {
                bar_top_n: 10,
                histogram_bins: 30,
                chart_height: 700,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
