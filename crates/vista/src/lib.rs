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

pub mod cache;
pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod interpret;
pub mod report;
pub mod schema;
pub mod stats;
pub mod style;
pub mod transform;

pub use cache::{CacheKey, DatasetCache, MemoryDatasetCache};
pub use chart::{
    ChartData, ChartDispatcher, ChartKind, ChartOutput, ChartRequest, ChartSelection, ChartSpec,
    Encoding, KeySequence, WaterfallStep,
};
pub use config::{CacheConfig, ChartConfig, DashboardConfig, InferenceConfig, SummaryConfig};
pub use dataset::{Cell, Column, ColumnValues, Dataset, FieldInfo, Schema, SemanticType};
pub use error::{
    CacheError, ConfigError, DatasetError, Notice, NoticeKind, Outcome, Result, Severity,
    VistaError,
};
pub use interpret::{Finding, Interpretation};
pub use stats::{
    CorrelationMatrix, CorrelationMethod, DatasetKpis, FrequencyTable, NumericSummary,
    QualityReport, StatValue, StatsSummarizer, SummaryTable, TemporalSummary,
};
pub use style::{ChartStyle, DisplayMode, Palette};
pub use transform::{CleaningOptions, CleaningReport, RowFilter};

use indexmap::IndexMap;
use polars::prelude::DataFrame;
use std::sync::Arc;
use tracing::info;

/// One dashboard session: configuration, summariser, chart dispatcher and
/// an optional dataset cache.
pub struct Dashboard {
    config: DashboardConfig,
    summarizer: StatsSummarizer,
    dispatcher: ChartDispatcher,
    cache: Option<Arc<dyn DatasetCache>>,
}
impl Dashboard {
    pub fn new() -> Self {
        let config = DashboardConfig::default();
        Self {
            summarizer: StatsSummarizer::with_config(config.summary.clone()),
            dispatcher: ChartDispatcher::with_config(
                config.charts.clone(),
                Arc::new(KeySequence::new()),
            ),
            cache: None,
            config,
        }
    }
    pub fn with_config(config: DashboardConfig) -> Result<Self> {
        Self::with_keys(config, Arc::new(KeySequence::new()))
    }
    /// Shares an existing key sequence, e.g. across dashboards of one
    /// host session.
    pub fn with_keys(config: DashboardConfig, keys: Arc<KeySequence>) -> Result<Self> {
        config.validate()?;
        let cache: Option<Arc<dyn DatasetCache>> = if config.cache.enabled {
            Some(Arc::new(MemoryDatasetCache::from_config(&config.cache)?))
        } else {
            None
        };
        Ok(Self {
            summarizer: StatsSummarizer::with_config(config.summary.clone()),
            dispatcher: ChartDispatcher::with_config(config.charts.clone(), keys),
            cache,
            config,
        })
    }
    pub fn with_cache(mut self, cache: Arc<dyn DatasetCache>) -> Self {
        self.cache = Some(cache);
        self
    }
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
    pub fn summarizer(&self) -> &StatsSummarizer {
        &self.summarizer
    }
    pub fn dispatcher(&self) -> &ChartDispatcher {
        &self.dispatcher
    }
    pub fn cache(&self) -> Option<&Arc<dyn DatasetCache>> {
        self.cache.as_ref()
    }

    pub fn load_dataframe(&self, df: &DataFrame) -> Result<Dataset> {
        let dataset = Dataset::from_dataframe(df, &self.config.inference)?;
        info!(
            "Loaded dataset with {} rows and {} columns",
            dataset.row_count(),
            dataset.column_count()
        );
        Ok(dataset)
    }

    /// Serves `key` from the cache when present; otherwise runs `load` and
    /// stores the result. Without a cache this is just `load`.
    pub fn load_cached<F>(&self, key: CacheKey, load: F) -> Result<Arc<Dataset>>
    where
        F: FnOnce() -> Result<Dataset>,
    {
        let Some(cache) = &self.cache else {
            return load().map(Arc::new);
        };
        if let Some(hit) = cache.get(&key) {
            info!("Dataset cache hit for {}", key);
            return Ok(hit);
        }
        let dataset = Arc::new(load()?);
        cache.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn numeric_summary(&self, dataset: &Dataset) -> Outcome<SummaryTable> {
        self.summarizer.numeric_summary(dataset)
    }
    pub fn categorical_summary(
        &self,
        dataset: &Dataset,
    ) -> Outcome<IndexMap<String, FrequencyTable>> {
        self.summarizer
            .categorical_summary(dataset, self.config.summary.top_n)
    }
    pub fn quality_report(&self, dataset: &Dataset) -> Outcome<QualityReport> {
        self.summarizer.quality_report(dataset)
    }
    pub fn correlation(
        &self,
        dataset: &Dataset,
        method: CorrelationMethod,
    ) -> Outcome<CorrelationMatrix> {
        self.summarizer.correlation(dataset, method)
    }
    pub fn temporal_summary(&self, dataset: &Dataset) -> Outcome<TemporalSummary> {
        self.summarizer.temporal_summary(dataset)
    }
    pub fn kpi_summary(&self, dataset: &Dataset) -> DatasetKpis {
        self.summarizer.kpi_summary(dataset)
    }
    pub fn chart(&self, dataset: &Dataset, request: &ChartRequest) -> Outcome<ChartOutput> {
        self.dispatcher.dispatch(dataset, request)
    }
    pub fn filter(&self, dataset: &Dataset, filters: &[RowFilter]) -> Outcome<Dataset> {
        transform::filter_rows(dataset, filters)
    }
    pub fn clean(&self, dataset: &Dataset, options: &CleaningOptions) -> Outcome<CleaningReport> {
        transform::clean(dataset, options)
    }
}
impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}
