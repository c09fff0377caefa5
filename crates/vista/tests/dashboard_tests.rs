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

use polars::prelude::*;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use vista::{
    CacheKey, ChartRequest, ChartSelection, CleaningOptions, Dashboard, DashboardConfig,
    DisplayMode, KeySequence, RowFilter, SemanticType, VistaError,
};

fn frame() -> DataFrame {
    df![
        "revenue" => [Some(120.0), Some(80.5), None, Some(300.0), Some(120.0)],
        "units" => [3i64, 2, 5, 9, 3],
        "segment" => ["retail", "online", "retail", "wholesale", "retail"],
        "opened" => ["2023-01-02", "2023-02-10", "2023-03-01", "2023-03-15", "2023-01-02"],
    ]
    .expect("frame")
}

#[test]
fn config_file_overrides_selected_fields() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[summary]\ntop_n = 5\n\n[charts]\nbar_top_n = 7\n\n[inference.overrides]\nunits = \"Categorical\""
    )
    .expect("write");
    let config = DashboardConfig::load_from_file(file.path()).expect("config");
    assert_eq!(config.summary.top_n, 5);
    assert_eq!(config.charts.bar_top_n, 7);
    assert_eq!(config.charts.histogram_bins, 50);

    let dashboard = Dashboard::with_config(config).expect("dashboard");
    let ds = dashboard.load_dataframe(&frame()).expect("dataset");
    assert_eq!(
        ds.column("units").map(|c| c.semantic_type()),
        Some(SemanticType::Categorical)
    );
}

#[test]
fn invalid_config_is_refused() {
    let mut config = DashboardConfig::default();
    config.charts.gauge_min = 10.0;
    config.charts.gauge_max = 10.0;
    assert!(matches!(
        Dashboard::with_config(config),
        Err(VistaError::Config(_))
    ));
}

#[test]
fn dataframe_round_trip_through_the_dashboard() {
    let dashboard = Dashboard::new();
    let ds = dashboard.load_dataframe(&frame()).expect("dataset");
    assert_eq!(ds.row_count(), 5);
    assert_eq!(ds.schema().count_of(SemanticType::Numeric), 2);
    assert_eq!(ds.schema().count_of(SemanticType::Categorical), 1);
    assert_eq!(ds.schema().count_of(SemanticType::Datetime), 1);

    let summary = dashboard.numeric_summary(&ds).into_value().expect("summary");
    assert_eq!(summary["revenue"].count, 4);

    let kpis = dashboard.kpi_summary(&ds);
    assert_eq!(kpis.observations, 5);
    assert_eq!(kpis.duplicate_rows, 1);
    assert!((kpis.density_pct - 95.0).abs() < 1e-9);

    let breakdown = dashboard
        .categorical_summary(&ds)
        .into_value()
        .expect("breakdown");
    assert_eq!(breakdown["segment"].entries[0].value, "retail");

    assert_eq!(
        dashboard
            .temporal_summary(&ds)
            .into_value()
            .map(|t| t.span_days),
        Some(72)
    );
}

#[test]
fn filter_then_clean() {
    let dashboard = Dashboard::new();
    let ds = dashboard.load_dataframe(&frame()).expect("dataset");
    let filtered = dashboard
        .filter(
            &ds,
            &[RowFilter::OneOf {
                column: "segment".into(),
                values: vec!["retail".into()],
            }],
        )
        .into_value()
        .expect("filtered");
    assert_eq!(filtered.row_count(), 3);

    let report = dashboard
        .clean(&filtered, &CleaningOptions::default())
        .into_value()
        .expect("cleaned");
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.cells_filled, 1);
}

#[test]
fn dashboards_can_share_a_key_sequence() {
    let keys = Arc::new(KeySequence::new());
    let first = Dashboard::with_keys(DashboardConfig::default(), Arc::clone(&keys)).expect("first");
    let second = Dashboard::with_keys(DashboardConfig::default(), Arc::clone(&keys)).expect("second");
    let ds = first.load_dataframe(&frame()).expect("dataset");
    let req = ChartRequest::new(
        ChartSelection::Donut {
            column: "segment".into(),
        },
        DisplayMode::Light,
    );
    let a = first.chart(&ds, &req).into_value().expect("a");
    let b = second.chart(&ds, &req).into_value().expect("b");
    assert_eq!(a.spec.key, "donut_segment_1");
    assert_eq!(b.spec.key, "donut_segment_2");
    assert_eq!(keys.current(), 2);
}

#[test]
fn cached_loads_run_the_loader_once() {
    let dashboard = Dashboard::with_config(DashboardConfig::for_large_datasets()).expect("dashboard");
    assert!(dashboard.cache().is_some());
    let loads = AtomicUsize::new(0);
    let key = CacheKey::new_session();
    for _ in 0..3 {
        let ds = dashboard
            .load_cached(key, || {
                loads.fetch_add(1, Ordering::SeqCst);
                dashboard.load_dataframe(&frame())
            })
            .expect("dataset");
        assert_eq!(ds.row_count(), 5);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn uncached_dashboards_always_load() {
    let dashboard = Dashboard::new();
    let loads = AtomicUsize::new(0);
    let key = CacheKey::new_session();
    for _ in 0..2 {
        dashboard
            .load_cached(key, || {
                loads.fetch_add(1, Ordering::SeqCst);
                dashboard.load_dataframe(&frame())
            })
            .expect("dataset");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}
