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

use std::sync::Arc;
use vista::interpret::{Finding, SkewClass};
use vista::{
    Cell, ChartData, ChartDispatcher, ChartKind, ChartRequest, ChartSelection, Column,
    Dataset, DisplayMode, KeySequence, NoticeKind, Severity, WaterfallStep,
};

fn sales() -> Dataset {
    Dataset::new(vec![
        Column::from_values("price", [1.0, 2.0, 3.0, 4.0, 100.0]),
        Column::from_values("qty", [5.0, 4.0, 3.0, 2.0, 1.0]),
        Column::categorical(
            "region",
            [Some("north"), Some("south"), Some("north"), None, Some("east")],
        ),
    ])
    .expect("dataset")
}

fn wide(columns: usize) -> Dataset {
    let cols = (0..columns)
        .map(|c| {
            Column::from_values(
                format!("c{c}"),
                (0..6).map(|r| (r * (c + 1)) as f64),
            )
        })
        .collect();
    Dataset::new(cols).expect("dataset")
}

fn dispatcher() -> ChartDispatcher {
    ChartDispatcher::new(Arc::new(KeySequence::new()))
}

fn request(selection: ChartSelection) -> ChartRequest {
    ChartRequest::new(selection, DisplayMode::Dark)
}

fn radar(columns: usize) -> ChartSelection {
    ChartSelection::Radar {
        columns: (0..columns).map(|c| format!("c{c}")).collect(),
    }
}

#[test]
fn identical_requests_get_distinct_keys() {
    let dispatcher = dispatcher();
    let ds = sales();
    let req = request(ChartSelection::Bar {
        column: "region".into(),
    });
    let first = dispatcher.dispatch(&ds, &req).into_value().expect("first");
    let second = dispatcher.dispatch(&ds, &req).into_value().expect("second");
    assert_ne!(first.spec.key, second.spec.key);
    assert!(first.spec.key.starts_with("bar_region_"));
}

#[test]
fn rejected_requests_do_not_consume_keys() {
    let keys = Arc::new(KeySequence::new());
    let dispatcher = ChartDispatcher::new(Arc::clone(&keys));
    let out = dispatcher.dispatch(
        &sales(),
        &request(ChartSelection::Distribution {
            column: "ghost".into(),
        }),
    );
    assert!(!out.is_computed());
    assert_eq!(keys.current(), 0);
}

#[test]
fn scatter_without_y_is_rejected() {
    let out = dispatcher().dispatch(
        &sales(),
        &request(ChartSelection::Scatter {
            x: "price".into(),
            y: "ghost".into(),
            color: None,
            size: None,
        }),
    );
    let notice = out.rejection().expect("rejected");
    assert!(notice.is(NoticeKind::MissingColumn));
    assert_eq!(notice.message, "Column 'ghost' not found in dataset");
}

#[test]
fn scatter_with_missing_color_still_renders() {
    let out = dispatcher().dispatch(
        &sales(),
        &request(ChartSelection::Scatter {
            x: "price".into(),
            y: "qty".into(),
            color: Some("ghost".into()),
            size: Some("qty".into()),
        }),
    );
    let output = out.value().expect("rendered");
    assert_eq!(output.spec.encoding.color, None);
    assert_eq!(output.spec.encoding.size.as_deref(), Some("marker_size"));
    assert!(output.interpretation.is_some());
}

#[test]
fn radar_enforces_column_bounds() {
    let ds = wide(9);
    let too_few = dispatcher().dispatch(&ds, &request(radar(2)));
    let notice = too_few.rejection().expect("too few");
    assert!(notice.message.contains("minimum 3 required"));
    assert_eq!(notice.severity, Severity::Warning);

    let too_many = dispatcher().dispatch(&ds, &request(radar(9)));
    assert!(too_many
        .rejection()
        .expect("too many")
        .message
        .contains("maximum 8"));

    let ok = dispatcher().dispatch(&ds, &request(radar(5)));
    let output = ok.value().expect("accepted");
    match &output.spec.data {
        ChartData::Polar { axes, profiles } => {
            assert_eq!(axes.len(), 5);
            assert_eq!(profiles.len(), 5);
            assert_eq!(profiles[0].name, "Profile 1");
        }
        other => panic!("unexpected data {other:?}"),
    }
}

#[test]
fn gauge_clamps_out_of_range_values() {
    let out = dispatcher().dispatch(
        &Dataset::empty(),
        &request(ChartSelection::Gauge {
            value: 140.0,
            label: "Score".into(),
        }),
    );
    assert!(out.is_computed());
    assert!(out.notices().iter().any(|n| n.is(NoticeKind::OutOfRangeSelection)));
    match &out.value().expect("gauge").spec.data {
        ChartData::Indicator { value, range, .. } => {
            assert_eq!(*value, 100.0);
            assert_eq!(*range, [0.0, 100.0]);
        }
        other => panic!("unexpected data {other:?}"),
    }
}

#[test]
fn waterfall_marks_the_last_step_as_total() {
    let steps = vec![
        WaterfallStep::new("Q1", 10.0),
        WaterfallStep::new("Q2", -4.0),
        WaterfallStep::new("Total", 6.0),
    ];
    let out = dispatcher().dispatch(
        &Dataset::empty(),
        &request(ChartSelection::Waterfall { steps }),
    );
    assert_eq!(
        out.value().map(|o| o.spec.kind),
        Some(ChartKind::Waterfall)
    );

    let mismatched = vec![WaterfallStep::new("Q1", 10.0), WaterfallStep::new("Total", 3.0)];
    let rejected = dispatcher().dispatch(
        &Dataset::empty(),
        &request(ChartSelection::Waterfall { steps: mismatched }),
    );
    assert!(!rejected.is_computed());
}

#[test]
fn distribution_reports_right_skew() {
    let out = dispatcher().dispatch(
        &sales(),
        &request(ChartSelection::Distribution {
            column: "price".into(),
        }),
    );
    let interpretation = out
        .into_value()
        .and_then(|o| o.interpretation)
        .expect("interpretation");
    assert!(matches!(
        interpretation.finding,
        Finding::Skew {
            class: SkewClass::RightSkewed,
            ..
        }
    ));
    assert_eq!(
        interpretation.banners[0].message,
        "Right-skewed distribution (positive tail)"
    );
}

#[test]
fn light_mode_switches_palette() {
    let dispatcher = dispatcher();
    let ds = sales();
    let selection = ChartSelection::Pie {
        column: "region".into(),
    };
    let dark = dispatcher
        .dispatch(&ds, &ChartRequest::new(selection.clone(), DisplayMode::Dark))
        .into_value()
        .expect("dark");
    let light = dispatcher
        .dispatch(&ds, &ChartRequest::new(selection, DisplayMode::Light))
        .into_value()
        .expect("light");
    assert_eq!(dark.spec.style.palette.template, "plotly_dark");
    assert_eq!(light.spec.style.palette.template, "plotly_white");
    assert_eq!(light.spec.style.palette.background, "#ffffff");
}

#[test]
fn correlation_heatmap_needs_two_numeric_columns() {
    let ds = Dataset::new(vec![Column::from_values("only", [1.0, 2.0, 3.0])]).expect("dataset");
    let out = dispatcher().dispatch(&ds, &request(ChartSelection::CorrelationHeatmap));
    assert!(out
        .rejection()
        .expect("rejected")
        .is(NoticeKind::InsufficientColumns));
}

#[test]
fn every_kind_has_a_distinct_key_prefix() {
    let mut prefixes: Vec<&str> = ChartKind::ALL.iter().map(ChartKind::as_str).collect();
    prefixes.sort_unstable();
    prefixes.dedup();
    assert_eq!(prefixes.len(), 15);
}

#[test]
fn requests_deserialise_from_json() {
    let req: ChartRequest = serde_json::from_str(
        r#"{"selection":{"kind":"box","column":"price","by":"region"},"display_mode":"light"}"#,
    )
    .expect("request");
    let out = dispatcher().dispatch(&sales(), &req);
    assert_eq!(
        out.value().map(|o| o.spec.key.as_str()),
        Some("box_price_region_1")
    );
}

#[test]
fn parallel_coordinates_need_four_numeric_columns() {
    let rejected = dispatcher().dispatch(&wide(3), &request(ChartSelection::ParallelCoordinates));
    let notice = rejected.rejection().expect("rejected");
    assert!(notice.is(NoticeKind::InsufficientColumns));
    assert_eq!(notice.severity, Severity::Info);

    let accepted = dispatcher().dispatch(&wide(4), &request(ChartSelection::ParallelCoordinates));
    let spec = &accepted.value().expect("accepted").spec;
    assert_eq!(spec.encoding.dimensions.len(), 4);
    assert_eq!(spec.encoding.color.as_deref(), Some("c0"));
}

#[test]
fn density_rejects_text_columns() {
    let out = dispatcher().dispatch(
        &sales(),
        &request(ChartSelection::Density {
            column: "region".into(),
        }),
    );
    let notice = out.rejection().expect("rejected");
    assert!(notice.is(NoticeKind::NonNumericInput));
    assert_eq!(notice.severity, Severity::Info);
}

#[test]
fn line_evolution_needs_both_columns() {
    let out = dispatcher().dispatch(
        &sales(),
        &request(ChartSelection::LineEvolution {
            x: "region".into(),
            y: "ghost".into(),
        }),
    );
    let notice = out.rejection().expect("rejected");
    assert!(notice.is(NoticeKind::MissingColumn));
    assert_eq!(notice.severity, Severity::Warning);
}

#[test]
fn line_evolution_sorts_numeric_axes() {
    let ds = Dataset::new(vec![
        Column::from_values("year", [2022.0, 2020.0, 2021.0]),
        Column::from_values("revenue", [30.0, 10.0, 20.0]),
    ])
    .expect("dataset");
    let out = dispatcher().dispatch(
        &ds,
        &request(ChartSelection::LineEvolution {
            x: "year".into(),
            y: "revenue".into(),
        }),
    );
    let ChartData::Table { columns } = &out.value().expect("line").spec.data else {
        panic!("expected table data");
    };
    let years: Vec<f64> = columns["year"].iter().filter_map(Cell::as_f64).collect();
    let revenue: Vec<f64> = columns["revenue"].iter().filter_map(Cell::as_f64).collect();
    assert_eq!(years, vec![2020.0, 2021.0, 2022.0]);
    assert_eq!(revenue, vec![10.0, 20.0, 30.0]);
}
