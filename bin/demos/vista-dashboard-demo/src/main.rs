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

mod args;
mod samples;
pub use args::Args;

use anyhow::{bail, Context, Result};
use clap::Parser;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vista::report;
use vista::{
    ChartRequest, ChartSelection, CleaningOptions, CorrelationMethod, Dashboard,
    DashboardConfig, Dataset, DisplayMode, Outcome, WaterfallStep,
};

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    match path {
        Some(p) => DashboardConfig::load_from_file(p)
            .with_context(|| format!("failed to load config from {}", p.display())),
        None => Ok(DashboardConfig::load_or_default()),
    }
}

/// Picks the reader from the file extension; files without one are read
/// as CSV.
fn load_frame(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let open = || File::open(path).with_context(|| format!("cannot open {}", path.display()));
    let df = match extension.as_deref() {
        Some("parquet") => ParquetReader::new(open()?)
            .finish()
            .with_context(|| format!("cannot parse {} as Parquet", path.display()))?,
        Some("csv") | Some("txt") | None => CsvReader::new(open()?)
            .finish()
            .with_context(|| format!("cannot parse {} as CSV", path.display()))?,
        Some(other) => bail!(
            "unsupported file extension '.{other}' for {}, expected .csv or .parquet",
            path.display()
        ),
    };
    Ok(df)
}

fn default_requests(dataset: &Dataset, mode: DisplayMode) -> Vec<ChartRequest> {
    let numeric: Vec<String> = dataset
        .numeric_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let categorical: Vec<String> = dataset
        .categorical_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut selections = Vec::new();
    if let Some(first) = numeric.first() {
        selections.push(ChartSelection::Distribution {
            column: first.clone(),
        });
        selections.push(ChartSelection::Box {
            column: first.clone(),
            by: categorical.first().cloned(),
        });
        selections.push(ChartSelection::Density {
            column: first.clone(),
        });
    }
    if let Some(first) = categorical.first() {
        selections.push(ChartSelection::Bar {
            column: first.clone(),
        });
        selections.push(ChartSelection::Donut {
            column: first.clone(),
        });
    }
    if let [x, y, ..] = numeric.as_slice() {
        selections.push(ChartSelection::Scatter {
            x: x.clone(),
            y: y.clone(),
            color: categorical.first().cloned(),
            size: numeric.get(2).cloned(),
        });
        selections.push(ChartSelection::CorrelationHeatmap);
    }
    if numeric.len() >= 3 {
        selections.push(ChartSelection::Radar {
            columns: numeric.iter().take(8).cloned().collect(),
        });
    }
    let kpis = vista::StatsSummarizer::new().kpi_summary(dataset);
    selections.push(ChartSelection::Gauge {
        value: kpis.mean_completeness_pct,
        label: "Mean completeness (%)".to_string(),
    });
    let total = (kpis.observations * kpis.variables) as f64;
    let filled = (kpis.density_pct / 100.0 * total).round();
    selections.push(ChartSelection::Waterfall {
        steps: vec![
            WaterfallStep::new("Filled cells", filled),
            WaterfallStep::new("Missing cells", total - filled),
            WaterfallStep::new("Total cells", total),
        ],
    });
    selections
        .into_iter()
        .map(|s| ChartRequest::new(s, mode))
        .collect()
}

fn print_outcome<T>(outcome: &Outcome<T>, render: impl Fn(&T) -> String) {
    if let Some(value) = outcome.value() {
        println!("{}", render(value));
    }
    let notices = report::notices_report(&outcome.notices());
    if !notices.is_empty() {
        print!("{notices}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug,polars=info"))
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    info!("Starting Vista Dashboard Demo");

    let config = load_config(args.config.as_deref())?;
    let dashboard = Dashboard::with_config(config).context("invalid dashboard configuration")?;
    let mode = if args.light {
        DisplayMode::Light
    } else {
        DisplayMode::Dark
    };

    let (df, source) = match (args.sample, &args.path) {
        (Some(sample), _) => (sample.frame()?, sample.name().to_string()),
        (None, Some(path)) => (load_frame(path)?, path.display().to_string()),
        (None, None) => bail!("a file path or --sample is required"),
    };
    info!("Exploring {}", source);
    let mut dataset = dashboard
        .load_dataframe(&df)
        .with_context(|| format!("cannot type the columns of {source}"))?;

    if args.clean {
        let cleaned = dashboard.clean(&dataset, &CleaningOptions::default());
        print_outcome(&cleaned, |r| {
            format!(
                "Cleaning removed {} duplicates and {} empty columns, filled {} cells",
                r.duplicates_removed,
                r.columns_removed.len(),
                r.cells_filled
            )
        });
        if let Some(cleaned) = cleaned.into_value() {
            dataset = cleaned.dataset;
        }
    }

    println!("{}", report::schema_report(dataset.schema()));
    println!("{}", report::kpi_report(&dashboard.kpi_summary(&dataset)));
    print_outcome(&dashboard.numeric_summary(&dataset), report::summary_report);
    print_outcome(&dashboard.categorical_summary(&dataset), |tables| {
        tables.values().map(report::frequency_report).collect()
    });
    print_outcome(&dashboard.quality_report(&dataset), report::quality_report);
    print_outcome(
        &dashboard.correlation(&dataset, CorrelationMethod::Pearson),
        report::correlation_report,
    );
    print_outcome(&dashboard.temporal_summary(&dataset), report::temporal_report);

    let requests = match &args.requests {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            serde_json::from_str::<Vec<ChartRequest>>(&raw)
                .with_context(|| format!("invalid chart requests in {}", path.display()))?
        }
        None => default_requests(&dataset, mode),
    };
    for request in &requests {
        let outcome = dashboard.chart(&dataset, request);
        match outcome.value() {
            Some(output) => {
                println!("{}", serde_json::to_string_pretty(output)?);
            }
            None => info!("Skipped {} chart", request.kind()),
        }
        print!("{}", report::notices_report(&outcome.notices()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parquet_files_are_read_by_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("sales.PARQUET");
        let mut df = df!(
            "price" => [1.5, 2.0, 3.25],
            "region" => ["north", "south", "north"],
        )
        .expect("frame");
        let mut file = File::create(&path).expect("create");
        ParquetWriter::new(&mut file).finish(&mut df).expect("write");

        let loaded = load_frame(&path).expect("load");
        assert!(loaded.equals(&df));
        let dataset = Dashboard::new().load_dataframe(&loaded).expect("dataset");
        assert_eq!(dataset.numeric_columns().len(), 1);
    }

    #[test]
    fn csv_is_the_fallback_reader() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["sales.csv", "sales"] {
            let path = dir.path().join(name);
            fs::write(&path, "price,region\n1.5,north\n2,south\n").expect("write");
            assert_eq!(load_frame(&path).expect("load").shape(), (2, 2));
        }
    }

    #[test]
    fn sample_flag_replaces_the_path() {
        let args = Args::try_parse_from(["demo", "--sample", "general"]).expect("sample");
        assert_eq!(args.sample, Some(samples::Sample::General));
        assert!(args.path.is_none());

        assert!(Args::try_parse_from(["demo"]).is_err());
        assert!(Args::try_parse_from(["demo", "data.csv", "--sample", "finance"]).is_err());
        let args = Args::try_parse_from(["demo", "data.csv"]).expect("path");
        assert_eq!(args.path.as_deref(), Some(Path::new("data.csv")));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let err = load_frame(Path::new("book.xlsx")).expect_err("xlsx");
        assert!(err.to_string().contains("unsupported file extension '.xlsx'"));
    }
}
