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

use crate::samples::Sample;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vista-dashboard-demo",
    version,
    about = "Summarise a CSV or Parquet file and print chart specs for it"
)]
pub struct Args {
    #[arg(
        required_unless_present = "sample",
        help = "CSV or Parquet file to explore"
    )]
    pub path: Option<PathBuf>,
    #[arg(long, value_enum, conflicts_with = "path", help = "Explore a built-in dataset instead of a file")]
    pub sample: Option<Sample>,
    #[arg(long, help = "Dashboard TOML config (defaults to config/vista.toml when present)")]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        help = "JSON file holding an array of chart requests; a default set is built otherwise"
    )]
    pub requests: Option<PathBuf>,
    #[arg(long, default_value_t = false, help = "Use the light palette")]
    pub light: bool,
    #[arg(long, default_value_t = false, help = "Drop duplicates and fill gaps before analysis")]
    pub clean: bool,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
