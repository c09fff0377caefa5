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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub plot_area: &'static str,
    pub text: &'static str,
    pub template: &'static str,
    /// Single-series accent, e.g. histogram bars.
    pub accent: &'static str,
    /// Continuous scale for count-coloured bars.
    pub sequential_scale: &'static str,
    pub marker_outline: &'static str,
    pub gauge_bar: &'static str,
}

const DARK: Palette = Palette {
    background: "#0e1117",
    plot_area: "#262730",
    text: "#fafafa",
    template: "plotly_dark",
    accent: "#8b5cf6",
    sequential_scale: "plasma",
    marker_outline: "white",
    gauge_bar: "cyan",
};

const LIGHT: Palette = Palette {
    background: "#ffffff",
    plot_area: "#f8f9fa",
    text: "#000000",
    template: "plotly_white",
    accent: "#636EFA",
    sequential_scale: "Viridis",
    marker_outline: "DarkSlateGrey",
    gauge_bar: "darkblue",
};

impl DisplayMode {
    pub fn palette(&self) -> &'static Palette {
        match self {
            DisplayMode::Dark => &DARK,
            DisplayMode::Light => &LIGHT,
        }
    }
    pub fn is_dark(&self) -> bool {
        matches!(self, DisplayMode::Dark)
    }
}

/// Layout block attached to every chart spec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartStyle {
    pub mode: DisplayMode,
    pub palette: Palette,
    pub height: Option<u32>,
}
impl ChartStyle {
    pub fn new(mode: DisplayMode, height: Option<u32>) -> Self {
        Self {
            mode,
            palette: mode.palette().clone(),
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palettes_match_display_mode() {
        let dark = DisplayMode::Dark.palette();
        assert_eq!(
            (dark.background, dark.plot_area, dark.text),
            ("#0e1117", "#262730", "#fafafa")
        );
        let light = DisplayMode::Light.palette();
        assert_eq!(
            (light.background, light.plot_area, light.text),
            ("#ffffff", "#f8f9fa", "#000000")
        );
        assert_eq!(light.template, "plotly_white");
    }
}
