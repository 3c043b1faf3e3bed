// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Ruler tick spacing.
//!
//! The labelled interval widens as the view zooms out so labels never
//! crowd each other; each interval is split into a fixed number of
//! unlabelled subdivisions.

use super::CoordinateModel;

/// Labelled interval and subdivision count for a zoom level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulerSpacing {
    /// Beats between labelled ticks
    pub interval_beats: f64,
    /// Number of sub-ticks each interval is divided into
    pub subdivisions: u32,
}

impl RulerSpacing {
    /// Pick the spacing for a zoom level
    pub fn for_zoom(zoom_level: f64) -> Self {
        let (interval_beats, subdivisions) = if zoom_level < 0.05 {
            (60.0, 2)
        } else if zoom_level < 0.15 {
            (60.0, 6)
        } else if zoom_level < 0.2 {
            (30.0, 6)
        } else if zoom_level < 0.75 {
            (10.0, 5)
        } else if zoom_level < 1.25 {
            (5.0, 5)
        } else if zoom_level < 3.0 {
            (1.0, 4)
        } else if zoom_level < 4.0 {
            (0.5, 4)
        } else {
            (0.1, 2)
        };
        Self {
            interval_beats,
            subdivisions,
        }
    }

    /// Generate the ticks in `[from_px, to_px)`, starting at the last tick
    /// at or before `from_px`
    pub fn ticks(&self, coords: &CoordinateModel, from_px: f64, to_px: f64) -> Vec<RulerTick> {
        let mut ticks = Vec::new();
        if !from_px.is_finite() || !to_px.is_finite() {
            return ticks;
        }
        let sub_beats = self.interval_beats / self.subdivisions as f64;
        let first = (coords.pixels_x_to_beats(from_px.max(0.0)) / sub_beats).floor();
        let mut step = first as u64;
        loop {
            let beats = step as f64 * sub_beats;
            let x = coords.beats_to_pixels_x(beats);
            if x >= to_px {
                break;
            }
            ticks.push(RulerTick {
                x,
                beats,
                major: step % self.subdivisions as u64 == 0,
            });
            step += 1;
        }
        ticks
    }
}

/// One tick on the ruler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulerTick {
    /// Horizontal pixel position
    pub x: f64,
    /// Time in beats at this tick
    pub beats: f64,
    /// Labelled tick
    pub major: bool,
}

impl RulerTick {
    /// Label text; whole numbers print without decimals
    pub fn label(&self) -> String {
        if self.beats.fract() == 0.0 {
            format!("{}", self.beats as i64)
        } else {
            format!("{:.1}", self.beats)
        }
    }
}
