// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Coordinate model for the timeline grid.
//!
//! Converts between logical time (beats), horizontal pixels, zoom level,
//! track index and track pixel height, and owns the grid snap policy.
//! Pixel geometry is always derived from logical values here; nothing in
//! the crate scales a previously rendered pixel value.

pub mod ruler;

pub use ruler::{RulerSpacing, RulerTick};

use crate::error::{EditorError, Result};

/// Default horizontal resolution at zoom 1.0
pub const DEFAULT_PIXELS_PER_BEAT: f64 = 100.0;

/// Number of snap steps per beat
pub const SNAP_DIVISIONS: f64 = 16.0;

/// Smallest zoom level a rescale may reach
pub const MIN_ZOOM: f64 = 0.01;

/// Largest zoom level a rescale may reach
pub const MAX_ZOOM: f64 = 100.0;

/// Decimal places kept for durations derived from pixel widths
pub const DURATION_DECIMALS: i32 = 3;

/// Horizontal mapping between beats and pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateModel {
    /// Pixels per beat at zoom 1.0 (constant per document)
    pixels_per_beat: f64,
    /// Current zoom level, always in `[MIN_ZOOM, MAX_ZOOM]`
    zoom_level: f64,
}

impl Default for CoordinateModel {
    fn default() -> Self {
        Self {
            pixels_per_beat: DEFAULT_PIXELS_PER_BEAT,
            zoom_level: 1.0,
        }
    }
}

impl CoordinateModel {
    /// Create a model at zoom 1.0
    pub fn new(pixels_per_beat: f64) -> Result<Self> {
        if !pixels_per_beat.is_finite() || pixels_per_beat <= 0.0 {
            return Err(EditorError::OutOfRange {
                what: "pixels per beat",
                value: pixels_per_beat,
            });
        }
        Ok(Self {
            pixels_per_beat,
            zoom_level: 1.0,
        })
    }

    pub fn pixels_per_beat(&self) -> f64 {
        self.pixels_per_beat
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }

    /// Pixels per beat at the current zoom
    pub fn px_per_beat_effective(&self) -> f64 {
        self.pixels_per_beat * self.zoom_level
    }

    /// Smallest horizontal step a clip may land on
    pub fn snap_quantum(&self) -> f64 {
        self.px_per_beat_effective() / SNAP_DIVISIONS
    }

    pub fn beats_to_pixels_x(&self, beats: f64) -> f64 {
        beats * self.px_per_beat_effective()
    }

    pub fn pixels_x_to_beats(&self, pixels_x: f64) -> f64 {
        pixels_x / self.px_per_beat_effective()
    }

    /// Snap a horizontal pixel position to the grid.
    ///
    /// Results below one quantum collapse to 0, so near-zero or negative
    /// jitter never produces a sub-quantum offset.
    pub fn snap(&self, pixels_x: f64) -> f64 {
        if !pixels_x.is_finite() {
            return 0.0;
        }
        let quantum = self.snap_quantum();
        let snapped = (pixels_x / quantum).round() * quantum;
        if snapped < quantum {
            0.0
        } else {
            snapped
        }
    }

    /// Convert a pixel width into a duration in beats, rounded to
    /// [`DURATION_DECIMALS`] places
    pub fn width_to_duration(&self, width_px: f64) -> f64 {
        round_to_decimals(self.pixels_x_to_beats(width_px), DURATION_DECIMALS)
    }

    /// Multiply the zoom level by `factor`.
    ///
    /// The result is clamped to `[MIN_ZOOM, MAX_ZOOM]`. Returns the factor
    /// that was actually applied (1.0 when the zoom did not change).
    pub fn rescale(&mut self, factor: f64) -> Result<f64> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(EditorError::InvariantViolation(format!(
                "zoom factor must be finite and positive, got {}",
                factor
            )));
        }
        let target = (self.zoom_level * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let applied = target / self.zoom_level;
        self.zoom_level = target;
        Ok(applied)
    }
}

/// Vertical position of a track lane
pub fn track_to_y(index: usize, track_height: f64) -> f64 {
    index as f64 * track_height
}

/// Track lane under a vertical position, clamped to the existing tracks.
///
/// Returns `None` when there are no tracks.
pub fn y_to_track(y: f64, track_height: f64, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let raw = (y / track_height).round();
    if !raw.is_finite() || raw <= 0.0 {
        return Some(0);
    }
    Some((raw as usize).min(count - 1))
}

/// Round to a fixed number of decimal places
pub fn round_to_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
