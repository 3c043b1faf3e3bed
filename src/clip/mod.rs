// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Logical clips placed on the timeline.
//!
//! A clip holds only logical state: beat position, track index, duration
//! and the gesture parameters. Pixel geometry is derived on demand by the
//! document, so a clip survives any number of zoom or height changes
//! unchanged.

pub mod params;
pub mod store;

pub use params::{ParamMap, ParamValue};
pub use store::ClipStore;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EditorError, Result};

/// Stable identifier of a clip inside its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClipId(pub(crate) u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display colour, persisted as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::new(100, 150, 200)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

/// Clip duration in beats.
///
/// A sequence duration carries extra values for the synthesis side; only
/// element 0 drives the timeline geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClipDuration {
    Beats(f64),
    Sequence(Vec<f64>),
}

impl ClipDuration {
    /// Authoritative length in beats
    pub fn beats(&self) -> f64 {
        match self {
            ClipDuration::Beats(b) => *b,
            ClipDuration::Sequence(values) => values.first().copied().unwrap_or(0.0),
        }
    }

    /// Same duration with the authoritative length replaced
    pub fn with_beats(&self, beats: f64) -> Self {
        match self {
            ClipDuration::Beats(_) => ClipDuration::Beats(beats),
            ClipDuration::Sequence(values) => {
                let mut values = values.clone();
                match values.first_mut() {
                    Some(first) => *first = beats,
                    None => values.push(beats),
                }
                ClipDuration::Sequence(values)
            }
        }
    }

    /// Length must be finite and positive; payload values must be finite
    pub fn validate(&self) -> Result<()> {
        let beats = self.beats();
        if !beats.is_finite() || beats <= 0.0 {
            return Err(EditorError::OutOfRange {
                what: "duration",
                value: beats,
            });
        }
        if let ClipDuration::Sequence(values) = self {
            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(EditorError::OutOfRange {
                    what: "duration",
                    value: *bad,
                });
            }
        }
        Ok(())
    }
}

impl From<f64> for ClipDuration {
    fn from(beats: f64) -> Self {
        ClipDuration::Beats(beats)
    }
}

/// Where a clip sits: beat position and track index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub beats: f64,
    pub track: usize,
}

impl Placement {
    pub fn new(beats: f64, track: usize) -> Self {
        Self { beats, track }
    }
}

/// A placed gesture
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Attack time in beats, never negative
    beat_position: f64,
    /// Track lane index
    track: usize,
    /// Duration
    duration: ClipDuration,
    /// Opaque gesture parameters
    params: ParamMap,
    /// Display name
    name: String,
    /// Display colour
    color: Rgb,
}

impl Clip {
    /// Create a clip with the default colour and no parameters.
    ///
    /// Negative beat positions are clamped to 0.
    pub fn new(
        beat_position: f64,
        track: usize,
        duration: impl Into<ClipDuration>,
        name: impl Into<String>,
    ) -> Result<Self> {
        if !beat_position.is_finite() {
            return Err(EditorError::OutOfRange {
                what: "beat position",
                value: beat_position,
            });
        }
        let duration = duration.into();
        duration.validate()?;
        let beat_position = if beat_position < 0.0 {
            warn!(beat_position, "negative beat position clamped to 0");
            0.0
        } else {
            beat_position
        };
        Ok(Self {
            beat_position,
            track,
            duration,
            params: ParamMap::new(),
            name: name.into(),
            color: Rgb::default(),
        })
    }

    /// Set parameters
    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.params = params;
        self
    }

    /// Set colour
    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn beat_position(&self) -> f64 {
        self.beat_position
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn placement(&self) -> Placement {
        Placement::new(self.beat_position, self.track)
    }

    pub fn duration(&self) -> &ClipDuration {
        &self.duration
    }

    /// Authoritative duration in beats
    pub fn duration_beats(&self) -> f64 {
        self.duration.beats()
    }

    /// Beat at which the clip ends
    pub fn end_beats(&self) -> f64 {
        self.beat_position + self.duration.beats()
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Check every field against the clip invariants (track range aside)
    pub fn validate(&self) -> Result<()> {
        if !self.beat_position.is_finite() || self.beat_position < 0.0 {
            return Err(EditorError::OutOfRange {
                what: "beat position",
                value: self.beat_position,
            });
        }
        if self.name.trim().is_empty() {
            return Err(EditorError::MalformedData(
                "clip name must not be empty".to_string(),
            ));
        }
        self.duration.validate()?;
        self.params.validate()
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.beat_position = placement.beats;
        self.track = placement.track;
    }

    pub(crate) fn set_track(&mut self, track: usize) {
        self.track = track;
    }

    pub(crate) fn set_duration(&mut self, duration: ClipDuration) {
        self.duration = duration;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    pub(crate) fn set_params(&mut self, params: ParamMap) {
        self.params = params;
    }
}
