// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! DPT - timeline editor core.
//!
//! Clips are placed on a beat/track grid, edited through undoable
//! commands and saved as YAML scores. The [`document::Document`] owns the
//! clip arena, the tracks, the coordinate model and the command history;
//! the [`ui`] module drives it from a terminal.

pub mod clip;
pub mod config;
pub mod coords;
pub mod document;
pub mod error;
pub mod history;
pub mod tracks;
pub mod ui;

pub use clip::{Clip, ClipDuration, ClipId, ClipStore, ParamMap, ParamValue, Placement, Rgb};
pub use config::{ScoreFile, Settings};
pub use coords::CoordinateModel;
pub use document::{ClipView, Document, DocumentOptions, ParamEdit, ViewLayout};
pub use error::{EditorError, Result};
pub use history::{CommandHistory, EditCommand, HistoryEvent, HistoryState};
pub use tracks::{TrackRemap, TrackSet};
