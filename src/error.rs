// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the timeline core.

use thiserror::Error;

use crate::clip::ClipId;

/// Errors surfaced by the timeline core
#[derive(Debug, Error)]
pub enum EditorError {
    /// A bound was violated (track index on placement, duration, factors)
    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: f64 },

    /// A structural edit addressed a track that does not exist
    #[error("invalid track {index} (document has {count} tracks)")]
    InvalidTrack { index: usize, count: usize },

    /// A command or operation addressed a clip that no longer exists
    #[error("unknown clip {0}")]
    UnknownClip(ClipId),

    /// Persisted data does not have the expected shape
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// A value typed by the user was rejected
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A mutation would have broken an internal invariant and was refused
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
