// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Track lanes.
//!
//! Tracks share one pixel height. Structural edits return a [`TrackRemap`]
//! describing where every old track index went, which the document uses to
//! renumber clips and retarget the edit history.

use tracing::{debug, warn};

use crate::coords;
use crate::error::{EditorError, Result};

/// Smallest track height in pixels
pub const MIN_TRACK_HEIGHT: f64 = 20.0;

/// Largest track height in pixels
pub const MAX_TRACK_HEIGHT: f64 = 200.0;

/// Track height of a new document
pub const DEFAULT_TRACK_HEIGHT: f64 = 50.0;

/// Content height never drops below this
pub const MIN_VIEWPORT_HEIGHT: f64 = 400.0;

/// Mapping from old track indices to new ones after a structural edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRemap {
    /// `map[old]` is the new index, or `None` when the track was deleted
    map: Vec<Option<usize>>,
}

impl TrackRemap {
    /// Remap that leaves `count` tracks where they are
    pub fn identity(count: usize) -> Self {
        Self {
            map: (0..count).map(Some).collect(),
        }
    }

    /// New index of an old track, `None` if it no longer exists
    pub fn map(&self, old: usize) -> Option<usize> {
        self.map.get(old).copied().flatten()
    }

    /// True when no track changed index
    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, m)| *m == Some(i))
    }

    fn deleting(count: usize, k: usize) -> Self {
        Self {
            map: (0..count)
                .map(|i| match i.cmp(&k) {
                    std::cmp::Ordering::Less => Some(i),
                    std::cmp::Ordering::Equal => None,
                    std::cmp::Ordering::Greater => Some(i - 1),
                })
                .collect(),
        }
    }

    fn inserting(count: usize, at: usize) -> Self {
        Self {
            map: (0..count)
                .map(|i| if i < at { Some(i) } else { Some(i + 1) })
                .collect(),
        }
    }

    fn swapping(count: usize, a: usize, b: usize) -> Self {
        let mut remap = Self::identity(count);
        remap.map[a] = Some(b);
        remap.map[b] = Some(a);
        remap
    }
}

/// One track lane
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Display name
    pub name: String,
}

/// Ordered track lanes with a shared height
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSet {
    tracks: Vec<Track>,
    track_height: f64,
    /// Counter for default names
    created: usize,
}

impl Default for TrackSet {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TrackSet {
    /// Create `count` tracks at the default height
    pub fn new(count: usize) -> Self {
        let mut set = Self {
            tracks: Vec::with_capacity(count),
            track_height: DEFAULT_TRACK_HEIGHT,
            created: 0,
        };
        for _ in 0..count {
            set.add_track();
        }
        set
    }

    /// Create `count` tracks at a given height, clamped to the allowed range
    pub fn with_height(count: usize, track_height: f64) -> Result<Self> {
        if !track_height.is_finite() || track_height <= 0.0 {
            return Err(EditorError::OutOfRange {
                what: "track height",
                value: track_height,
            });
        }
        let mut set = Self::new(count);
        set.track_height = clamp_height(track_height);
        Ok(set)
    }

    pub fn count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_height(&self) -> f64 {
        self.track_height
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.tracks.get(index).map(|t| t.name.as_str())
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.tracks.len()
    }

    /// Total height of all lanes, floored at [`MIN_VIEWPORT_HEIGHT`]
    pub fn content_height(&self) -> f64 {
        (self.count() as f64 * self.track_height).max(MIN_VIEWPORT_HEIGHT)
    }

    pub fn track_to_y(&self, index: usize) -> f64 {
        coords::track_to_y(index, self.track_height)
    }

    /// Lane under a vertical position, clamped into range
    pub fn y_to_track(&self, y: f64) -> Option<usize> {
        coords::y_to_track(y, self.track_height, self.count())
    }

    /// Fail with `InvalidTrack` unless `index` exists
    pub fn check(&self, index: usize) -> Result<()> {
        if self.contains(index) {
            Ok(())
        } else {
            Err(EditorError::InvalidTrack {
                index,
                count: self.count(),
            })
        }
    }

    /// Append a track and return its index
    pub fn add_track(&mut self) -> usize {
        let track = self.next_track();
        self.tracks.push(track);
        self.count() - 1
    }

    /// Insert a track at `at`; tracks at or after it move down by one
    pub fn insert_track(&mut self, at: usize) -> Result<TrackRemap> {
        if at > self.count() {
            return Err(EditorError::InvalidTrack {
                index: at,
                count: self.count(),
            });
        }
        let remap = TrackRemap::inserting(self.count(), at);
        let track = self.next_track();
        self.tracks.insert(at, track);
        debug!(at, count = self.count(), "track inserted");
        Ok(remap)
    }

    /// Remove track `k`; tracks after it move up by one
    pub fn delete_track(&mut self, k: usize) -> Result<TrackRemap> {
        self.check(k)?;
        let remap = TrackRemap::deleting(self.count(), k);
        self.tracks.remove(k);
        debug!(k, count = self.count(), "track deleted");
        Ok(remap)
    }

    /// Swap track `k` with its neighbour in `direction` (-1 or +1).
    ///
    /// Returns `None` when the neighbour does not exist.
    pub fn move_track(&mut self, k: usize, direction: i32) -> Result<Option<TrackRemap>> {
        self.check(k)?;
        if direction != -1 && direction != 1 {
            return Err(EditorError::InvariantViolation(format!(
                "track move direction must be -1 or +1, got {}",
                direction
            )));
        }
        let dest = k as i64 + direction as i64;
        if dest < 0 || dest >= self.count() as i64 {
            return Ok(None);
        }
        let dest = dest as usize;
        self.tracks.swap(k, dest);
        Ok(Some(TrackRemap::swapping(self.count(), k, dest)))
    }

    /// Multiply the track height by `factor`, clamped to the allowed range.
    ///
    /// Returns false when the height did not change.
    pub fn scale_height(&mut self, factor: f64) -> Result<bool> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(EditorError::InvariantViolation(format!(
                "track height factor must be finite and positive, got {}",
                factor
            )));
        }
        let target = clamp_height(self.track_height * factor);
        if target == self.track_height {
            return Ok(false);
        }
        self.track_height = target;
        Ok(true)
    }

    /// Rename track `index`
    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.check(index)?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EditorError::InvalidInput(
                "track name must not be empty".to_string(),
            ));
        }
        self.tracks[index].name = name;
        Ok(())
    }

    fn next_track(&mut self) -> Track {
        self.created += 1;
        Track {
            name: format!("Track {}", self.created),
        }
    }
}

fn clamp_height(height: f64) -> f64 {
    let clamped = height.clamp(MIN_TRACK_HEIGHT, MAX_TRACK_HEIGHT);
    if clamped != height {
        warn!(requested = height, applied = clamped, "track height clamped");
    }
    clamped
}
