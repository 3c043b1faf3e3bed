// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timeline document.
//!
//! The document owns every piece of per-document state: the clip arena,
//! the tracks, the coordinate model, the edit history, the selection and
//! the presentation cache of [`ClipView`]s. All edits go through it.
//!
//! Clip edits are recorded as [`EditCommand`]s and can be undone. Structural
//! edits (zoom, track height, track insert/delete/move) are not undoable;
//! they recompute every view from logical state, retarget the history and
//! publish a fresh [`ViewLayout`] to subscribers before returning.

pub mod selection;

pub use selection::Selection;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info, warn};

use crate::clip::{Clip, ClipDuration, ClipId, ClipStore, ParamMap, Placement, Rgb};
use crate::config::score::{ClipRecord, ScoreFile};
use crate::coords::{CoordinateModel, DEFAULT_PIXELS_PER_BEAT};
use crate::error::{EditorError, Result};
use crate::history::{
    ClipMove, ClipRename, ClipResize, CommandHistory, EditCommand, EditTarget, HistoryEvent,
};
use crate::tracks::{TrackRemap, TrackSet, DEFAULT_TRACK_HEIGHT};

/// Clip rectangles fill this share of the track height
pub const CLIP_HEIGHT_RATIO: f64 = 0.8;

/// Content width at zoom 1.0 when the clips end earlier
pub const MIN_CONTENT_WIDTH: f64 = 2000.0;

/// Room left after the last clip, as a factor of its end position
pub const CONTENT_WIDTH_MARGIN: f64 = 1.2;

/// Name given to clips added from the timeline
pub const NEW_CLIP_NAME: &str = "New Clip";

/// Name given to loaded clips that carry none
pub const LOADED_CLIP_NAME: &str = "Clip";

/// Duration of clips added from the timeline, in beats
pub const NEW_CLIP_DURATION: f64 = 3.0;

/// Track count of a new document
pub const DEFAULT_TRACK_COUNT: usize = 8;

/// On-screen rectangle of one clip, derived from its logical state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipView {
    pub clip: ClipId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub selected: bool,
}

impl ClipView {
    /// True if the point lies inside the rectangle
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// True if the rectangle overlaps the given one
    pub fn intersects(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        self.x < right && self.x + self.width > left && self.y < bottom && self.y + self.height > top
    }
}

/// Geometry published to dependent displays after a structural rebuild
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewLayout {
    pub track_count: usize,
    pub track_height: f64,
    pub zoom_level: f64,
    pub content_width: f64,
    pub content_height: f64,
}

/// Starting parameters for a document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    pub track_count: usize,
    pub track_height: f64,
    pub pixels_per_beat: f64,
    /// Duration of clips added from the timeline
    pub default_duration: f64,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            track_count: DEFAULT_TRACK_COUNT,
            track_height: DEFAULT_TRACK_HEIGHT,
            pixels_per_beat: DEFAULT_PIXELS_PER_BEAT,
            default_duration: NEW_CLIP_DURATION,
        }
    }
}

/// Field changes committed from a clip parameter form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamEdit {
    pub name: Option<String>,
    pub color: Option<Rgb>,
    pub beat_position: Option<f64>,
    pub duration: Option<ClipDuration>,
    pub params: Option<ParamMap>,
}

impl ParamEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn beat_position(mut self, beats: f64) -> Self {
        self.beat_position = Some(beats);
        self
    }

    pub fn duration(mut self, duration: impl Into<ClipDuration>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn params(mut self, params: ParamMap) -> Self {
        self.params = Some(params);
        self
    }
}

/// One open timeline
#[derive(Debug)]
pub struct Document {
    clips: ClipStore,
    tracks: TrackSet,
    coords: CoordinateModel,
    history: CommandHistory,
    selection: Selection,
    /// Presentation cache in clip id order
    views: Vec<ClipView>,
    /// Bumped on every structural rebuild
    generation: u64,
    layout_listeners: Vec<Sender<ViewLayout>>,
    path: Option<PathBuf>,
    dirty: bool,
    default_duration: f64,
}

impl Default for Document {
    fn default() -> Self {
        Self::with_tracks(DEFAULT_TRACK_COUNT)
    }
}

impl Document {
    /// Create an empty document
    pub fn new(options: DocumentOptions) -> Result<Self> {
        if !options.default_duration.is_finite() || options.default_duration <= 0.0 {
            return Err(EditorError::OutOfRange {
                what: "default duration",
                value: options.default_duration,
            });
        }
        Ok(Self {
            clips: ClipStore::new(),
            tracks: TrackSet::with_height(options.track_count, options.track_height)?,
            coords: CoordinateModel::new(options.pixels_per_beat)?,
            history: CommandHistory::new(),
            selection: Selection::new(),
            views: Vec::new(),
            generation: 0,
            layout_listeners: Vec::new(),
            path: None,
            dirty: false,
            default_duration: options.default_duration,
        })
    }

    /// Empty document with `count` tracks and default geometry
    pub fn with_tracks(count: usize) -> Self {
        Self {
            clips: ClipStore::new(),
            tracks: TrackSet::new(count),
            coords: CoordinateModel::default(),
            history: CommandHistory::new(),
            selection: Selection::new(),
            views: Vec::new(),
            generation: 0,
            layout_listeners: Vec::new(),
            path: None,
            dirty: false,
            default_duration: NEW_CLIP_DURATION,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn clips(&self) -> &ClipStore {
        &self.clips
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(id)
    }

    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    pub fn coords(&self) -> &CoordinateModel {
        &self.coords
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Receive a [`HistoryEvent`] after every history change
    pub fn subscribe_history(&mut self) -> Receiver<HistoryEvent> {
        self.history.subscribe()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_selected(&self, id: ClipId) -> bool {
        self.selection.contains(id)
    }

    /// Current presentation of every clip
    pub fn views(&self) -> &[ClipView] {
        &self.views
    }

    pub fn view(&self, id: ClipId) -> Option<&ClipView> {
        self.views.iter().find(|v| v.clip == id)
    }

    /// Number of structural rebuilds so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// True when there are changes since the last load or save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn default_duration(&self) -> f64 {
        self.default_duration
    }

    /// Change the duration given to clips added with [`Document::add_clip_at`]
    pub fn set_default_duration(&mut self, beats: f64) -> Result<()> {
        if !beats.is_finite() || beats <= 0.0 {
            return Err(EditorError::OutOfRange {
                what: "default duration",
                value: beats,
            });
        }
        self.default_duration = beats;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Current layout tuple
    pub fn layout(&self) -> ViewLayout {
        let zoom = self.coords.zoom_level();
        let clip_end = self.coords.beats_to_pixels_x(self.clips.max_end_beats());
        ViewLayout {
            track_count: self.tracks.count(),
            track_height: self.tracks.track_height(),
            zoom_level: zoom,
            content_width: (MIN_CONTENT_WIDTH * zoom).max(clip_end * CONTENT_WIDTH_MARGIN),
            content_height: self.tracks.content_height(),
        }
    }

    /// Receive a [`ViewLayout`] after every structural rebuild
    pub fn subscribe_layout(&mut self) -> Receiver<ViewLayout> {
        let (tx, rx) = mpsc::channel();
        self.layout_listeners.push(tx);
        rx
    }

    fn view_of(&self, id: ClipId, clip: &Clip) -> ClipView {
        let track_height = self.tracks.track_height();
        let height = track_height * CLIP_HEIGHT_RATIO;
        ClipView {
            clip: id,
            x: self.coords.beats_to_pixels_x(clip.beat_position()),
            y: self.tracks.track_to_y(clip.track()) + (track_height - height) / 2.0,
            width: self.coords.beats_to_pixels_x(clip.duration_beats()),
            height,
            selected: self.selection.contains(id),
        }
    }

    /// Recompute every view from logical clip state
    fn sync_views(&mut self) {
        let views: Vec<ClipView> = self
            .clips
            .iter()
            .map(|(id, clip)| self.view_of(id, clip))
            .collect();
        self.views = views;
    }

    fn sync_selection_flags(&mut self) {
        for view in &mut self.views {
            view.selected = self.selection.contains(view.clip);
        }
    }

    /// Recreate the presentation and publish the new layout
    fn rebuild(&mut self) {
        self.sync_views();
        self.generation += 1;
        let layout = self.layout();
        debug!(
            generation = self.generation,
            zoom = layout.zoom_level,
            track_height = layout.track_height,
            tracks = layout.track_count,
            "structural rebuild"
        );
        self.layout_listeners.retain(|tx| tx.send(layout).is_ok());
    }

    fn edited(&mut self) {
        self.sync_views();
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    /// Place a new clip.
    ///
    /// Fails with `OutOfRange` when `track` does not exist or the duration
    /// is not a positive finite number. Negative beats are clamped to 0.
    pub fn place(
        &mut self,
        beats: f64,
        track: usize,
        duration: impl Into<ClipDuration>,
        name: impl Into<String>,
        params: ParamMap,
    ) -> Result<ClipId> {
        self.check_placement_track(track)?;
        params.validate()?;
        let clip = Clip::new(beats, track, duration, name)?.with_params(params);
        self.insert_clip(clip)
    }

    /// Place a fully built clip
    pub fn place_clip(&mut self, clip: Clip) -> Result<ClipId> {
        self.check_placement_track(clip.track())?;
        clip.validate()?;
        self.insert_clip(clip)
    }

    /// Add a default gesture at a pixel position.
    ///
    /// The position is snapped; the track is the lane under `px_y`.
    pub fn add_clip_at(&mut self, px_x: f64, px_y: f64) -> Result<ClipId> {
        let track = self
            .tracks
            .y_to_track(px_y)
            .ok_or(EditorError::InvalidTrack {
                index: 0,
                count: self.tracks.count(),
            })?;
        let beats = self.coords.pixels_x_to_beats(self.coords.snap(px_x));
        self.place(
            beats,
            track,
            self.default_duration,
            NEW_CLIP_NAME,
            ParamMap::gesture_defaults(),
        )
    }

    fn check_placement_track(&self, track: usize) -> Result<()> {
        if self.tracks.contains(track) {
            Ok(())
        } else {
            Err(EditorError::OutOfRange {
                what: "track index",
                value: track as f64,
            })
        }
    }

    fn insert_clip(&mut self, clip: Clip) -> Result<ClipId> {
        let id = self.clips.insert(clip);
        self.edited();
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Undoable clip edits
    // ------------------------------------------------------------------

    fn execute(&mut self, cmd: EditCommand) -> Result<()> {
        let mut target = EditTarget::new(&mut self.clips, self.tracks.count());
        self.history.execute(cmd, &mut target)?;
        self.edited();
        Ok(())
    }

    /// Revert the last clip edit; false when there was none
    pub fn undo(&mut self) -> Result<bool> {
        let mut target = EditTarget::new(&mut self.clips, self.tracks.count());
        let undone = self.history.undo(&mut target)?;
        if undone {
            self.edited();
        }
        Ok(undone)
    }

    /// Reapply the last undone clip edit; false when there was none
    pub fn redo(&mut self) -> Result<bool> {
        let mut target = EditTarget::new(&mut self.clips, self.tracks.count());
        let redone = self.history.redo(&mut target)?;
        if redone {
            self.edited();
        }
        Ok(redone)
    }

    /// Drag `id` to a pixel position.
    ///
    /// X is snapped and the track is the lane under `px_y`. When `id` is
    /// selected every other selected clip gets the same pixel and track
    /// delta. If any clip of the group would end up before beat 0 the
    /// whole group moves vertically only. Returns false if nothing moved.
    pub fn move_to(&mut self, id: ClipId, px_x: f64, px_y: f64) -> Result<bool> {
        let anchor = self.clips.require(id)?.placement();
        let Some(target_track) = self.tracks.y_to_track(px_y) else {
            return Err(EditorError::InvalidTrack {
                index: anchor.track,
                count: self.tracks.count(),
            });
        };

        let anchor_x = self.coords.beats_to_pixels_x(anchor.beats);
        let dx = self.coords.snap(px_x) - anchor_x;
        let dtrack = target_track as i64 - anchor.track as i64;
        let last_track = self.tracks.count() as i64 - 1;

        let group: Vec<ClipId> = if self.selection.contains(id) {
            self.selection.iter().collect()
        } else {
            vec![id]
        };

        let mut vertical_only = px_x < 0.0;
        let mut planned = Vec::with_capacity(group.len());
        for member in group {
            let before = self.clips.require(member)?.placement();
            let (new_x, new_track) = if member == id {
                (anchor_x + dx, target_track)
            } else {
                let x = self.coords.beats_to_pixels_x(before.beats) + dx;
                let track = (before.track as i64 + dtrack).clamp(0, last_track) as usize;
                (x, track)
            };
            if new_x < 0.0 {
                vertical_only = true;
            }
            planned.push((member, before, new_x, new_track));
        }

        if vertical_only {
            debug!(clip = %id, "group move would cross beat 0, moving vertically only");
        }

        let moves: Vec<ClipMove> = planned
            .into_iter()
            .map(|(clip, before, new_x, track)| {
                let beats = if vertical_only {
                    before.beats
                } else {
                    self.coords.pixels_x_to_beats(new_x).max(0.0)
                };
                ClipMove {
                    clip,
                    before,
                    after: Placement::new(beats, track),
                }
            })
            .filter(|m| m.before != m.after)
            .collect();

        if moves.is_empty() {
            return Ok(false);
        }
        self.execute(EditCommand::Move { moves })?;
        Ok(true)
    }

    /// Place `id` exactly at `beats` on `track`, without snapping
    pub fn set_position(&mut self, id: ClipId, beats: f64, track: usize) -> Result<bool> {
        let before = self.clips.require(id)?.placement();
        self.check_placement_track(track)?;
        if !beats.is_finite() {
            return Err(EditorError::OutOfRange {
                what: "beat position",
                value: beats,
            });
        }
        let beats = if beats < 0.0 {
            warn!(beats, "negative beat position clamped to 0");
            0.0
        } else {
            beats
        };
        let cmd = EditCommand::SetPosition(ClipMove {
            clip: id,
            before,
            after: Placement::new(beats, track),
        });
        if cmd.is_noop() {
            return Ok(false);
        }
        self.execute(cmd)?;
        Ok(true)
    }

    /// Scale the on-screen width of `id` by `scale`
    pub fn resize_by_factor(&mut self, id: ClipId, scale: f64) -> Result<bool> {
        self.resize_clips(&[id], scale).map(|n| n > 0)
    }

    /// Scale the width of every selected clip; returns how many changed
    pub fn resize_selected(&mut self, scale: f64) -> Result<usize> {
        let ids = self.selection.to_vec();
        self.resize_clips(&ids, scale)
    }

    fn resize_clips(&mut self, ids: &[ClipId], scale: f64) -> Result<usize> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EditorError::InvariantViolation(format!(
                "resize factor must be finite and positive, got {}",
                scale
            )));
        }
        let mut resizes = Vec::with_capacity(ids.len());
        for &id in ids {
            let before = self.clips.require(id)?.duration().clone();
            let new_width = self.coords.beats_to_pixels_x(before.beats()) * scale;
            let beats = self.coords.width_to_duration(new_width);
            if beats <= 0.0 {
                return Err(EditorError::OutOfRange {
                    what: "duration",
                    value: beats,
                });
            }
            let after = before.with_beats(beats);
            if after != before {
                resizes.push(ClipResize {
                    clip: id,
                    before,
                    after,
                });
            }
        }
        let changed = resizes.len();
        if changed > 0 {
            self.execute(EditCommand::Resize { resizes })?;
        }
        Ok(changed)
    }

    /// Commit a parameter form for `id` as one command.
    ///
    /// Returns false when the form changed nothing.
    pub fn apply_param_edit(&mut self, id: ClipId, edit: ParamEdit) -> Result<bool> {
        let before = self.clips.require(id)?.clone();
        let mut after = before.clone();
        if let Some(name) = edit.name {
            after.set_name(name);
        }
        if let Some(color) = edit.color {
            after.set_color(color);
        }
        if let Some(beats) = edit.beat_position {
            if !beats.is_finite() {
                return Err(EditorError::OutOfRange {
                    what: "beat position",
                    value: beats,
                });
            }
            after.set_placement(Placement::new(beats.max(0.0), before.track()));
        }
        if let Some(duration) = edit.duration {
            after.set_duration(duration);
        }
        if let Some(params) = edit.params {
            after.set_params(params);
        }
        after.validate()?;
        let cmd = EditCommand::EditParams {
            clip: id,
            before: Box::new(before),
            after: Box::new(after),
        };
        if cmd.is_noop() {
            return Ok(false);
        }
        self.execute(cmd)?;
        Ok(true)
    }

    /// Rename every selected clip; returns how many changed
    pub fn rename_selected(&mut self, name: &str) -> Result<usize> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditorError::InvalidInput(
                "clip name must not be empty".to_string(),
            ));
        }
        let mut renames = Vec::new();
        for id in self.selection.iter() {
            let clip = self.clips.require(id)?;
            if clip.name() != name {
                renames.push(ClipRename {
                    clip: id,
                    before: clip.name().to_string(),
                    after: name.to_string(),
                });
            }
        }
        let changed = renames.len();
        if changed > 0 {
            self.execute(EditCommand::Rename { renames })?;
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Non-undoable clip edits
    // ------------------------------------------------------------------

    /// Copy every selected clip to start where the original ends.
    ///
    /// The selection moves to the copies.
    pub fn duplicate_selected(&mut self) -> Result<Vec<ClipId>> {
        let mut copies = Vec::with_capacity(self.selection.len());
        for id in self.selection.to_vec() {
            let original = self.clips.require(id)?;
            let mut copy = original.clone();
            copy.set_placement(Placement::new(original.end_beats(), original.track()));
            copies.push(copy);
        }
        let ids: Vec<ClipId> = copies.into_iter().map(|c| self.clips.insert(c)).collect();
        self.selection.replace(ids.iter().copied());
        self.edited();
        Ok(ids)
    }

    /// Remove every selected clip; returns how many were removed
    pub fn delete_selected(&mut self) -> usize {
        let removed: BTreeSet<ClipId> = self.selection.iter().collect();
        for id in &removed {
            self.clips.remove(*id);
        }
        self.history.purge(&removed);
        self.selection.clear();
        if !removed.is_empty() {
            self.edited();
        }
        removed.len()
    }

    /// Remove every clip and forget the history
    pub fn clear(&mut self) {
        self.clips.clear();
        self.selection.clear();
        self.history.clear();
        self.dirty = true;
        self.rebuild();
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Make `id` the only selected clip
    pub fn select(&mut self, id: ClipId) -> Result<()> {
        self.clips.require(id)?;
        self.selection.replace([id]);
        self.sync_selection_flags();
        Ok(())
    }

    /// Add or remove `id`; returns true when it is now selected
    pub fn toggle_select(&mut self, id: ClipId) -> Result<bool> {
        self.clips.require(id)?;
        let selected = self.selection.toggle(id);
        self.sync_selection_flags();
        Ok(selected)
    }

    pub fn select_all(&mut self) {
        self.selection.replace(self.clips.ids());
        self.sync_selection_flags();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.sync_selection_flags();
    }

    /// Select the clips overlapping a pixel rectangle; returns the count
    pub fn select_in_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> usize {
        let hits: Vec<ClipId> = self
            .views
            .iter()
            .filter(|v| v.intersects(x0, y0, x1, y1))
            .map(|v| v.clip)
            .collect();
        let count = hits.len();
        self.selection.replace(hits);
        self.sync_selection_flags();
        count
    }

    /// Topmost clip under a pixel position
    pub fn clip_at(&self, px_x: f64, px_y: f64) -> Option<ClipId> {
        self.views
            .iter()
            .rev()
            .find(|v| v.contains(px_x, px_y))
            .map(|v| v.clip)
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    /// Multiply the zoom level; returns the new zoom level
    pub fn set_zoom(&mut self, factor: f64) -> Result<f64> {
        let applied = self.coords.rescale(factor)?;
        if applied != factor {
            warn!(requested = factor, applied, "zoom clamped");
        }
        if applied != 1.0 {
            self.rebuild();
        }
        Ok(self.coords.zoom_level())
    }

    /// Multiply the track height; returns false when it did not change
    pub fn set_track_height(&mut self, factor: f64) -> Result<bool> {
        let changed = self.tracks.scale_height(factor)?;
        if changed {
            self.rebuild();
        }
        Ok(changed)
    }

    /// Append a track; returns its index
    pub fn add_track(&mut self) -> usize {
        let index = self.tracks.add_track();
        self.dirty = true;
        self.rebuild();
        index
    }

    /// Insert a track at `at`, shifting clips on later tracks down
    pub fn insert_track(&mut self, at: usize) -> Result<()> {
        let remap = self.tracks.insert_track(at)?;
        self.apply_remap(&remap);
        Ok(())
    }

    /// Delete track `k` and the clips on it; returns how many clips were
    /// discarded
    pub fn delete_track(&mut self, k: usize) -> Result<usize> {
        let remap = self.tracks.delete_track(k)?;
        let discarded = self.apply_remap(&remap);
        if !discarded.is_empty() {
            info!(track = k, clips = discarded.len(), "clips discarded with deleted track");
        }
        Ok(discarded.len())
    }

    /// Swap track `k` with its neighbour; returns false when there is none
    pub fn move_track(&mut self, k: usize, direction: i32) -> Result<bool> {
        match self.tracks.move_track(k, direction)? {
            Some(remap) => {
                self.apply_remap(&remap);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn rename_track(&mut self, k: usize, name: impl Into<String>) -> Result<()> {
        self.tracks.rename(k, name)?;
        self.dirty = true;
        Ok(())
    }

    fn apply_remap(&mut self, remap: &TrackRemap) -> BTreeSet<ClipId> {
        let discarded = self.clips.remap_tracks(remap);
        self.selection.forget(&discarded);
        self.history.retarget(remap, &discarded);
        self.dirty = true;
        self.rebuild();
        discarded
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Replace the clips with the contents of a score.
    ///
    /// Clips go to their `traccia` when it exists, otherwise to track
    /// `i mod track_count`. Nothing changes if any clip is invalid.
    pub fn load_score(&mut self, score: &ScoreFile) -> Result<()> {
        let count = self.tracks.count();
        if count == 0 && !score.clips.is_empty() {
            return Err(EditorError::MalformedData(
                "cannot load clips into a document without tracks".to_string(),
            ));
        }
        let mut clips = ClipStore::new();
        for (i, record) in score.clips.iter().enumerate() {
            let track = match record.track {
                Some(t) if t < count => t,
                Some(t) => {
                    warn!(clip = i, track = t, "track out of range, assigning by position");
                    i % count
                }
                None => i % count,
            };
            let name = record.name.clone().unwrap_or_else(|| LOADED_CLIP_NAME.to_string());
            let clip = Clip::new(record.attack, track, record.duration.clone(), name)?
                .with_params(record.params.clone())
                .with_color(record.color.unwrap_or_default());
            clip.validate()?;
            clips.insert(clip);
        }
        self.clips = clips;
        self.selection.clear();
        self.history.clear();
        self.dirty = false;
        self.rebuild();
        Ok(())
    }

    /// Snapshot the clips as a score, in clip creation order
    pub fn to_score(&self) -> ScoreFile {
        let clips = self
            .clips
            .iter()
            .map(|(_, clip)| ClipRecord {
                attack: clip.beat_position(),
                duration: clip.duration().clone(),
                name: Some(clip.name().to_string()),
                color: Some(clip.color()),
                track: Some(clip.track()),
                params: clip.params().clone(),
            })
            .collect();
        ScoreFile { clips }
    }

    /// Load a score file into this document and remember its path
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let score = ScoreFile::load(path.as_ref())?;
        self.load_score(&score)?;
        self.path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    /// Save to `path`, or to the remembered path when `None`
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path.or(self.path.as_deref()) {
            Some(p) => p.to_path_buf(),
            None => {
                return Err(EditorError::InvalidInput(
                    "document has no file path".to_string(),
                ))
            }
        };
        self.to_score().save(&path)?;
        self.path = Some(path.clone());
        self.dirty = false;
        Ok(path)
    }
}
