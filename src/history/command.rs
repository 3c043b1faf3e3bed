// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Reversible clip edits.
//!
//! Every command stores immutable logical before/after values and the ids
//! of its target clips. Applying or reverting writes those values back
//! verbatim, so an undo restores the prior state exactly no matter how
//! often the view was rezoomed in between.

use std::collections::BTreeSet;

use crate::clip::{Clip, ClipDuration, ClipId, ClipStore, Placement};
use crate::error::{EditorError, Result};
use crate::tracks::TrackRemap;

/// What a command writes into
pub struct EditTarget<'a> {
    /// Clip arena of the document
    pub clips: &'a mut ClipStore,
    /// Number of tracks the placements must fit into
    pub track_count: usize,
}

impl<'a> EditTarget<'a> {
    pub fn new(clips: &'a mut ClipStore, track_count: usize) -> Self {
        Self { clips, track_count }
    }

    fn check_clip(&self, id: ClipId) -> Result<()> {
        self.clips.require(id).map(|_| ())
    }

    fn check_track(&self, track: usize) -> Result<()> {
        if track < self.track_count {
            Ok(())
        } else {
            Err(EditorError::InvalidTrack {
                index: track,
                count: self.track_count,
            })
        }
    }
}

/// Placement change of one clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipMove {
    pub clip: ClipId,
    pub before: Placement,
    pub after: Placement,
}

/// Duration change of one clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipResize {
    pub clip: ClipId,
    pub before: ClipDuration,
    pub after: ClipDuration,
}

/// Name change of one clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRename {
    pub clip: ClipId,
    pub before: String,
    pub after: String,
}

/// One undoable edit
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Snapped drag of one clip or a selection group
    Move { moves: Vec<ClipMove> },
    /// Duration change of one or more clips
    Resize { resizes: Vec<ClipResize> },
    /// Exact placement of a single clip
    SetPosition(ClipMove),
    /// Whole-clip edit committed from a parameter form
    EditParams {
        clip: ClipId,
        before: Box<Clip>,
        after: Box<Clip>,
    },
    /// Name change of one or more clips
    Rename { renames: Vec<ClipRename> },
}

impl EditCommand {
    /// Short human readable name
    pub fn label(&self) -> &'static str {
        match self {
            EditCommand::Move { .. } => "Move",
            EditCommand::Resize { .. } => "Resize",
            EditCommand::SetPosition(_) => "Set position",
            EditCommand::EditParams { .. } => "Edit parameters",
            EditCommand::Rename { .. } => "Rename",
        }
    }

    /// Ids of every clip the command writes
    pub fn targets(&self) -> Vec<ClipId> {
        match self {
            EditCommand::Move { moves } => moves.iter().map(|m| m.clip).collect(),
            EditCommand::Resize { resizes } => resizes.iter().map(|r| r.clip).collect(),
            EditCommand::SetPosition(m) => vec![m.clip],
            EditCommand::EditParams { clip, .. } => vec![*clip],
            EditCommand::Rename { renames } => renames.iter().map(|r| r.clip).collect(),
        }
    }

    /// True when applying the command would change nothing
    pub fn is_noop(&self) -> bool {
        match self {
            EditCommand::Move { moves } => moves.iter().all(|m| m.before == m.after),
            EditCommand::Resize { resizes } => resizes.iter().all(|r| r.before == r.after),
            EditCommand::SetPosition(m) => m.before == m.after,
            EditCommand::EditParams { before, after, .. } => before == after,
            EditCommand::Rename { renames } => renames.iter().all(|r| r.before == r.after),
        }
    }

    /// Write the after-state
    pub fn apply(&self, target: &mut EditTarget<'_>) -> Result<()> {
        self.write(target, true)
    }

    /// Write the before-state
    pub fn revert(&self, target: &mut EditTarget<'_>) -> Result<()> {
        self.write(target, false)
    }

    /// True if any target is in `clips`
    pub fn references_any(&self, clips: &BTreeSet<ClipId>) -> bool {
        self.targets().iter().any(|id| clips.contains(id))
    }

    /// Rewrite stored track indices through `remap`.
    ///
    /// Returns false when a snapshot refers to a track that no longer
    /// exists; the command is then left partially rewritten and must be
    /// dropped by the caller.
    pub(crate) fn remap_tracks(&mut self, remap: &TrackRemap) -> bool {
        match self {
            EditCommand::Move { moves } => moves.iter_mut().all(|m| remap_move(m, remap)),
            EditCommand::SetPosition(m) => remap_move(m, remap),
            EditCommand::EditParams { before, after, .. } => {
                remap_clip(before, remap) && remap_clip(after, remap)
            }
            EditCommand::Resize { .. } | EditCommand::Rename { .. } => true,
        }
    }

    fn write(&self, target: &mut EditTarget<'_>, forward: bool) -> Result<()> {
        // Validate everything first so a failure leaves the store untouched
        for id in self.targets() {
            target.check_clip(id)?;
        }
        match self {
            EditCommand::Move { moves } => {
                for m in moves {
                    target.check_track(pick(&m.before, &m.after, forward).track)?;
                }
            }
            EditCommand::SetPosition(m) => {
                target.check_track(pick(&m.before, &m.after, forward).track)?;
            }
            EditCommand::EditParams { before, after, .. } => {
                let clip = pick(before, after, forward);
                target.check_track(clip.track())?;
                clip.validate()?;
            }
            EditCommand::Resize { resizes } => {
                for r in resizes {
                    pick(&r.before, &r.after, forward).validate()?;
                }
            }
            EditCommand::Rename { .. } => {}
        }

        match self {
            EditCommand::Move { moves } => {
                for m in moves {
                    let placement = *pick(&m.before, &m.after, forward);
                    target.clips.require_mut(m.clip)?.set_placement(placement);
                }
            }
            EditCommand::SetPosition(m) => {
                let placement = *pick(&m.before, &m.after, forward);
                target.clips.require_mut(m.clip)?.set_placement(placement);
            }
            EditCommand::EditParams { clip, before, after } => {
                let state = Clip::clone(pick(before, after, forward));
                *target.clips.require_mut(*clip)? = state;
            }
            EditCommand::Resize { resizes } => {
                for r in resizes {
                    let duration = pick(&r.before, &r.after, forward).clone();
                    target.clips.require_mut(r.clip)?.set_duration(duration);
                }
            }
            EditCommand::Rename { renames } => {
                for r in renames {
                    let name = pick(&r.before, &r.after, forward).clone();
                    target.clips.require_mut(r.clip)?.set_name(name);
                }
            }
        }
        Ok(())
    }
}

fn pick<'a, T>(before: &'a T, after: &'a T, forward: bool) -> &'a T {
    if forward {
        after
    } else {
        before
    }
}

fn remap_move(m: &mut ClipMove, remap: &TrackRemap) -> bool {
    match (remap.map(m.before.track), remap.map(m.after.track)) {
        (Some(before), Some(after)) => {
            m.before.track = before;
            m.after.track = after;
            true
        }
        _ => false,
    }
}

fn remap_clip(clip: &mut Clip, remap: &TrackRemap) -> bool {
    match remap.map(clip.track()) {
        Some(track) => {
            clip.set_track(track);
            true
        }
        None => false,
    }
}
