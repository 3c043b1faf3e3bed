// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Id-addressed clip storage.

use std::collections::{BTreeMap, BTreeSet};

use super::{Clip, ClipId};
use crate::error::{EditorError, Result};
use crate::tracks::TrackRemap;

/// Arena of clips keyed by stable ids.
///
/// Ids are never reused within a store, so a stale id can only miss.
#[derive(Debug, Clone, Default)]
pub struct ClipStore {
    clips: BTreeMap<ClipId, Clip>,
    next_id: u64,
}

impl ClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a clip and return its new id
    pub fn insert(&mut self, clip: Clip) -> ClipId {
        let id = ClipId(self.next_id);
        self.next_id += 1;
        self.clips.insert(id, clip);
        id
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(&id)
    }

    /// Get a clip or fail with `UnknownClip`
    pub fn require(&self, id: ClipId) -> Result<&Clip> {
        self.clips.get(&id).ok_or(EditorError::UnknownClip(id))
    }

    pub(crate) fn require_mut(&mut self, id: ClipId) -> Result<&mut Clip> {
        self.clips.get_mut(&id).ok_or(EditorError::UnknownClip(id))
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.clips.contains_key(&id)
    }

    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        self.clips.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Remove every clip. Ids keep counting up.
    pub fn clear(&mut self) {
        self.clips.clear();
    }

    /// Clips in id (creation) order
    pub fn iter(&self) -> impl Iterator<Item = (ClipId, &Clip)> {
        self.clips.iter().map(|(id, clip)| (*id, clip))
    }

    pub fn ids(&self) -> impl Iterator<Item = ClipId> + '_ {
        self.clips.keys().copied()
    }

    /// Ids of the clips on one track
    pub fn on_track(&self, track: usize) -> impl Iterator<Item = ClipId> + '_ {
        self.clips
            .iter()
            .filter(move |(_, clip)| clip.track() == track)
            .map(|(id, _)| *id)
    }

    /// Latest end time over all clips, 0 when empty
    pub fn max_end_beats(&self) -> f64 {
        self.clips
            .values()
            .map(Clip::end_beats)
            .fold(0.0, f64::max)
    }

    /// Renumber every clip's track through `remap`.
    ///
    /// Clips whose track no longer exists are removed; their ids are
    /// returned.
    pub fn remap_tracks(&mut self, remap: &TrackRemap) -> BTreeSet<ClipId> {
        let mut discarded = BTreeSet::new();
        for (id, clip) in self.clips.iter_mut() {
            match remap.map(clip.track()) {
                Some(track) => clip.set_track(track),
                None => {
                    discarded.insert(*id);
                }
            }
        }
        for id in &discarded {
            self.clips.remove(id);
        }
        discarded
    }
}
