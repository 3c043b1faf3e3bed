// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Clip selection state.

use std::collections::BTreeSet;

use crate::clip::ClipId;

/// Set of selected clips, kept in id order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<ClipId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ClipId> + '_ {
        self.ids.iter().copied()
    }

    /// Selected ids as an owned list
    pub fn to_vec(&self) -> Vec<ClipId> {
        self.ids.iter().copied().collect()
    }

    pub fn insert(&mut self, id: ClipId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: ClipId) -> bool {
        self.ids.remove(&id)
    }

    /// Flip membership; returns true if `id` is now selected
    pub fn toggle(&mut self, id: ClipId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Replace the whole selection
    pub fn replace(&mut self, ids: impl IntoIterator<Item = ClipId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Forget ids that are in `removed`
    pub fn forget(&mut self, removed: &BTreeSet<ClipId>) {
        self.ids.retain(|id| !removed.contains(id));
    }
}
