// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bounded undo/redo history.
//!
//! Commands are applied through [`CommandHistory::execute`] and walked with
//! [`CommandHistory::undo`] / [`CommandHistory::redo`]. Both stacks hold at
//! most [`MAX_DEPTH`] commands and evict the oldest entry first.
//!
//! Commands address clips by stable id and store only logical values, so a
//! rezoom or track height change never invalidates them. Track insertion,
//! deletion and moves do renumber tracks; the document then calls
//! [`CommandHistory::retarget`] so stored track indices follow the edit.

pub mod command;

pub use command::{ClipMove, ClipRename, ClipResize, EditCommand, EditTarget};

use std::collections::{BTreeSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, warn};

use crate::clip::ClipId;
use crate::error::Result;
use crate::tracks::TrackRemap;

/// Maximum number of commands kept on each stack
pub const MAX_DEPTH: usize = 50;

/// What changed the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Execute,
    Undo,
    Redo,
    Clear,
    /// Commands were dropped after a structural edit
    Retarget,
}

/// Snapshot of the undo/redo affordances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_len: usize,
    pub redo_len: usize,
}

/// Notification sent to subscribers after every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub action: HistoryAction,
    /// Label of the command involved, if any
    pub label: Option<&'static str>,
    pub state: HistoryState,
}

/// Undo and redo stacks over [`EditCommand`]
#[derive(Debug)]
pub struct CommandHistory {
    undo: VecDeque<EditCommand>,
    redo: VecDeque<EditCommand>,
    max_depth: usize,
    listeners: Vec<Sender<HistoryEvent>>,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_DEPTH)
    }

    /// History with a custom bound (at least 1)
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max_depth: max_depth.max(1),
            listeners: Vec::new(),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            undo_len: self.undo.len(),
            redo_len: self.redo.len(),
        }
    }

    /// Label of the command `undo` would revert
    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo.back().map(EditCommand::label)
    }

    /// Label of the command `redo` would reapply
    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo.back().map(EditCommand::label)
    }

    /// Undo stack, oldest first
    pub fn undo_commands(&self) -> impl Iterator<Item = &EditCommand> {
        self.undo.iter()
    }

    /// Redo stack, oldest first
    pub fn redo_commands(&self) -> impl Iterator<Item = &EditCommand> {
        self.redo.iter()
    }

    /// Register a listener for state changes
    pub fn subscribe(&mut self) -> Receiver<HistoryEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    /// Apply `cmd` and push it on the undo stack.
    ///
    /// Clears the redo stack. If applying fails, nothing is pushed and the
    /// error is returned.
    pub fn execute(&mut self, cmd: EditCommand, target: &mut EditTarget<'_>) -> Result<()> {
        cmd.apply(target)?;
        debug!(command = cmd.label(), "executed");
        let label = cmd.label();
        push_bounded(&mut self.undo, cmd, self.max_depth);
        self.redo.clear();
        self.notify(HistoryAction::Execute, Some(label));
        Ok(())
    }

    /// Revert the most recent command.
    ///
    /// Returns false when there was nothing to undo. On error the command
    /// stays on the undo stack.
    pub fn undo(&mut self, target: &mut EditTarget<'_>) -> Result<bool> {
        let Some(cmd) = self.undo.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = cmd.revert(target) {
            self.undo.push_back(cmd);
            return Err(e);
        }
        debug!(command = cmd.label(), "undone");
        let label = cmd.label();
        push_bounded(&mut self.redo, cmd, self.max_depth);
        self.notify(HistoryAction::Undo, Some(label));
        Ok(true)
    }

    /// Reapply the most recently undone command.
    ///
    /// Returns false when there was nothing to redo. On error the command
    /// stays on the redo stack.
    pub fn redo(&mut self, target: &mut EditTarget<'_>) -> Result<bool> {
        let Some(cmd) = self.redo.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = cmd.apply(target) {
            self.redo.push_back(cmd);
            return Err(e);
        }
        debug!(command = cmd.label(), "redone");
        let label = cmd.label();
        push_bounded(&mut self.undo, cmd, self.max_depth);
        self.notify(HistoryAction::Redo, Some(label));
        Ok(true)
    }

    /// Empty both stacks
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.notify(HistoryAction::Clear, None);
    }

    /// Bring stored commands in line with a structural edit.
    ///
    /// Commands targeting a clip in `discarded`, or whose snapshots refer
    /// to a track that `remap` deletes, are dropped. Track indices in the
    /// rest are rewritten. Returns the number of dropped commands.
    pub fn retarget(&mut self, remap: &TrackRemap, discarded: &BTreeSet<ClipId>) -> usize {
        if remap.is_identity() && discarded.is_empty() {
            return 0;
        }
        let before = self.undo.len() + self.redo.len();
        let keep = |cmd: &mut EditCommand| !cmd.references_any(discarded) && cmd.remap_tracks(remap);
        self.undo.retain_mut(keep);
        self.redo.retain_mut(keep);
        let dropped = before - self.undo.len() - self.redo.len();
        if dropped > 0 {
            warn!(dropped, "edit history commands dropped after structural edit");
            self.notify(HistoryAction::Retarget, None);
        }
        dropped
    }

    /// Drop every command that targets one of `removed`
    pub fn purge(&mut self, removed: &BTreeSet<ClipId>) -> usize {
        if removed.is_empty() {
            return 0;
        }
        let before = self.undo.len() + self.redo.len();
        self.undo.retain(|cmd| !cmd.references_any(removed));
        self.redo.retain(|cmd| !cmd.references_any(removed));
        let dropped = before - self.undo.len() - self.redo.len();
        if dropped > 0 {
            debug!(dropped, "edit history commands purged");
            self.notify(HistoryAction::Retarget, None);
        }
        dropped
    }

    fn notify(&mut self, action: HistoryAction, label: Option<&'static str>) {
        let event = HistoryEvent {
            action,
            label,
            state: self.state(),
        };
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn push_bounded(stack: &mut VecDeque<EditCommand>, cmd: EditCommand, max_depth: usize) {
    stack.push_back(cmd);
    while stack.len() > max_depth {
        stack.pop_front();
    }
}
