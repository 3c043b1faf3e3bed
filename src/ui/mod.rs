// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Terminal UI for the DPT timeline editor.
//!
//! Provides a ratatui-based terminal interface over a [`Document`]: a
//! timeline view with ruler and track headers, keyboard editing, and a
//! status bar reporting undo/redo state or the prompt being typed.

mod prompt;
mod timeline;

pub use prompt::{param_form_text, parse_beat_range, parse_param_form, BeatRange, Prompt, PromptKind};
pub use timeline::{column_for_x, rows_per_track, TimelineWidget, HEADER_WIDTH, PIXELS_PER_COLUMN};

use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use tracing::{debug, info, warn};

use crate::clip::ClipId;
use crate::config::{Settings, SettingsEvent, SettingsWatcher};
use crate::coords::SNAP_DIVISIONS;
use crate::document::{Document, ViewLayout};
use crate::error::{EditorError, Result};
use crate::history::{HistoryAction, HistoryEvent, HistoryState};

/// Pixels scrolled per key press
pub const SCROLL_STEP: f64 = 100.0;

/// Zoom factor per key press
pub const ZOOM_STEP: f64 = 1.2;

/// Track height factor per key press
pub const TRACK_HEIGHT_STEP: f64 = 1.2;

/// Width factor per resize key press
pub const RESIZE_STEP: f64 = 1.1;

/// File name suggested when saving an untitled score
pub const UNTITLED_FILE_NAME: &str = "untitled.yaml";

/// Editor state driven by key actions
#[derive(Debug)]
pub struct EditorState {
    /// The document being edited
    pub document: Document,
    /// Clip receiving move and resize keys
    pub focus: Option<ClipId>,
    /// Track receiving track keys
    pub focus_track: usize,
    /// Horizontal scroll offset in pixels
    pub scroll_x: f64,
    /// Last published undo/redo state
    pub history: HistoryState,
    /// Last published layout
    pub layout: ViewLayout,
    /// Help text visible
    pub show_help: bool,
    /// Status message
    pub status_message: Option<String>,
    /// Status message timestamp
    pub status_time: Option<Instant>,
    /// Text prompt capturing keys, if open
    pub prompt: Option<Prompt>,
    /// Current editor settings
    pub settings: Settings,
    /// Where `settings` is persisted; `None` keeps them in memory
    settings_path: Option<PathBuf>,
    history_rx: Receiver<HistoryEvent>,
    layout_rx: Receiver<ViewLayout>,
}

impl EditorState {
    /// Wrap a document, subscribing to its history and layout updates
    pub fn new(mut document: Document) -> Self {
        let history_rx = document.subscribe_history();
        let layout_rx = document.subscribe_layout();
        let history = document.history().state();
        let layout = document.layout();
        Self {
            document,
            focus: None,
            focus_track: 0,
            scroll_x: 0.0,
            history,
            layout,
            show_help: false,
            status_message: None,
            status_time: None,
            prompt: None,
            settings: Settings::default(),
            settings_path: None,
            history_rx,
            layout_rx,
        }
    }

    /// Use `settings`, writing changes such as the last save directory
    /// back to `path`
    pub fn with_settings(mut self, settings: Settings, path: PathBuf) -> Self {
        self.settings = settings;
        self.settings_path = Some(path);
        self
    }

    /// Take over settings reloaded from disk
    pub fn apply_settings(&mut self, settings: Settings) {
        match self.document.set_default_duration(settings.default_duration) {
            Ok(()) => {
                self.settings = settings;
                self.set_status("Settings reloaded");
            }
            Err(e) => self.set_status(format!("Settings rejected: {}", e)),
        }
    }

    /// Set a status message that will be displayed temporarily
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_time = Some(Instant::now());
    }

    /// Clear expired status message
    pub fn clear_expired_status(&mut self) {
        if let Some(time) = self.status_time {
            if time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
                self.status_time = None;
            }
        }
    }

    /// Drain pending history and layout notifications
    pub fn poll_updates(&mut self) {
        while let Ok(event) = self.history_rx.try_recv() {
            if event.action == HistoryAction::Retarget {
                self.set_status("History adjusted to track change");
            }
            self.history = event.state;
        }
        while let Ok(layout) = self.layout_rx.try_recv() {
            self.layout = layout;
        }
        self.scroll_x = self.scroll_x.clamp(0.0, self.layout.content_width);
    }

    /// Apply a key action, reporting failures in the status bar
    pub fn apply(&mut self, action: KeyAction) {
        if let Err(e) = self.try_apply(action) {
            warn!(?action, error = %e, "edit rejected");
            self.set_status(format!("Error: {}", e));
        }
        self.sync_focus();
        self.poll_updates();
    }

    fn try_apply(&mut self, action: KeyAction) -> Result<()> {
        match action {
            KeyAction::None | KeyAction::Quit => {}
            KeyAction::FocusNext => self.cycle_focus(1),
            KeyAction::FocusPrev => self.cycle_focus(-1),
            KeyAction::FocusTrack(direction) => {
                let last = self.document.tracks().count().saturating_sub(1) as i64;
                self.focus_track = (self.focus_track as i64 + direction as i64).clamp(0, last) as usize;
                let focused_track = self.focus.and_then(|id| self.document.clip(id)).map(|c| c.track());
                if focused_track != Some(self.focus_track) {
                    self.focus = self.first_clip_on(self.focus_track);
                }
            }
            KeyAction::ToggleSelect => match self.focus {
                Some(id) => {
                    self.document.toggle_select(id)?;
                }
                None => self.set_status("No clip focused"),
            },
            KeyAction::SelectAll => self.document.select_all(),
            KeyAction::ClearSelection => self.document.clear_selection(),
            KeyAction::Nudge { steps, tracks } => self.nudge(steps, tracks)?,
            KeyAction::Zoom(factor) => {
                let zoom = self.document.set_zoom(factor)?;
                self.set_status(format!("Zoom {:.2}x", zoom));
            }
            KeyAction::Scroll(dx) => {
                self.scroll_x = (self.scroll_x + dx).clamp(0.0, self.layout.content_width);
            }
            KeyAction::TrackHeight(factor) => {
                if !self.document.set_track_height(factor)? {
                    self.set_status("Track height at limit");
                }
            }
            KeyAction::Resize(factor) => self.resize(factor)?,
            KeyAction::AddClip => {
                let px_y = self.document.tracks().track_to_y(self.focus_track);
                let id = self.document.add_clip_at(self.scroll_x, px_y)?;
                self.focus = Some(id);
            }
            KeyAction::Duplicate => {
                let copies = self.document.duplicate_selected()?;
                match copies.last() {
                    Some(&last) => {
                        self.focus = Some(last);
                        self.set_status(format!("Duplicated {} clip(s)", copies.len()));
                    }
                    None => self.set_status("Nothing selected"),
                }
            }
            KeyAction::DeleteClips => {
                let removed = self.document.delete_selected();
                self.set_status(format!("Deleted {} clip(s)", removed));
            }
            KeyAction::AddTrack => {
                self.focus_track = self.document.add_track();
            }
            KeyAction::InsertTrack => {
                self.document.insert_track(self.focus_track)?;
            }
            KeyAction::DeleteTrack => {
                if self.document.tracks().is_empty() {
                    self.set_status("No tracks");
                } else {
                    let discarded = self.document.delete_track(self.focus_track)?;
                    self.set_status(format!("Track deleted, {} clip(s) discarded", discarded));
                }
            }
            KeyAction::MoveTrack(direction) => {
                if self.document.move_track(self.focus_track, direction)? {
                    self.focus_track = (self.focus_track as i64 + direction as i64) as usize;
                }
            }
            KeyAction::Undo => {
                if !self.document.undo()? {
                    self.set_status("Nothing to undo");
                }
            }
            KeyAction::Redo => {
                if !self.document.redo()? {
                    self.set_status("Nothing to redo");
                }
            }
            KeyAction::Save => {
                if self.document.path().is_none() {
                    self.open_prompt(PromptKind::SaveAs);
                } else {
                    self.save_to(None)?;
                }
            }
            KeyAction::SaveAs => self.open_prompt(PromptKind::SaveAs),
            KeyAction::RenameClip => self.open_prompt(PromptKind::RenameClip),
            KeyAction::RenameTrack => self.open_prompt(PromptKind::RenameTrack),
            KeyAction::EditParams => self.open_prompt(PromptKind::EditParams),
            KeyAction::SelectRange => self.open_prompt(PromptKind::SelectRange),
            KeyAction::ToggleHelp => self.show_help = !self.show_help,
        }
        Ok(())
    }

    /// Route a key press; an open prompt takes every key as text.
    ///
    /// Returns the action taken. `Quit` is left to the caller.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        if self.prompt.is_some() {
            self.prompt_key(code);
            return KeyAction::None;
        }
        let action = key_action(code, modifiers);
        match action {
            KeyAction::Quit | KeyAction::None => {}
            _ => {
                debug!(?action, "key action");
                self.apply(action);
            }
        }
        action
    }

    /// Open a prompt pre-filled with the current value it edits
    fn open_prompt(&mut self, kind: PromptKind) {
        let initial = match kind {
            PromptKind::SaveAs => self.suggested_save_path().display().to_string(),
            PromptKind::RenameClip => match self.rename_targets_name() {
                Some(name) => name,
                None => return self.set_status("No clip focused"),
            },
            PromptKind::RenameTrack => match self.document.tracks().name(self.focus_track) {
                Some(name) => name.to_string(),
                None => return self.set_status("No tracks"),
            },
            PromptKind::EditParams => match self.focus.and_then(|id| self.document.clip(id)) {
                Some(clip) => param_form_text(clip),
                None => return self.set_status("No clip focused"),
            },
            PromptKind::SelectRange => String::new(),
        };
        self.prompt = Some(Prompt::new(kind, initial));
    }

    /// Feed a key to the open prompt
    pub fn prompt_key(&mut self, code: KeyCode) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Char(c) => prompt.input.push(c),
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Esc => {
                self.prompt = None;
                self.set_status("Cancelled");
            }
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    if let Err(e) = self.submit_prompt(&prompt) {
                        warn!(kind = ?prompt.kind, error = %e, "prompt rejected");
                        self.set_status(format!("Error: {}", e));
                    }
                    self.sync_focus();
                    self.poll_updates();
                }
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self, prompt: &Prompt) -> Result<()> {
        let text = prompt.input.trim();
        match prompt.kind {
            PromptKind::SaveAs => {
                if text.is_empty() {
                    return Err(EditorError::InvalidInput("file name must not be empty".to_string()));
                }
                self.save_to(Some(Path::new(text)))?;
            }
            PromptKind::RenameClip => {
                if self.document.selection().is_empty() {
                    if let Some(id) = self.focus {
                        self.document.select(id)?;
                    }
                }
                let renamed = self.document.rename_selected(text)?;
                self.set_status(format!("Renamed {} clip(s)", renamed));
            }
            PromptKind::RenameTrack => {
                self.document.rename_track(self.focus_track, text)?;
            }
            PromptKind::EditParams => {
                let Some(id) = self.focus else {
                    return Err(EditorError::InvalidInput("no clip focused".to_string()));
                };
                let edit = parse_param_form(self.document.clips().require(id)?, text)?;
                if self.document.apply_param_edit(id, edit)? {
                    self.set_status("Parameters updated");
                } else {
                    self.set_status("No changes");
                }
            }
            PromptKind::SelectRange => {
                let range = parse_beat_range(text, self.document.tracks().count())?;
                let coords = self.document.coords();
                let tracks = self.document.tracks();
                let x0 = coords.beats_to_pixels_x(range.from_beats);
                let x1 = coords.beats_to_pixels_x(range.to_beats);
                let y0 = tracks.track_to_y(range.first_track);
                let y1 = tracks.track_to_y(range.last_track + 1);
                let selected = self.document.select_in_rect(x0, y0, x1, y1);
                self.set_status(format!("Selected {} clip(s)", selected));
            }
        }
        Ok(())
    }

    /// Save, remembering the directory in the settings
    fn save_to(&mut self, path: Option<&Path>) -> Result<()> {
        let path = self.document.save(path)?;
        info!(?path, "score saved");
        self.set_status(format!("Saved {}", path.display()));
        if self.settings.record_save(&path) {
            if let Some(settings_path) = &self.settings_path {
                if let Err(e) = self.settings.save(settings_path) {
                    warn!(error = %e, "could not record save directory");
                }
            }
        }
        Ok(())
    }

    /// Current file, else an untitled file in the last used directory
    fn suggested_save_path(&self) -> PathBuf {
        if let Some(path) = self.document.path() {
            return path.to_path_buf();
        }
        let directory = self
            .settings
            .last_save_directory
            .as_ref()
            .or(self.settings.last_open_directory.as_ref());
        match directory {
            Some(dir) => dir.join(UNTITLED_FILE_NAME),
            None => PathBuf::from(UNTITLED_FILE_NAME),
        }
    }

    /// Name shown when renaming: the focused clip, else the first selected
    fn rename_targets_name(&self) -> Option<String> {
        let id = self.focus.or_else(|| self.document.selection().iter().next())?;
        self.document.clip(id).map(|c| c.name().to_string())
    }

    /// Earliest clip on `track`
    fn first_clip_on(&self, track: usize) -> Option<ClipId> {
        let clips = self.document.clips();
        clips
            .on_track(track)
            .filter_map(|id| clips.get(id).map(|c| (c.beat_position(), id)))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    /// Move focus through clips ordered by track, then position
    fn cycle_focus(&mut self, direction: i64) {
        let mut order: Vec<(usize, f64, ClipId)> = self
            .document
            .clips()
            .iter()
            .map(|(id, clip)| (clip.track(), clip.beat_position(), id))
            .collect();
        if order.is_empty() {
            self.focus = None;
            return;
        }
        order.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

        let len = order.len() as i64;
        let next = match self.focus.and_then(|f| order.iter().position(|o| o.2 == f)) {
            Some(current) => (current as i64 + direction).rem_euclid(len),
            None if direction < 0 => len - 1,
            None => 0,
        };
        self.focus = Some(order[next as usize].2);
    }

    fn nudge(&mut self, steps: i32, tracks: i32) -> Result<()> {
        let Some(id) = self.focus else {
            self.set_status("No clip focused");
            return Ok(());
        };
        let track = self.document.clips().require(id)?.track();
        let Some(view) = self.document.view(id).copied() else {
            return Ok(());
        };

        let track_set = self.document.tracks();
        let last = track_set.count().saturating_sub(1) as i64;
        let target = (track as i64 + tracks as i64).clamp(0, last) as usize;
        let px_x = view.x + steps as f64 * self.document.coords().snap_quantum();
        let px_y = track_set.track_to_y(target);

        if !self.document.move_to(id, px_x, px_y)? {
            self.set_status("Clip cannot move further");
        }
        Ok(())
    }

    fn resize(&mut self, factor: f64) -> Result<()> {
        if !self.document.selection().is_empty() {
            self.document.resize_selected(factor)?;
        } else if let Some(id) = self.focus {
            self.document.resize_by_factor(id, factor)?;
        } else {
            self.set_status("No clip focused");
        }
        Ok(())
    }

    /// Drop focus on clips that no longer exist and follow the focused
    /// clip's track
    fn sync_focus(&mut self) {
        if let Some(id) = self.focus {
            match self.document.clip(id) {
                Some(clip) => self.focus_track = clip.track(),
                None => self.focus = None,
            }
        }
        let last = self.document.tracks().count().saturating_sub(1);
        self.focus_track = self.focus_track.min(last);
    }
}

/// Action resulting from a key press
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    /// No action
    None,
    /// Quit application
    Quit,
    /// Focus the next clip
    FocusNext,
    /// Focus the previous clip
    FocusPrev,
    /// Move track focus up or down
    FocusTrack(i32),
    /// Toggle selection of the focused clip
    ToggleSelect,
    /// Select every clip
    SelectAll,
    /// Deselect every clip
    ClearSelection,
    /// Move the focused clip by snap steps and tracks
    Nudge { steps: i32, tracks: i32 },
    /// Multiply zoom level
    Zoom(f64),
    /// Scroll horizontally by pixels
    Scroll(f64),
    /// Multiply track height
    TrackHeight(f64),
    /// Multiply clip width
    Resize(f64),
    /// Add a clip at the left edge of the view
    AddClip,
    /// Duplicate selected clips
    Duplicate,
    /// Delete selected clips
    DeleteClips,
    /// Append a track
    AddTrack,
    /// Insert a track at the focused track
    InsertTrack,
    /// Delete the focused track
    DeleteTrack,
    /// Swap the focused track with a neighbour
    MoveTrack(i32),
    /// Undo last edit
    Undo,
    /// Redo last undone edit
    Redo,
    /// Save the score, asking for a file name when it has none
    Save,
    /// Save the score under a new file name
    SaveAs,
    /// Rename the selected or focused clips
    RenameClip,
    /// Rename the focused track
    RenameTrack,
    /// Edit the focused clip's parameter form
    EditParams,
    /// Select the clips inside a beat and track range
    SelectRange,
    /// Toggle help
    ToggleHelp,
}

/// Map a key press to an editor action
pub fn key_action(code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
    let beat = SNAP_DIVISIONS as i32;
    match (code, modifiers) {
        // Quit
        (KeyCode::Char('q'), KeyModifiers::NONE)
        | (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,

        // Focus and selection
        (KeyCode::Tab, _) => KeyAction::FocusNext,
        (KeyCode::BackTab, _) => KeyAction::FocusPrev,
        (KeyCode::PageUp, _) => KeyAction::FocusTrack(-1),
        (KeyCode::PageDown, _) => KeyAction::FocusTrack(1),
        (KeyCode::Char(' '), KeyModifiers::NONE) => KeyAction::ToggleSelect,
        (KeyCode::Char('a'), KeyModifiers::CONTROL) => KeyAction::SelectAll,
        (KeyCode::Esc, _) => KeyAction::ClearSelection,

        // View
        (KeyCode::Up, KeyModifiers::ALT) => KeyAction::Zoom(ZOOM_STEP),
        (KeyCode::Down, KeyModifiers::ALT) => KeyAction::Zoom(1.0 / ZOOM_STEP),
        (KeyCode::Left, KeyModifiers::ALT) => KeyAction::Scroll(-SCROLL_STEP),
        (KeyCode::Right, KeyModifiers::ALT) => KeyAction::Scroll(SCROLL_STEP),
        (KeyCode::Char('+'), _) | (KeyCode::Char('='), KeyModifiers::NONE) => {
            KeyAction::TrackHeight(TRACK_HEIGHT_STEP)
        }
        (KeyCode::Char('-'), KeyModifiers::NONE) => KeyAction::TrackHeight(1.0 / TRACK_HEIGHT_STEP),

        // Tracks
        (KeyCode::Up, KeyModifiers::CONTROL) => KeyAction::MoveTrack(-1),
        (KeyCode::Down, KeyModifiers::CONTROL) => KeyAction::MoveTrack(1),
        (KeyCode::Char('t'), KeyModifiers::NONE) => KeyAction::AddTrack,
        (KeyCode::Char('i'), KeyModifiers::NONE) => KeyAction::InsertTrack,
        (KeyCode::Delete, KeyModifiers::ALT) => KeyAction::DeleteTrack,

        // Clips
        (KeyCode::Left, KeyModifiers::NONE) => KeyAction::Nudge { steps: -1, tracks: 0 },
        (KeyCode::Right, KeyModifiers::NONE) => KeyAction::Nudge { steps: 1, tracks: 0 },
        (KeyCode::Left, KeyModifiers::SHIFT) => KeyAction::Nudge { steps: -beat, tracks: 0 },
        (KeyCode::Right, KeyModifiers::SHIFT) => KeyAction::Nudge { steps: beat, tracks: 0 },
        (KeyCode::Up, KeyModifiers::NONE) => KeyAction::Nudge { steps: 0, tracks: -1 },
        (KeyCode::Down, KeyModifiers::NONE) => KeyAction::Nudge { steps: 0, tracks: 1 },
        (KeyCode::Char('['), KeyModifiers::NONE) => KeyAction::Resize(1.0 / RESIZE_STEP),
        (KeyCode::Char(']'), KeyModifiers::NONE) => KeyAction::Resize(RESIZE_STEP),
        (KeyCode::Char('a'), KeyModifiers::NONE) => KeyAction::AddClip,
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => KeyAction::Duplicate,
        (KeyCode::Char('n'), KeyModifiers::NONE) => KeyAction::RenameClip,
        (KeyCode::Char('n'), KeyModifiers::ALT) => KeyAction::RenameTrack,
        (KeyCode::Char('e'), KeyModifiers::NONE) => KeyAction::EditParams,
        (KeyCode::Char('b'), KeyModifiers::NONE) => KeyAction::SelectRange,
        (KeyCode::Delete, KeyModifiers::NONE) | (KeyCode::Backspace, KeyModifiers::NONE) => {
            KeyAction::DeleteClips
        }

        // History and file
        (KeyCode::Char('u'), KeyModifiers::NONE) | (KeyCode::Char('z'), KeyModifiers::CONTROL) => {
            KeyAction::Undo
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) | (KeyCode::Char('y'), KeyModifiers::CONTROL) => {
            KeyAction::Redo
        }
        (KeyCode::Char('s'), KeyModifiers::CONTROL) => KeyAction::Save,
        (KeyCode::Char('s'), KeyModifiers::ALT) => KeyAction::SaveAs,

        // Help
        (KeyCode::Char('?'), _) | (KeyCode::Char('h'), KeyModifiers::NONE) => KeyAction::ToggleHelp,

        _ => KeyAction::None,
    }
}

/// Terminal UI application
pub struct App {
    /// Editor state
    state: EditorState,
    /// Terminal handle
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Settings reload source
    settings: Option<SettingsWatcher>,
    /// Target frame rate
    frame_rate: u32,
    /// Whether to continue running
    running: bool,
}

impl App {
    /// Create a new app editing `state`
    pub fn new(state: EditorState) -> io::Result<Self> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            state,
            terminal,
            settings: None,
            frame_rate: 30,
            running: true,
        })
    }

    /// Apply settings changes picked up by `watcher` while running
    pub fn with_settings_watcher(mut self, watcher: SettingsWatcher) -> Self {
        self.settings = Some(watcher);
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EditorState {
        &mut self.state
    }

    /// Set frame rate
    pub fn set_frame_rate(&mut self, fps: u32) {
        self.frame_rate = fps.clamp(1, 120);
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the app
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Handle a key event
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        let action = self.state.handle_key(code, modifiers);
        if action == KeyAction::Quit {
            self.quit();
        }
        action
    }

    /// Poll for events with timeout
    pub fn poll_event(&self) -> io::Result<Option<Event>> {
        let timeout = Duration::from_millis(1000 / self.frame_rate as u64);
        if event::poll(timeout)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }

    /// Run the event loop until the user quits
    pub fn run(&mut self) -> io::Result<()> {
        while self.running {
            self.poll_settings();
            self.state.poll_updates();
            self.state.clear_expired_status();
            self.draw()?;

            if let Some(Event::Key(key)) = self.poll_event()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code, key.modifiers);
                }
            }
        }
        Ok(())
    }

    fn poll_settings(&mut self) {
        let Some(watcher) = &self.settings else {
            return;
        };
        for event in watcher.recv_all() {
            match event {
                SettingsEvent::Reloaded(settings) => self.state.apply_settings(*settings),
                SettingsEvent::Error(message) => {
                    warn!(error = %message, "settings reload failed");
                    self.state.set_status(message);
                }
                SettingsEvent::FileDeleted(path) => {
                    self.state
                        .set_status(format!("Settings file removed: {}", path.display()));
                }
            }
        }
    }

    /// Draw the UI
    pub fn draw(&mut self) -> io::Result<()> {
        let state = &self.state;

        self.terminal.draw(|frame| {
            let area = frame.area();

            // Main layout: header, timeline, footer
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1), // Title
                    Constraint::Min(6),    // Timeline
                    Constraint::Length(1), // Status bar
                ])
                .split(area);

            render_title(frame, chunks[0], state);

            let timeline = TimelineWidget::new(&state.document)
                .scroll_x(state.scroll_x)
                .focus(state.focus)
                .focus_track(Some(state.focus_track))
                .block(Block::default().borders(Borders::ALL).title(" Timeline "));
            frame.render_widget(timeline, chunks[1]);

            render_status_bar(frame, chunks[2], state);

            // Help overlay
            if state.show_help {
                render_help_overlay(frame, area);
            }
        })?;

        Ok(())
    }

    /// Cleanup terminal on drop
    fn cleanup(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// One-line document summary
fn title_text(state: &EditorState) -> String {
    let doc = &state.document;
    let name = doc
        .path()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string());
    let dirty = if doc.is_dirty() { "*" } else { "" };
    format!(
        " DPT  {}{}  |  {} clips  {} tracks  |  zoom {:.2}x  height {:.0}px  |  {} selected",
        name,
        dirty,
        doc.clips().len(),
        doc.tracks().count(),
        state.layout.zoom_level,
        state.layout.track_height,
        doc.selection().len(),
    )
}

fn render_title(frame: &mut Frame, area: Rect, state: &EditorState) {
    let title = Paragraph::new(title_text(state)).style(
        Style::default()
            .fg(Color::White)
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(title, area);
}

/// Undo/redo hint for the status bar
fn history_hint(state: &EditorState) -> String {
    let history = state.document.history();
    let undo = match history.undo_label() {
        Some(label) if state.history.can_undo => format!("u: Undo {}", label),
        _ => "u: -".to_string(),
    };
    let redo = match history.redo_label() {
        Some(label) if state.history.can_redo => format!("r: Redo {}", label),
        _ => "r: -".to_string(),
    };
    format!(" {} | {} | h: Help | q: Quit", undo, redo)
}

/// Render status bar
fn render_status_bar(frame: &mut Frame, area: Rect, state: &EditorState) {
    let text = if let Some(prompt) = &state.prompt {
        Span::styled(prompt.display(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
    } else if let Some(ref msg) = state.status_message {
        Span::styled(msg.as_str(), Style::default().fg(Color::Yellow))
    } else {
        Span::styled(history_hint(state), Style::default().fg(Color::DarkGray))
    };

    frame.render_widget(Paragraph::new(text), area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, area: Rect) {
    // Calculate centered area
    let width = 52.min(area.width.saturating_sub(4));
    let height = 32.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(help_area);
    frame.render_widget(block, help_area);

    let heading = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled("Clips", heading)),
        Line::from("  Tab/S-Tab      Focus next/previous clip"),
        Line::from("  Space          Toggle selection"),
        Line::from("  Left/Right     Move by one snap step"),
        Line::from("  S-Left/Right   Move by one beat"),
        Line::from("  Up/Down        Move to neighbouring track"),
        Line::from("  [ ]            Shrink/grow width"),
        Line::from("  a              Add clip"),
        Line::from("  Ctrl+d         Duplicate selection"),
        Line::from("  Del            Delete selection"),
        Line::from("  n              Rename clip"),
        Line::from("  e              Edit parameters"),
        Line::from("  b              Select beat range"),
        Line::from(""),
        Line::from(Span::styled("Tracks and view", heading)),
        Line::from("  PgUp/PgDn      Focus track"),
        Line::from("  t / i          Append/insert track"),
        Line::from("  Alt+Del        Delete focused track"),
        Line::from("  Ctrl+Up/Down   Move focused track"),
        Line::from("  Alt+n          Rename focused track"),
        Line::from("  + / -          Track height"),
        Line::from("  Alt+Up/Down    Zoom"),
        Line::from("  Alt+Left/Right Scroll"),
        Line::from(""),
        Line::from(Span::styled("Other", heading)),
        Line::from("  u / r          Undo/redo"),
        Line::from("  Ctrl+s / Alt+s Save / save as"),
        Line::from("  Enter / Esc    Confirm / cancel prompt"),
        Line::from("  h/?            Toggle help"),
        Line::from("  q/Ctrl+c       Quit"),
    ];

    frame.render_widget(Paragraph::new(help_text), inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ParamMap;

    fn state_with(clips: &[(f64, usize)]) -> (EditorState, Vec<ClipId>) {
        let mut doc = Document::with_tracks(4);
        let ids = clips
            .iter()
            .map(|&(beats, track)| doc.place(beats, track, 2.0, "Clip", ParamMap::new()).unwrap())
            .collect();
        (EditorState::new(doc), ids)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key_action(KeyCode::Char('q'), KeyModifiers::NONE), KeyAction::Quit);
        assert_eq!(key_action(KeyCode::Char('c'), KeyModifiers::CONTROL), KeyAction::Quit);
        assert_eq!(key_action(KeyCode::Char('z'), KeyModifiers::CONTROL), KeyAction::Undo);
        assert_eq!(
            key_action(KeyCode::Right, KeyModifiers::SHIFT),
            KeyAction::Nudge { steps: 16, tracks: 0 }
        );
        assert_eq!(key_action(KeyCode::Delete, KeyModifiers::ALT), KeyAction::DeleteTrack);
        assert_eq!(key_action(KeyCode::Char('x'), KeyModifiers::NONE), KeyAction::None);
    }

    #[test]
    fn test_status_message() {
        let (mut state, _) = state_with(&[]);
        state.set_status("Test message");
        assert_eq!(state.status_message, Some("Test message".to_string()));
        state.clear_expired_status();
        assert!(state.status_message.is_some());
    }

    #[test]
    fn test_focus_cycles_by_track_then_position() {
        let (mut state, ids) = state_with(&[(4.0, 1), (0.0, 1), (8.0, 0)]);
        state.apply(KeyAction::FocusNext);
        assert_eq!(state.focus, Some(ids[2]));
        state.apply(KeyAction::FocusNext);
        assert_eq!(state.focus, Some(ids[1]));
        state.apply(KeyAction::FocusNext);
        assert_eq!(state.focus, Some(ids[0]));
        state.apply(KeyAction::FocusNext);
        assert_eq!(state.focus, Some(ids[2]));
        state.apply(KeyAction::FocusPrev);
        assert_eq!(state.focus, Some(ids[0]));
        assert_eq!(state.focus_track, 1);
    }

    #[test]
    fn test_nudge_then_undo() {
        let (mut state, ids) = state_with(&[(1.0, 0)]);
        state.focus = Some(ids[0]);

        state.apply(KeyAction::Nudge { steps: 16, tracks: 1 });
        let clip = state.document.clip(ids[0]).unwrap();
        assert_eq!(clip.beat_position(), 2.0);
        assert_eq!(clip.track(), 1);
        assert!(state.history.can_undo);
        assert_eq!(state.focus_track, 1);

        state.apply(KeyAction::Undo);
        let clip = state.document.clip(ids[0]).unwrap();
        assert_eq!(clip.beat_position(), 1.0);
        assert_eq!(clip.track(), 0);
        assert!(state.history.can_redo);
    }

    #[test]
    fn test_nudge_without_focus_sets_status() {
        let (mut state, _) = state_with(&[(1.0, 0)]);
        state.apply(KeyAction::Nudge { steps: 1, tracks: 0 });
        assert_eq!(state.status_message.as_deref(), Some("No clip focused"));
        assert!(!state.history.can_undo);
    }

    #[test]
    fn test_add_clip_on_focused_track() {
        let (mut state, _) = state_with(&[]);
        state.focus_track = 2;
        state.apply(KeyAction::AddClip);
        let id = state.focus.unwrap();
        let clip = state.document.clip(id).unwrap();
        assert_eq!(clip.track(), 2);
        assert_eq!(clip.beat_position(), 0.0);
    }

    #[test]
    fn test_delete_selected_drops_focus() {
        let (mut state, ids) = state_with(&[(0.0, 0), (4.0, 0)]);
        state.focus = Some(ids[0]);
        state.apply(KeyAction::ToggleSelect);
        state.apply(KeyAction::DeleteClips);
        assert_eq!(state.focus, None);
        assert_eq!(state.document.clips().len(), 1);
    }

    #[test]
    fn test_delete_track_reports_retarget() {
        let (mut state, ids) = state_with(&[(0.0, 0), (0.0, 2)]);
        state.focus = Some(ids[1]);
        state.apply(KeyAction::Nudge { steps: 16, tracks: 0 });
        assert!(state.history.can_undo);

        state.focus = None;
        state.focus_track = 0;
        state.apply(KeyAction::DeleteTrack);
        assert_eq!(state.document.tracks().count(), 3);
        assert_eq!(state.document.clip(ids[1]).unwrap().track(), 1);
        // The surviving move command was retargeted and still undoes
        state.apply(KeyAction::Undo);
        assert_eq!(state.document.clip(ids[1]).unwrap().beat_position(), 0.0);
        assert_eq!(state.document.clip(ids[1]).unwrap().track(), 1);
    }

    #[test]
    fn test_zoom_updates_layout() {
        let (mut state, _) = state_with(&[]);
        state.apply(KeyAction::Zoom(2.0));
        assert_eq!(state.layout.zoom_level, 2.0);
        assert_eq!(state.status_message.as_deref(), Some("Zoom 2.00x"));
    }

    #[test]
    fn test_scroll_is_clamped() {
        let (mut state, _) = state_with(&[]);
        state.apply(KeyAction::Scroll(-SCROLL_STEP));
        assert_eq!(state.scroll_x, 0.0);
        for _ in 0..100 {
            state.apply(KeyAction::Scroll(SCROLL_STEP));
        }
        assert_eq!(state.scroll_x, state.layout.content_width);
    }

    fn type_text(state: &mut EditorState, text: &str) {
        for c in text.chars() {
            state.prompt_key(KeyCode::Char(c));
        }
    }

    fn replace_input(state: &mut EditorState, text: &str) {
        if let Some(prompt) = state.prompt.as_mut() {
            prompt.input.clear();
        }
        type_text(state, text);
        state.prompt_key(KeyCode::Enter);
    }

    #[test]
    fn test_prompt_key_mapping() {
        assert_eq!(key_action(KeyCode::Char('s'), KeyModifiers::ALT), KeyAction::SaveAs);
        assert_eq!(key_action(KeyCode::Char('n'), KeyModifiers::NONE), KeyAction::RenameClip);
        assert_eq!(key_action(KeyCode::Char('n'), KeyModifiers::ALT), KeyAction::RenameTrack);
        assert_eq!(key_action(KeyCode::Char('e'), KeyModifiers::NONE), KeyAction::EditParams);
        assert_eq!(key_action(KeyCode::Char('b'), KeyModifiers::NONE), KeyAction::SelectRange);
    }

    #[test]
    fn test_save_without_path_asks_for_name() {
        let (mut state, _) = state_with(&[(0.0, 0)]);
        state.settings.last_open_directory = Some(PathBuf::from("/scores"));
        state.apply(KeyAction::Save);
        let prompt = state.prompt.clone().unwrap();
        assert_eq!(prompt.kind, PromptKind::SaveAs);
        assert_eq!(PathBuf::from(prompt.input), Path::new("/scores").join(UNTITLED_FILE_NAME));
    }

    #[test]
    fn test_save_as_writes_and_records_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.toml");
        let score_dir = dir.path().join("out");
        std::fs::create_dir(&score_dir).unwrap();
        let score_path = score_dir.join("piece.yaml");

        let (state, _) = state_with(&[(0.0, 0)]);
        let mut state = state.with_settings(Settings::default(), settings_path.clone());
        state.apply(KeyAction::SaveAs);
        replace_input(&mut state, &score_path.display().to_string());

        assert!(state.prompt.is_none());
        assert!(score_path.exists());
        assert_eq!(state.document.path(), Some(score_path.as_path()));
        assert_eq!(state.settings.last_save_directory, Some(score_dir.clone()));
        let persisted = Settings::load(&settings_path).unwrap();
        assert_eq!(persisted.last_save_directory, Some(score_dir));
    }

    #[test]
    fn test_empty_save_name_is_rejected() {
        let (mut state, _) = state_with(&[]);
        state.apply(KeyAction::SaveAs);
        replace_input(&mut state, "   ");
        assert!(state.status_message.unwrap().starts_with("Error: invalid input"));
        assert_eq!(state.document.path(), None);
    }

    #[test]
    fn test_prompt_swallows_command_keys() {
        let (mut state, ids) = state_with(&[(0.0, 0)]);
        state.focus = Some(ids[0]);
        state.handle_key(KeyCode::Char('n'), KeyModifiers::NONE);
        assert_eq!(state.prompt.as_ref().map(|p| p.kind), Some(PromptKind::RenameClip));

        // 'q' is text while a prompt is open
        assert_eq!(state.handle_key(KeyCode::Char('q'), KeyModifiers::NONE), KeyAction::None);
        assert_eq!(state.prompt.as_ref().unwrap().input, "Clipq");

        state.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        state.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert!(state.prompt.is_none());
        assert_eq!(state.status_message.as_deref(), Some("Cancelled"));
        assert_eq!(state.document.clip(ids[0]).unwrap().name(), "Clip");
        assert_eq!(state.handle_key(KeyCode::Char('q'), KeyModifiers::NONE), KeyAction::Quit);
    }

    #[test]
    fn test_rename_focused_clip() {
        let (mut state, ids) = state_with(&[(0.0, 0), (4.0, 0)]);
        state.focus = Some(ids[1]);
        state.apply(KeyAction::RenameClip);
        assert_eq!(state.prompt.as_ref().unwrap().input, "Clip");
        replace_input(&mut state, "Swell");

        assert_eq!(state.document.clip(ids[1]).unwrap().name(), "Swell");
        assert_eq!(state.document.clip(ids[0]).unwrap().name(), "Clip");
        assert_eq!(state.status_message.as_deref(), Some("Renamed 1 clip(s)"));

        state.apply(KeyAction::Undo);
        assert_eq!(state.document.clip(ids[1]).unwrap().name(), "Clip");
    }

    #[test]
    fn test_rename_without_focus() {
        let (mut state, _) = state_with(&[(0.0, 0)]);
        state.apply(KeyAction::RenameClip);
        assert!(state.prompt.is_none());
        assert_eq!(state.status_message.as_deref(), Some("No clip focused"));
    }

    #[test]
    fn test_rename_focused_track() {
        let (mut state, _) = state_with(&[]);
        state.focus_track = 2;
        state.apply(KeyAction::RenameTrack);
        assert_eq!(state.prompt.as_ref().unwrap().input, "Track 3");
        replace_input(&mut state, "Winds");
        assert_eq!(state.document.tracks().name(2), Some("Winds"));

        state.apply(KeyAction::RenameTrack);
        replace_input(&mut state, "");
        assert_eq!(state.document.tracks().name(2), Some("Winds"));
        assert!(state.status_message.unwrap().starts_with("Error: invalid input"));
    }

    #[test]
    fn test_param_form_edit_and_undo() {
        let (mut state, ids) = state_with(&[(0.0, 0)]);
        state.focus = Some(ids[0]);
        state.apply(KeyAction::EditParams);
        let form = state.prompt.as_ref().unwrap().input.clone();
        assert!(form.starts_with("name=Clip; "));

        // Submitting the form untouched changes nothing
        state.prompt_key(KeyCode::Enter);
        assert_eq!(state.status_message.as_deref(), Some("No changes"));
        assert!(!state.history.can_undo);

        state.apply(KeyAction::EditParams);
        replace_input(&mut state, "cAttacco=3; durata=6; ritmo=[1, 2]");
        assert_eq!(state.status_message.as_deref(), Some("Parameters updated"));
        let clip = state.document.clip(ids[0]).unwrap();
        assert_eq!(clip.beat_position(), 3.0);
        assert_eq!(clip.params().get_numbers("ritmo"), Some(&[1.0, 2.0][..]));

        state.apply(KeyAction::Undo);
        let clip = state.document.clip(ids[0]).unwrap();
        assert_eq!(clip.beat_position(), 0.0);
        assert!(clip.params().get("ritmo").is_none());
    }

    #[test]
    fn test_select_beat_range() {
        let (mut state, ids) = state_with(&[(0.0, 0), (4.0, 1), (4.0, 3), (20.0, 1)]);
        state.apply(KeyAction::SelectRange);
        replace_input(&mut state, "3 10 2 3");
        let selected: Vec<_> = state.document.selection().iter().collect();
        assert_eq!(selected, vec![ids[1]]);
        assert_eq!(state.status_message.as_deref(), Some("Selected 1 clip(s)"));

        state.apply(KeyAction::SelectRange);
        replace_input(&mut state, "0 10");
        assert_eq!(state.document.selection().len(), 3);
    }

    #[test]
    fn test_focus_track_moves_clip_focus() {
        let (mut state, ids) = state_with(&[(0.0, 0), (8.0, 1), (2.0, 1)]);
        state.focus = Some(ids[0]);
        state.apply(KeyAction::FocusTrack(1));
        assert_eq!(state.focus_track, 1);
        assert_eq!(state.focus, Some(ids[2]));

        state.apply(KeyAction::FocusTrack(1));
        assert_eq!(state.focus_track, 2);
        assert_eq!(state.focus, None);
    }

    #[test]
    fn test_move_track_follows_focus() {
        let (mut state, _) = state_with(&[]);
        state.focus_track = 1;
        state.apply(KeyAction::MoveTrack(1));
        assert_eq!(state.focus_track, 2);
        assert_eq!(state.document.tracks().name(2), Some("Track 2"));
    }

    #[test]
    fn test_history_hint() {
        let (mut state, ids) = state_with(&[(0.0, 0)]);
        assert!(history_hint(&state).contains("u: -"));
        state.focus = Some(ids[0]);
        state.apply(KeyAction::Nudge { steps: 1, tracks: 0 });
        assert!(history_hint(&state).contains("u: Undo"));
    }
}
