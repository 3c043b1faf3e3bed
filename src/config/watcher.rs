// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reloading editor settings.
//!
//! Watches the settings file and re-parses it once writes have settled,
//! so the editor can pick up new defaults without restarting.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use super::Settings;

/// Default debounce delay in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Events emitted by the settings watcher
#[derive(Debug, Clone)]
pub enum SettingsEvent {
    /// Settings file was modified and successfully reloaded
    Reloaded(Box<Settings>),
    /// Settings file was modified but failed to parse
    Error(String),
    /// Settings file was deleted
    FileDeleted(PathBuf),
}

/// Settings file watcher with debouncing and validation
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<SettingsEvent>,
    watched_path: PathBuf,
}

impl SettingsWatcher {
    /// Create a new watcher for the settings file at `path`
    ///
    /// The parent directory is watched so that editors which replace the
    /// file on save are still noticed.
    ///
    /// # Arguments
    /// * `path` - Settings file to watch
    /// * `debounce_ms` - Debounce duration in milliseconds (default: 500)
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce_duration =
            Duration::from_millis(debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS));

        let (event_tx, event_rx): (Sender<SettingsEvent>, Receiver<SettingsEvent>) =
            mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        let watch_dir = match watched_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", watch_dir, e))?;

        let target = watched_path.clone();
        std::thread::spawn(move || debounce_loop(target, notify_rx, event_tx, debounce_duration));

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next settings event (non-blocking)
    pub fn try_recv(&self) -> Option<SettingsEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending settings events
    pub fn recv_all(&self) -> Vec<SettingsEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next settings event is received
    pub fn recv(&self) -> Option<SettingsEvent> {
        self.event_receiver.recv().ok()
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b || (a.file_name().is_some() && a.file_name() == b.file_name())
}

fn debounce_loop(
    target: PathBuf,
    notify_rx: Receiver<Event>,
    event_tx: Sender<SettingsEvent>,
    debounce: Duration,
) {
    let mut last_event_time: Option<Instant> = None;

    loop {
        match notify_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if !event.paths.iter().any(|p| same_file(p, &target)) {
                    continue;
                }
                match event.kind {
                    EventKind::Remove(_) => {
                        last_event_time = None;
                        if event_tx.send(SettingsEvent::FileDeleted(target.clone())).is_err() {
                            break;
                        }
                    }
                    EventKind::Create(_) | EventKind::Modify(_) => {
                        last_event_time = Some(Instant::now());
                    }
                    _ => {}
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let Some(last_time) = last_event_time else {
                    continue;
                };
                if last_time.elapsed() < debounce {
                    continue;
                }
                last_event_time = None;
                let event = match Settings::load(&target) {
                    Ok(settings) => {
                        debug!(path = ?target, "settings reloaded");
                        SettingsEvent::Reloaded(Box::new(settings))
                    }
                    Err(e) => SettingsEvent::Error(format!("Failed to load {:?}: {:#}", target, e)),
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Watcher was dropped, exit thread
                break;
            }
        }
    }
}
