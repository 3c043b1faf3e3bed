// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dpt::config::{Settings, SettingsWatcher};
use dpt::ui::{App, EditorState};
use dpt::Document;

/// Log file used while the terminal UI owns the screen
const TUI_LOG_FILE: &str = "dpt.log";

fn print_usage() {
    println!("DPT - Timeline editor");
    println!();
    println!("Usage: dpt [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --info <FILE>           Print a summary of a score file");
    println!("  --edit [FILE]           Edit a score file (created on first save)");
    println!("  --new                   Edit a new, untitled score");
    println!("  --help                  Show this help message");
    println!();
    println!("Settings are read from $DPT_SETTINGS or ./dpt-settings.toml.");
    println!("Set RUST_LOG to change the log level (default: info).");
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stderr
fn init_console_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Log to a file in the temp directory so the terminal stays clean
fn init_file_logging() -> Result<PathBuf> {
    let path = env::temp_dir().join(TUI_LOG_FILE);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file: {:?}", path))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(path)
}

fn print_info(path: &Path) -> Result<()> {
    let settings = Settings::read_or_default(Settings::default_path());
    let mut document = Document::new(settings.document_options())?;
    document
        .open(path)
        .with_context(|| format!("Failed to open score: {:?}", path))?;

    let clips = document.clips();
    let end = clips.max_end_beats();
    println!("Score: {}", path.display());
    println!("Clips: {}", clips.len());
    println!("Tracks: {}", document.tracks().count());
    println!("Length: {:.3} beats", end);
    println!();

    let mut rows: Vec<_> = clips.iter().collect();
    rows.sort_by(|a, b| a.1.beat_position().total_cmp(&b.1.beat_position()));
    for (id, clip) in rows {
        println!(
            "  {:>5}  {:<16} track {:>2}  at {:>9.3}  for {:>8.3}  ({} params)",
            id.to_string(),
            clip.name(),
            clip.track() + 1,
            clip.beat_position(),
            clip.duration_beats(),
            clip.params().len(),
        );
    }
    Ok(())
}

fn run_editor(file: Option<PathBuf>) -> Result<()> {
    let log_path = init_file_logging()?;
    let settings_path = Settings::default_path();
    let mut settings = Settings::load_or_default(&settings_path);

    let mut document = Document::new(settings.document_options())?;
    if let Some(path) = file {
        if path.exists() {
            document
                .open(&path)
                .with_context(|| format!("Failed to open score: {:?}", path))?;
            if settings.record_open(&path) {
                if let Err(e) = settings.save(&settings_path) {
                    warn!(error = %e, "could not record score directory");
                }
            }
        } else {
            info!(?path, "new score");
            document.set_path(path);
        }
    }

    let watcher = match SettingsWatcher::new(&settings_path, None) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "settings will not be reloaded");
            None
        }
    };

    info!(log = ?log_path, "starting editor");
    let state = EditorState::new(document).with_settings(settings, settings_path);
    let mut app = App::new(state)?;
    if let Some(watcher) = watcher {
        app = app.with_settings_watcher(watcher);
    }
    app.run()?;

    if app.state().document.is_dirty() {
        eprintln!("Exited with unsaved changes");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("DPT - Timeline editor");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--info" => {
            if args.len() < 3 {
                eprintln!("Error: --info requires a score file");
                std::process::exit(1);
            }
            init_console_logging();
            print_info(Path::new(&args[2]))?;
        }
        "--edit" => {
            run_editor(args.get(2).map(PathBuf::from))?;
        }
        "--new" => {
            run_editor(None)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
