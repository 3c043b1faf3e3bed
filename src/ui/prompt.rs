// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! One-line text prompts.
//!
//! Editing that needs typed input (file names, clip and track names, the
//! parameter form and range selection) goes through a prompt shown in the
//! status bar. Typing edits the buffer, Enter submits and Esc cancels.
//!
//! The parameter form is a `;`-separated list of `key=value` pairs:
//!
//! ```text
//! name=Swell; color=100, 150, 200; cAttacco=4; durata=5; ritmo=[7, 15]
//! ```

use crate::clip::{Clip, ClipDuration, ParamMap, ParamValue, Rgb};
use crate::config::score::{ATTACK_KEY, COLOR_KEY, DURATION_KEY, NAME_KEY, TRACK_KEY};
use crate::document::ParamEdit;
use crate::error::{EditorError, Result};

/// What a prompt's text is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// File path to save the score to
    SaveAs,
    /// New name for the selected clips
    RenameClip,
    /// New name for the focused track
    RenameTrack,
    /// Parameter form of the focused clip
    EditParams,
    /// Beat range, and optionally a track range, to select
    SelectRange,
}

impl PromptKind {
    /// Label shown before the input
    pub fn label(&self) -> &'static str {
        match self {
            PromptKind::SaveAs => "Save as",
            PromptKind::RenameClip => "Clip name",
            PromptKind::RenameTrack => "Track name",
            PromptKind::EditParams => "Parameters",
            PromptKind::SelectRange => "Select beats (from to [track from to])",
        }
    }
}

/// Prompt being typed
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

impl Prompt {
    pub fn new(kind: PromptKind, input: impl Into<String>) -> Self {
        Self {
            kind,
            input: input.into(),
        }
    }

    /// Status bar text, with a trailing cursor
    pub fn display(&self) -> String {
        format!(" {}: {}_", self.kind.label(), self.input)
    }
}

/// Selection rectangle in logical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatRange {
    pub from_beats: f64,
    pub to_beats: f64,
    /// First track, 0-based
    pub first_track: usize,
    /// Last track, inclusive
    pub last_track: usize,
}

fn invalid(message: impl Into<String>) -> EditorError {
    EditorError::InvalidInput(message.into())
}

fn parse_number(text: &str, what: &str) -> Result<f64> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{} must be a number, got `{}`", what, text.trim())))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(format!("{} must be finite", what)))
    }
}

fn strip_brackets(text: &str) -> Option<&str> {
    text.strip_prefix('[').and_then(|t| t.strip_suffix(']'))
}

fn is_list(text: &str) -> bool {
    strip_brackets(text).is_some() || text.contains(',')
}

fn parse_list(text: &str, what: &str) -> Result<Vec<f64>> {
    let inner = strip_brackets(text).unwrap_or(text);
    let values = inner
        .split(',')
        .map(|item| parse_number(item, what))
        .collect::<Result<Vec<_>>>()?;
    Ok(values)
}

/// Parse one parameter value: a list, a number or free text
fn parse_value(key: &str, text: &str) -> Result<ParamValue> {
    if is_list(text) {
        return parse_list(text, key).map(ParamValue::Numbers);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(ParamValue::Number(v)),
        Ok(_) => Err(invalid(format!("{} must be finite", key))),
        Err(_) => Ok(ParamValue::Text(text.trim_matches(|c| c == '"' || c == '\'').to_string())),
    }
}

fn format_numbers(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Current values of a clip as parameter form text
pub fn param_form_text(clip: &Clip) -> String {
    let color: [u8; 3] = clip.color().into();
    let duration = match clip.duration() {
        ClipDuration::Beats(b) => b.to_string(),
        ClipDuration::Sequence(values) => format_numbers(values),
    };
    let mut fields = vec![
        format!("{}={}", NAME_KEY, clip.name()),
        format!("{}={}, {}, {}", COLOR_KEY, color[0], color[1], color[2]),
        format!("{}={}", ATTACK_KEY, clip.beat_position()),
        format!("{}={}", DURATION_KEY, duration),
    ];
    for (key, value) in clip.params().iter() {
        let text = match value {
            ParamValue::Numbers(values) => format_numbers(values),
            other => other.to_string(),
        };
        fields.push(format!("{}={}", key, text));
    }
    fields.join("; ")
}

/// Turn parameter form text into an edit of `clip`.
///
/// Only the keys present in `text` change; gesture parameters not named
/// keep their values.
pub fn parse_param_form(clip: &Clip, text: &str) -> Result<ParamEdit> {
    let mut edit = ParamEdit::new();
    let mut params: Option<ParamMap> = None;

    for field in text.split(';').map(str::trim).filter(|f| !f.is_empty()) {
        let Some((key, value)) = field.split_once('=') else {
            return Err(invalid(format!("expected key=value, got `{}`", field)));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(invalid(format!("missing key in `{}`", field)));
        }
        match key {
            NAME_KEY => {
                if value.is_empty() {
                    return Err(invalid("clip name must not be empty"));
                }
                edit = edit.name(value);
            }
            COLOR_KEY => {
                let parts = parse_list(value, COLOR_KEY)?;
                let rgb: Vec<u8> = parts
                    .iter()
                    .filter(|c| c.fract() == 0.0 && (0.0..=255.0).contains(*c))
                    .map(|c| *c as u8)
                    .collect();
                let [r, g, b] = rgb[..] else {
                    return Err(invalid("color must be three whole numbers from 0 to 255"));
                };
                edit = edit.color(Rgb::new(r, g, b));
            }
            ATTACK_KEY => edit = edit.beat_position(parse_number(value, ATTACK_KEY)?),
            DURATION_KEY => {
                let duration = if is_list(value) {
                    ClipDuration::Sequence(parse_list(value, DURATION_KEY)?)
                } else {
                    ClipDuration::Beats(parse_number(value, DURATION_KEY)?)
                };
                edit = edit.duration(duration);
            }
            TRACK_KEY => return Err(invalid("move the clip to change its track")),
            _ => {
                let value = parse_value(key, value)?;
                params
                    .get_or_insert_with(|| clip.params().clone())
                    .insert(key, value);
            }
        }
    }

    if let Some(params) = params {
        edit = edit.params(params);
    }
    Ok(edit)
}

/// Parse `from to [first last]`; tracks are 1-based as displayed
pub fn parse_beat_range(text: &str, track_count: usize) -> Result<BeatRange> {
    let numbers = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| parse_number(s, "range"))
        .collect::<Result<Vec<_>>>()?;

    let (from, to, tracks) = match numbers[..] {
        [from, to] => (from, to, None),
        [from, to, first, last] => (from, to, Some((first, last))),
        _ => return Err(invalid("expected `from to` or `from to first_track last_track`")),
    };
    if track_count == 0 {
        return Err(invalid("no tracks to select on"));
    }

    let (first_track, last_track) = match tracks {
        None => (0, track_count - 1),
        Some((first, last)) => {
            let (first, last) = (first.min(last), first.max(last));
            if first < 1.0 || last > track_count as f64 || first.fract() != 0.0 || last.fract() != 0.0 {
                return Err(invalid(format!("tracks must be whole numbers from 1 to {}", track_count)));
            }
            (first as usize - 1, last as usize - 1)
        }
    };

    Ok(BeatRange {
        from_beats: from.min(to),
        to_beats: from.max(to),
        first_track,
        last_track,
    })
}
