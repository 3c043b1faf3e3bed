// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! DPT score files.
//!
//! A score is a YAML mapping with a `comportamenti` sequence; every entry
//! is one clip:
//!
//! ```yaml
//! comportamenti:
//! - cAttacco: 0.0
//!   durataArmonica: 26
//!   ritmo: [7, 15]
//!   durata: 5.0
//!   ampiezza: [-30, -0.25]
//!   frequenza: [6, 1]
//!   posizione: -8
//!   name: Swell
//!   color: [100, 150, 200]
//!   traccia: 2
//! ```
//!
//! `cAttacco` and `durata` are required. `name`, `color` and `traccia` are
//! editor extensions. Every other key is carried as an opaque parameter.
//!
//! Field values are bounded: sequences may not be empty, longer than
//! [`MAX_SEQUENCE_LENGTH`] items or nested deeper than
//! [`MAX_SEQUENCE_DEPTH`], and strings may not exceed
//! [`MAX_STRING_LENGTH`] characters.

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::clip::{ClipDuration, ParamMap, Rgb};
use crate::error::{EditorError, Result};

/// Top-level key holding the clip list
pub const SCORE_KEY: &str = "comportamenti";

/// Attack time in beats
pub const ATTACK_KEY: &str = "cAttacco";

/// Duration, a number or a number sequence
pub const DURATION_KEY: &str = "durata";

pub const NAME_KEY: &str = "name";
pub const COLOR_KEY: &str = "color";

/// Explicit track index
pub const TRACK_KEY: &str = "traccia";

/// Deepest sequence nesting accepted in a clip field
pub const MAX_SEQUENCE_DEPTH: usize = 10;

/// Most items accepted in one sequence
pub const MAX_SEQUENCE_LENGTH: usize = 1000;

/// Longest string accepted, in characters
pub const MAX_STRING_LENGTH: usize = 10_000;

/// Order in which the standard gesture keys are written
const STANDARD_ORDER: [&str; 7] = [
    ATTACK_KEY,
    "durataArmonica",
    "ritmo",
    DURATION_KEY,
    "ampiezza",
    "frequenza",
    "posizione",
];

/// One clip as stored in a score
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRecord {
    /// Attack time in beats (`cAttacco`)
    pub attack: f64,
    /// Duration (`durata`)
    pub duration: ClipDuration,
    pub name: Option<String>,
    pub color: Option<Rgb>,
    /// Explicit track (`traccia`)
    pub track: Option<usize>,
    /// Remaining gesture parameters in file order
    pub params: ParamMap,
}

/// A whole score
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreFile {
    pub clips: Vec<ClipRecord>,
}

impl ScoreFile {
    /// Load a score from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let score = Self::from_yaml(&contents)?;
        info!(path = ?path.as_ref(), clips = score.clips.len(), "score loaded");
        Ok(score)
    }

    /// Parse a score, checking its shape
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(yaml)?;
        let Value::Mapping(root) = root else {
            return Err(malformed("score must be a mapping"));
        };
        let entries = match root.get(SCORE_KEY) {
            Some(Value::Sequence(entries)) => entries,
            Some(_) => return Err(malformed(format!("`{}` must be a sequence", SCORE_KEY))),
            None => return Err(malformed(format!("missing `{}`", SCORE_KEY))),
        };
        let clips = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| parse_record(i, entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clips })
    }

    /// Serialize with the standard keys in canonical order
    pub fn to_yaml(&self) -> Result<String> {
        let clips = self
            .clips
            .iter()
            .map(record_to_value)
            .collect::<Result<Vec<_>>>()?;
        let mut root = Mapping::new();
        root.insert(key(SCORE_KEY), Value::Sequence(clips));
        Ok(serde_yaml::to_string(&Value::Mapping(root))?)
    }

    /// Save a score to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)?;
        info!(path = ?path.as_ref(), clips = self.clips.len(), "score saved");
        Ok(())
    }
}

fn malformed(message: impl Into<String>) -> EditorError {
    EditorError::MalformedData(message.into())
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn number_list(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Sequence(items) => items.iter().map(finite_number).collect(),
        _ => None,
    }
}

/// Check a field value against the size limits
fn check_limits(value: &Value, depth: usize) -> std::result::Result<(), String> {
    if depth > MAX_SEQUENCE_DEPTH {
        return Err(format!("is nested deeper than {} levels", MAX_SEQUENCE_DEPTH));
    }
    match value {
        Value::String(s) if s.chars().count() > MAX_STRING_LENGTH => Err(format!(
            "is longer than {} characters",
            MAX_STRING_LENGTH
        )),
        Value::Sequence(items) if items.is_empty() => Err("is an empty sequence".to_string()),
        Value::Sequence(items) if items.len() > MAX_SEQUENCE_LENGTH => Err(format!(
            "has more than {} items",
            MAX_SEQUENCE_LENGTH
        )),
        Value::Sequence(items) => items.iter().try_for_each(|item| check_limits(item, depth + 1)),
        _ => Ok(()),
    }
}

fn parse_record(index: usize, entry: &Value) -> Result<ClipRecord> {
    let Value::Mapping(fields) = entry else {
        return Err(malformed(format!("clip {} is not a mapping", index)));
    };

    let mut attack = None;
    let mut duration = None;
    let mut name = None;
    let mut color = None;
    let mut track = None;
    let mut gesture = Mapping::new();

    for (k, v) in fields {
        let Some(k) = k.as_str() else {
            return Err(malformed(format!("clip {} has a non-string key", index)));
        };
        let bad = |what: &str| malformed(format!("clip {}: `{}` {}", index, k, what));
        check_limits(v, 0).map_err(|what| bad(&what))?;
        match k {
            ATTACK_KEY => {
                let beats = finite_number(v).ok_or_else(|| bad("must be a finite number"))?;
                attack = Some(beats);
            }
            DURATION_KEY => {
                let parsed = match v {
                    Value::Sequence(_) => number_list(v).map(ClipDuration::Sequence),
                    _ => finite_number(v).map(ClipDuration::Beats),
                }
                .ok_or_else(|| bad("must be a finite number or number list"))?;
                if parsed.validate().is_err() {
                    return Err(bad("must be positive"));
                }
                duration = Some(parsed);
            }
            NAME_KEY => {
                let text = v.as_str().ok_or_else(|| bad("must be a string"))?;
                name = Some(text.to_string());
            }
            COLOR_KEY => {
                let rgb = parse_color(v).ok_or_else(|| bad("must be [r, g, b] with 0-255 components"))?;
                color = Some(rgb);
            }
            TRACK_KEY => {
                let t = v.as_u64().ok_or_else(|| bad("must be a non-negative integer"))?;
                track = Some(t as usize);
            }
            _ => {
                gesture.insert(key(k), v.clone());
            }
        }
    }

    let params: ParamMap = serde_yaml::from_value(Value::Mapping(gesture))
        .map_err(|e| malformed(format!("clip {}: {}", index, e)))?;

    Ok(ClipRecord {
        attack: attack.ok_or_else(|| malformed(format!("clip {} is missing `{}`", index, ATTACK_KEY)))?,
        duration: duration
            .ok_or_else(|| malformed(format!("clip {} is missing `{}`", index, DURATION_KEY)))?,
        name,
        color,
        track,
        params,
    })
}

fn parse_color(value: &Value) -> Option<Rgb> {
    let Value::Sequence(items) = value else {
        return None;
    };
    if items.len() != 3 {
        return None;
    }
    let mut rgb = [0u8; 3];
    for (slot, item) in rgb.iter_mut().zip(items) {
        *slot = u8::try_from(item.as_u64()?).ok()?;
    }
    Some(Rgb::from(rgb))
}

fn record_to_value(record: &ClipRecord) -> Result<Value> {
    let mut fields = Mapping::new();
    for name in STANDARD_ORDER {
        match name {
            ATTACK_KEY => {
                fields.insert(key(ATTACK_KEY), Value::Number(record.attack.into()));
            }
            DURATION_KEY => {
                fields.insert(key(DURATION_KEY), serde_yaml::to_value(&record.duration)?);
            }
            _ => {
                if let Some(value) = record.params.get(name) {
                    fields.insert(key(name), serde_yaml::to_value(value)?);
                }
            }
        }
    }
    for (name, value) in record.params.iter() {
        if !STANDARD_ORDER.contains(&name) {
            fields.insert(key(name), serde_yaml::to_value(value)?);
        }
    }
    if let Some(name) = &record.name {
        fields.insert(key(NAME_KEY), Value::String(name.clone()));
    }
    if let Some(color) = record.color {
        fields.insert(key(COLOR_KEY), serde_yaml::to_value(color)?);
    }
    if let Some(track) = record.track {
        fields.insert(key(TRACK_KEY), Value::Number((track as u64).into()));
    }
    Ok(Value::Mapping(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ParamValue;

    const SAMPLE: &str = r#"
comportamenti:
- cAttacco: 0.5
  durataArmonica: 26
  ritmo: [7, 15]
  durata: 5
  ampiezza: [-30, -0.25]
  frequenza: [6, 1]
  posizione: -8
- cAttacco: 3
  durata: [2.5, 0.1]
  name: Tail
  color: [10, 20, 30]
  traccia: 1
  custom: value
"#;

    #[test]
    fn test_parse_sample() {
        let score = ScoreFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(score.clips.len(), 2);

        let first = &score.clips[0];
        assert_eq!(first.attack, 0.5);
        assert_eq!(first.duration, ClipDuration::Beats(5.0));
        assert_eq!(first.track, None);
        assert_eq!(
            first.params.keys().collect::<Vec<_>>(),
            vec!["durataArmonica", "ritmo", "ampiezza", "frequenza", "posizione"]
        );

        let second = &score.clips[1];
        assert_eq!(second.duration, ClipDuration::Sequence(vec![2.5, 0.1]));
        assert_eq!(second.name.as_deref(), Some("Tail"));
        assert_eq!(second.color, Some(Rgb::new(10, 20, 30)));
        assert_eq!(second.track, Some(1));
        assert_eq!(second.params.get("custom"), Some(&ParamValue::Text("value".to_string())));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        for yaml in [
            "- 1\n- 2\n",
            "other: []\n",
            "comportamenti: 5\n",
            "comportamenti:\n- 5\n",
            "comportamenti:\n- durata: 1\n",
            "comportamenti:\n- cAttacco: 1\n",
            "comportamenti:\n- cAttacco: .nan\n  durata: 1\n",
            "comportamenti:\n- cAttacco: 1\n  durata: 0\n",
            "comportamenti:\n- cAttacco: 1\n  durata: 1\n  ritmo: [1, .inf]\n",
            "comportamenti:\n- cAttacco: 1\n  durata: 1\n  color: [1, 2]\n",
            "comportamenti:\n- cAttacco: 1\n  durata: 1\n  traccia: -1\n",
            "comportamenti:\n- cAttacco: 1\n  durata: 1\n  flag: true\n",
        ] {
            let err = ScoreFile::from_yaml(yaml).unwrap_err();
            assert!(
                matches!(err, EditorError::MalformedData(_)),
                "expected malformed data for {:?}, got {:?}",
                yaml,
                err
            );
        }
    }

    fn malformed_message(yaml: &str) -> String {
        match ScoreFile::from_yaml(yaml) {
            Err(EditorError::MalformedData(message)) => message,
            other => panic!("expected malformed data, got {:?}", other),
        }
    }

    fn clip_with(field: &str) -> String {
        format!("comportamenti:\n- cAttacco: 1\n  durata: 1\n  {}\n", field)
    }

    #[test]
    fn test_rejects_empty_sequences() {
        let message = malformed_message(&clip_with("ritmo: []"));
        assert!(message.contains("`ritmo`"), "{}", message);
        assert!(message.contains("empty"), "{}", message);

        let message = malformed_message("comportamenti:\n- cAttacco: 1\n  durata: []\n");
        assert!(message.contains("`durata`"), "{}", message);
    }

    #[test]
    fn test_rejects_long_sequences() {
        let items = vec!["1"; MAX_SEQUENCE_LENGTH + 1].join(", ");
        let message = malformed_message(&clip_with(&format!("ritmo: [{}]", items)));
        assert!(message.contains("`ritmo`"), "{}", message);
        assert!(message.contains("more than 1000 items"), "{}", message);

        let items = vec!["1"; MAX_SEQUENCE_LENGTH].join(", ");
        let score = ScoreFile::from_yaml(&clip_with(&format!("ritmo: [{}]", items))).unwrap();
        assert_eq!(score.clips[0].params.get_numbers("ritmo").map(|v| v.len()), Some(1000));
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let nested = format!("{}1{}", "[".repeat(MAX_SEQUENCE_DEPTH + 1), "]".repeat(MAX_SEQUENCE_DEPTH + 1));
        let message = malformed_message(&clip_with(&format!("frequenza: {}", nested)));
        assert!(message.contains("`frequenza`"), "{}", message);
        assert!(message.contains("nested deeper than 10"), "{}", message);
    }

    #[test]
    fn test_rejects_long_strings() {
        let text = "x".repeat(MAX_STRING_LENGTH + 1);
        let message = malformed_message(&clip_with(&format!("name: {}", text)));
        assert!(message.contains("`name`"), "{}", message);
        assert!(message.contains("longer than 10000"), "{}", message);

        let text = "x".repeat(MAX_STRING_LENGTH);
        let score = ScoreFile::from_yaml(&clip_with(&format!("note: {}", text))).unwrap();
        assert_eq!(score.clips[0].params.get("note"), Some(&ParamValue::Text(text)));
    }

    #[test]
    fn test_bad_parameter_names_its_key() {
        let message = malformed_message(&clip_with("ritmo: [1, .inf]"));
        assert!(message.contains("ritmo"), "{}", message);
        let message = malformed_message(&clip_with("flag: true"));
        assert!(message.contains("flag"), "{}", message);
    }

    #[test]
    fn test_invalid_yaml_is_yaml_error() {
        let err = ScoreFile::from_yaml("comportamenti: [").unwrap_err();
        assert!(matches!(err, EditorError::Yaml(_)));
    }

    #[test]
    fn test_to_yaml_canonical_order() {
        let mut params = ParamMap::new();
        params.insert("extra", ParamValue::Number(1.0));
        params.insert("posizione", ParamValue::Number(-8.0));
        params.insert("durataArmonica", ParamValue::Number(26.0));
        let score = ScoreFile {
            clips: vec![ClipRecord {
                attack: 2.0,
                duration: ClipDuration::Beats(3.5),
                name: Some("A".to_string()),
                color: None,
                track: Some(0),
                params,
            }],
        };

        let yaml = score.to_yaml().unwrap();
        let order: Vec<usize> = ["cAttacco", "durataArmonica", "durata", "posizione", "extra", "name", "traccia"]
            .iter()
            .map(|k| yaml.find(&format!("{}:", k)).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{}", yaml);
        assert!(yaml.contains("durataArmonica: 26\n"));

        let parsed = ScoreFile::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.clips[0].attack, 2.0);
        assert_eq!(parsed.clips[0].track, Some(0));
        assert_eq!(parsed.clips[0].params.get_number("posizione", 0.0), -8.0);
    }

    #[test]
    fn test_empty_score() {
        let score = ScoreFile::from_yaml("comportamenti: []\n").unwrap();
        assert!(score.clips.is_empty());
        assert!(score.to_yaml().unwrap().contains("comportamenti: []"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("score.yaml");
        let score = ScoreFile::from_yaml(SAMPLE).unwrap();
        score.save(&path).unwrap();

        let loaded = ScoreFile::load(&path).unwrap();
        assert_eq!(loaded, score);
    }
}
