// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for DPT
//!
//! These tests drive the public API: coordinate mapping, document edits,
//! history and score files working together.

use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use dpt::config::ScoreFile;
use dpt::coords::{CoordinateModel, DEFAULT_PIXELS_PER_BEAT};
use dpt::history::{ClipMove, CommandHistory, EditCommand, EditTarget, HistoryAction, MAX_DEPTH};
use dpt::{Clip, ClipId, ClipStore, Document, EditorError, ParamMap, Placement};

const TOLERANCE: f64 = 1e-9;

fn document_with(clips: &[(f64, usize)], tracks: usize) -> (Document, Vec<ClipId>) {
    let mut doc = Document::with_tracks(tracks);
    let ids = clips
        .iter()
        .map(|&(beats, track)| doc.place(beats, track, 3.0, "Clip", ParamMap::new()).unwrap())
        .collect();
    (doc, ids)
}

/// Y of a lane's top edge; drops snap to the nearest lane top
fn track_top(doc: &Document, track: usize) -> f64 {
    doc.tracks().track_to_y(track)
}

/// beats -> pixels -> beats is lossless for any zoom
#[test]
fn test_round_trip_sweep() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let mut coords = CoordinateModel::new(DEFAULT_PIXELS_PER_BEAT).unwrap();
        coords.rescale(rng.gen_range(0.01..100.0)).unwrap();
        for _ in 0..20 {
            let beats: f64 = rng.gen_range(0.0..10_000.0);
            let back = coords.pixels_x_to_beats(coords.beats_to_pixels_x(beats));
            assert!(
                (back - beats).abs() <= beats.max(1.0) * 1e-12,
                "zoom {} beats {} came back as {}",
                coords.zoom_level(),
                beats,
                back
            );
        }
    }
}

/// snap(snap(x)) == snap(x)
#[test]
fn test_snap_idempotence_sweep() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..100 {
        let mut coords = CoordinateModel::new(DEFAULT_PIXELS_PER_BEAT).unwrap();
        coords.rescale(rng.gen_range(0.05..20.0)).unwrap();
        for _ in 0..50 {
            let x: f64 = rng.gen_range(-500.0..50_000.0);
            let once = coords.snap(x);
            let twice = coords.snap(once);
            assert!((once - twice).abs() < 1e-6, "snap({}) = {} but snap again = {}", x, once, twice);
            assert!(once >= 0.0);
        }
    }
}

#[test]
fn test_zoom_does_not_compound() {
    let (mut doc, ids) = document_with(&[(3.0, 0)], 2);
    doc.set_zoom(1.2).unwrap();
    doc.set_zoom(1.0 / 1.2).unwrap();

    let clip = doc.clip(ids[0]).unwrap();
    assert!((clip.beat_position() - 3.0).abs() < TOLERANCE);
    let view = doc.view(ids[0]).unwrap();
    assert!((view.x - 300.0).abs() < 1e-6);

    // Many zoom steps still leave the logical position untouched
    for _ in 0..25 {
        doc.set_zoom(1.2).unwrap();
    }
    for _ in 0..25 {
        doc.set_zoom(1.0 / 1.2).unwrap();
    }
    assert_eq!(doc.clip(ids[0]).unwrap().beat_position(), 3.0);
}

#[test]
fn test_history_bound_keeps_most_recent() {
    let (mut doc, ids) = document_with(&[(0.0, 0)], 1);
    for i in 1..=55 {
        doc.set_position(ids[0], i as f64, 0).unwrap();
    }
    assert_eq!(doc.history().undo_len(), MAX_DEPTH);

    let mut undone = 0;
    while doc.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, MAX_DEPTH);
    // The five oldest moves were evicted
    assert_eq!(doc.clip(ids[0]).unwrap().beat_position(), 5.0);
}

#[test]
fn test_redo_invalidated_by_new_edit() {
    let (mut doc, ids) = document_with(&[(0.0, 0)], 2);
    doc.set_position(ids[0], 1.0, 0).unwrap();
    doc.undo().unwrap();
    assert!(doc.can_redo());

    doc.set_position(ids[0], 2.0, 1).unwrap();
    assert!(!doc.can_redo());
    assert_eq!(doc.history().redo_len(), 0);
}

#[test]
fn test_track_deletion_renumbers() {
    let (mut doc, ids) = document_with(&[(0.0, 0), (0.0, 1), (0.0, 2), (0.0, 3)], 4);

    let discarded = doc.delete_track(1).unwrap();
    assert_eq!(discarded, 1);
    assert_eq!(doc.tracks().count(), 3);
    assert!(doc.clip(ids[1]).is_none());
    assert_eq!(doc.clip(ids[0]).unwrap().track(), 0);
    assert_eq!(doc.clip(ids[2]).unwrap().track(), 1);
    assert_eq!(doc.clip(ids[3]).unwrap().track(), 2);
    assert_eq!(doc.clips().on_track(3).count(), 0);
}

#[test]
fn test_delete_track_out_of_range() {
    let (mut doc, _) = document_with(&[(0.0, 0)], 2);
    assert!(matches!(
        doc.delete_track(2),
        Err(EditorError::InvalidTrack { index: 2, count: 2 })
    ));
    assert_eq!(doc.tracks().count(), 2);
}

#[test]
fn test_move_undo_redo_end_to_end() {
    let mut doc = Document::with_tracks(2);
    let id = doc.place(0.0, 0, 3.0, "Clip", ParamMap::new()).unwrap();

    let px_x = doc.coords().beats_to_pixels_x(2.0);
    let px_y = track_top(&doc, 0);
    assert!(doc.move_to(id, px_x, px_y).unwrap());
    assert_eq!(doc.clip(id).unwrap().beat_position(), 2.0);
    assert_eq!(doc.history().undo_label(), Some("Move"));

    assert!(doc.undo().unwrap());
    assert_eq!(doc.clip(id).unwrap().beat_position(), 0.0);

    assert!(doc.redo().unwrap());
    assert_eq!(doc.clip(id).unwrap().beat_position(), 2.0);
    assert_eq!(doc.view(id).unwrap().x, px_x);
}

#[test]
fn test_group_move_floor() {
    let (mut doc, ids) = document_with(&[(0.0, 0), (1.0, 0)], 3);
    doc.select(ids[0]).unwrap();
    doc.toggle_select(ids[1]).unwrap();

    // Drag the second clip 50px left and one track down
    let quantum = doc.coords().snap_quantum();
    let px_x = doc.view(ids[1]).unwrap().x - 8.0 * quantum;
    let px_y = track_top(&doc, 1);
    assert!(doc.move_to(ids[1], px_x, px_y).unwrap());

    let first = doc.clip(ids[0]).unwrap();
    let second = doc.clip(ids[1]).unwrap();
    assert_eq!(first.placement(), Placement::new(0.0, 1));
    assert_eq!(second.placement(), Placement::new(1.0, 1));
    assert_eq!(doc.history().undo_len(), 1);
}

#[test]
fn test_undo_after_zoom_and_track_move() {
    let (mut doc, ids) = document_with(&[(1.0, 0), (2.0, 3)], 4);
    doc.set_position(ids[1], 4.0, 3).unwrap();

    doc.set_zoom(2.0).unwrap();
    doc.set_track_height(1.5).unwrap();
    assert!(doc.move_track(3, -1).unwrap());
    assert_eq!(doc.clip(ids[1]).unwrap().track(), 2);

    // The command was retargeted to the clip's new track
    assert!(doc.undo().unwrap());
    assert_eq!(doc.clip(ids[1]).unwrap().placement(), Placement::new(2.0, 2));
    assert_eq!(doc.view(ids[1]).unwrap().x, 400.0);
}

#[test]
fn test_undo_after_track_inserted_above() {
    let (mut doc, ids) = document_with(&[(0.0, 0)], 4);
    assert!(doc.set_position(ids[0], 6.0, 0).unwrap());

    doc.insert_track(0).unwrap();
    assert_eq!(doc.clip(ids[0]).unwrap().placement(), Placement::new(6.0, 1));

    // Undo restores the old beat position on the shifted track
    assert!(doc.undo().unwrap());
    assert_eq!(doc.clip(ids[0]).unwrap().placement(), Placement::new(0.0, 1));
    assert!(doc.redo().unwrap());
    assert_eq!(doc.clip(ids[0]).unwrap().placement(), Placement::new(6.0, 1));
}

#[test]
fn test_history_events_are_published() {
    let (mut doc, ids) = document_with(&[(0.0, 0)], 2);
    let events = doc.subscribe_history();

    doc.set_position(ids[0], 1.0, 0).unwrap();
    doc.undo().unwrap();
    doc.redo().unwrap();

    let actions: Vec<HistoryAction> = events.try_iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![HistoryAction::Execute, HistoryAction::Undo, HistoryAction::Redo]
    );
}

#[test]
fn test_layout_published_on_structural_rebuild() {
    let (mut doc, _) = document_with(&[(10.0, 0)], 2);
    let layouts = doc.subscribe_layout();

    doc.set_zoom(2.0).unwrap();
    doc.add_track();

    let received: Vec<_> = layouts.try_iter().collect();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].zoom_level, 2.0);
    assert_eq!(received[1].track_count, 3);
    // Last clip ends at 13 beats = 2600px, below the zoomed minimum
    assert_eq!(received[1].content_width, 4000.0);
}

#[test]
fn test_history_over_plain_store() {
    let mut store = ClipStore::new();
    let id = store.insert(Clip::new(0.0, 0, 2.0, "Solo").unwrap());
    let mut history = CommandHistory::with_max_depth(3);

    for i in 1..=5 {
        let before = store.require(id).unwrap().placement();
        let cmd = EditCommand::SetPosition(ClipMove {
            clip: id,
            before,
            after: Placement::new(i as f64, i % 2),
        });
        history.execute(cmd, &mut EditTarget::new(&mut store, 2)).unwrap();
    }
    assert_eq!(history.undo_len(), 3);
    assert_eq!(store.require(id).unwrap().placement(), Placement::new(5.0, 1));

    // A vanished target fails the undo and keeps the command
    let removed = store.remove(id).unwrap();
    let err = history.undo(&mut EditTarget::new(&mut store, 2)).unwrap_err();
    assert!(matches!(err, EditorError::UnknownClip(missing) if missing == id));
    assert_eq!(history.undo_len(), 3);
    assert_eq!(removed.beat_position(), 5.0);
}

#[test]
fn test_save_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("score.yaml");

    let (mut doc, ids) = document_with(&[(0.5, 0), (4.0, 2)], 3);
    doc.set_position(ids[1], 6.0, 1).unwrap();
    let saved = doc.save(Some(&path)).unwrap();
    assert_eq!(saved, path);
    assert!(!doc.is_dirty());

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("comportamenti:"));
    assert!(text.contains("cAttacco: 6"));

    let mut reopened = Document::with_tracks(3);
    reopened.open(&path).unwrap();
    let placements: Vec<Placement> = reopened.clips().iter().map(|(_, c)| c.placement()).collect();
    assert_eq!(placements, vec![Placement::new(0.5, 0), Placement::new(6.0, 1)]);
    assert!(!reopened.can_undo());
    assert_eq!(reopened.path(), Some(path.as_path()));
}

#[test]
fn test_hand_written_score() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gestures.yaml");
    fs::write(
        &path,
        "comportamenti:\n\
         - cAttacco: 0\n  durataArmonica: 26\n  ritmo: [7, 15]\n  durata: 4.5\n\
         - cAttacco: 2.25\n  durata: [3, 0.5]\n  traccia: 9\n",
    )
    .unwrap();

    let mut doc = Document::with_tracks(4);
    doc.open(&path).unwrap();
    let clips: Vec<_> = doc.clips().iter().map(|(_, c)| c.clone()).collect();
    assert_eq!(clips.len(), 2);
    assert_eq!(clips[0].duration_beats(), 4.5);
    assert_eq!(clips[0].params().get_number("durataArmonica", 0.0), 26.0);
    // Out-of-range explicit track falls back to position
    assert_eq!(clips[1].track(), 1);
    assert_eq!(clips[1].duration_beats(), 3.0);
}

#[test]
fn test_malformed_score_leaves_document_untouched() {
    let (mut doc, _) = document_with(&[(0.0, 0)], 2);
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "comportamenti:\n- durata: 1\n").unwrap();

    assert!(matches!(doc.open(&path), Err(EditorError::MalformedData(_))));
    assert_eq!(doc.clips().len(), 1);
    assert!(doc.path().is_none());

    assert!(matches!(
        ScoreFile::from_yaml("- just\n- a list\n"),
        Err(EditorError::MalformedData(_))
    ));
}

/// Random edit sequences always undo back to the starting placements
#[test]
fn test_random_edits_fully_undo() {
    let mut rng = StdRng::seed_from_u64(7);
    let (mut doc, ids) = document_with(&[(0.0, 0), (2.0, 1), (5.0, 2), (9.0, 3)], 4);
    let start: Vec<Placement> = ids.iter().map(|&id| doc.clip(id).unwrap().placement()).collect();

    let mut executed = 0;
    for _ in 0..40 {
        let id = ids[rng.gen_range(0..ids.len())];
        let changed = match rng.gen_range(0..3) {
            0 => {
                let px_x = rng.gen_range(0.0..2000.0);
                let px_y = track_top(&doc, rng.gen_range(0..4));
                doc.move_to(id, px_x, px_y).unwrap()
            }
            1 => doc.resize_by_factor(id, rng.gen_range(0.8..1.25)).unwrap(),
            _ => doc
                .set_position(id, rng.gen_range(0.0..20.0), rng.gen_range(0..4))
                .unwrap(),
        };
        if changed {
            executed += 1;
        }
        if rng.gen_bool(0.2) {
            doc.set_zoom(rng.gen_range(0.5..2.0)).unwrap();
        }
    }
    assert_eq!(doc.history().undo_len(), executed.min(MAX_DEPTH));

    while doc.undo().unwrap() {}
    let end: Vec<Placement> = ids.iter().map(|&id| doc.clip(id).unwrap().placement()).collect();
    assert_eq!(end, start);
    assert!(ids.iter().all(|&id| doc.clip(id).unwrap().duration_beats() == 3.0));
}
