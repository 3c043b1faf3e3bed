// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for DPT
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Structural rebuilds (zoom, track height) on large documents
//! - Command history execute/undo churn
//! - Score serialization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dpt::config::ScoreFile;
use dpt::{Document, ParamMap};

/// Document with `size` clips spread over 16 tracks
fn large_document(size: usize) -> Document {
    let mut doc = Document::with_tracks(16);
    for i in 0..size {
        doc.place(i as f64 * 0.5, i % 16, 2.0, format!("Clip {}", i), ParamMap::gesture_defaults())
            .expect("bench clip");
    }
    doc
}

/// Benchmark zoom rebuilds (every view recomputed)
fn bench_rescale(c: &mut Criterion) {
    let mut group = c.benchmark_group("rescale");

    for size in [100, 1000, 10000].iter() {
        let mut doc = large_document(*size);
        group.bench_with_input(BenchmarkId::new("zoom_in_out", size), size, |b, _| {
            b.iter(|| {
                doc.set_zoom(black_box(1.2)).unwrap();
                doc.set_zoom(black_box(1.0 / 1.2)).unwrap();
                black_box(doc.generation())
            })
        });

        let mut doc = large_document(*size);
        group.bench_with_input(BenchmarkId::new("track_height", size), size, |b, _| {
            b.iter(|| {
                doc.set_track_height(black_box(1.5)).unwrap();
                doc.set_track_height(black_box(1.0 / 1.5)).unwrap();
                black_box(doc.views().len())
            })
        });
    }

    group.finish();
}

/// Benchmark execute/undo/redo churn on the bounded history
fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");

    group.bench_function("execute_past_bound", |b| {
        let mut doc = large_document(64);
        let ids: Vec<_> = doc.clips().ids().collect();
        let mut step = 0usize;
        b.iter(|| {
            step += 1;
            let id = ids[step % ids.len()];
            doc.set_position(id, (step % 1000) as f64, step % 16).unwrap();
            black_box(doc.history().undo_len())
        })
    });

    group.bench_function("undo_redo_50", |b| {
        let mut doc = large_document(64);
        let ids: Vec<_> = doc.clips().ids().collect();
        for i in 0..50 {
            doc.set_position(ids[i], 100.0 + i as f64, i % 16).unwrap();
        }
        b.iter(|| {
            while doc.undo().unwrap() {}
            while doc.redo().unwrap() {}
            black_box(doc.can_undo())
        })
    });

    group.bench_function("group_move_256", |b| {
        let mut doc = large_document(256);
        doc.select_all();
        let anchor = doc.clips().ids().last().unwrap();
        let y = doc.tracks().track_to_y(15) + 1.0;
        let mut offset = 0.0;
        b.iter(|| {
            offset = if offset == 0.0 { 100.0 } else { 0.0 };
            let x = doc.view(anchor).unwrap().x + offset - 50.0;
            black_box(doc.move_to(anchor, x, y).unwrap())
        })
    });

    group.finish();
}

/// Benchmark score YAML serialization and parsing
fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    for size in [100, 1000].iter() {
        let score = large_document(*size).to_score();
        group.bench_with_input(BenchmarkId::new("to_yaml", size), &score, |b, score| {
            b.iter(|| black_box(score.to_yaml().unwrap().len()))
        });

        let yaml = score.to_yaml().unwrap();
        group.bench_with_input(BenchmarkId::new("from_yaml", size), &yaml, |b, yaml| {
            b.iter(|| black_box(ScoreFile::from_yaml(yaml).unwrap().clips.len()))
        });

        group.bench_with_input(BenchmarkId::new("load_score", size), &score, |b, score| {
            let mut doc = Document::with_tracks(16);
            b.iter(|| {
                doc.load_score(score).unwrap();
                black_box(doc.clips().len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rescale, bench_history, bench_score);
criterion_main!(benches);
