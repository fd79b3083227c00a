use autocommit_core::engine::state::{ActivityHistoryEntry, ActivityKind, OrchestrationState};
use autocommit_core::monitor::fingerprint::fingerprint;
use autocommit_core::monitor::{ChangeFilter, DiffFingerprinter, DuplicateSuppressor};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

fn sample_diff(lines: usize) -> String {
    let mut diff = String::from("diff --git a/src/lib.rs b/src/lib.rs\n");
    diff.push_str("--- a/src/lib.rs\n+++ b/src/lib.rs\n");
    for i in 0..lines {
        diff.push_str(&format!("+let value_{} = compute({});\n", i, i));
    }
    diff
}

fn bench_ingest(c: &mut Criterion) {
    let filter = ChangeFilter::new("/repo");
    let paths: Vec<PathBuf> = (0..100)
        .map(|i| match i % 4 {
            0 => PathBuf::from(format!("/repo/.git/objects/{:02x}/abc", i)),
            1 => PathBuf::from("/repo/.DS_Store"),
            _ => PathBuf::from(format!("/repo/src/module_{}.rs", i)),
        })
        .collect();

    c.bench_function("filter_100_paths", |b| {
        b.iter(|| {
            paths
                .iter()
                .filter(|p| !filter.is_ignored(black_box(p)))
                .count()
        });
    });

    c.bench_function("suppress_burst_100", |b| {
        let suppressor = DuplicateSuppressor::default();
        let start = Instant::now();
        b.iter(|| {
            for i in 0..100u64 {
                let at = start + Duration::from_millis(i);
                suppressor.admit_at(black_box(Path::new("src/lib.rs")), at);
            }
            suppressor.clear();
        });
    });

    let small = sample_diff(20);
    let large = sample_diff(2_000);

    c.bench_function("fingerprint_small_diff", |b| {
        b.iter(|| fingerprint(black_box(&small)))
    });
    c.bench_function("fingerprint_large_diff", |b| {
        b.iter(|| fingerprint(black_box(&large)))
    });

    c.bench_function("fingerprinter_unchanged", |b| {
        let fp = DiffFingerprinter::new();
        fp.observe(&large);
        b.iter(|| fp.observe(black_box(&large)));
    });

    c.bench_function("diff_summary_large", |b| {
        b.iter(|| regex_utils::diffstat::summarize(black_box(&large)));
    });
}

fn bench_state(c: &mut Criterion) {
    c.bench_function("state_record_change", |b| {
        let state = OrchestrationState::new();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let path = format!("src/file_{}.rs", i % 500);
            state.record_change(PathBuf::from(path));
        });
    });

    c.bench_function("state_history_at_capacity", |b| {
        let state = OrchestrationState::new();
        b.iter(|| {
            let entry = ActivityHistoryEntry::new(ActivityKind::FileChange, "changed");
            state.append_history(entry)
        });
    });
}

criterion_group!(benches, bench_ingest, bench_state);
criterion_main!(benches);
