//! End-to-end indexing benchmarks using a real repository.
//!
//! Run with: `TRIGREP_BENCH_REPO=/path/to/repo cargo bench --bench indexing`
//! Save baseline: `cargo bench --bench indexing -- --save-baseline main`
//! Compare: `cargo bench --bench indexing -- --baseline main`

use criterion::{criterion_group, criterion_main, Criterion};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use trigrep::index::build::{build_index, BuildOptions};
use trigrep::scan::WalkScanner;

const REPO_ENV: &str = "TRIGREP_BENCH_REPO";

fn run_index(repo: &PathBuf, out: &TempDir, max_segment_bytes: u64) -> Duration {
    let index_path = out.path().join("index");
    let _ = std::fs::remove_file(&index_path);
    let options = BuildOptions {
        max_segment_bytes,
        silent: true,
        ..Default::default()
    };

    let start = Instant::now();
    if let Err(err) = build_index(&WalkScanner::new(repo), &index_path, &options) {
        eprintln!("indexing failed: {:#}", err);
    }
    start.elapsed()
}

fn bench_repo(c: &mut Criterion) {
    let Some(repo) = std::env::var_os(REPO_ENV).map(PathBuf::from) else {
        eprintln!("Skipping indexing benchmark - set {} to a source tree", REPO_ENV);
        return;
    };
    let out = TempDir::new().expect("Failed to create temp dir");

    let mut group = c.benchmark_group("indexing");
    group.sample_size(10); // Fewer samples since each run is slow
    group.measurement_time(Duration::from_secs(300));

    for (name, max_segment_bytes) in [("single_segment", u64::MAX), ("16mb_segments", 16 << 20)] {
        group.bench_function(name, |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    total += run_index(&repo, &out, max_segment_bytes);
                }
                total
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_repo);
criterion_main!(benches);
