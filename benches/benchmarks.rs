//! Performance benchmarks for trigrep
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use trigrep::index::build::{build_index, BuildOptions};
use trigrep::index::MultiIndex;
use trigrep::scan::WalkScanner;

/// Create a test directory with sample files and an index over it
fn create_benchmark_fixtures() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root_path = temp_dir.path().join("tree");
    fs::create_dir_all(&root_path).expect("Failed to create tree");

    for i in 0..50 {
        let content = format!(
            r#"// File {i}
fn function_{i}() {{
    println!("Hello from function {i}");
    let x = {i} * 2;
    let y = x + 1;
}}

struct Struct{i} {{
    field: i32,
    name: String,
}}

impl Struct{i} {{
    fn new() -> Self {{
        Self {{ field: {i}, name: "test".to_string() }}
    }}
}}
"#,
            i = i
        );
        fs::write(root_path.join(format!("file_{}.rs", i)), content)
            .expect("Failed to write file");
    }

    let index_path = temp_dir.path().join("index");
    let options = BuildOptions {
        silent: true,
        ..Default::default()
    };
    build_index(&WalkScanner::new(&root_path), &index_path, &options).expect("Failed to build index");

    (temp_dir, index_path)
}

fn bench_trigram_extraction(c: &mut Criterion) {
    let small_content = "fn main() { println!(\"hello\"); }";
    let medium_content = small_content.repeat(100);
    let large_content = small_content.repeat(10000);

    let mut group = c.benchmark_group("trigram_extraction");
    group.bench_function("small", |b| {
        b.iter(|| trigrep::utils::extract_trigrams(black_box(small_content)))
    });
    group.bench_function("medium", |b| {
        b.iter(|| trigrep::utils::extract_trigrams(black_box(&medium_content)))
    });
    group.bench_function("large", |b| {
        b.iter(|| trigrep::utils::extract_trigrams(black_box(&large_content)))
    });
    group.finish();
}

fn bench_query_planning(c: &mut Criterion) {
    let queries = ["fn", "main", "Hello from", "println!(\"hello\")"];

    let mut group = c.benchmark_group("query_planning");
    for q in queries {
        group.bench_with_input(BenchmarkId::new("ignore_case", q), q, |b, q| {
            b.iter(|| trigrep::query::plan_literal(black_box(q), false))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let (_temp_dir, index_path) = create_benchmark_fixtures();
    let index = MultiIndex::open(&index_path).expect("Failed to open index");

    let mut group = c.benchmark_group("search");
    group.bench_function("literal", |b| {
        b.iter(|| index.containing_str(black_box("function"), true))
    });
    group.bench_function("phrase", |b| {
        b.iter(|| index.containing_str(black_box("Hello from"), true))
    });
    group.bench_function("ignore_case", |b| {
        b.iter(|| index.containing_str(black_box("struct"), false))
    });
    group.bench_function("short", |b| {
        b.iter(|| index.containing_str(black_box("fn"), true))
    });
    group.finish();
}

fn bench_set_algebra(c: &mut Criterion) {
    let evens: Vec<i32> = (0..100_000).step_by(2).collect();
    let threes: Vec<i32> = (0..100_000).step_by(3).collect();

    c.bench_function("intersect_100k", |b| {
        b.iter(|| trigrep::query::intersect(black_box(&evens), black_box(&threes)))
    });
    c.bench_function("union_100k", |b| {
        b.iter(|| trigrep::query::union(black_box(&evens), black_box(&threes)))
    });
}

fn bench_index_reading(c: &mut Criterion) {
    let (_temp_dir, index_path) = create_benchmark_fixtures();

    c.bench_function("index_open", |b| {
        b.iter(|| MultiIndex::open(black_box(&index_path)))
    });
}

criterion_group!(
    benches,
    bench_trigram_extraction,
    bench_query_planning,
    bench_search,
    bench_set_algebra,
    bench_index_reading,
);

criterion_main!(benches);
