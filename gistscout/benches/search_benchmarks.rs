use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gistscout::search::validate_pattern;
use gistscout::transport::GistRecord;
use gistscout::{MemoryTransport, SearchConfig, SearchOptions, SearchOrchestrator};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn build_transport(gist_count: usize, files_per_gist: usize, lines_per_file: usize) -> Arc<MemoryTransport> {
    let mut transport = MemoryTransport::new();
    let mut gists = Vec::with_capacity(gist_count);

    for i in 0..gist_count {
        let mut record = GistRecord::new(format!("g{i}"));
        for j in 0..files_per_gist {
            let url = format!("https://gist.githubusercontent.com/bench/g{i}/f{j}.py");
            let mut body = String::new();
            for line in 0..lines_per_file {
                body.push_str(&format!("value_{line} = compute({line})  # TODO: tune {line}\n"));
            }
            if j == files_per_gist - 1 && i % 4 == 0 {
                body.push_str("import requests\n");
            }
            record = record.with_file(format!("f{j}.py"), &url, body.len() as u64);
            transport = transport.with_file(&url, body);
        }
        gists.push(record);

        // 30 gists per page
        if gists.len() == 30 {
            transport = transport.with_page("bench", std::mem::take(&mut gists));
        }
    }
    if !gists.is_empty() {
        transport = transport.with_page("bench", gists);
    }
    Arc::new(transport)
}

fn bench_pattern_validation(c: &mut Criterion) {
    let patterns = vec![
        "import requests",
        r"import\s+requests",
        r"TODO:.*\d+",
        r"(?i)def\s+\w+\(self",
    ];

    let mut group = c.benchmark_group("Pattern Validation");
    for pattern in patterns {
        group.bench_with_input(BenchmarkId::from_parameter(pattern), pattern, |b, p| {
            b.iter(|| validate_pattern(black_box(p)))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let transport = build_transport(90, 3, 200);

    let mut group = c.benchmark_group("Search");
    for pattern in ["import requests", r"TODO:.*\b19\d\b"] {
        group.bench_with_input(BenchmarkId::new("pattern", pattern), pattern, |b, p| {
            let orchestrator =
                SearchOrchestrator::new(SearchConfig::default(), transport.clone(), transport.clone());
            b.iter(|| runtime.block_on(orchestrator.search("bench", black_box(p))))
        });
    }
    group.finish();
}

fn bench_streaming_vs_whole_body(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let transport = build_transport(10, 1, 5000);
    let orchestrator =
        SearchOrchestrator::new(SearchConfig::default(), transport.clone(), transport.clone());

    let mut group = c.benchmark_group("Content Strategy");
    for (name, threshold) in [("whole_body", u64::MAX), ("streamed", 0)] {
        let options = SearchOptions {
            streaming_threshold_bytes: Some(threshold),
            ..SearchOptions::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| {
                runtime.block_on(orchestrator.search_with_options(
                    "bench",
                    black_box("import requests"),
                    options,
                ))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_pattern_validation,
    bench_search,
    bench_streaming_vs_whole_body
);
criterion_main!(benches);
