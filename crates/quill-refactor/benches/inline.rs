use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use quill_refactor::{InlineRequest, InlineSession};
use quill_syntax::{parse_java_file, TextSize, Tree};

fn method_fixture() -> String {
    let mut out = String::from("class Bench {\n");
    out.push_str("    int clamp(int v, int lo, int hi) {\n");
    out.push_str("        if (v < lo) {\n            return lo;\n        }\n");
    out.push_str("        if (v > hi) {\n            return hi;\n        }\n");
    out.push_str("        return v;\n    }\n\n");
    out.push_str("    int next() {\n        return 1;\n    }\n\n");
    out.push_str("    int run() {\n        int total = 0;\n");
    for i in 0..100u32 {
        out.push_str(&format!("        total += clamp(next(), {i}, 50);\n"));
    }
    out.push_str("        return total;\n    }\n}\n");
    out
}

fn local_fixture() -> String {
    let mut out = String::from("class Bench {\n    int run(int a) {\n");
    out.push_str("        int factor = a * 2 + 1;\n");
    for _ in 0..200u32 {
        out.push_str("        System.out.println(factor);\n");
    }
    out.push_str("        return a;\n    }\n}\n");
    out
}

fn load(source: &str, needle: &str) -> (Tree, InlineRequest) {
    let mut tree = Tree::new();
    let file = parse_java_file(&mut tree, "/Bench.java", source)
        .expect("bench fixture must parse");
    let offset = source.find(needle).expect("needle in fixture");
    let request = InlineRequest::at(&tree, file, TextSize::from(offset as u32))
        .expect("fixture has an inline target");
    (tree, request)
}

fn bench_inline(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline");
    group.measurement_time(Duration::from_secs(2));
    group.warm_up_time(Duration::from_secs(1));
    group.sample_size(20);

    let source = method_fixture();
    let (tree, request) = load(&source, "clamp(int");
    let analysis = InlineSession::from_tree(tree.clone())
        .analyze(&request)
        .expect("analysis must succeed on fixture");
    assert_eq!(analysis.usages.len(), 100);

    group.bench_function("analyze_method", |b| {
        let session = InlineSession::from_tree(tree.clone());
        b.iter(|| black_box(session.analyze(black_box(&request)).expect("analyze")));
    });

    group.bench_function("inline_method", |b| {
        b.iter_batched(
            || InlineSession::from_tree(tree.clone()),
            |session| black_box(session.inline(&request).expect("inline_method must succeed")),
            BatchSize::SmallInput,
        );
    });

    let source = local_fixture();
    let (tree, request) = load(&source, "factor =");
    group.bench_function("inline_local", |b| {
        b.iter_batched(
            || InlineSession::from_tree(tree.clone()),
            |session| black_box(session.inline(&request).expect("inline_local must succeed")),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_inline);
criterion_main!(benches);
