//! Benchmarks for galley core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use galley::core::context::Context;
use galley::core::parser::{parse_recipe, validate_recipe};
use galley::tripwire::{drift, hasher};
use indexmap::IndexMap;
use serde_json::json;

fn recipe_yaml(steps: usize) -> String {
    let mut yaml = String::from(
        "name: bench\ndescription: benchmark recipe\ncontext:\n  repo: acme/widgets\n  flag: \"yes\"\nsteps:\n",
    );
    for i in 0..steps {
        if i % 2 == 0 {
            yaml.push_str(&format!(
                "  - id: fetch_{i}\n    command: \"gh issue view {i} -R {{{{repo}}}}\"\n    output: issue_{i}\n    condition: 'flag == \"yes\"'\n"
            ));
        } else {
            yaml.push_str(&format!(
                "  - id: triage_{i}\n    agent: \"ops:triager\"\n    prompt: \"Triage {{{{issue_{prev}}}}}\"\n    mode: analyze\n",
                prev = i - 1
            ));
        }
    }
    yaml
}

fn bench_parse_recipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_recipe");
    for n in [4, 32, 128] {
        let yaml = recipe_yaml(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &yaml, |b, yaml| {
            b.iter(|| {
                let recipe = parse_recipe(black_box(yaml)).unwrap();
                black_box(recipe);
            });
        });
    }
    group.finish();
}

fn bench_validate_recipe(c: &mut Criterion) {
    let recipe = parse_recipe(&recipe_yaml(128)).unwrap();
    c.bench_function("validate_recipe_128", |b| {
        b.iter(|| black_box(validate_recipe(black_box(&recipe))));
    });
}

fn bench_render(c: &mut Criterion) {
    let mut defaults = IndexMap::new();
    defaults.insert("name".to_string(), json!("world"));
    defaults.insert("result".to_string(), json!({"items": ["a", "b"], "status": "ok"}));
    defaults.insert("unsafe".to_string(), json!("x; rm -rf / 'quoted'"));
    let ctx = Context::new(&defaults, &IndexMap::new());
    let template = "hello {{name}} status={{result.status}} item={{result.items.1}} {{missing}}";

    let mut group = c.benchmark_group("render");
    group.bench_function("plain", |b| {
        b.iter(|| black_box(ctx.render(black_box(template))));
    });
    group.bench_function("shell", |b| {
        b.iter(|| black_box(ctx.render_shell(black_box("echo {{unsafe}} {{name}}"))));
    });
    group.finish();
}

fn bench_blake3_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake3_string");
    for size in [64, 1024, 16384] {
        let input: String = "x".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(hasher::hash_string(black_box(input))));
        });
    }
    group.finish();
}

fn bench_manifest(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..32 {
        std::fs::write(dir.path().join(format!("r{i:02}.yaml")), recipe_yaml(8)).unwrap();
    }
    drift::update_manifest(dir.path()).unwrap();

    c.bench_function("check_upstream_changes_32", |b| {
        b.iter(|| black_box(drift::check_upstream_changes(black_box(dir.path())).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_parse_recipe,
    bench_validate_recipe,
    bench_render,
    bench_blake3_string,
    bench_manifest
);
criterion_main!(benches);
