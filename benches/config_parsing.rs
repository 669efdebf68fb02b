//! Benchmark for config parsing performance.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

fn bench_config_load_from_file(c: &mut Criterion) {
    let config_path = Path::new("keyrouter.example.toml");

    c.bench_function("config_parse_from_file", |b| {
        b.iter(|| {
            let config = keyrouter::config::RouterConfig::load(Some(black_box(config_path)));
            black_box(config)
        });
    });
}

fn bench_config_load_defaults(c: &mut Criterion) {
    c.bench_function("config_parse_defaults_only", |b| {
        b.iter(|| {
            let config = keyrouter::config::RouterConfig::load(None);
            black_box(config)
        });
    });
}

fn bench_config_toml_parsing(c: &mut Criterion) {
    let toml_content = r#"
[server]
host = "0.0.0.0"
port = 8000

[logging]
level = "info"
format = "json"

[[providers]]
id = "openai"
kind = "open_ai"
base_url = "https://api.openai.com"

[[providers]]
id = "anthropic"
kind = "anthropic"
base_url = "https://api.anthropic.com"

[[budgets]]
scope = "global"
limit = "500.00"
period = "monthly"
enforcement_mode = "soft"

[[policies]]
name = "prefer-openai"
type = "routing"
scope = "global"
priority = 10
"#;

    c.bench_function("config_parse_complex_toml", |b| {
        b.iter(|| {
            let config: keyrouter::config::RouterConfig =
                toml::from_str(black_box(toml_content)).unwrap();
            black_box(config)
        });
    });
}

criterion_group!(
    benches,
    bench_config_load_from_file,
    bench_config_load_defaults,
    bench_config_toml_parsing
);
criterion_main!(benches);
