//! Criterion benchmarks for the JSON and XML configuration codecs.
//!
//! Run with:
//! ```bash
//! cargo bench --package configio-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use configio_core::{Codec, Entries, JsonCodec, Value, XmlCodec};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A flat map of `n` mixed scalars plus one nested map and one string array.
fn make_entries(n: usize) -> Entries {
    let mut entries = Entries::new();
    for i in 0..n {
        let value = match i % 6 {
            0 => Value::String(format!("value-{i} <&>")),
            1 => Value::Boolean(i % 4 == 1),
            2 => Value::Int32(i as i32),
            3 => Value::Int64(i as i64 * 1_000_000_000),
            4 => Value::Float32(i as f32 / 8.0),
            _ => Value::Float64(i as f64 / 3.0),
        };
        entries.insert(format!("key_{i:05}"), value);
    }

    let mut window = Entries::new();
    window.insert("width".to_string(), Value::Int32(1280));
    window.insert("height".to_string(), Value::Int32(720));
    entries.insert("window".to_string(), Value::NestedMap(window));
    entries.insert(
        "recent".to_string(),
        Value::StringArray((0..16).map(|i| format!("/home/user/file{i}.txt")).collect()),
    );
    entries
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let codecs: [(&str, Box<dyn Codec>); 2] = [
        ("json", Box::new(JsonCodec::new())),
        ("xml", Box::new(XmlCodec::new())),
    ];
    let mut group = c.benchmark_group("encode");
    for size in [10usize, 100, 1_000] {
        let entries = make_entries(size);
        for (name, codec) in &codecs {
            group.bench_with_input(BenchmarkId::new(*name, size), &entries, |b, entries| {
                b.iter(|| codec.encode(black_box(entries)).expect("encode"));
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codecs: [(&str, Box<dyn Codec>); 2] = [
        ("json", Box::new(JsonCodec::new())),
        ("xml", Box::new(XmlCodec::new())),
    ];
    let mut group = c.benchmark_group("decode");
    for size in [10usize, 100, 1_000] {
        let entries = make_entries(size);
        for (name, codec) in &codecs {
            let bytes = codec.encode(&entries).expect("encode");
            group.bench_with_input(BenchmarkId::new(*name, size), &bytes, |b, bytes| {
                b.iter(|| codec.decode(black_box(bytes)).expect("decode"));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
