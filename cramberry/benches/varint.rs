use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use cramberry::varint::{zigzag_decode, zigzag_encode, VarintCodec};

fn varint_decoding(c: &mut Criterion) {
    let values: Vec<_> = vec![
        1u64,
        0x0000_0000_0000_0080,
        0x0000_0000_0000_8000,
        0x0000_0000_0080_0000,
        0x0000_0000_8000_0000,
        0x8000_0000_0000_0000,
    ]
    .into_iter()
    .map(|value| {
        let mut buffer = Vec::with_capacity(10);
        let len = value.encode_varint(&mut buffer);
        (buffer, len)
    })
    .collect();

    let mut group = c.benchmark_group("varint_decode");
    for (data, len) in &values {
        group.bench_with_input(BenchmarkId::new("cramberry", len), &data, |b, data| {
            b.iter(|| {
                let value = u64::decode_varint(data);
                std::hint::black_box(value)
            })
        });
    }
}

fn varint_encoding(c: &mut Criterion) {
    let values = [1u64, 0x80, 0x8000, 0x8000_0000, u64::MAX];

    let mut group = c.benchmark_group("varint_encode");
    group.bench_with_input(
        BenchmarkId::new("cramberry", values.len()),
        &values,
        |b, values| {
            let mut buffer = Vec::with_capacity(64);
            b.iter(|| {
                buffer.clear();
                for value in values {
                    value.encode_varint(&mut buffer);
                }
                std::hint::black_box(buffer.len())
            });
        },
    );
}

fn zigzag(c: &mut Criterion) {
    let values = [0i64, -1, 1, i64::MIN, i64::MAX];

    c.bench_function("zigzag_roundtrip", |b| {
        b.iter(|| {
            for value in values {
                let encoded = zigzag_encode(std::hint::black_box(value));
                std::hint::black_box(zigzag_decode(encoded));
            }
        })
    });
}

criterion_group!(benches, varint_decoding, varint_encoding, zigzag);
criterion_main!(benches);
