//! Mirrored varint and field codec benchmarks.

use chainlog_bench::random_data;
use chainlog_codec::{
    decode_varint, encode_varint, FieldCodec, FieldKind, FieldValue, FrameBuilder, Timestamp,
    VarintDecoder, VarintPoll,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// One value per varint width.
const WIDTHS: [(&str, u64); 5] = [
    ("literal", 200),
    ("two", 60_000),
    ("three", 16_000_000),
    ("four", 4_000_000_000),
    ("eight", u64::MAX),
];

/// Benchmark varint encoding per width.
fn bench_varint_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_encode");

    for (name, value) in WIDTHS {
        group.bench_function(name, |b| {
            let mut buf = Vec::with_capacity(16);
            b.iter(|| {
                buf.clear();
                encode_varint(black_box(value), &mut buf);
                black_box(&buf);
            });
        });
    }

    group.finish();
}

/// Benchmark one-shot against byte-fed varint decoding.
fn bench_varint_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_decode");

    for (name, value) in WIDTHS {
        let mut encoded = Vec::new();
        encode_varint(value, &mut encoded);

        group.bench_with_input(BenchmarkId::new("whole", name), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_varint(black_box(encoded)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("bytewise", name), &encoded, |b, encoded| {
            let mut decoder = VarintDecoder::default();
            b.iter(|| {
                decoder.reset();
                for byte in encoded.chunks(1) {
                    if let VarintPoll::Ready(varint, _) = decoder.feed(black_box(byte)).unwrap() {
                        black_box(varint);
                    }
                }
            });
        });
    }

    group.finish();
}

/// Benchmark field codecs.
fn bench_field_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_codec");

    let cases = [
        ("i64", FieldKind::I64, false, FieldValue::Int(-123_456_789)),
        ("nullable_u64", FieldKind::U64, true, FieldValue::UInt(42)),
        ("f64", FieldKind::F64, false, FieldValue::F64(3.25)),
        (
            "timestamp",
            FieldKind::Timestamp,
            false,
            FieldValue::Timestamp(Timestamp::from_ticks(638_000_000_000_000_000)),
        ),
        ("string", FieldKind::String, true, FieldValue::String("x".repeat(64))),
    ];

    for (name, kind, nullable, value) in cases {
        let codec = FieldCodec::resolve(kind, nullable);
        let wire = codec.encode(&value).unwrap();

        group.bench_function(BenchmarkId::new("encode", name), |b| {
            b.iter(|| black_box(codec.encode(black_box(&value)).unwrap()));
        });
        group.bench_function(BenchmarkId::new("decode", name), |b| {
            b.iter(|| black_box(codec.decode(black_box(&wire)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark frame assembly with varying payload sizes.
fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [16, 256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let payload = random_data(size);
            b.iter(|| {
                let mut frame = FrameBuilder::new(9);
                frame.inline(1, 1_000_001).inline(17, 7).bytes(16, black_box(&payload));
                black_box(frame.finish());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_varint_encode,
    bench_varint_decode,
    bench_field_codec,
    bench_frame,
);

criterion_main!(benches);
