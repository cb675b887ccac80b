//! Benchmarks for the ingestion hot path
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sigstream_rs::conditioning::{shared_filter, ChannelConditioner, ChannelSettings, MovingAverage};
use sigstream_rs::parser::{encode_frame, FrameParser, NumericFormat, ParserConfig};
use sigstream_rs::ring_buffer::RingBuffer;

const CHANNELS: usize = 8;
const FRAMES: usize = 4096;

fn capture(config: &ParserConfig) -> Vec<u8> {
    let mut raw = Vec::new();
    let mut frame = vec![0.0; config.channel_count];
    for i in 0..FRAMES {
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample = ((i * 7 + ch * 13) % 4000) as f64 - 2000.0;
        }
        encode_frame(config, &frame, &mut raw);
    }
    raw
}

fn bench_ring_buffer_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_append");

    for capacity in [1000, 10_000, 100_000].iter() {
        let block: Vec<f64> = (0..FRAMES).map(|i| i as f64).collect();
        group.throughput(Throughput::Elements(block.len() as u64));

        group.bench_with_input(BenchmarkId::new("append_slice", capacity), capacity, |b, &cap| {
            let mut buffer = RingBuffer::new(cap).unwrap();
            b.iter(|| buffer.append_slice(black_box(&block)));
        });

        group.bench_with_input(BenchmarkId::new("append", capacity), capacity, |b, &cap| {
            let mut buffer = RingBuffer::new(cap).unwrap();
            b.iter(|| {
                for &v in &block {
                    buffer.append(black_box(v));
                }
            });
        });
    }

    group.finish();
}

fn bench_copy_latest(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_latest");

    let mut buffer = RingBuffer::new(100_000).unwrap();
    // Leave head mid-buffer so reads take the wrapped path
    buffer.extend((0..150_000).map(|i| i as f64));

    for requested in [1000, 10_000, 100_000].iter() {
        let mut dest = vec![0.0; *requested];
        group.throughput(Throughput::Elements(*requested as u64));
        group.bench_with_input(BenchmarkId::from_parameter(requested), requested, |b, &n| {
            b.iter(|| black_box(buffer.copy_latest(&mut dest, n)));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let configs = [
        ("fixed_i16", ParserConfig::fixed_binary(CHANNELS, NumericFormat::Int16)),
        (
            "framed_f32",
            ParserConfig::framed_binary(CHANNELS, NumericFormat::Float32, vec![0xAA, 0x55]),
        ),
        ("ascii", ParserConfig::ascii(CHANNELS, ',', '\n')),
    ];

    for (name, config) in configs {
        let raw = capture(&config);
        let parser = FrameParser::new(config).unwrap();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_function(name, |b| b.iter(|| black_box(parser.decode(black_box(&raw)))));
    }

    group.finish();
}

fn bench_conditioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditioning");
    group.throughput(Throughput::Elements(FRAMES as u64));

    let conditioner = ChannelConditioner::new(2);
    conditioner.set_channel_settings(0, ChannelSettings::new(0.5, -2048.0));
    conditioner.set_channel_settings(
        1,
        ChannelSettings::new(0.5, -2048.0).with_filter(shared_filter(MovingAverage::new(16))),
    );

    let block: Vec<f64> = (0..FRAMES).map(|i| (i % 4096) as f64).collect();

    group.bench_function("gain_offset", |b| {
        b.iter(|| {
            let mut samples = block.clone();
            conditioner.apply_slice(0, &mut samples);
            black_box(samples)
        })
    });

    group.bench_function("moving_average", |b| {
        b.iter(|| {
            let mut samples = block.clone();
            conditioner.apply_slice(1, &mut samples);
            black_box(samples)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_buffer_append,
    bench_copy_latest,
    bench_decode,
    bench_conditioning,
);

criterion_main!(benches);
