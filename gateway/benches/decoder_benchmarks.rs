//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use portcullis_gateway::compression::{CompressionPipeline, Direction};
use portcullis_gateway::telnet::decoder::TelnetDecoder;
use portcullis_gateway::telnet::protocol::encode_text;
use std::hint::black_box;

/// Typical MUD input: short commands, CRLF terminated, with occasional negotiation
fn sample_input(lines: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..lines {
        data.extend_from_slice(format!("say hello number {}\r\n", i).as_bytes());
        if i % 10 == 0 {
            data.extend_from_slice(&[255, 250, 31, 0, 80, 0, 24, 255, 240]);
        }
    }
    data
}

/// Benchmark decoding a buffer in one pass
fn bench_decode_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_lines");
    for lines in [10, 100, 1000] {
        let data = sample_input(lines);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &data, |b, data| {
            b.iter(|| {
                let mut decoder = TelnetDecoder::new();
                black_box(decoder.feed(black_box(data)))
            });
        });
    }
    group.finish();
}

/// Benchmark decoding the same buffer delivered in small reads
fn bench_decode_chunked(c: &mut Criterion) {
    let data = sample_input(1000);
    let mut group = c.benchmark_group("decode_chunked");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for chunk in [1, 16, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut decoder = TelnetDecoder::new();
                let mut events = 0;
                for part in data.chunks(chunk) {
                    events += decoder.feed(black_box(part)).len();
                }
                black_box(events)
            });
        });
    }
    group.finish();
}

/// Benchmark MCCP2 output for a typical room description
fn bench_compress_output(c: &mut Criterion) {
    let text = "You stand in a dimly lit hall. Torches flicker along the walls.\n".repeat(8);
    let mut plain = BytesMut::new();
    encode_text(&text, &mut plain);

    c.bench_function("compress_room_description", |b| {
        let mut pipeline = CompressionPipeline::new();
        pipeline.enable(Direction::Outbound);
        let mut wire = BytesMut::with_capacity(plain.len());
        b.iter(|| {
            wire.clear();
            pipeline.encode(black_box(&plain), &mut wire).unwrap();
            black_box(wire.len())
        });
    });
}

criterion_group!(
    benches,
    bench_decode_lines,
    bench_decode_chunked,
    bench_compress_output
);
criterion_main!(benches);
