// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Framing Benchmark
//!
//! Measures the CPU cost of the wire codecs without network I/O:
//! - TCPROS length-prefix framing (encode, decode)
//! - Connection header encode/decode
//! - md5 of a message spec

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use roswire::tcpros::FrameCodec;
use roswire::{ConnectionHeader, MsgSpec};
use std::hint::black_box as bb;

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");
    for size in [64, 1024, 16384, 262_144] {
        let payload = vec![0xAB; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            let mut buf = Vec::with_capacity(size + 4);
            b.iter(|| {
                buf.clear();
                FrameCodec::encode_into(bb(payload), &mut buf);
                bb(buf.len())
            });
        });
    }
    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    for size in [64, 1024, 16384, 262_144] {
        // 16 frames back to back
        let mut stream = Vec::new();
        for _ in 0..16 {
            FrameCodec::encode_into(&vec![0xCD; size], &mut stream);
        }
        group.throughput(Throughput::Bytes((size * 16) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &stream, |b, stream| {
            b.iter(|| {
                let mut codec = FrameCodec::new(1 << 20);
                let mut reader = &stream[..];
                let mut n = 0;
                while let Ok(Some(frame)) = codec.decode(&mut reader) {
                    n += frame.len();
                }
                bb(n)
            });
        });
    }
    group.finish();
}

fn bench_connection_header(c: &mut Criterion) {
    let header = ConnectionHeader::new()
        .with("callerid", "/listener")
        .with("topic", "/chatter")
        .with("md5sum", "992ce8a1687cec8c8bd883ec73ca41d1")
        .with("type", "std_msgs/String")
        .with("tcp_nodelay", "0");
    let encoded = header.encode();

    c.bench_function("header_encode", |b| b.iter(|| bb(header.encode())));
    c.bench_function("header_decode", |b| {
        b.iter(|| ConnectionHeader::decode(bb(&encoded[4..])))
    });
}

fn bench_md5sum(c: &mut Criterion) {
    let spec = MsgSpec::parse(
        "int32 A=1\nint32 B=2\nstd_msgs/Header header\nfloat64[] ranges\nstring frame\n",
        "sensor_msgs",
    )
    .unwrap_or_else(|e| panic!("spec: {}", e));
    c.bench_function("msg_md5sum", |b| b.iter(|| bb(spec.md5sum())));
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_connection_header,
    bench_md5sum
);
criterion_main!(benches);
