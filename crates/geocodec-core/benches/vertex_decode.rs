//! Benchmark comparing the scalar and SSSE3 vertex decoders.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geocodec_core::byte_group::{encode_bytes_group, header_size};
use geocodec_core::version::{vertex_block_size, vertex_tail_size, vertex_tail_size_padded};
use geocodec_core::{decode_vertex_buffer_with, is_hardware_accelerated, DecoderOptions};

const VERTEX_SIZE: usize = 16;

/// Builds a version 1 stream whose planes mix 2, 4 and 8 bit groups.
fn generate_vertex_stream(vertex_count: usize) -> Vec<u8> {
    let mut out = vec![0xa1];
    let block_size = vertex_block_size(VERTEX_SIZE);
    let mut state = 0x2545_f491u32;

    let mut offset = 0;
    while offset < vertex_count {
        let count = block_size.min(vertex_count - offset);
        let groups = (count + 15) / 16;

        // every plane uses the 1/2/4/8 width window
        out.extend([0x55u8; VERTEX_SIZE / 4]);

        for _ in 0..VERTEX_SIZE {
            let mut header = vec![0u8; header_size(groups)];
            for g in 0..groups {
                header[g / 4] |= (1 + (g % 3) as u8) << ((g % 4) * 2);
            }
            out.extend(&header);

            for g in 0..groups {
                let bits = [2u8, 4, 8][g % 3];
                let mut group = [0u8; 16];
                for v in group.iter_mut() {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    *v = (state as u8) & ((1u16 << bits) - 1) as u8;
                }
                out.extend(encode_bytes_group(&group, bits).expect("group fits its width"));
            }
        }

        offset += count;
    }

    let tail_size = vertex_tail_size(VERTEX_SIZE, 1);
    out.extend(std::iter::repeat(0).take(vertex_tail_size_padded(VERTEX_SIZE, 1) - tail_size));
    out.extend([0u8; VERTEX_SIZE]);
    // byte, short, xor and rotated xor lanes
    out.extend([0x00, 0x01, 0x02, 0x42]);
    out
}

fn bench_vertex_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("vertex_decode");

    for vertex_count in [1024usize, 16384, 65536] {
        let data = generate_vertex_stream(vertex_count);
        let reference =
            decode_vertex_buffer_with(vertex_count, VERTEX_SIZE, &data, &DecoderOptions::scalar())
                .expect("generated stream must decode");
        assert_eq!(reference.len(), vertex_count * VERTEX_SIZE);
        group.throughput(Throughput::Bytes((vertex_count * VERTEX_SIZE) as u64));

        let scalar = DecoderOptions::scalar();
        group.bench_with_input(BenchmarkId::new("scalar", vertex_count), &data, |b, data| {
            b.iter(|| {
                let output =
                    decode_vertex_buffer_with(vertex_count, VERTEX_SIZE, black_box(data), &scalar);
                black_box(output)
            })
        });

        if is_hardware_accelerated() {
            let simd = DecoderOptions::default();
            group.bench_with_input(BenchmarkId::new("ssse3", vertex_count), &data, |b, data| {
                b.iter(|| {
                    let output =
                        decode_vertex_buffer_with(vertex_count, VERTEX_SIZE, black_box(data), &simd);
                    black_box(output)
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_vertex_decode);
criterion_main!(benches);
