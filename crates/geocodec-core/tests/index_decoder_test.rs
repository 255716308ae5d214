//! Index buffers captured from the reference encoder.

use byteorder::{ByteOrder, LittleEndian};
use geocodec_core::{decode_index_buffer, CodecError};

static INDEX_BUFFER: [u32; 12] = [0, 1, 2, 2, 1, 3, 4, 6, 5, 7, 8, 9];

static INDEX_DATA_V0: [u8; 27] = [
    0xe0, 0xf0, 0x10, 0xfe, 0xff, 0xf0, 0x0c, 0xff, 0x02, 0x02, 0x02, 0x00, 0x76, 0x87, 0x56, 0x67,
    0x78, 0xa9, 0x86, 0x65, 0x89, 0x68, 0x98, 0x01, 0x69, 0x00, 0x00,
];

// restarts (0 1 2) and repeats of the last explicit index
static INDEX_BUFFER_TRICKY: [u32; 15] = [0, 1, 2, 2, 1, 3, 0, 1, 2, 2, 1, 5, 2, 1, 4];

static INDEX_DATA_V1: [u8; 24] = [
    0xe1, 0xf0, 0x10, 0xfe, 0x1f, 0x3d, 0x00, 0x0a, 0x00, 0x76, 0x87, 0x56, 0x67, 0x78, 0xa9, 0x86,
    0x65, 0x89, 0x68, 0x98, 0x01, 0x69, 0x00, 0x00,
];

static INDEX_DATA_V1_MORE: [u8; 27] = [
    0xe1, 0xf0, 0x10, 0xfe, 0xff, 0xf0, 0x0c, 0xff, 0x02, 0x02, 0x02, 0x00, 0x76, 0x87, 0x56, 0x67,
    0x78, 0xa9, 0x86, 0x65, 0x89, 0x68, 0x98, 0x01, 0x69, 0x00, 0x00,
];

static INDEX_DATA_V1_THREE_EDGES: [u8; 21] = [
    0xe1, 0xf0, 0x20, 0x30, 0x40, 0x00, 0x76, 0x87, 0x56, 0x67, 0x78, 0xa9, 0x86, 0x65, 0x89, 0x68,
    0x98, 0x01, 0x69, 0x00, 0x00,
];

static INDEX_BUFFER_THREE_EDGES: [u32; 12] = [0, 1, 2, 1, 0, 3, 2, 1, 4, 0, 2, 5];

fn cases() -> Vec<(&'static [u8], &'static [u32])> {
    vec![
        (&INDEX_DATA_V0[..], &INDEX_BUFFER[..]),
        (&INDEX_DATA_V1[..], &INDEX_BUFFER_TRICKY[..]),
        (&INDEX_DATA_V1_MORE[..], &INDEX_BUFFER[..]),
        (&INDEX_DATA_V1_THREE_EDGES[..], &INDEX_BUFFER_THREE_EDGES[..]),
    ]
}

fn decode_u32(count: usize, data: &[u8]) -> Vec<u32> {
    let bytes = decode_index_buffer(count, 4, data).expect("decode failed");
    bytes.chunks_exact(4).map(LittleEndian::read_u32).collect()
}

#[test]
fn decode_index_v0() {
    assert_eq!(decode_u32(INDEX_BUFFER.len(), &INDEX_DATA_V0), INDEX_BUFFER);
}

#[test]
fn decode_index_v1() {
    assert_eq!(
        decode_u32(INDEX_BUFFER_TRICKY.len(), &INDEX_DATA_V1),
        INDEX_BUFFER_TRICKY
    );
}

#[test]
fn decode_index_v1_more() {
    assert_eq!(decode_u32(INDEX_BUFFER.len(), &INDEX_DATA_V1_MORE), INDEX_BUFFER);
}

#[test]
fn decode_index_v1_three_edges() {
    assert_eq!(
        decode_u32(INDEX_BUFFER_THREE_EDGES.len(), &INDEX_DATA_V1_THREE_EDGES),
        INDEX_BUFFER_THREE_EDGES
    );
}

#[test]
fn decode_index_16_bit_matches_32_bit() {
    for (data, expected) in cases() {
        let bytes = decode_index_buffer(expected.len(), 2, data).unwrap();
        let indices: Vec<u32> = bytes
            .chunks_exact(2)
            .map(|c| LittleEndian::read_u16(c) as u32)
            .collect();
        assert_eq!(indices, expected);
    }
}

#[test]
fn decoded_triangles_reference_known_vertices() {
    for (data, expected) in cases() {
        let vertex_count = expected.iter().max().map_or(0, |&m| m + 1);
        let indices = decode_u32(expected.len(), data);

        assert_eq!(indices.len() % 3, 0);
        assert!(indices.iter().all(|&i| i < vertex_count));
    }
}

#[test]
fn truncated_buffers_are_rejected() {
    for (data, expected) in cases() {
        for len in 0..data.len() {
            assert!(
                decode_index_buffer(expected.len(), 4, &data[..len]).is_err(),
                "decoded {} of {} bytes",
                len,
                data.len()
            );
        }
    }
}

#[test]
fn flipped_magic_is_rejected() {
    for (data, expected) in cases() {
        let mut corrupted = data.to_vec();
        corrupted[0] ^= 0x20;
        assert!(matches!(
            decode_index_buffer(expected.len(), 4, &corrupted),
            Err(CodecError::HeaderMismatch(_))
        ));
    }
}
