// Format constants for the encoded buffers.
//
// The block and tail sizes are implicitly part of the vertex format: the
// encoder picks the same block size, so none of them can change without
// breaking compatibility with existing assets.

// =============================================================================
// Headers
// =============================================================================

/// High nibble of the first byte of an encoded vertex buffer.
pub const VERTEX_HEADER: u8 = 0xa0;

/// High nibble of the first byte of an encoded index buffer.
pub const INDEX_HEADER: u8 = 0xe0;

/// Latest vertex buffer version this crate decodes.
pub const VERTEX_DECODE_VERSION: u8 = 1;

/// Latest index buffer version this crate decodes.
pub const INDEX_DECODE_VERSION: u8 = 1;

// =============================================================================
// Vertex codec layout
// =============================================================================

/// Byte budget of one decoded vertex block.
pub const VERTEX_BLOCK_SIZE_BYTES: usize = 8192;

/// Upper bound on the number of vertices per block.
pub const VERTEX_BLOCK_MAX_SIZE: usize = 256;

/// Number of values packed together under one bit width.
pub const BYTE_GROUP_SIZE: usize = 16;

/// Bytes a single group decode may touch (8 packed bytes + 16 escapes).
pub const BYTE_GROUP_DECODE_LIMIT: usize = 24;

/// Minimum tail (with padding) for version 0 buffers.
pub const TAIL_MIN_SIZE_V0: usize = 32;

/// Minimum tail (with padding) for version 1 buffers.
pub const TAIL_MIN_SIZE_V1: usize = 24;

/// Largest vertex stride the codec accepts.
pub const VERTEX_MAX_SIZE: usize = 256;

// =============================================================================
// Meshlet codec layout
// =============================================================================

/// Upper bound on vertices and triangles in one meshlet.
pub const MESHLET_MAX_ELEMENTS: usize = 256;

/// Bytes guaranteed after the meshlet data region (gap + ctrl + codes).
pub const MESHLET_MIN_TRAILER: usize = 16;

// =============================================================================
// Utility Functions
// =============================================================================

/// Splits a header byte into `(magic, version)`.
#[inline]
pub fn split_header(byte: u8) -> (u8, u8) {
    (byte & 0xf0, byte & 0x0f)
}

/// Returns the number of vertices decoded per block for a vertex stride.
///
/// The result is a multiple of [`BYTE_GROUP_SIZE`] and never exceeds
/// [`VERTEX_BLOCK_MAX_SIZE`].
#[inline]
pub fn vertex_block_size(vertex_size: usize) -> usize {
    let result = (VERTEX_BLOCK_SIZE_BYTES / vertex_size) & !(BYTE_GROUP_SIZE - 1);
    result.min(VERTEX_BLOCK_MAX_SIZE)
}

/// Size of the vertex tail: last vertex, plus channel tags from version 1 on.
#[inline]
pub fn vertex_tail_size(vertex_size: usize, version: u8) -> usize {
    if version == 0 {
        vertex_size
    } else {
        vertex_size + vertex_size / 4
    }
}

/// Tail size including the padding the encoder guarantees.
#[inline]
pub fn vertex_tail_size_padded(vertex_size: usize, version: u8) -> usize {
    let min = if version == 0 { TAIL_MIN_SIZE_V0 } else { TAIL_MIN_SIZE_V1 };
    vertex_tail_size(vertex_size, version).max(min)
}
