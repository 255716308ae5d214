//! Vertex buffer decoder.
//!
//! An encoded vertex buffer is a header byte, a sequence of blocks and a
//! tail. Each block stores up to [`vertex_block_size`] vertices as byte
//! planes: for every 4-byte lane of the vertex, four planes of deltas are
//! packed as byte groups. The tail holds the vertex that seeds prediction
//! for the first block and, from version 1 on, one channel tag per lane.
//!
//! Two kernels implement the per-block work: a portable scalar one and an
//! SSSE3 one on x86_64. Both share the block driver below, so they accept
//! and reject exactly the same inputs.

use std::sync::Once;

use num_traits::{PrimInt, WrappingAdd, WrappingSub};
use tracing::{debug, trace, warn};

use crate::bit_utils::{apply_zigzag_delta, channel_rotation, rotate32};
use crate::byte_group::{self, bits_table};
use crate::decoder_buffer::DecoderBuffer;
use crate::decoder_options::DecoderOptions;
use crate::status::{invalid_parameter, truncated, CodecError, CodecResult, Status};
use crate::version::{
    split_header, vertex_block_size, vertex_tail_size, vertex_tail_size_padded,
    BYTE_GROUP_SIZE, VERTEX_BLOCK_MAX_SIZE, VERTEX_BLOCK_SIZE_BYTES, VERTEX_DECODE_VERSION,
    VERTEX_HEADER, VERTEX_MAX_SIZE,
};

/// Returns true when the vectorized vertex decoder can run on this CPU.
pub fn is_hardware_accelerated() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("ssse3")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

// =============================================================================
// Channels
// =============================================================================

/// Delta rule applied to one 4-byte lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Four independent bytes, zigzag delta each.
    Byte,
    /// Two little-endian u16 values, zigzag delta each.
    Short,
    /// One u32, rotated left and xored with the previous value.
    Xor { rotation: u32 },
}

impl Channel {
    /// Parses a channel tag from the tail of a version 1 buffer.
    pub fn from_tag(tag: u8) -> CodecResult<Self> {
        match tag & 3 {
            0 => Ok(Channel::Byte),
            1 => Ok(Channel::Short),
            2 => Ok(Channel::Xor {
                rotation: channel_rotation(tag),
            }),
            _ => Err(CodecError::Malformed(format!(
                "invalid channel tag 0x{:02x}",
                tag
            ))),
        }
    }
}

// =============================================================================
// Kernels
// =============================================================================

/// Geometry of the block currently being decoded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockLayout {
    pub vertex_count: usize,
    pub vertex_count_aligned: usize,
    pub vertex_size: usize,
}

/// Per-block operations that differ between the scalar and vector decoders.
pub(crate) trait VertexKernel {
    /// Decodes byte groups for one plane of `out.len()` values.
    fn decode_bytes(&self, buffer: &mut DecoderBuffer, out: &mut [u8], bits: &[u8; 4]) -> Status;

    /// Rebuilds one lane of every vertex in the block.
    ///
    /// `planes` holds four planes of `vertex_count_aligned` bytes each and
    /// `transposed` starts at the lane's first byte in the first vertex.
    fn decode_deltas(
        &self,
        planes: &[u8],
        transposed: &mut [u8],
        layout: BlockLayout,
        last: [u8; 4],
        channel: Channel,
    );
}

pub(crate) struct ScalarKernel;

impl VertexKernel for ScalarKernel {
    fn decode_bytes(&self, buffer: &mut DecoderBuffer, out: &mut [u8], bits: &[u8; 4]) -> Status {
        byte_group::decode_bytes(buffer, out, bits)
    }

    fn decode_deltas(
        &self,
        planes: &[u8],
        transposed: &mut [u8],
        layout: BlockLayout,
        last: [u8; 4],
        channel: Channel,
    ) {
        match channel {
            Channel::Byte => decode_lane_deltas::<u8>(planes, transposed, layout, &last, 0),
            Channel::Short => decode_lane_deltas::<u16>(planes, transposed, layout, &last, 0),
            Channel::Xor { rotation } => {
                decode_lane_deltas::<u32>(planes, transposed, layout, &last, rotation)
            }
        }
    }
}

/// A lane word: 1, 2 or 4 bytes gathered from consecutive byte planes.
trait LaneWord: PrimInt + WrappingAdd + WrappingSub {
    const BYTES: usize;

    fn gather(bytes: &[u8], offset: usize, stride: usize) -> Self;

    fn scatter(self, out: &mut [u8]);

    fn reconstruct(encoded: Self, prev: Self, rotation: u32) -> Self;
}

impl LaneWord for u8 {
    const BYTES: usize = 1;

    fn gather(bytes: &[u8], offset: usize, _stride: usize) -> Self {
        bytes[offset]
    }

    fn scatter(self, out: &mut [u8]) {
        out[0] = self;
    }

    fn reconstruct(encoded: Self, prev: Self, _rotation: u32) -> Self {
        apply_zigzag_delta(prev, encoded)
    }
}

impl LaneWord for u16 {
    const BYTES: usize = 2;

    fn gather(bytes: &[u8], offset: usize, stride: usize) -> Self {
        u16::from_le_bytes([bytes[offset], bytes[offset + stride]])
    }

    fn scatter(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }

    fn reconstruct(encoded: Self, prev: Self, _rotation: u32) -> Self {
        apply_zigzag_delta(prev, encoded)
    }
}

impl LaneWord for u32 {
    const BYTES: usize = 4;

    fn gather(bytes: &[u8], offset: usize, stride: usize) -> Self {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + stride],
            bytes[offset + 2 * stride],
            bytes[offset + 3 * stride],
        ])
    }

    fn scatter(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn reconstruct(encoded: Self, prev: Self, rotation: u32) -> Self {
        rotate32(encoded, rotation) ^ prev
    }
}

fn decode_lane_deltas<T: LaneWord>(
    planes: &[u8],
    transposed: &mut [u8],
    layout: BlockLayout,
    last: &[u8; 4],
    rotation: u32,
) {
    let aligned = layout.vertex_count_aligned;

    for k in (0..4).step_by(T::BYTES) {
        let mut prev = T::gather(last, k, 1);
        let mut offset = k;

        for i in 0..layout.vertex_count {
            let encoded = T::gather(planes, k * aligned + i, aligned);
            let value = T::reconstruct(encoded, prev, rotation);

            value.scatter(&mut transposed[offset..]);
            prev = value;
            offset += layout.vertex_size;
        }
    }
}

// =============================================================================
// Block driver
// =============================================================================

/// Scratch reused by every block of one decode call.
struct VertexBlockScratch {
    planes: Vec<u8>,
    transposed: Vec<u8>,
}

impl VertexBlockScratch {
    fn new() -> Self {
        Self {
            planes: vec![0; VERTEX_BLOCK_MAX_SIZE * 4],
            transposed: vec![0; VERTEX_BLOCK_SIZE_BYTES],
        }
    }
}

struct VertexStream<'a> {
    version: u8,
    vertex_size: usize,
    channels: &'a [u8],
    last_vertex: [u8; VERTEX_MAX_SIZE],
}

fn decode_vertex_block<K: VertexKernel>(
    kernel: &K,
    buffer: &mut DecoderBuffer,
    stream: &mut VertexStream,
    scratch: &mut VertexBlockScratch,
    out: &mut [u8],
    vertex_count: usize,
) -> Status {
    debug_assert!(vertex_count > 0 && vertex_count <= VERTEX_BLOCK_MAX_SIZE);

    let vertex_size = stream.vertex_size;
    let layout = BlockLayout {
        vertex_count,
        vertex_count_aligned: (vertex_count + BYTE_GROUP_SIZE - 1) & !(BYTE_GROUP_SIZE - 1),
        vertex_size,
    };
    let aligned = layout.vertex_count_aligned;

    let control: &[u8] = if stream.version == 0 {
        &[]
    } else {
        buffer
            .decode_slice(vertex_size / 4)
            .map_err(|_| truncated("vertex block control bytes"))?
    };

    for lane in 0..vertex_size / 4 {
        let ctrl_byte = control.get(lane).copied().unwrap_or(0);

        for (j, plane) in scratch.planes[..4 * aligned]
            .chunks_exact_mut(aligned)
            .enumerate()
        {
            match (ctrl_byte >> (j * 2)) & 3 {
                3 => {
                    let literal = buffer
                        .decode_slice(vertex_count)
                        .map_err(|_| truncated("literal vertex plane"))?;
                    plane[..vertex_count].copy_from_slice(literal);
                    plane[vertex_count..].fill(0);
                }
                2 => plane.fill(0),
                ctrl => {
                    let bits = bits_table(stream.version, ctrl)?;
                    kernel.decode_bytes(buffer, plane, &bits)?;
                }
            }
        }

        let channel = match stream.channels.get(lane) {
            Some(&tag) => Channel::from_tag(tag)?,
            None => Channel::Byte,
        };

        let k = lane * 4;
        let last = [
            stream.last_vertex[k],
            stream.last_vertex[k + 1],
            stream.last_vertex[k + 2],
            stream.last_vertex[k + 3],
        ];
        kernel.decode_deltas(
            &scratch.planes[..4 * aligned],
            &mut scratch.transposed[k..],
            layout,
            last,
            channel,
        );
    }

    let block_bytes = vertex_count * vertex_size;
    out.copy_from_slice(&scratch.transposed[..block_bytes]);
    stream.last_vertex[..vertex_size]
        .copy_from_slice(&scratch.transposed[block_bytes - vertex_size..block_bytes]);

    Ok(())
}

fn decode_blocks<K: VertexKernel>(
    kernel: &K,
    buffer: &mut DecoderBuffer,
    stream: &mut VertexStream,
    output: &mut [u8],
    vertex_count: usize,
) -> Status {
    let vertex_size = stream.vertex_size;
    let block_size = vertex_block_size(vertex_size);
    let mut scratch = VertexBlockScratch::new();

    let mut vertex_offset = 0;
    while vertex_offset < vertex_count {
        let count = block_size.min(vertex_count - vertex_offset);
        let out = &mut output[vertex_offset * vertex_size..(vertex_offset + count) * vertex_size];

        decode_vertex_block(kernel, buffer, stream, &mut scratch, out, count)?;
        trace!(
            vertex_offset,
            count,
            position = buffer.position(),
            "decoded vertex block"
        );

        vertex_offset += count;
    }

    Ok(())
}

// =============================================================================
// Entry points
// =============================================================================

fn validate_vertex_size(vertex_size: usize) -> Status {
    if vertex_size == 0 || vertex_size > VERTEX_MAX_SIZE {
        return Err(invalid_parameter(format!(
            "vertex size {} must be between 1 and {}",
            vertex_size, VERTEX_MAX_SIZE
        )));
    }
    if vertex_size % 4 != 0 {
        return Err(invalid_parameter(format!(
            "vertex size {} must be a multiple of 4",
            vertex_size
        )));
    }
    Ok(())
}

/// Decodes `vertex_count` vertices of `vertex_size` bytes.
///
/// Uses [`DecoderOptions::default`], which picks the vector kernel when
/// the CPU supports it.
pub fn decode_vertex_buffer(
    vertex_count: usize,
    vertex_size: usize,
    buffer: &[u8],
) -> CodecResult<Vec<u8>> {
    decode_vertex_buffer_with(vertex_count, vertex_size, buffer, &DecoderOptions::default())
}

/// Decodes a vertex buffer with explicit options.
///
/// # Errors
///
/// - `InvalidParameter` for a vertex size that is zero, above 256 or not a
///   multiple of 4.
/// - `HeaderMismatch` / `UnsupportedVersion` for a bad header byte.
/// - `Truncated` when any step runs out of input.
/// - `Malformed` for an invalid channel tag.
/// - `BoundaryMismatch` when the blocks do not end exactly at the tail.
pub fn decode_vertex_buffer_with(
    vertex_count: usize,
    vertex_size: usize,
    buffer: &[u8],
    options: &DecoderOptions,
) -> CodecResult<Vec<u8>> {
    validate_vertex_size(vertex_size)?;

    let output_size = vertex_count
        .checked_mul(vertex_size)
        .ok_or_else(|| invalid_parameter("vertex buffer size overflows usize"))?;

    let mut cursor = DecoderBuffer::new(buffer);
    let header = cursor
        .decode_u8()
        .map_err(|_| truncated("vertex buffer is empty"))?;

    let (magic, version) = split_header(header);
    if magic != VERTEX_HEADER {
        return Err(CodecError::HeaderMismatch(format!(
            "expected vertex header 0x{:02x}, got 0x{:02x}",
            VERTEX_HEADER, header
        )));
    }
    if version > VERTEX_DECODE_VERSION {
        return Err(CodecError::UnsupportedVersion(format!(
            "vertex buffer version {} (max {})",
            version, VERTEX_DECODE_VERSION
        )));
    }

    let tail_size = vertex_tail_size(vertex_size, version);
    let tail_size_padded = vertex_tail_size_padded(vertex_size, version);
    if cursor.remaining_size() < tail_size_padded {
        return Err(truncated(format!(
            "vertex buffer needs a {} byte tail, have {}",
            tail_size_padded,
            cursor.remaining_size()
        )));
    }

    let tail = &buffer[buffer.len() - tail_size..];
    let mut stream = VertexStream {
        version,
        vertex_size,
        channels: &tail[vertex_size..],
        last_vertex: [0; VERTEX_MAX_SIZE],
    };
    stream.last_vertex[..vertex_size].copy_from_slice(&tail[..vertex_size]);

    let mut output = vec![0u8; output_size];
    let simd = options.effective_simd();
    if options.use_simd() && !simd {
        static FALLBACK: Once = Once::new();
        FALLBACK.call_once(|| warn!("SIMD vertex decoding requested but unavailable, using scalar"));
    }

    dispatch(simd, &mut cursor, &mut stream, &mut output, vertex_count)?;

    if cursor.remaining_size() != tail_size_padded {
        return Err(CodecError::BoundaryMismatch(format!(
            "{} bytes left after vertex blocks, expected {}",
            cursor.remaining_size(),
            tail_size_padded
        )));
    }

    debug!(
        vertex_count,
        vertex_size,
        version,
        simd,
        input = buffer.len(),
        "decoded vertex buffer"
    );
    Ok(output)
}

#[cfg(target_arch = "x86_64")]
fn dispatch(
    simd: bool,
    cursor: &mut DecoderBuffer,
    stream: &mut VertexStream,
    output: &mut [u8],
    vertex_count: usize,
) -> Status {
    use crate::vertex_decoder_simd::Ssse3Kernel;

    match Ssse3Kernel::detect().filter(|_| simd) {
        Some(kernel) => decode_blocks(&kernel, cursor, stream, output, vertex_count),
        None => decode_blocks(&ScalarKernel, cursor, stream, output, vertex_count),
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn dispatch(
    _simd: bool,
    cursor: &mut DecoderBuffer,
    stream: &mut VertexStream,
    output: &mut [u8],
    vertex_count: usize,
) -> Status {
    decode_blocks(&ScalarKernel, cursor, stream, output, vertex_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_buffer(last: [u8; 4]) -> Vec<u8> {
        // header, 4 plane headers selecting width 0, padded tail
        let mut data = vec![0xa0, 0, 0, 0, 0];
        data.extend([0u8; 28]);
        data.extend(last);
        data
    }

    #[test]
    fn test_single_vertex_from_tail() {
        let data = minimal_buffer([1, 2, 3, 4]);
        assert_eq!(data.len(), 37);
        for options in [DecoderOptions::default(), DecoderOptions::scalar()] {
            let decoded = decode_vertex_buffer_with(1, 4, &data, &options).unwrap();
            assert_eq!(decoded, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_zero_vertices() {
        let mut data = vec![0xa0];
        data.extend([0u8; 32]);
        assert!(decode_vertex_buffer(0, 4, &data).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_vertex_size() {
        let data = minimal_buffer([0; 4]);
        for size in [0, 3, 6, 260] {
            assert!(matches!(
                decode_vertex_buffer(1, size, &data),
                Err(CodecError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_rejects_header() {
        let mut data = minimal_buffer([0; 4]);
        data[0] = 0xb0;
        assert!(matches!(
            decode_vertex_buffer(1, 4, &data),
            Err(CodecError::HeaderMismatch(_))
        ));
        data[0] = 0xa2;
        assert!(matches!(
            decode_vertex_buffer(1, 4, &data),
            Err(CodecError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            decode_vertex_buffer(1, 4, &[]),
            Err(CodecError::Truncated(_))
        ));
    }

    #[test]
    fn test_rejects_extra_bytes() {
        let mut data = minimal_buffer([0; 4]);
        data.insert(5, 0);
        assert!(matches!(
            decode_vertex_buffer(1, 4, &data),
            Err(CodecError::BoundaryMismatch(_))
        ));
    }

    #[test]
    fn test_channel_tags() {
        assert_eq!(Channel::from_tag(0x00).unwrap(), Channel::Byte);
        assert_eq!(Channel::from_tag(0x01).unwrap(), Channel::Short);
        assert_eq!(
            Channel::from_tag(0x62).unwrap(),
            Channel::Xor { rotation: 26 }
        );
        assert!(matches!(
            Channel::from_tag(0x03),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_scalar_lane_deltas() {
        let layout = BlockLayout {
            vertex_count: 2,
            vertex_count_aligned: 16,
            vertex_size: 4,
        };
        let mut planes = vec![0u8; 64];
        // vertex 0 plane 0 delta +1, vertex 1 plane 0 delta -1
        planes[0] = 2;
        planes[1] = 1;
        let mut transposed = vec![0u8; 8];
        ScalarKernel.decode_deltas(&planes, &mut transposed, layout, [10, 0, 0, 0], Channel::Byte);
        assert_eq!(transposed, vec![11, 0, 0, 0, 10, 0, 0, 0]);

        // u16 lane: 0x0258 unzigzags to 300
        let mut planes = vec![0u8; 64];
        planes[0] = 0x58;
        planes[16] = 0x02;
        let mut transposed = vec![0u8; 8];
        ScalarKernel.decode_deltas(&planes, &mut transposed, layout, [0; 4], Channel::Short);
        assert_eq!(&transposed[..4], &[0x2c, 0x01, 0, 0]);
        assert_eq!(&transposed[4..], &[0x2c, 0x01, 0, 0]);
    }
}
