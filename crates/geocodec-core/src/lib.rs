//! Geometry Codec Core Library
//!
//! Decoders for compressed vertex, index and meshlet buffers produced by an
//! offline mesh optimizer, plus the block decompressor used by generic
//! resource payloads.

#![allow(clippy::needless_range_loop)] // byte-at-a-time copies read earlier output

// =============================================================================
// Shared primitives
// =============================================================================

pub mod bit_utils;
pub mod byte_group;
pub mod decoder_buffer;
pub mod decoder_options;
pub mod status;
pub mod version;

// =============================================================================
// Decoders
// =============================================================================

pub mod block_compress;
pub mod index_decoder;
pub mod meshlet_decoder;
pub mod vertex_decoder;

#[cfg(target_arch = "x86_64")]
mod vertex_decoder_simd;

// =============================================================================
// Re-exports
// =============================================================================

pub use block_compress::{
    decompress_slice, fast_decompress, fast_decompress_into, read_block_info, BlockCompressInfo,
};
pub use decoder_buffer::DecoderBuffer;
pub use decoder_options::DecoderOptions;
pub use index_decoder::decode_index_buffer;
pub use meshlet_decoder::{decode_meshlet, decode_meshlet_raw};
pub use status::{CodecError, CodecResult, Status};
pub use vertex_decoder::{
    decode_vertex_buffer, decode_vertex_buffer_with, is_hardware_accelerated, Channel,
};
