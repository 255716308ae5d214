//! Block decompressor for generic resource payloads.
//!
//! A payload starts with a little-endian u32 size. With the top bit set the
//! remaining `size & 0x7fff_ffff` bytes are stored raw. Otherwise the body is
//! a stream of operations, 16 per little-endian u16 mask, consumed LSB-first:
//! a clear bit copies one literal byte, a set bit reads a u16 back-reference
//! `offset = (v >> 4) + 1`, `length = (v & 0xf) + 3`.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::status::{invalid_parameter, CodecError, CodecResult, Status};

const STORED_RAW_FLAG: u32 = 0x8000_0000;

/// Decompressed size and storage mode of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCompressInfo {
    pub size: usize,
    pub is_compressed: bool,
}

/// Reads the 4-byte size prefix of a block.
pub fn read_block_info<R: Read>(reader: &mut R) -> CodecResult<BlockCompressInfo> {
    let raw = reader.read_u32::<LittleEndian>()?;
    Ok(BlockCompressInfo {
        size: (raw & !STORED_RAW_FLAG) as usize,
        is_compressed: raw & STORED_RAW_FLAG == 0,
    })
}

/// Decodes the block body that follows `info` into `output`.
///
/// `output` must be exactly `info.size` bytes long.
pub fn fast_decompress_into<R: Read>(
    info: BlockCompressInfo,
    reader: &mut R,
    output: &mut [u8],
) -> Status {
    if output.len() != info.size {
        return Err(invalid_parameter(format!(
            "block output holds {} bytes, block decompresses to {}",
            output.len(),
            info.size
        )));
    }

    if !info.is_compressed {
        reader.read_exact(output)?;
        return Ok(());
    }

    let mut position = 0;
    let mut mask = 0u16;
    let mut ops_left = 0;

    while position < info.size {
        if ops_left == 0 {
            mask = reader.read_u16::<LittleEndian>()?;
            ops_left = 16;
        }

        if mask & 1 != 0 {
            let offset_size = reader.read_u16::<LittleEndian>()?;
            let offset = (offset_size >> 4) as usize + 1;
            let length = (offset_size & 0xf) as usize + 3;

            if offset > position {
                return Err(CodecError::Malformed(format!(
                    "back-reference offset {} at position {}",
                    offset, position
                )));
            }
            if position + length > info.size {
                return Err(CodecError::Malformed(format!(
                    "back-reference of {} bytes at {} overruns block size {}",
                    length, position, info.size
                )));
            }

            // byte at a time: an offset shorter than the length repeats a pattern
            for i in position..position + length {
                output[i] = output[i - offset];
            }
            position += length;
        } else {
            output[position] = reader.read_u8()?;
            position += 1;
        }

        mask >>= 1;
        ops_left -= 1;
    }

    Ok(())
}

/// Reads a size-prefixed block and returns its decompressed bytes.
pub fn fast_decompress<R: Read>(reader: &mut R) -> CodecResult<Vec<u8>> {
    let info = read_block_info(reader)?;
    let mut output = vec![0u8; info.size];
    fast_decompress_into(info, reader, &mut output)?;

    debug!(
        size = info.size,
        compressed = info.is_compressed,
        "decompressed block"
    );
    Ok(output)
}

/// Decompresses a block held in memory.
pub fn decompress_slice(data: &[u8]) -> CodecResult<Vec<u8>> {
    let mut reader = data;
    fast_decompress(&mut reader)
}
