//! Byte group codec.
//!
//! A byte group is 16 values stored under one bit width. Widths 1, 2 and 4
//! store a packed prefix where the all-ones pattern is an escape: the real
//! byte follows the prefix, one per escape in order of occurrence. Width 0
//! is an all-zero group and width 8 is 16 literal bytes.
//!
//! A run of groups is preceded by a header holding 2 bits per group, which
//! index a 4-entry table of widths chosen by the caller.

use crate::bit_utils::{count_ones8, reverse_bits8};
use crate::decoder_buffer::DecoderBuffer;
use crate::status::{invalid_parameter, truncated, CodecError, Status};
use crate::version::{BYTE_GROUP_DECODE_LIMIT, BYTE_GROUP_SIZE};

/// Widths selectable by a version 0 group header.
pub const BITS_V0: [u8; 4] = [0, 2, 4, 8];

/// Widths available to version 1; a control value picks a 4-entry window.
pub const BITS_V1: [u8; 5] = [0, 1, 2, 4, 8];

/// Returns the width table for a byte plane.
///
/// Version 0 always uses [`BITS_V0`]; version 1 uses the window of
/// [`BITS_V1`] starting at `ctrl` (0 or 1).
pub fn bits_table(version: u8, ctrl: u8) -> Result<[u8; 4], CodecError> {
    if version == 0 {
        return Ok(BITS_V0);
    }
    match ctrl {
        0 => Ok([BITS_V1[0], BITS_V1[1], BITS_V1[2], BITS_V1[3]]),
        1 => Ok([BITS_V1[1], BITS_V1[2], BITS_V1[3], BITS_V1[4]]),
        _ => Err(invalid_parameter(format!(
            "control value {} has no bit width table",
            ctrl
        ))),
    }
}

/// Number of header bytes for `group_count` groups.
#[inline]
pub fn header_size(group_count: usize) -> usize {
    (group_count + 3) / 4
}

/// Reads the 2-bit selector of group `index` from a group header.
#[inline]
pub fn header_selector(header: &[u8], index: usize) -> usize {
    ((header[index / 4] >> ((index % 4) * 2)) & 3) as usize
}

// =============================================================================
// Shuffle tables
// =============================================================================

const fn build_shuffle_table() -> [[u8; 8]; 256] {
    let mut table = [[0u8; 8]; 256];
    let mut mask = 0;
    while mask < 256 {
        let mut count = 0u8;
        let mut i = 0;
        while i < 8 {
            if (mask >> i) & 1 != 0 {
                table[mask][i] = count;
                count += 1;
            } else {
                table[mask][i] = 0x80;
            }
            i += 1;
        }
        mask += 1;
    }
    table
}

const fn build_count_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut mask = 0;
    while mask < 256 {
        table[mask] = count_ones8(mask as u8);
        mask += 1;
    }
    table
}

/// For an 8-lane escape mask, the index of each lane's escape byte among
/// the escapes, or `0x80` (shuffle to zero) for lanes that are not escaped.
pub static DECODE_SHUFFLE: [[u8; 8]; 256] = build_shuffle_table();

/// Number of escapes in an 8-lane mask.
pub static DECODE_COUNT: [u8; 256] = build_count_table();

/// Builds the 16-lane gather mask for a group from its two 8-lane escape masks.
///
/// Lanes 8..16 index past the escapes of the first half.
#[inline]
pub fn decode_shuffle_mask(mask0: u8, mask1: u8) -> [u8; 16] {
    let sm0 = &DECODE_SHUFFLE[mask0 as usize];
    let sm1 = &DECODE_SHUFFLE[mask1 as usize];
    let offset = DECODE_COUNT[mask0 as usize];

    let mut out = [0u8; 16];
    out[..8].copy_from_slice(sm0);
    for (dst, src) in out[8..].iter_mut().zip(sm1) {
        *dst = src.wrapping_add(offset);
    }
    out
}

// =============================================================================
// Scalar decode
// =============================================================================

/// Decodes one group of 16 values stored with `bits` bits each.
///
/// Returns the number of input bytes consumed, escapes included.
pub fn decode_bytes_group(data: &[u8], out: &mut [u8], bits: u8) -> Result<usize, CodecError> {
    let out = &mut out[..BYTE_GROUP_SIZE];
    match bits {
        0 => {
            out.fill(0);
            Ok(0)
        }
        1 | 2 | 4 => decode_packed_group(data, out, bits as u32),
        8 => {
            let src = data
                .get(..BYTE_GROUP_SIZE)
                .ok_or_else(|| truncated("literal byte group"))?;
            out.copy_from_slice(src);
            Ok(BYTE_GROUP_SIZE)
        }
        _ => Err(invalid_parameter(format!("unexpected bit width {}", bits))),
    }
}

fn decode_packed_group(data: &[u8], out: &mut [u8], bits: u32) -> Result<usize, CodecError> {
    let packed_size = BYTE_GROUP_SIZE * bits as usize / 8;
    let per_byte = (8 / bits) as usize;
    let sentinel = ((1u32 << bits) - 1) as u8;

    let packed = data
        .get(..packed_size)
        .ok_or_else(|| truncated("packed byte group"))?;

    let mut data_var = packed_size;
    for (chunk, &raw) in out.chunks_exact_mut(per_byte).zip(packed) {
        // 1-bit groups are stored LSB-first
        let mut byte = if bits == 1 { reverse_bits8(raw) } else { raw };

        for value in chunk.iter_mut() {
            let enc = byte >> (8 - bits);
            byte = ((byte as u32) << bits) as u8;

            if enc == sentinel {
                *value = *data
                    .get(data_var)
                    .ok_or_else(|| truncated("byte group escape"))?;
                data_var += 1;
            } else {
                *value = enc;
            }
        }
    }

    Ok(data_var)
}

/// Returns the number of groups covering `len` output bytes.
pub(crate) fn group_count(len: usize) -> Result<usize, CodecError> {
    if len % BYTE_GROUP_SIZE != 0 {
        return Err(invalid_parameter(
            "byte group output must be a multiple of the group size",
        ));
    }
    Ok(len / BYTE_GROUP_SIZE)
}

/// Fails unless group `index` has [`BYTE_GROUP_DECODE_LIMIT`] readable bytes.
#[inline]
pub(crate) fn ensure_decode_limit(buffer: &DecoderBuffer, index: usize) -> Status {
    if buffer.remaining_size() < BYTE_GROUP_DECODE_LIMIT {
        return Err(truncated(format!(
            "byte group {} needs {} readable bytes, have {}",
            index,
            BYTE_GROUP_DECODE_LIMIT,
            buffer.remaining_size()
        )));
    }
    Ok(())
}

/// Decodes `out.len() / 16` groups preceded by their header.
///
/// `bits` maps the 2-bit header selector to a width. Every group must have
/// [`BYTE_GROUP_DECODE_LIMIT`] readable bytes before it is decoded.
pub fn decode_bytes(buffer: &mut DecoderBuffer, out: &mut [u8], bits: &[u8; 4]) -> Status {
    let groups = group_count(out.len())?;
    let header = buffer.decode_slice(header_size(groups))?;

    for (index, group) in out.chunks_exact_mut(BYTE_GROUP_SIZE).enumerate() {
        ensure_decode_limit(buffer, index)?;

        let width = bits[header_selector(header, index)];
        let consumed = decode_bytes_group(buffer.remaining_data(), group, width)?;
        buffer.advance(consumed)?;
    }

    Ok(())
}

// =============================================================================
// Encode
// =============================================================================

/// Encodes one group of 16 values with `bits` bits each.
///
/// Values at or above the escape pattern are written as escape bytes. Width 0
/// only accepts an all-zero group.
pub fn encode_bytes_group(group: &[u8; BYTE_GROUP_SIZE], bits: u8) -> Result<Vec<u8>, CodecError> {
    match bits {
        0 => {
            if group.iter().any(|&v| v != 0) {
                return Err(invalid_parameter("width 0 requires an all-zero group"));
            }
            Ok(Vec::new())
        }
        1 | 2 | 4 => {
            let per_byte = (8 / bits) as usize;
            let sentinel = ((1u32 << bits) - 1) as u8;
            let mut out = Vec::with_capacity(BYTE_GROUP_DECODE_LIMIT);

            for chunk in group.chunks_exact(per_byte) {
                let mut byte = 0u8;
                for &v in chunk {
                    let enc = v.min(sentinel);
                    byte = ((byte as u32) << bits) as u8 | enc;
                }
                out.push(if bits == 1 { reverse_bits8(byte) } else { byte });
            }

            out.extend(group.iter().copied().filter(|&v| v >= sentinel));
            Ok(out)
        }
        8 => Ok(group.to_vec()),
        _ => Err(invalid_parameter(format!("unexpected bit width {}", bits))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_table_golden() {
        assert_eq!(DECODE_SHUFFLE[0], [0x80; 8]);
        assert_eq!(DECODE_SHUFFLE[0xff], [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(
            DECODE_SHUFFLE[0b1011],
            [0, 1, 0x80, 2, 0x80, 0x80, 0x80, 0x80]
        );
        assert_eq!(
            DECODE_SHUFFLE[0b1000_0001],
            [0, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 1]
        );
    }

    #[test]
    fn test_count_table_golden() {
        assert_eq!(DECODE_COUNT[0], 0);
        assert_eq!(DECODE_COUNT[0b1011], 3);
        assert_eq!(DECODE_COUNT[0x80], 1);
        assert_eq!(DECODE_COUNT[0xff], 8);
        for mask in 0..=255u8 {
            assert_eq!(DECODE_COUNT[mask as usize], mask.count_ones() as u8);
        }
    }

    #[test]
    fn test_shuffle_mask_second_half_offset() {
        let mask = decode_shuffle_mask(0b0000_0011, 0b0000_0001);
        assert_eq!(&mask[..8], &[0, 1, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80]);
        assert_eq!(mask[8], 2);
        assert!(mask[9..].iter().all(|&m| m == 0x82));
    }

    #[test]
    fn test_bits_tables() {
        assert_eq!(bits_table(0, 3).unwrap(), [0, 2, 4, 8]);
        assert_eq!(bits_table(1, 0).unwrap(), [0, 1, 2, 4]);
        assert_eq!(bits_table(1, 1).unwrap(), [1, 2, 4, 8]);
        assert!(bits_table(1, 2).is_err());
    }

    #[test]
    fn test_decode_zero_group() {
        let mut out = [0xaa; 16];
        assert_eq!(decode_bytes_group(&[], &mut out, 0).unwrap(), 0);
        assert_eq!(out, [0; 16]);
    }

    #[test]
    fn test_decode_two_bit_group_with_escape() {
        // values 0,1,2,3(escape -> 0x40), rest 1
        let data = [0b00_01_10_11, 0x55, 0x55, 0x55, 0x40];
        let mut out = [0; 16];
        assert_eq!(decode_bytes_group(&data, &mut out, 2).unwrap(), 5);
        assert_eq!(&out[..4], &[0, 1, 2, 0x40]);
        assert!(out[4..].iter().all(|&v| v == 1));
    }

    #[test]
    fn test_decode_one_bit_group_is_lsb_first() {
        // value 0 and value 9 escaped
        let data = [0b0000_0001, 0b0000_0010, 0x11, 0x22];
        let mut out = [0; 16];
        assert_eq!(decode_bytes_group(&data, &mut out, 1).unwrap(), 4);
        let mut expected = [0u8; 16];
        expected[0] = 0x11;
        expected[9] = 0x22;
        assert_eq!(out, expected);
    }

    #[test]
    fn test_decode_group_truncated_escape() {
        let data = [0xff; 8];
        let mut out = [0; 16];
        assert!(matches!(
            decode_bytes_group(&data, &mut out, 4),
            Err(CodecError::Truncated(_))
        ));
    }

    #[test]
    fn test_encode_then_decode_group() {
        let group: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 15, 16, 200, 0, 0, 1, 1, 2];
        for bits in [1u8, 2, 4, 8] {
            let encoded = encode_bytes_group(&group, bits).unwrap();
            let mut out = [0; 16];
            let consumed = decode_bytes_group(&encoded, &mut out, bits).unwrap();
            assert_eq!(consumed, encoded.len(), "bits {bits}");
            assert_eq!(out, group, "bits {bits}");
        }
        assert!(encode_bytes_group(&group, 0).is_err());
    }

    #[test]
    fn test_decode_bytes_header_walk() {
        // two groups: width 0 then width 8, header selector 0 then 3
        let mut data = vec![0b0000_1100];
        data.extend(1..=16u8);
        data.extend([0u8; 24]);
        let mut buffer = DecoderBuffer::new(&data);
        let mut out = [0xee; 32];
        decode_bytes(&mut buffer, &mut out, &BITS_V0).unwrap();
        assert_eq!(&out[..16], &[0; 16]);
        assert_eq!(&out[16..], &(1..=16u8).collect::<Vec<_>>()[..]);
        assert_eq!(buffer.position(), 17);
    }

    #[test]
    fn test_decode_bytes_requires_decode_limit() {
        let data = [0u8; 1 + BYTE_GROUP_DECODE_LIMIT - 1];
        let mut buffer = DecoderBuffer::new(&data);
        let mut out = [0; 16];
        assert!(decode_bytes(&mut buffer, &mut out, &BITS_V0).is_err());
    }
}
