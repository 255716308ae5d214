//! SSSE3 kernel for the vertex decoder.
//!
//! Byte groups of width 1, 2 and 4 are expanded with one `pshufb`: the
//! escape mask of each half group indexes [`DECODE_SHUFFLE`], which gathers
//! escape bytes into the lanes that hold the all-ones pattern. The delta
//! stage transposes 16 vertices of one lane at a time and runs the prefix
//! sum (or xor) in a register.

use std::arch::x86_64::*;

use crate::byte_group::{
    decode_shuffle_mask, ensure_decode_limit, group_count, header_selector, header_size,
    DECODE_COUNT,
};
use crate::decoder_buffer::DecoderBuffer;
use crate::status::{invalid_parameter, truncated, CodecError, Status};
use crate::version::{BYTE_GROUP_DECODE_LIMIT, BYTE_GROUP_SIZE};
use crate::vertex_decoder::{BlockLayout, Channel, VertexKernel};

/// Vertex kernel backed by SSSE3. Only constructible when the CPU has it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ssse3Kernel {
    _detected: (),
}

impl Ssse3Kernel {
    pub fn detect() -> Option<Self> {
        if is_x86_feature_detected!("ssse3") {
            Some(Self { _detected: () })
        } else {
            None
        }
    }
}

impl VertexKernel for Ssse3Kernel {
    fn decode_bytes(&self, buffer: &mut DecoderBuffer, out: &mut [u8], bits: &[u8; 4]) -> Status {
        // SAFETY: ssse3 support was checked in `detect`.
        unsafe { decode_bytes_simd(buffer, out, bits) }
    }

    fn decode_deltas(
        &self,
        planes: &[u8],
        transposed: &mut [u8],
        layout: BlockLayout,
        last: [u8; 4],
        channel: Channel,
    ) {
        // SAFETY: ssse3 support was checked in `detect`.
        unsafe { decode_deltas_simd(planes, transposed, layout, last, channel) }
    }
}

// =============================================================================
// Byte groups
// =============================================================================

#[inline]
unsafe fn load16(bytes: &[u8]) -> __m128i {
    let bytes = &bytes[..16];
    _mm_loadu_si128(bytes.as_ptr() as *const __m128i)
}

#[inline]
#[target_feature(enable = "ssse3")]
unsafe fn gather_escapes(rest: __m128i, mask: __m128i) -> (__m128i, usize) {
    let mask16 = _mm_movemask_epi8(mask);
    let mask0 = (mask16 & 255) as u8;
    let mask1 = ((mask16 >> 8) & 255) as u8;

    let shuf = decode_shuffle_mask(mask0, mask1);
    let gathered = _mm_shuffle_epi8(rest, load16(&shuf));
    let escapes = DECODE_COUNT[mask0 as usize] as usize + DECODE_COUNT[mask1 as usize] as usize;
    (gathered, escapes)
}

/// Decodes one group into `out[..16]`; `data` must hold
/// [`BYTE_GROUP_DECODE_LIMIT`] bytes.
#[target_feature(enable = "ssse3")]
unsafe fn decode_bytes_group_simd(data: &[u8], out: &mut [u8], bits: u8) -> Result<usize, CodecError> {
    let data = data
        .get(..BYTE_GROUP_DECODE_LIMIT)
        .ok_or_else(|| truncated("byte group"))?;
    let out = &mut out[..BYTE_GROUP_SIZE];

    let (result, consumed) = match bits {
        0 => (_mm_setzero_si128(), 0),
        1 => {
            // flags are already LSB-first, so they are the escape mask
            let (mask0, mask1) = (data[0], data[1]);
            let shuf = decode_shuffle_mask(mask0, mask1);
            let result = _mm_shuffle_epi8(load16(&data[2..]), load16(&shuf));
            let escapes = DECODE_COUNT[mask0 as usize] as usize + DECODE_COUNT[mask1 as usize] as usize;
            (result, 2 + escapes)
        }
        2 => {
            let sel2 = _mm_cvtsi32_si128(i32::from_le_bytes([data[0], data[1], data[2], data[3]]));
            let sel22 = _mm_unpacklo_epi8(_mm_srli_epi16::<4>(sel2), sel2);
            let sel2222 = _mm_unpacklo_epi8(_mm_srli_epi16::<2>(sel22), sel22);
            let sel = _mm_and_si128(sel2222, _mm_set1_epi8(3));

            let mask = _mm_cmpeq_epi8(sel, _mm_set1_epi8(3));
            let (gathered, escapes) = gather_escapes(load16(&data[4..]), mask);
            (_mm_or_si128(gathered, _mm_andnot_si128(mask, sel)), 4 + escapes)
        }
        4 => {
            let sel4 = _mm_loadl_epi64(data.as_ptr() as *const __m128i);
            let sel44 = _mm_unpacklo_epi8(_mm_srli_epi16::<4>(sel4), sel4);
            let sel = _mm_and_si128(sel44, _mm_set1_epi8(15));

            let mask = _mm_cmpeq_epi8(sel, _mm_set1_epi8(15));
            let (gathered, escapes) = gather_escapes(load16(&data[8..]), mask);
            (_mm_or_si128(gathered, _mm_andnot_si128(mask, sel)), 8 + escapes)
        }
        8 => (load16(data), BYTE_GROUP_SIZE),
        _ => return Err(invalid_parameter(format!("unexpected bit width {}", bits))),
    };

    _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, result);
    Ok(consumed)
}

#[target_feature(enable = "ssse3")]
unsafe fn decode_bytes_simd(buffer: &mut DecoderBuffer, out: &mut [u8], bits: &[u8; 4]) -> Status {
    let groups = group_count(out.len())?;
    let header = buffer.decode_slice(header_size(groups))?;

    let mut index = 0;

    // four groups per header byte under one shared bounds check
    while index + 4 <= groups && buffer.remaining_size() >= BYTE_GROUP_DECODE_LIMIT * 4 {
        let header_byte = header[index / 4];
        for g in 0..4 {
            let width = bits[((header_byte >> (g * 2)) & 3) as usize];
            let start = (index + g) * BYTE_GROUP_SIZE;
            let consumed = decode_bytes_group_simd(buffer.remaining_data(), &mut out[start..], width)?;
            buffer.advance(consumed)?;
        }
        index += 4;
    }

    while index < groups {
        ensure_decode_limit(buffer, index)?;

        let width = bits[header_selector(header, index)];
        let start = index * BYTE_GROUP_SIZE;
        let consumed = decode_bytes_group_simd(buffer.remaining_data(), &mut out[start..], width)?;
        buffer.advance(consumed)?;
        index += 1;
    }

    Ok(())
}

// =============================================================================
// Deltas
// =============================================================================

#[inline]
#[target_feature(enable = "ssse3")]
unsafe fn transpose8(r: &mut [__m128i; 4]) {
    let t0 = _mm_unpacklo_epi8(r[0], r[1]);
    let t1 = _mm_unpackhi_epi8(r[0], r[1]);
    let t2 = _mm_unpacklo_epi8(r[2], r[3]);
    let t3 = _mm_unpackhi_epi8(r[2], r[3]);

    r[0] = _mm_unpacklo_epi16(t0, t2);
    r[1] = _mm_unpackhi_epi16(t0, t2);
    r[2] = _mm_unpacklo_epi16(t1, t3);
    r[3] = _mm_unpackhi_epi16(t1, t3);
}

#[inline]
#[target_feature(enable = "ssse3")]
unsafe fn unzigzag8(v: __m128i) -> __m128i {
    let xl = _mm_sub_epi8(_mm_setzero_si128(), _mm_and_si128(v, _mm_set1_epi8(1)));
    let xr = _mm_and_si128(_mm_srli_epi16::<1>(v), _mm_set1_epi8(127));
    _mm_xor_si128(xl, xr)
}

#[inline]
#[target_feature(enable = "ssse3")]
unsafe fn unzigzag16(v: __m128i) -> __m128i {
    let xl = _mm_sub_epi16(_mm_setzero_si128(), _mm_and_si128(v, _mm_set1_epi16(1)));
    let xr = _mm_srli_epi16::<1>(v);
    _mm_xor_si128(xl, xr)
}

#[inline]
#[target_feature(enable = "ssse3")]
unsafe fn rotate32(v: __m128i, r: u32) -> __m128i {
    let left = _mm_sll_epi32(v, _mm_cvtsi32_si128(r as i32));
    let right = _mm_srl_epi32(v, _mm_cvtsi32_si128(32 - r as i32));
    _mm_or_si128(left, right)
}

#[target_feature(enable = "ssse3")]
unsafe fn decode_deltas_simd(
    planes: &[u8],
    transposed: &mut [u8],
    layout: BlockLayout,
    last: [u8; 4],
    channel: Channel,
) {
    let aligned = layout.vertex_count_aligned;
    let mut pi = _mm_cvtsi32_si128(i32::from_le_bytes(last));
    let mut save = 0;

    for j in (0..aligned).step_by(BYTE_GROUP_SIZE) {
        let mut r = [
            load16(&planes[j..]),
            load16(&planes[j + aligned..]),
            load16(&planes[j + 2 * aligned..]),
            load16(&planes[j + 3 * aligned..]),
        ];
        transpose8(&mut r);

        for quad in r {
            let mut t = match channel {
                Channel::Byte => unzigzag8(quad),
                Channel::Short => unzigzag16(quad),
                Channel::Xor { rotation } => rotate32(quad, rotation),
            };

            for _ in 0..4 {
                pi = match channel {
                    Channel::Byte => _mm_add_epi8(pi, t),
                    Channel::Short => _mm_add_epi16(pi, t),
                    Channel::Xor { .. } => _mm_xor_si128(pi, t),
                };

                let word = _mm_cvtsi128_si32(pi) as u32;
                transposed[save..save + 4].copy_from_slice(&word.to_le_bytes());
                save += layout.vertex_size;

                t = _mm_srli_si128::<4>(t);
            }
        }
    }
}
