//! Index buffer decoder.
//!
//! Triangles are predicted from two small ring buffers: recently emitted
//! edges and recently introduced vertices. Layout of an encoded buffer:
//!
//! ```text
//! [header][one code byte per triangle][data: aux bytes + vByte deltas][16-byte codeaux]
//! ```
//!
//! A code below `0xf0` reuses a cached edge and names the third vertex; codes
//! `0xf0..0xfe` look up a pair of vertex selectors in the codeaux table;
//! `0xfe` and `0xff` spell the triangle out with an aux byte from the data
//! region.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::bit_utils::unzigzag;
use crate::decoder_buffer::DecoderBuffer;
use crate::status::{invalid_parameter, truncated, CodecError, CodecResult};
use crate::version::{split_header, INDEX_DECODE_VERSION, INDEX_HEADER};

const FIFO_SIZE: usize = 16;
const CODEAUX_SIZE: usize = 16;

/// Ring of the 16 most recent edges.
#[derive(Debug, Default)]
pub struct EdgeFifo {
    edges: [(u32, u32); FIFO_SIZE],
    offset: usize,
}

impl EdgeFifo {
    pub fn push(&mut self, a: u32, b: u32) {
        self.edges[self.offset] = (a, b);
        self.offset = (self.offset + 1) & (FIFO_SIZE - 1);
    }

    /// Edge pushed `age + 1` pushes ago.
    pub fn get(&self, age: usize) -> (u32, u32) {
        self.edges[self.offset.wrapping_sub(1 + age) & (FIFO_SIZE - 1)]
    }
}

/// Ring of the 16 most recently introduced vertices.
///
/// A push always writes the slot but only advances when `advance` is set, so
/// a repeated vertex overwrites the pending slot without aging the ring.
#[derive(Debug, Default)]
pub struct VertexFifo {
    vertices: [u32; FIFO_SIZE],
    offset: usize,
}

impl VertexFifo {
    pub fn push(&mut self, v: u32, advance: bool) {
        self.vertices[self.offset] = v;
        self.offset = (self.offset + advance as usize) & (FIFO_SIZE - 1);
    }

    /// Vertex `distance` slots behind the write position.
    pub fn get(&self, distance: usize) -> u32 {
        self.vertices[self.offset.wrapping_sub(distance) & (FIFO_SIZE - 1)]
    }
}

struct IndexState {
    edges: EdgeFifo,
    vertices: VertexFifo,
    next: u32,
    last: u32,
}

impl IndexState {
    fn decode_index(&mut self, data: &mut DecoderBuffer) -> CodecResult<u32> {
        let v = data.decode_vbyte()?;
        self.last = self.last.wrapping_add(unzigzag(v));
        Ok(self.last)
    }

    /// Takes a fresh vertex id when `selector` is 0, otherwise a cached one.
    fn fresh_or_cached(&mut self, selector: usize) -> u32 {
        if selector == 0 {
            let v = self.next;
            self.next = self.next.wrapping_add(1);
            v
        } else {
            self.vertices.get(selector)
        }
    }
}

fn write_triangle(out: &mut [u8], index_size: usize, triangle: [u32; 3]) {
    match index_size {
        2 => {
            for (chunk, v) in out.chunks_exact_mut(2).zip(triangle) {
                LittleEndian::write_u16(chunk, v as u16);
            }
        }
        _ => {
            for (chunk, v) in out.chunks_exact_mut(4).zip(triangle) {
                LittleEndian::write_u32(chunk, v);
            }
        }
    }
}

/// Decodes `index_count` indices of `index_size` (2 or 4) bytes each.
///
/// # Errors
///
/// - `InvalidParameter` if `index_count` is not a multiple of 3 or
///   `index_size` is not 2 or 4.
/// - `Truncated` if the buffer is shorter than header + codes + codeaux, or
///   the data region runs out.
/// - `HeaderMismatch` / `UnsupportedVersion` for a bad header byte.
/// - `BoundaryMismatch` if decoding stops before the codeaux table.
pub fn decode_index_buffer(
    index_count: usize,
    index_size: usize,
    buffer: &[u8],
) -> CodecResult<Vec<u8>> {
    if index_count % 3 != 0 {
        return Err(invalid_parameter(format!(
            "index count {} is not a multiple of 3",
            index_count
        )));
    }
    if index_size != 2 && index_size != 4 {
        return Err(invalid_parameter(format!(
            "index size {} must be 2 or 4",
            index_size
        )));
    }

    let triangle_count = index_count / 3;
    let data_offset = 1 + triangle_count;

    // header, one code per triangle and the codeaux table
    if buffer.len() < data_offset + CODEAUX_SIZE {
        return Err(truncated(format!(
            "index buffer of {} bytes is too short for {} triangles",
            buffer.len(),
            triangle_count
        )));
    }

    let (magic, version) = split_header(buffer[0]);
    if magic != INDEX_HEADER {
        return Err(CodecError::HeaderMismatch(format!(
            "expected index header 0x{:02x}, got 0x{:02x}",
            INDEX_HEADER, buffer[0]
        )));
    }
    if version > INDEX_DECODE_VERSION {
        return Err(CodecError::UnsupportedVersion(format!(
            "index buffer version {} (max {})",
            version, INDEX_DECODE_VERSION
        )));
    }

    let fecmax = if version >= 1 { 13 } else { 15 };

    let codes = &buffer[1..data_offset];
    let codeaux_table = &buffer[buffer.len() - CODEAUX_SIZE..];
    let mut data = DecoderBuffer::new(&buffer[data_offset..buffer.len() - CODEAUX_SIZE]);

    let mut state = IndexState {
        edges: EdgeFifo::default(),
        vertices: VertexFifo::default(),
        next: 0,
        last: 0,
    };

    let mut output = vec![0u8; index_count * index_size];

    for (&codetri, out) in codes.iter().zip(output.chunks_exact_mut(3 * index_size)) {
        let triangle = if codetri < 0xf0 {
            let fe = (codetri >> 4) as usize;
            let (a, b) = state.edges.get(fe);

            let fec = (codetri & 15) as usize;
            let c = if fec < fecmax {
                let c = if fec == 0 {
                    state.fresh_or_cached(0)
                } else {
                    state.vertices.get(1 + fec)
                };
                state.vertices.push(c, fec == 0);
                c
            } else {
                let c = if fec != 15 {
                    // 13 and 14 step the last explicit index by -1 and +1
                    state.last = state
                        .last
                        .wrapping_add((fec as i32 - (fec ^ 3) as i32) as u32);
                    state.last
                } else {
                    state.decode_index(&mut data)?
                };
                state.vertices.push(c, true);
                c
            };

            state.edges.push(c, b);
            state.edges.push(a, c);
            [a, b, c]
        } else if codetri < 0xfe {
            let codeaux = codeaux_table[(codetri & 15) as usize];
            let feb = (codeaux >> 4) as usize;
            let fec = (codeaux & 15) as usize;

            let a = state.fresh_or_cached(0);
            let b = state.fresh_or_cached(feb);
            let c = state.fresh_or_cached(fec);

            state.vertices.push(a, true);
            state.vertices.push(b, feb == 0);
            state.vertices.push(c, fec == 0);

            state.edges.push(b, a);
            state.edges.push(c, b);
            state.edges.push(a, c);
            [a, b, c]
        } else {
            let codeaux = data
                .decode_u8()
                .map_err(|_| truncated("explicit triangle aux byte"))?;
            let fea = if codetri == 0xfe { 0 } else { 15 };
            let feb = (codeaux >> 4) as usize;
            let fec = (codeaux & 15) as usize;

            // a zero aux byte restarts vertex numbering
            if codeaux == 0 {
                state.next = 0;
            }

            let mut a = if fea == 0 { state.fresh_or_cached(0) } else { 0 };
            let mut b = state.fresh_or_cached(feb);
            let mut c = state.fresh_or_cached(fec);

            if fea == 15 {
                a = state.decode_index(&mut data)?;
            }
            if feb == 15 {
                b = state.decode_index(&mut data)?;
            }
            if fec == 15 {
                c = state.decode_index(&mut data)?;
            }

            state.vertices.push(a, true);
            state.vertices.push(b, feb == 0 || feb == 15);
            state.vertices.push(c, fec == 0 || fec == 15);

            state.edges.push(b, a);
            state.edges.push(c, b);
            state.edges.push(a, c);
            [a, b, c]
        };

        write_triangle(out, index_size, triangle);
    }

    if data.remaining_size() != 0 {
        return Err(CodecError::BoundaryMismatch(format!(
            "index data stopped {} bytes before the codeaux table",
            data.remaining_size()
        )));
    }

    debug!(index_count, index_size, version, "decoded index buffer");
    Ok(output)
}
