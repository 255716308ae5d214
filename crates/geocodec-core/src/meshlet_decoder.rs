//! Meshlet decoder.
//!
//! A meshlet buffer has no header. Reading from the end:
//!
//! ```text
//! [vertex + triangle data][gap][ctrl: 2 bits per vertex][codes: 4 bits per triangle]
//! ```
//!
//! The gap pads `ctrl + codes` to at least 16 bytes, so any group read that
//! starts inside the data region stays inside the buffer.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::bit_utils::unzigzag;
use crate::status::{invalid_parameter, truncated, CodecError, CodecResult, Status};
use crate::version::{MESHLET_MAX_ELEMENTS, MESHLET_MIN_TRAILER};

struct MeshletLayout<'a> {
    data: &'a [u8],
    ctrl: &'a [u8],
    codes: &'a [u8],
    bound: usize,
}

impl<'a> MeshletLayout<'a> {
    fn new(buffer: &'a [u8], vertex_count: usize, triangle_count: usize) -> CodecResult<Self> {
        if vertex_count > MESHLET_MAX_ELEMENTS || triangle_count > MESHLET_MAX_ELEMENTS {
            return Err(invalid_parameter(format!(
                "meshlet has {} vertices and {} triangles, limit is {}",
                vertex_count, triangle_count, MESHLET_MAX_ELEMENTS
            )));
        }

        let codes_size = (triangle_count + 1) / 2;
        let ctrl_size = (vertex_count + 3) / 4;
        let gap_size = MESHLET_MIN_TRAILER.saturating_sub(codes_size + ctrl_size);

        if buffer.len() < codes_size + ctrl_size + gap_size {
            return Err(truncated(format!(
                "meshlet buffer of {} bytes is smaller than its {} byte trailer",
                buffer.len(),
                codes_size + ctrl_size + gap_size
            )));
        }

        let end = buffer.len();
        Ok(Self {
            data: buffer,
            codes: &buffer[end - codes_size..],
            ctrl: &buffer[end - codes_size - ctrl_size..end - codes_size],
            bound: end - codes_size - ctrl_size - gap_size,
        })
    }

    fn byte(&self, offset: usize) -> CodecResult<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| truncated("meshlet data"))
    }

    fn ensure_in_bounds(&self, offset: usize, what: &str) -> Status {
        if offset > self.bound {
            return Err(truncated(format!(
                "meshlet {} start at {} past data end {}",
                what, offset, self.bound
            )));
        }
        Ok(())
    }

    /// Decodes vertex ids; returns the data offset after the last group.
    fn decode_vertices(&self, vertex_count: usize, mut emit: impl FnMut(usize, u32)) -> CodecResult<usize> {
        let mut last = u32::MAX;
        let mut offset = 0;

        for group in 0..(vertex_count + 3) / 4 {
            self.ensure_in_bounds(offset, "vertices")?;

            let code4 = self.ctrl[group];
            for k in 0..4 {
                let code = ((code4 >> k) & 1) | ((code4 >> (k + 3)) & 2);
                let length = if code4 == 0xff { 4 } else { code as usize };

                let mut v = 0u32;
                for byte in 0..length {
                    v |= (self.byte(offset + byte)? as u32) << (8 * byte);
                }

                let r = last.wrapping_add(unzigzag(v)).wrapping_add(1);
                let index = group * 4 + k;
                if index < vertex_count {
                    emit(index, r);
                }

                offset += length;
                last = r;
            }
        }

        Ok(offset)
    }

    /// Decodes triangles starting at `offset`; returns the offset after them.
    fn decode_triangles(
        &self,
        mut offset: usize,
        triangle_count: usize,
        mut emit: impl FnMut(usize, [u8; 3]),
    ) -> CodecResult<usize> {
        let mut next = 0u32;
        let mut fifo = [0u32; 3];

        for i in 0..triangle_count {
            self.ensure_in_bounds(offset, "triangles")?;

            let code = ((self.codes[i / 2] >> ((i & 1) * 4)) & 0xf) as u32;

            let mut vertex = |explicit: bool| -> CodecResult<u32> {
                if explicit {
                    let v = self.byte(offset)? as u32;
                    offset += 1;
                    Ok(v)
                } else {
                    let v = next;
                    next = next.wrapping_add(1);
                    Ok(v)
                }
            };

            let tri = if code < 12 {
                // reuse an edge of a recent triangle, rotated by the low bits
                let edge = fifo[(code / 4) as usize] >> ((code << 3) & 16);
                let c = vertex(code & 1 != 0)?;
                ((edge & 0xff) << 16) | (edge & 0xff00) | c | (c << 24)
            } else {
                let a = vertex(code > 12)?;
                let b = vertex(code > 13)?;
                let c = vertex(code > 14)?;
                c | (a << 8) | (b << 16) | (c << 24)
            };

            emit(i, [(tri >> 8) as u8, (tri >> 16) as u8, (tri >> 24) as u8]);

            fifo[2] = fifo[1];
            fifo[1] = fifo[0];
            fifo[0] = tri;
        }

        Ok(offset)
    }

    fn ensure_consumed(&self, offset: usize) -> Status {
        if offset != self.bound {
            return Err(CodecError::BoundaryMismatch(format!(
                "meshlet data ended at {}, expected {}",
                offset, self.bound
            )));
        }
        Ok(())
    }
}

fn pack_triangle(t: [u8; 3]) -> u32 {
    t[0] as u32 | (t[1] as u32) << 8 | (t[2] as u32) << 16
}

fn ensure_output(len: usize, required: usize, what: &str) -> Status {
    if len < required {
        return Err(invalid_parameter(format!(
            "{} output holds {} bytes, need {}",
            what, len, required
        )));
    }
    Ok(())
}

/// Decodes a meshlet into caller-provided vertex and triangle buffers.
///
/// Vertices are written as little-endian u16 (`vertex_size == 2`) or u32
/// (`vertex_size == 4`). Triangles are written as 3 bytes each
/// (`triangle_size == 3`) or packed into a little-endian u32 as
/// `a | b << 8 | c << 16` (`triangle_size == 4`).
pub fn decode_meshlet(
    vertices: &mut [u8],
    vertex_count: usize,
    vertex_size: usize,
    triangles: &mut [u8],
    triangle_count: usize,
    triangle_size: usize,
    buffer: &[u8],
) -> Status {
    if vertex_size != 2 && vertex_size != 4 {
        return Err(invalid_parameter(format!(
            "meshlet vertex size {} must be 2 or 4",
            vertex_size
        )));
    }
    if triangle_size != 3 && triangle_size != 4 {
        return Err(invalid_parameter(format!(
            "meshlet triangle size {} must be 3 or 4",
            triangle_size
        )));
    }

    let layout = MeshletLayout::new(buffer, vertex_count, triangle_count)?;
    ensure_output(vertices.len(), vertex_count * vertex_size, "vertex")?;
    ensure_output(triangles.len(), triangle_count * triangle_size, "triangle")?;

    let offset = layout.decode_vertices(vertex_count, |i, v| {
        if vertex_size == 4 {
            LittleEndian::write_u32(&mut vertices[i * 4..], v);
        } else {
            LittleEndian::write_u16(&mut vertices[i * 2..], v as u16);
        }
    })?;

    let offset = layout.decode_triangles(offset, triangle_count, |i, t| {
        if triangle_size == 4 {
            LittleEndian::write_u32(&mut triangles[i * 4..], pack_triangle(t));
        } else {
            triangles[i * 3..i * 3 + 3].copy_from_slice(&t);
        }
    })?;

    layout.ensure_consumed(offset)?;
    debug!(vertex_count, triangle_count, "decoded meshlet");
    Ok(())
}

/// Decodes a meshlet into u32 vertex ids and packed u32 triangles.
pub fn decode_meshlet_raw(
    vertices: &mut [u32],
    vertex_count: usize,
    triangles: &mut [u32],
    triangle_count: usize,
    buffer: &[u8],
) -> Status {
    let layout = MeshletLayout::new(buffer, vertex_count, triangle_count)?;
    ensure_output(vertices.len() * 4, vertex_count * 4, "vertex")?;
    ensure_output(triangles.len() * 4, triangle_count * 4, "triangle")?;

    let offset = layout.decode_vertices(vertex_count, |i, v| vertices[i] = v)?;
    let offset = layout.decode_triangles(offset, triangle_count, |i, t| {
        triangles[i] = pack_triangle(t)
    })?;

    layout.ensure_consumed(offset)
}
