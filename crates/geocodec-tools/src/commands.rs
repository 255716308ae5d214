//! Subcommand implementations. Each reads one encoded file and writes the
//! decoded bytes verbatim.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use geocodec_core::status::invalid_parameter;
use geocodec_core::version::MESHLET_MAX_ELEMENTS;
use geocodec_core::{
    decode_index_buffer, decode_meshlet, decode_vertex_buffer_with, fast_decompress,
    DecoderOptions,
};
use tracing::{debug, info};

use crate::error::{ToolError, ToolResult};

pub fn read_input(path: &Path) -> ToolResult<Vec<u8>> {
    fs::read(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_output(path: &Path, data: &[u8]) -> ToolResult<()> {
    fs::write(path, data).map_err(|source| ToolError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn vertex(input: &Path, output: &Path, count: usize, size: usize, scalar: bool) -> ToolResult<()> {
    let encoded = read_input(input)?;
    let options = DecoderOptions::new().with_simd(!scalar);

    let decoded = decode_vertex_buffer_with(count, size, &encoded, &options)?;
    write_output(output, &decoded)?;

    info!(
        vertices = count,
        encoded = encoded.len(),
        decoded = decoded.len(),
        "decoded vertex buffer"
    );
    Ok(())
}

pub fn index(input: &Path, output: &Path, count: usize, size: usize) -> ToolResult<()> {
    let encoded = read_input(input)?;
    let decoded = decode_index_buffer(count, size, &encoded)?;
    write_output(output, &decoded)?;

    info!(
        indices = count,
        encoded = encoded.len(),
        decoded = decoded.len(),
        "decoded index buffer"
    );
    Ok(())
}

/// Bytes needed for a meshlet's vertices, checked before anything is allocated.
fn meshlet_vertex_bytes(
    vertex_count: usize,
    triangle_count: usize,
    vertex_size: usize,
    triangle_size: usize,
) -> ToolResult<usize> {
    if vertex_count > MESHLET_MAX_ELEMENTS || triangle_count > MESHLET_MAX_ELEMENTS {
        return Err(invalid_parameter(format!(
            "meshlet has {} vertices and {} triangles, limit is {}",
            vertex_count, triangle_count, MESHLET_MAX_ELEMENTS
        ))
        .into());
    }
    if !matches!(vertex_size, 2 | 4) || !matches!(triangle_size, 3 | 4) {
        return Err(invalid_parameter(format!(
            "meshlet element sizes {}/{} must be 2 or 4 and 3 or 4",
            vertex_size, triangle_size
        ))
        .into());
    }
    Ok(vertex_count * vertex_size)
}

/// Writes the vertex ids followed by the triangles.
pub fn meshlet(
    input: &Path,
    output: &Path,
    vertex_count: usize,
    triangle_count: usize,
    vertex_size: usize,
    triangle_size: usize,
) -> ToolResult<()> {
    let vertex_bytes =
        meshlet_vertex_bytes(vertex_count, triangle_count, vertex_size, triangle_size)?;
    let encoded = read_input(input)?;

    let mut decoded = vec![0u8; vertex_bytes + triangle_count * triangle_size];
    let (vertices, triangles) = decoded.split_at_mut(vertex_bytes);

    decode_meshlet(
        vertices,
        vertex_count,
        vertex_size,
        triangles,
        triangle_count,
        triangle_size,
        &encoded,
    )?;
    write_output(output, &decoded)?;

    info!(
        vertices = vertex_count,
        triangles = triangle_count,
        "decoded meshlet"
    );
    Ok(())
}

/// Decompresses every block in the file and concatenates the results.
pub fn block(input: &Path, output: &Path) -> ToolResult<()> {
    let encoded = read_input(input)?;
    let mut reader = Cursor::new(encoded.as_slice());
    let mut decoded = Vec::new();

    let mut blocks = 0;
    while (reader.position() as usize) < encoded.len() {
        let chunk = fast_decompress(&mut reader)?;
        debug!(block = blocks, size = chunk.len(), "decompressed block");
        decoded.extend(chunk);
        blocks += 1;
    }
    write_output(output, &decoded)?;

    info!(blocks, decoded = decoded.len(), "decompressed blocks");
    Ok(())
}
