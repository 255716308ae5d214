use std::path::PathBuf;

use geocodec_core::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),
}

pub type ToolResult<T> = Result<T, ToolError>;
