use thiserror::Error;

/// Errors raised by every decoder in this crate.
///
/// A decode either returns the complete output or one of these; there is no
/// partial result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),
    #[error("Truncated input: {0}")]
    Truncated(String),
    #[error("Boundary mismatch: {0}")]
    BoundaryMismatch(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Malformed data: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(String),
}

pub type Status = Result<(), CodecError>;

pub type CodecResult<T> = Result<T, CodecError>;

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            CodecError::Truncated(err.to_string())
        } else {
            CodecError::Io(err.to_string())
        }
    }
}

pub fn truncated(msg: impl Into<String>) -> CodecError {
    CodecError::Truncated(msg.into())
}

pub fn invalid_parameter(msg: impl Into<String>) -> CodecError {
    CodecError::InvalidParameter(msg.into())
}
