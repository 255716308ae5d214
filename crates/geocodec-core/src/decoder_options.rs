use crate::vertex_decoder::is_hardware_accelerated;

/// Settings shared by the decode entry points.
///
/// SIMD is requested by default and silently falls back to the scalar
/// decoder when the CPU lacks support; see [`DecoderOptions::effective_simd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    use_simd: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self { use_simd: true }
    }
}

impl DecoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that always take the scalar path.
    pub fn scalar() -> Self {
        Self { use_simd: false }
    }

    pub fn with_simd(mut self, use_simd: bool) -> Self {
        self.use_simd = use_simd;
        self
    }

    pub fn use_simd(&self) -> bool {
        self.use_simd
    }

    /// Whether a decode with these options will actually run vectorized.
    pub fn effective_simd(&self) -> bool {
        self.use_simd && is_hardware_accelerated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_request_simd() {
        let options = DecoderOptions::default();
        assert!(options.use_simd());
        assert_eq!(options.effective_simd(), is_hardware_accelerated());
    }

    #[test]
    fn test_scalar_never_uses_simd() {
        let options = DecoderOptions::scalar();
        assert!(!options.use_simd());
        assert!(!options.effective_simd());
        assert_eq!(DecoderOptions::new().with_simd(false), options);
    }
}
