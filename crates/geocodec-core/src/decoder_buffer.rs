use crate::status::{truncated, CodecError};

/// Input cursor over an encoded buffer.
///
/// `DecoderBuffer` provides sequential, bounds-checked byte access. Every
/// read that would run past the end returns [`CodecError::Truncated`] and
/// leaves the position untouched.
///
/// # Example
///
/// ```
/// use geocodec_core::DecoderBuffer;
///
/// let data = [0xa0, 0x81, 0x01, 0x7f];
/// let mut buffer = DecoderBuffer::new(&data);
///
/// assert_eq!(buffer.decode_u8().unwrap(), 0xa0);
/// assert_eq!(buffer.decode_vbyte().unwrap(), 129);
/// assert_eq!(buffer.remaining_size(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DecoderBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DecoderBuffer<'a> {
    /// Creates a new `DecoderBuffer` from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current read position in bytes.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes remaining in the buffer.
    pub fn remaining_size(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns a slice of the remaining data without advancing.
    pub fn remaining_data(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn ensure(&self, size: usize) -> Result<(), CodecError> {
        if size > self.remaining_size() {
            return Err(truncated(format!(
                "Unexpected end of buffer: need {} bytes, have {}",
                size,
                self.remaining_size()
            )));
        }
        Ok(())
    }

    /// Decodes a single byte.
    pub fn decode_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Decodes and returns a slice of the specified size.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Truncated` if not enough bytes remaining.
    pub fn decode_slice(&mut self, size: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(size)?;
        let slice = &self.data[self.pos..self.pos + size];
        self.pos += size;
        Ok(slice)
    }

    /// Advances the position by `n` bytes without reading.
    pub fn advance(&mut self, n: usize) -> Result<(), CodecError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Decodes a vByte integer: 7 value bits per byte, high bit set while more
    /// bytes follow, least significant group first. At most 5 bytes are read.
    pub fn decode_vbyte(&mut self) -> Result<u32, CodecError> {
        let lead = self.decode_u8()? as u32;
        if lead < 128 {
            return Ok(lead);
        }

        let mut result = lead & 127;
        let mut shift = 7;
        for _ in 0..4 {
            let group = self.decode_u8()? as u32;
            result |= (group & 127) << shift;
            shift += 7;
            if group < 128 {
                break;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56];
        let mut buffer = DecoderBuffer::new(&data);
        assert_eq!(buffer.decode_u8().unwrap(), 0x01);
        assert_eq!(buffer.decode_slice(2).unwrap(), &[0x34, 0x12]);
        buffer.advance(1).unwrap();
        assert_eq!(buffer.remaining_data(), &[0x56]);
        assert_eq!(buffer.decode_u8().unwrap(), 0x56);
        assert_eq!(buffer.remaining_size(), 0);
        assert!(buffer.decode_u8().is_err());
    }

    #[test]
    fn test_failed_read_keeps_position() {
        let data = [1, 2, 3];
        let mut buffer = DecoderBuffer::new(&data);
        buffer.decode_u8().unwrap();
        assert!(matches!(buffer.decode_slice(3), Err(CodecError::Truncated(_))));
        assert!(buffer.advance(3).is_err());
        assert_eq!(buffer.position(), 1);
        assert_eq!(buffer.remaining_data(), &[2, 3]);
    }

    #[test]
    fn test_vbyte_golden() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00], 0),
            (&[0x7f], 127),
            (&[0x80, 0x01], 128),
            (&[0xac, 0x02], 300),
            (&[0xff, 0xff, 0xff, 0xff, 0x0f], u32::MAX),
        ];
        for (bytes, expected) in cases {
            let mut buffer = DecoderBuffer::new(bytes);
            assert_eq!(buffer.decode_vbyte().unwrap(), *expected);
            assert_eq!(buffer.remaining_size(), 0);
        }
    }

    #[test]
    fn test_vbyte_stops_after_five_bytes() {
        let data = [0xff, 0xff, 0xff, 0xff, 0xff, 0x42];
        let mut buffer = DecoderBuffer::new(&data);
        buffer.decode_vbyte().unwrap();
        assert_eq!(buffer.decode_u8().unwrap(), 0x42);
    }

    #[test]
    fn test_vbyte_truncated() {
        let data = [0x80];
        let mut buffer = DecoderBuffer::new(&data);
        assert!(buffer.decode_vbyte().is_err());
    }
}
