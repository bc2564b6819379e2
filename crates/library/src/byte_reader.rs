//! Bounds-checked little-endian cursor over a byte slice.
//!
//! Used to decode the audio map and sector footers. All multi-byte integers
//! are little-endian (the device's native order).

/// A read ran past the end of the underlying slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("read of {width} bytes at offset {offset} exceeds {len}-byte region")]
pub struct ByteReaderError {
    /// Cursor position when the read was attempted.
    pub offset: usize,
    /// Width of the requested field in bytes.
    pub width: usize,
    /// Length of the region.
    pub len: usize,
}

/// Forward-only cursor over an immutable byte region.
///
/// A failed read leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Cursor over `bytes` starting at `offset`.
    #[must_use]
    pub fn new(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    /// Current cursor position.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left between the cursor and the end of the region.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Advance by `n` bytes without reading.
    pub fn skip(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n);
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, ByteReaderError> {
        self.take::<1>().map(u8::from_le_bytes)
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, ByteReaderError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, ByteReaderError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const W: usize>(&mut self) -> Result<[u8; W], ByteReaderError> {
        self.take::<W>()
    }

    fn take<const W: usize>(&mut self) -> Result<[u8; W], ByteReaderError> {
        let err = ByteReaderError { offset: self.offset, width: W, len: self.bytes.len() };
        let end = self.offset.checked_add(W).ok_or(err)?;
        let field: [u8; W] = self
            .bytes
            .get(self.offset..end)
            .and_then(|s| s.try_into().ok())
            .ok_or(err)?;
        self.offset = end;
        Ok(field)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields_in_sequence() {
        let bytes = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut r = ByteReader::new(&bytes, 0);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.offset(), 7);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn starts_at_given_offset() {
        let bytes = [0xFF, 0xFF, 0x2A, 0x00];
        let mut r = ByteReader::new(&bytes, 2);
        assert_eq!(r.read_u16().unwrap(), 42);
    }

    #[test]
    fn skip_moves_without_reading() {
        let bytes = [0, 0, 0, 9];
        let mut r = ByteReader::new(&bytes, 0);
        r.skip(3);
        assert_eq!(r.read_u8().unwrap(), 9);
    }

    #[test]
    fn short_read_fails_and_keeps_cursor() {
        let bytes = [1, 2, 3];
        let mut r = ByteReader::new(&bytes, 1);
        let err = r.read_u32().unwrap_err();
        assert_eq!(err, ByteReaderError { offset: 1, width: 4, len: 3 });
        assert_eq!(r.offset(), 1);
        assert_eq!(r.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn skip_past_end_then_read_fails() {
        let bytes = [0u8; 4];
        let mut r = ByteReader::new(&bytes, 0);
        r.skip(usize::MAX);
        assert!(r.read_u8().is_err());
        assert_eq!(r.remaining(), 0);
    }
}
