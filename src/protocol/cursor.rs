//! Bounds-checked byte cursor and frame builder
//!
//! Every field on the game wire is little-endian. Strings are raw bytes
//! terminated by a single `0x00`.

/// Errors raised by [`ByteCursor`] reads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("Out of bounds: {width} byte(s) at offset {offset} (length {len})")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },
}

/// Sequential reader over an untrusted byte buffer
///
/// A failed read leaves the offset untouched.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read n bytes
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        let end = self
            .position
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(CursorError::OutOfBounds {
                offset: self.position,
                width: n,
                len: self.data.len(),
            })?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CursorError> {
        self.read_array().map(i8::from_le_bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16, CursorError> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, CursorError> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Read a null-terminated string, decoding the bytes as UTF-8
    ///
    /// Invalid sequences are replaced rather than rejected; a missing
    /// terminator is an out-of-bounds read.
    pub fn read_string(&mut self) -> Result<String, CursorError> {
        let rest = &self.data[self.position..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(CursorError::OutOfBounds {
                offset: self.position,
                width: rest.len() + 1,
                len: self.data.len(),
            });
        };
        let text = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.position += nul + 1;
        Ok(text)
    }

    /// Advance without decoding
    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        self.read(n).map(|_| ())
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Check if there are more bytes to read
    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Frame builder for constructing outbound messages
pub struct FrameBuilder {
    buffer: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(16),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Write raw bytes
    pub fn write(mut self, data: &[u8]) -> Self {
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn write_u8(mut self, value: u8) -> Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16(mut self, value: u16) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(mut self, value: u32) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i32(mut self, value: i32) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f64(mut self, value: f64) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Write a UTF-8 string followed by a `0x00` terminator
    pub fn write_string(mut self, value: &str) -> Self {
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0);
        self
    }

    /// Get the built frame
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
