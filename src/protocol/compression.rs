//! Compressed envelope expansion
//!
//! Layout: `[255][u32 uncompressed length][LZ4 block]`.

use crate::protocol::constants::envelope::{HEADER_LEN, MAX_UNCOMPRESSED_LEN};
use crate::protocol::cursor::ByteCursor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompressionError {
    #[error("Envelope header truncated ({0} bytes)")]
    TruncatedHeader(usize),
    #[error("Declared length too large: {0} bytes (max {1})")]
    TooLarge(usize, usize),
    #[error("Malformed compressed payload: {0}")]
    Malformed(String),
    #[error("Length mismatch: declared {declared}, produced {produced}")]
    LengthMismatch { declared: usize, produced: usize },
}

/// Expand an envelope frame into its inner frame
///
/// The inner frame is exactly as long as the header declares.
pub fn decompress_envelope(frame: &[u8]) -> Result<Vec<u8>, DecompressionError> {
    if frame.len() < HEADER_LEN {
        return Err(DecompressionError::TruncatedHeader(frame.len()));
    }

    let mut cursor = ByteCursor::new(frame);
    cursor
        .skip(1)
        .and_then(|_| cursor.read_u32())
        .map_err(|_| DecompressionError::TruncatedHeader(frame.len()))
        .and_then(|declared| expand(&frame[HEADER_LEN..], declared as usize))
}

/// Expand a raw LZ4 block to `declared` bytes
pub fn expand(compressed: &[u8], declared: usize) -> Result<Vec<u8>, DecompressionError> {
    if declared > MAX_UNCOMPRESSED_LEN {
        return Err(DecompressionError::TooLarge(declared, MAX_UNCOMPRESSED_LEN));
    }

    let mut output = vec![0u8; declared];
    let produced = lz4_flex::block::decompress_into(compressed, &mut output)
        .map_err(|e| DecompressionError::Malformed(e.to_string()))?;

    if produced != declared {
        return Err(DecompressionError::LengthMismatch { declared, produced });
    }
    Ok(output)
}

#[cfg(test)]
pub(crate) fn build_envelope(inner: &[u8]) -> Vec<u8> {
    use crate::protocol::constants::opcode::COMPRESSED_ENVELOPE;
    use crate::protocol::cursor::FrameBuilder;

    FrameBuilder::new()
        .write_u8(COMPRESSED_ENVELOPE)
        .write_u32(inner.len() as u32)
        .write(&lz4_flex::block::compress(inner))
        .build()
}
