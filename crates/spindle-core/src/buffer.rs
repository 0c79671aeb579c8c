//! Binary buffer decoding.
//!
//! Position and speed buffers travel as raw bytes, four bytes per sample,
//! native byte order on both ends of the wire.

/// Decode error for a raw sample buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Byte length is not a whole number of 4-byte samples. A short tail
    /// means the transfer is corrupt; samples are never silently dropped.
    #[error("buffer length {len} is not a multiple of 4")]
    Misaligned { len: usize },
}

/// Decode a raw transfer into f32 samples, bit-exact.
pub fn decode_f32_buffer(bytes: &[u8]) -> Result<Vec<f32>, BufferError> {
    if bytes.len() % 4 != 0 {
        return Err(BufferError::Misaligned { len: bytes.len() });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
