//! Sample encodings and raw buffer decoding.
//!
//! Pixel payloads arrive as undecoded little-endian bytes tagged with a
//! TIFF sample-format code and bit depth. [`SampleKind`] is the
//! exhaustive tagged union over the encodings the engine understands;
//! [`SampleBuffer`] holds the decoded values. Unrecognized encodings
//! degrade to unsigned 8-bit so the per-tile pipeline stays total.

use thiserror::Error;
use tracing::warn;

/// An unrecognized sample-format / bit-depth pair.
///
/// Tile-scoped and non-fatal: decoding falls back to [`SampleKind::U8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognized sample encoding: format code {format}, {bits} bits per sample")]
pub struct SampleFormatError {
    pub format: u16,
    pub bits: u16,
}

/// The numeric encodings a source tile may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl SampleKind {
    /// Resolve a TIFF sample-format code and bit depth into an encoding.
    pub fn from_codes(format: u16, bits: u16) -> Result<Self, SampleFormatError> {
        match (format, bits) {
            (1, 8) => Ok(SampleKind::U8),
            (1, 16) => Ok(SampleKind::U16),
            (1, 32) => Ok(SampleKind::U32),
            (2, 8) => Ok(SampleKind::I8),
            (2, 16) => Ok(SampleKind::I16),
            (2, 32) => Ok(SampleKind::I32),
            (3, 32) => Ok(SampleKind::F32),
            (3, 64) => Ok(SampleKind::F64),
            _ => Err(SampleFormatError { format, bits }),
        }
    }

    /// Display range assumed for the encoding when neither explicit
    /// min/max nor raster statistics are available.
    ///
    /// Integer encodings use their full range. 32-bit float uses an
    /// approximate epsilon-to-max range. 64-bit float deliberately keeps
    /// the 0..255 default the unlisted encodings fall through to.
    pub fn display_range(self) -> (f64, f64) {
        match self {
            SampleKind::U8 => (0.0, 255.0),
            SampleKind::U16 => (0.0, 65_535.0),
            SampleKind::U32 => (0.0, 4_294_967_295.0),
            SampleKind::I8 => (-128.0, 127.0),
            SampleKind::I16 => (-32_768.0, 32_767.0),
            SampleKind::I32 => (-2_147_483_648.0, 2_147_483_647.0),
            SampleKind::F32 => (1.2e-38, 3.4e38),
            SampleKind::F64 => (0.0, 255.0),
        }
    }
}

/// A decoded tile payload.
#[derive(Debug, Clone)]
pub enum SampleBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl SampleBuffer {
    /// Decode raw bytes according to the tagged encoding.
    ///
    /// Unrecognized format/bit-depth pairs are logged and decoded as
    /// unsigned 8-bit instead of failing the tile. Trailing bytes that
    /// do not fill a whole sample are dropped.
    pub fn decode(format: u16, bits: u16, bytes: &[u8]) -> Self {
        let kind = match SampleKind::from_codes(format, bits) {
            Ok(kind) => kind,
            Err(error) => {
                warn!(%error, "falling back to unsigned 8-bit decode");
                SampleKind::U8
            }
        };

        match kind {
            SampleKind::U8 => SampleBuffer::U8(bytes.to_vec()),
            SampleKind::U16 => SampleBuffer::U16(decode_words(bytes, u16::from_le_bytes)),
            SampleKind::U32 => SampleBuffer::U32(decode_words(bytes, u32::from_le_bytes)),
            SampleKind::I8 => SampleBuffer::I8(bytes.iter().map(|&b| b as i8).collect()),
            SampleKind::I16 => SampleBuffer::I16(decode_words(bytes, i16::from_le_bytes)),
            SampleKind::I32 => SampleBuffer::I32(decode_words(bytes, i32::from_le_bytes)),
            SampleKind::F32 => SampleBuffer::F32(decode_words(bytes, f32::from_le_bytes)),
            SampleKind::F64 => SampleBuffer::F64(decode_words(bytes, f64::from_le_bytes)),
        }
    }

    /// The encoding this buffer holds.
    pub fn kind(&self) -> SampleKind {
        match self {
            SampleBuffer::U8(_) => SampleKind::U8,
            SampleBuffer::U16(_) => SampleKind::U16,
            SampleBuffer::U32(_) => SampleKind::U32,
            SampleBuffer::I8(_) => SampleKind::I8,
            SampleBuffer::I16(_) => SampleKind::I16,
            SampleBuffer::I32(_) => SampleKind::I32,
            SampleBuffer::F32(_) => SampleKind::F32,
            SampleBuffer::F64(_) => SampleKind::F64,
        }
    }

    /// Number of decoded samples.
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::U8(v) => v.len(),
            SampleBuffer::U16(v) => v.len(),
            SampleBuffer::U32(v) => v.len(),
            SampleBuffer::I8(v) => v.len(),
            SampleBuffer::I16(v) => v.len(),
            SampleBuffer::I32(v) => v.len(),
            SampleBuffer::F32(v) => v.len(),
            SampleBuffer::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index` widened to `f64`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            SampleBuffer::U8(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::U16(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::U32(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::I8(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::I16(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::I32(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::F32(v) => v.get(index).map(|&s| s as f64),
            SampleBuffer::F64(v) => v.get(index).copied(),
        }
    }
}

fn decode_words<T, const N: usize>(bytes: &[u8], convert: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut word = [0u8; N];
            word.copy_from_slice(chunk);
            convert(word)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_codes_covers_all_known_encodings() {
        assert_eq!(SampleKind::from_codes(1, 8), Ok(SampleKind::U8));
        assert_eq!(SampleKind::from_codes(1, 16), Ok(SampleKind::U16));
        assert_eq!(SampleKind::from_codes(1, 32), Ok(SampleKind::U32));
        assert_eq!(SampleKind::from_codes(2, 8), Ok(SampleKind::I8));
        assert_eq!(SampleKind::from_codes(2, 16), Ok(SampleKind::I16));
        assert_eq!(SampleKind::from_codes(2, 32), Ok(SampleKind::I32));
        assert_eq!(SampleKind::from_codes(3, 32), Ok(SampleKind::F32));
        assert_eq!(SampleKind::from_codes(3, 64), Ok(SampleKind::F64));
    }

    #[test]
    fn test_from_codes_rejects_unknown_pairs() {
        let error = SampleKind::from_codes(3, 16).unwrap_err();
        assert_eq!(error, SampleFormatError { format: 3, bits: 16 });
        assert!(SampleKind::from_codes(4, 8).is_err());
    }

    #[test]
    fn test_decode_u16_little_endian() {
        let buffer = SampleBuffer::decode(1, 16, &[0x64, 0x00, 0xFF, 0x07]);
        assert_eq!(buffer.kind(), SampleKind::U16);
        assert_eq!(buffer.get(0), Some(100.0));
        assert_eq!(buffer.get(1), Some(2047.0));
        assert_eq!(buffer.get(2), None);
    }

    #[test]
    fn test_decode_signed_and_float() {
        let buffer = SampleBuffer::decode(2, 16, &(-5i16).to_le_bytes());
        assert_eq!(buffer.get(0), Some(-5.0));

        let buffer = SampleBuffer::decode(3, 32, &1.5f32.to_le_bytes());
        assert_eq!(buffer.get(0), Some(1.5));

        let buffer = SampleBuffer::decode(3, 64, &2.25f64.to_le_bytes());
        assert_eq!(buffer.get(0), Some(2.25));
    }

    #[test]
    fn test_unknown_encoding_degrades_to_u8() {
        let buffer = SampleBuffer::decode(9, 12, &[7, 8]);
        assert_eq!(buffer.kind(), SampleKind::U8);
        assert_eq!(buffer.get(0), Some(7.0));
        assert_eq!(buffer.get(1), Some(8.0));
    }

    #[test]
    fn test_trailing_partial_sample_is_dropped() {
        let buffer = SampleBuffer::decode(1, 32, &[1, 0, 0, 0, 9]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get(0), Some(1.0));
    }

    #[test]
    fn test_display_ranges_match_bit_widths() {
        assert_eq!(SampleKind::U16.display_range(), (0.0, 65_535.0));
        assert_eq!(SampleKind::I8.display_range(), (-128.0, 127.0));
        assert_eq!(SampleKind::F32.display_range(), (1.2e-38, 3.4e38));
        // f64 falls through to the 8-bit default range
        assert_eq!(SampleKind::F64.display_range(), (0.0, 255.0));
    }
}
