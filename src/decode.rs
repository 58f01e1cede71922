use std::io::{self, SeekFrom};

use crate::error::{CdfError, Result};
use crate::repr::{CdfEncoding, Endian, FileVariant, Majority};
use crate::types::{CdfInt4, CdfInt8};

/// Trait for decoding a value from a CDF image.
///
/// Record control fields are always big-endian; data payloads follow the
/// endianness recorded in the decoding context.
pub trait Decodable: Sized {
    /// Decode a value using big-endian byte order.
    /// # Errors
    /// Returns a [`CdfError`] if the decoding fails for any reason.
    fn decode_be<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek;

    /// Decode a value using little-endian byte order.
    /// # Errors
    /// Returns a [`CdfError`] if the decoding fails for any reason.
    fn decode_le<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek;

    /// Decode a sequential collection of this type into a vector using
    /// big-endian byte order.
    fn decode_vec_be<R>(decoder: &mut Decoder<R>, count: usize) -> Result<Vec<Self>>
    where
        R: io::Read + io::Seek,
    {
        let mut result = Vec::with_capacity(count);
        for _ in 0..count {
            result.push(Self::decode_be(decoder)?);
        }
        Ok(result)
    }
}

/// Struct containing the reader and decoding configuration.
pub struct Decoder<R>
where
    R: io::Read + io::Seek,
{
    /// The source of file bytes, addressed by absolute offset.
    pub reader: R,
    /// Context keeps track of file-wide values that records depend on for
    /// their decoding.
    pub context: DecodeContext,
}

impl<R> Decoder<R>
where
    R: io::Read + io::Seek,
{
    /// Create a new decoder over a seekable byte source.
    pub fn new(reader: R) -> Self {
        Decoder {
            reader,
            context: DecodeContext::default(),
        }
    }

    /// Position the decoder at an absolute file offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<u64> {
        Ok(self.reader.seek(SeekFrom::Start(offset))?)
    }

    /// Current absolute file offset.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    /// Read exactly `count` bytes at the current position.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; count];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

/// File-wide facts read from the CDR/GDR that later records need for their
/// decoding. Immutable once the open pass completes.
#[derive(Default, Clone)]
pub struct DecodeContext {
    /// The data encoding of the file, from the CDR.
    pub encoding: Option<CdfEncoding>,
    /// The byte order of data values, derived from the encoding.
    pub endianness: Option<Endian>,
    /// Offset and record-size width, derived from the first magic number.
    pub variant: FileVariant,
    /// Row- or column-major record storage, from the CDR flags.
    pub majority: Option<Majority>,
    /// rVariable dimension sizes, from the GDR. rVDRs inherit these.
    pub r_dim_sizes: Option<Vec<i32>>,
}

impl DecodeContext {
    /// Record the data encoding and its derived byte order.
    pub fn set_encoding(&mut self, encoding: CdfEncoding) -> Result<()> {
        self.endianness = Some(encoding.endianness()?);
        self.encoding = Some(encoding);
        Ok(())
    }

    /// The data encoding of the file.
    /// # Errors
    /// Raises [`CdfError::Malformed`] if the CDR has not been decoded yet.
    pub fn encoding(&self) -> Result<CdfEncoding> {
        self.encoding
            .ok_or_else(|| CdfError::Malformed("no encoding in decoding context".to_string()))
    }

    /// The byte order of data values in the file.
    /// # Errors
    /// Raises [`CdfError::Malformed`] if the CDR has not been decoded yet.
    pub fn endianness(&self) -> Result<Endian> {
        self.endianness
            .ok_or_else(|| CdfError::Malformed("no endianness in decoding context".to_string()))
    }

    /// The record storage majority of the file.
    /// # Errors
    /// Raises [`CdfError::Malformed`] if the CDR has not been decoded yet.
    pub fn majority(&self) -> Result<Majority> {
        self.majority
            .ok_or_else(|| CdfError::Malformed("no majority in decoding context".to_string()))
    }

    /// The file-wide rVariable dimension sizes.
    /// # Errors
    /// Raises [`CdfError::Malformed`] if the GDR has not been decoded yet.
    pub fn r_dim_sizes(&self) -> Result<&[i32]> {
        self.r_dim_sizes
            .as_deref()
            .ok_or_else(|| CdfError::Malformed("no rVariable dimensions in decoding context".to_string()))
    }
}

/// Decode a record size or file offset at the width of the file variant.
/// The classic variant stores these as 4-byte signed integers; the v3
/// large-file variant uses 8 bytes. Either way the value is widened to
/// [`CdfInt8`].
pub fn decode_offset<R>(decoder: &mut Decoder<R>) -> Result<CdfInt8>
where
    R: io::Read + io::Seek,
{
    match decoder.context.variant {
        FileVariant::LargeFile => CdfInt8::decode_be(decoder),
        FileVariant::Classic => {
            let narrow: i32 = CdfInt4::decode_be(decoder)?.into();
            Ok(CdfInt8::from(i64::from(narrow)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn offset_width_follows_variant() -> Result<()> {
        let bytes = 0x0102_0304_0506_0708i64.to_be_bytes();
        let mut decoder = Decoder::new(Cursor::new(bytes.as_slice()));
        decoder.context.variant = FileVariant::LargeFile;
        assert_eq!(i64::from(decode_offset(&mut decoder)?), 0x0102_0304_0506_0708);

        let mut decoder = Decoder::new(Cursor::new(bytes.as_slice()));
        decoder.context.variant = FileVariant::Classic;
        assert_eq!(i64::from(decode_offset(&mut decoder)?), 0x0102_0304);
        Ok(())
    }

    #[test]
    fn context_getters_require_cdr() {
        let context = DecodeContext::default();
        assert!(context.encoding().is_err());
        assert!(context.endianness().is_err());
        assert!(context.majority().is_err());
    }
}
