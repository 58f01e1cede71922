#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::{CdfError, Result},
    record::{self, RecordKind},
    types::CdfInt4,
};
use std::{fmt, io};

/// The compression methods a CDF file may declare. Only GZIP payloads can be
/// decompressed by this library; the other kinds parse but reads of their
/// data fail.
#[repr(i32)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdfCompressionKind {
    /// No compression
    None = 0,
    /// Run-length encoding
    Rle = 1,
    /// Huffman coding
    Huff = 2,
    /// Adaptive Huffman coding
    Ahuff = 3,
    /// GZIP compression
    Gzip = 5,
}

impl fmt::Display for CdfCompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Rle => write!(f, "RLE"),
            Self::Huff => write!(f, "HUFF"),
            Self::Ahuff => write!(f, "AHUFF"),
            Self::Gzip => write!(f, "GZIP"),
        }
    }
}

impl TryFrom<i32> for CdfCompressionKind {
    type Error = CdfError;
    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Rle),
            2 => Ok(Self::Huff),
            3 => Ok(Self::Ahuff),
            5 => Ok(Self::Gzip),
            v => Err(CdfError::Unsupported(format!("compression code {v}"))),
        }
    }
}

/// A Compressed Parameters Record carries the compression method and its
/// parameters. It is pointed to by the CCR for whole-file compression, or by
/// a VDR for per-variable compression. For GZIP the single parameter is the
/// level.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct CompressedParametersRecord {
    /// The compression method.
    pub compression: CdfCompressionKind,
    /// Method parameters; the GZIP level for GZIP.
    pub parameters: Vec<i32>,
}

impl CompressedParametersRecord {
    /// A GZIP parameters record at the given level.
    pub fn gzip(level: u32) -> Self {
        CompressedParametersRecord {
            compression: CdfCompressionKind::Gzip,
            parameters: vec![level as i32],
        }
    }

    /// The GZIP level, when this record describes GZIP compression.
    /// # Errors
    /// Raises [`CdfError::Unsupported`] for every other method.
    pub fn gzip_level(&self) -> Result<u32> {
        if self.compression != CdfCompressionKind::Gzip {
            return Err(CdfError::Unsupported(format!(
                "{} compressed data",
                self.compression
            )));
        }
        Ok(self.parameters.first().map_or(6, |lvl| *lvl as u32))
    }

    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 3 * 4 + 4 * self.parameters.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> u64 {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Cpr);
        CdfInt4::from(self.compression as i32).encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(self.parameters.len() as i32).encode_be(encoder);
        for parameter in &self.parameters {
            CdfInt4::from(*parameter).encode_be(encoder);
        }
        offset
    }
}

impl record::ParseRecord for CompressedParametersRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Cpr)?;
        let compression = CdfCompressionKind::try_from(i32::from(CdfInt4::decode_be(decoder)?))?;
        record::expect_reserved(decoder, RecordKind::Cpr, 0)?;
        let count = usize::try_from(*CdfInt4::decode_be(decoder)?)?;

        let variant = decoder.context.variant;
        let expected = record::header_len(variant) as i64 + 3 * 4 + 4 * count as i64;
        record::expect_size(RecordKind::Cpr, record_size, expected)?;

        let parameters = CdfInt4::decode_vec_be(decoder, count)?
            .into_iter()
            .map(i32::from)
            .collect();

        Ok(Self {
            compression,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    #[test]
    fn cpr_round_trip() -> Result<()> {
        let cpr = CompressedParametersRecord::gzip(6);
        let mut encoder = Encoder::new(Endian::Big);
        cpr.emit(&mut encoder);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = CompressedParametersRecord::parse(&mut decoder)?;
        assert_eq!(back.compression, CdfCompressionKind::Gzip);
        assert_eq!(back.gzip_level()?, 6);
        Ok(())
    }

    #[test]
    fn non_gzip_methods_parse_but_cannot_inflate() -> Result<()> {
        let cpr = CompressedParametersRecord {
            compression: CdfCompressionKind::Huff,
            parameters: vec![0],
        };
        let mut encoder = Encoder::new(Endian::Big);
        cpr.emit(&mut encoder);
        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = CompressedParametersRecord::parse(&mut decoder)?;
        assert!(matches!(back.gzip_level(), Err(CdfError::Unsupported(_))));
        Ok(())
    }
}
