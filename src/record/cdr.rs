#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{decode_offset, Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::{CdfError, Result},
    record::{self, RecordKind},
    repr::{CdfEncoding, CdfVersion, Majority},
    types::{CdfInt4, CdfInt8, CdfString},
};
use std::io;

/// File offset of the CDR, immediately after the two magic numbers.
pub const CDR_OFFSET: u64 = 8;

/// Byte length of the copyright field.
pub const COPYRIGHT_LEN: usize = 256;

const ROW_MAJOR_BIT: i32 = 0x1;
const SINGLE_FILE_BIT: i32 = 0x2;
const CHECKSUM_BIT: i32 = 0x4;
const MD5_BIT: i32 = 0x8;
const COMPRESSED_BIT: i32 = 0x10;

/// Flags pertaining to this CDF file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CdrFlags {
    /// Storage order of multi-dimensional records.
    pub majority: Majority,
    /// Whether this is a single-file CDF, as opposed to multi-file CDFs.
    pub single_file: bool,
    /// Whether this CDF file carries a checksum trailer.
    pub has_checksum: bool,
    /// Whether the checksum is an MD5 checksum.
    pub md5_checksum: bool,
    /// Whether everything after the CDR is wrapped in one compressed record.
    pub compressed: bool,
}

impl CdrFlags {
    /// Decode the CDR flag word.
    pub fn from_bits(bits: i32) -> Self {
        CdrFlags {
            majority: if bits & ROW_MAJOR_BIT != 0 {
                Majority::Row
            } else {
                Majority::Column
            },
            single_file: bits & SINGLE_FILE_BIT != 0,
            has_checksum: bits & CHECKSUM_BIT != 0,
            md5_checksum: bits & MD5_BIT != 0,
            compressed: bits & COMPRESSED_BIT != 0,
        }
    }

    /// Encode the CDR flag word.
    pub fn to_bits(self) -> i32 {
        let mut bits = 0;
        if self.majority == Majority::Row {
            bits |= ROW_MAJOR_BIT;
        }
        if self.single_file {
            bits |= SINGLE_FILE_BIT;
        }
        if self.has_checksum {
            bits |= CHECKSUM_BIT;
        }
        if self.md5_checksum {
            bits |= MD5_BIT;
        }
        if self.compressed {
            bits |= COMPRESSED_BIT;
        }
        bits
    }
}

/// The CDF Descriptor Record is present in all CDF files at a file offset of
/// 8 bytes and contains general information about the CDF.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct CdfDescriptorRecord {
    /// The file offset of the global descriptor record.
    pub gdr_offset: CdfInt8,
    /// The version of the CDF library that created this file.
    pub version: CdfVersion,
    /// The encoding for data stored inside this CDF.
    pub encoding: CdfEncoding,
    /// Flags holding information on different options for this file.
    pub flags: CdrFlags,
    /// Identifier.
    pub identifier: CdfInt4,
    /// The copyright string.
    pub copyright: CdfString,
}

impl CdfDescriptorRecord {
    /// Encoded size of a CDR in the large-file variant.
    pub const fn encoded_size() -> i64 {
        12 + 8 + 9 * 4 + COPYRIGHT_LEN as i64
    }

    /// Emit this record at the encoder's current position, returning its
    /// offset.
    pub fn emit(&self, encoder: &mut Encoder) -> Result<u64> {
        let offset = encoder.offset();
        record::emit_header(encoder, Self::encoded_size(), RecordKind::Cdr);
        encoder.put_offset(*self.gdr_offset);
        CdfInt4::from(i32::from(self.version.major)).encode_be(encoder);
        CdfInt4::from(i32::from(self.version.minor)).encode_be(encoder);
        CdfInt4::from(self.encoding as i32).encode_be(encoder);
        CdfInt4::from(self.flags.to_bits()).encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(i32::from(self.version.patch)).encode_be(encoder);
        self.identifier.encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        self.copyright.encode_fixed(encoder, COPYRIGHT_LEN)?;
        Ok(offset)
    }
}

impl record::ParseRecord for CdfDescriptorRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Cdr)?;
        let expected = record::header_len(decoder.context.variant) as i64
            + record::offset_width(decoder.context.variant) as i64
            + 9 * 4
            + COPYRIGHT_LEN as i64;
        record::expect_size(RecordKind::Cdr, record_size, expected)?;

        let gdr_offset = decode_offset(decoder)?;
        let version: i32 = CdfInt4::decode_be(decoder)?.into();
        let release: i32 = CdfInt4::decode_be(decoder)?.into();
        let encoding: CdfEncoding = i32::from(CdfInt4::decode_be(decoder)?).try_into()?;

        // Make the encoding available to every data payload that follows.
        decoder.context.set_encoding(encoding)?;

        let flags = CdrFlags::from_bits(i32::from(CdfInt4::decode_be(decoder)?));
        decoder.context.majority = Some(flags.majority);

        record::expect_reserved(decoder, RecordKind::Cdr, 0)?;
        record::expect_reserved(decoder, RecordKind::Cdr, 0)?;

        let increment: i32 = CdfInt4::decode_be(decoder)?.into();
        let identifier = CdfInt4::decode_be(decoder)?;
        let _rfu_e = CdfInt4::decode_be(decoder)?;

        let cdf_version = CdfVersion::new(
            u16::try_from(version)?,
            u16::try_from(release)?,
            u16::try_from(increment)?,
        );
        if cdf_version.major < 3 {
            return Err(CdfError::Unsupported(format!(
                "CDF version {cdf_version}; only version 3 files are supported"
            )));
        }

        let copyright = CdfString::decode_fixed(decoder, COPYRIGHT_LEN)?;

        Ok(CdfDescriptorRecord {
            gdr_offset,
            version: cdf_version,
            encoding,
            flags,
            identifier,
            copyright,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    fn sample() -> CdfDescriptorRecord {
        CdfDescriptorRecord {
            gdr_offset: CdfInt8::from(320),
            version: CdfVersion::new(3, 8, 1),
            encoding: CdfEncoding::IbmPc,
            flags: CdrFlags {
                majority: Majority::Row,
                single_file: true,
                has_checksum: true,
                md5_checksum: true,
                compressed: false,
            },
            identifier: CdfInt4::from(-1),
            copyright: CdfString::from("Common Data Format (CDF)"),
        }
    }

    #[test]
    fn cdr_round_trip() -> Result<()> {
        let mut encoder = Encoder::new(Endian::Little);
        sample().emit(&mut encoder)?;
        assert_eq!(encoder.sink.len() as i64, CdfDescriptorRecord::encoded_size());

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let cdr = CdfDescriptorRecord::parse(&mut decoder)?;
        assert_eq!(*cdr.gdr_offset, 320);
        assert_eq!(cdr.version, CdfVersion::new(3, 8, 1));
        assert_eq!(cdr.encoding, CdfEncoding::IbmPc);
        assert_eq!(cdr.flags, sample().flags);
        assert_eq!(cdr.copyright.as_ref(), "Common Data Format (CDF)");
        assert_eq!(decoder.context.endianness()?, Endian::Little);
        assert_eq!(decoder.context.majority()?, Majority::Row);
        Ok(())
    }

    #[test]
    fn version_2_is_rejected() -> Result<()> {
        let mut encoder = Encoder::new(Endian::Big);
        let mut cdr = sample();
        cdr.version = CdfVersion::new(2, 7, 2);
        cdr.emit(&mut encoder)?;

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        assert!(matches!(
            CdfDescriptorRecord::parse(&mut decoder),
            Err(CdfError::Unsupported(_))
        ));
        Ok(())
    }

    #[test]
    fn wrong_record_type_is_rejected() {
        let mut encoder = Encoder::new(Endian::Big);
        record::emit_header(&mut encoder, CdfDescriptorRecord::encoded_size(), RecordKind::Gdr);
        encoder.put_bytes(&[0u8; 300]);
        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        assert!(matches!(
            CdfDescriptorRecord::parse(&mut decoder),
            Err(CdfError::Malformed(_))
        ));
    }

    #[test]
    fn flag_bits_round_trip() {
        let flags = CdrFlags {
            majority: Majority::Column,
            single_file: true,
            has_checksum: false,
            md5_checksum: false,
            compressed: true,
        };
        assert_eq!(CdrFlags::from_bits(flags.to_bits()), flags);
    }
}
