/// Attribute Descriptor Record
pub mod adr;
/// Attribute Entry Descriptor Record (g/r and z entries)
pub mod aedr;
/// Compressed CDF Record
pub mod ccr;
/// CDF Descriptor Record
pub mod cdr;
/// Module to handle record chains.
pub mod collection;
/// Compressed Parameters Record
pub mod cpr;
/// Compressed Variable Values Record
pub mod cvvr;
/// Global Descriptor Record
pub mod gdr;
/// Sparseness Parameters Record
pub mod spr;
/// Unused Internal Record
pub mod uir;
/// Variable Descriptor Record (r and z variables)
pub mod vdr;
/// Variable Values Record
pub mod vvr;
/// Variable Index Record
pub mod vxr;

use std::io;

use crate::decode::{decode_offset, Decodable, Decoder};
use crate::encode::{Encodable, Encoder};
use crate::error::{CdfError, Result};
use crate::repr::FileVariant;
use crate::types::{CdfInt4, CdfInt8};

/// A CDF file contains 2 or more internal records that organize the contents
/// of the CDF. These are their type codes.
///
/// The MD5 checksum is not an internal record. It is optional and occupies
/// 16 bytes at the end of the CDF file, past the offset recorded in the
/// GDR `eof` field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum RecordKind {
    /// Unused Internal Record
    Uir = -1,
    /// CDF Descriptor Record. All CDF files must contain this record.
    Cdr = 1,
    /// Global Descriptor Record. All CDF files must contain this record.
    Gdr = 2,
    /// rVariable Descriptor Record
    RVdr = 3,
    /// Attribute Descriptor Record
    Adr = 4,
    /// Attribute g/rEntry Descriptor Record
    AgrEdr = 5,
    /// Variable Index Record
    Vxr = 6,
    /// Variable Values Record
    Vvr = 7,
    /// zVariable Descriptor Record
    ZVdr = 8,
    /// Attribute zEntry Descriptor Record
    AzEdr = 9,
    /// Compressed CDF Record
    Ccr = 10,
    /// Compressed Parameters Record
    Cpr = 11,
    /// Sparseness Parameters Record
    Spr = 12,
    /// Compressed Variable Values Record
    Cvvr = 13,
}

impl TryFrom<i32> for RecordKind {
    type Error = CdfError;
    fn try_from(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(RecordKind::Uir),
            1 => Ok(RecordKind::Cdr),
            2 => Ok(RecordKind::Gdr),
            3 => Ok(RecordKind::RVdr),
            4 => Ok(RecordKind::Adr),
            5 => Ok(RecordKind::AgrEdr),
            6 => Ok(RecordKind::Vxr),
            7 => Ok(RecordKind::Vvr),
            8 => Ok(RecordKind::ZVdr),
            9 => Ok(RecordKind::AzEdr),
            10 => Ok(RecordKind::Ccr),
            11 => Ok(RecordKind::Cpr),
            12 => Ok(RecordKind::Spr),
            13 => Ok(RecordKind::Cvvr),
            v => Err(CdfError::Malformed(format!("unknown record type code {v}"))),
        }
    }
}

/// Trait implemented by every internal record: decode one record starting at
/// the decoder's current position, which must be the record's first byte.
pub trait ParseRecord: Sized {
    /// Parse the record at the current position.
    /// # Errors
    /// Raises [`CdfError::Malformed`] when the record header is inconsistent
    /// with the record kind's layout.
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek;
}

/// Byte length of the `{size, type}` record header for a file variant.
pub const fn header_len(variant: FileVariant) -> usize {
    match variant {
        FileVariant::LargeFile => 12,
        FileVariant::Classic => 8,
    }
}

/// Byte width of record sizes and file offsets for a file variant.
pub const fn offset_width(variant: FileVariant) -> usize {
    match variant {
        FileVariant::LargeFile => 8,
        FileVariant::Classic => 4,
    }
}

/// Read a record header `{size, type}` at the current position.
pub fn read_header<R>(decoder: &mut Decoder<R>) -> Result<(i64, RecordKind)>
where
    R: io::Read + io::Seek,
{
    let record_size = i64::from(decode_offset(decoder)?);
    let record_type = i32::from(CdfInt4::decode_be(decoder)?);
    let kind = RecordKind::try_from(record_type)?;
    if record_size < header_len(decoder.context.variant) as i64 {
        return Err(CdfError::Malformed(format!(
            "{kind:?} record declares {record_size} bytes, less than its own header"
        )));
    }
    Ok((record_size, kind))
}

/// Read a record header and reject any record kind but `expected`.
pub fn expect_header<R>(decoder: &mut Decoder<R>, expected: RecordKind) -> Result<i64>
where
    R: io::Read + io::Seek,
{
    let (record_size, kind) = read_header(decoder)?;
    if kind != expected {
        return Err(CdfError::Malformed(format!(
            "expected a {expected:?} record, found {kind:?}"
        )));
    }
    Ok(record_size)
}

/// Reject a fixed-layout record whose declared size disagrees with its kind.
pub fn expect_size(kind: RecordKind, declared: i64, expected: i64) -> Result<()> {
    if declared != expected {
        return Err(CdfError::Malformed(format!(
            "{kind:?} record declares {declared} bytes, layout requires {expected}"
        )));
    }
    Ok(())
}

/// Look at the record kind stored at `offset` without consuming the record.
/// Used while walking VXR trees, whose entries may target a VVR, a CVVR, or
/// a child VXR.
pub fn kind_at<R>(decoder: &mut Decoder<R>, offset: u64) -> Result<RecordKind>
where
    R: io::Read + io::Seek,
{
    decoder.seek_to(offset)?;
    let (_, kind) = read_header(decoder)?;
    decoder.seek_to(offset)?;
    Ok(kind)
}

/// Emit a record header.
pub fn emit_header(encoder: &mut Encoder, record_size: i64, kind: RecordKind) {
    encoder.put_offset(record_size);
    CdfInt4::from(kind as i32).encode_be(encoder);
}

/// Decode an offset field where zero means "no record".
pub fn decode_link<R>(decoder: &mut Decoder<R>) -> Result<Option<CdfInt8>>
where
    R: io::Read + io::Seek,
{
    decode_offset(decoder).map(|v| (*v != 0).then_some(v))
}

/// Emit an offset field where `None` becomes zero.
pub fn emit_link(encoder: &mut Encoder, link: Option<CdfInt8>) {
    encoder.put_offset(link.map_or(0, i64::from));
}

/// Read an i32 field that the format reserves at a fixed value.
pub fn expect_reserved<R>(decoder: &mut Decoder<R>, kind: RecordKind, expected: i32) -> Result<CdfInt4>
where
    R: io::Read + io::Seek,
{
    let value = CdfInt4::decode_be(decoder)?;
    if *value != expected {
        return Err(CdfError::Malformed(format!(
            "reserved field in {kind:?} holds {}, expected {expected}",
            *value
        )));
    }
    Ok(value)
}
