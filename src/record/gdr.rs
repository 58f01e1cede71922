#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::Result,
    record::{self, RecordKind},
    types::{CdfInt4, CdfInt8},
};
use std::io;

/// The Global Descriptor Record follows the CDF Descriptor Record, at the
/// file offset noted in the CDR `gdr_offset` field. It anchors the variable
/// and attribute chains.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct GlobalDescriptorRecord {
    /// The file offset of the first rVariable Descriptor Record.
    pub rvdr_head: Option<CdfInt8>,
    /// The file offset of the first zVariable Descriptor Record.
    pub zvdr_head: Option<CdfInt8>,
    /// The file offset of the first Attribute Descriptor Record.
    pub adr_head: Option<CdfInt8>,
    /// The file offset one past the last internal record. The checksum
    /// trailer, when present, sits past this offset.
    pub eof: CdfInt8,
    /// Number of rVariables.
    pub num_rvars: CdfInt4,
    /// Number of attributes.
    pub num_attributes: CdfInt4,
    /// Maximum record number written across all rVariables, -1 when none.
    pub r_max_rec: CdfInt4,
    /// Number of zVariables.
    pub num_zvars: CdfInt4,
    /// The file offset of the first Unused Internal Record.
    pub uir_head: Option<CdfInt8>,
    /// Date of the last leap second the file's TT2000 values account for,
    /// as yyyymmdd, or -1 when the file carries no TT2000 data.
    pub leapsecond_updated: CdfInt4,
    /// Dimension sizes shared by every rVariable.
    pub r_dim_sizes: Vec<i32>,
}

impl GlobalDescriptorRecord {
    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 5 * 8 + 8 * 4 + 4 * self.r_dim_sizes.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> Result<u64> {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Gdr);
        record::emit_link(encoder, self.rvdr_head);
        record::emit_link(encoder, self.zvdr_head);
        record::emit_link(encoder, self.adr_head);
        encoder.put_offset(*self.eof);
        self.num_rvars.encode_be(encoder);
        self.num_attributes.encode_be(encoder);
        self.r_max_rec.encode_be(encoder);
        CdfInt4::from(self.r_dim_sizes.len() as i32).encode_be(encoder);
        self.num_zvars.encode_be(encoder);
        record::emit_link(encoder, self.uir_head);
        CdfInt4::from(0).encode_be(encoder);
        self.leapsecond_updated.encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        for size in &self.r_dim_sizes {
            CdfInt4::from(*size).encode_be(encoder);
        }
        Ok(offset)
    }
}

impl record::ParseRecord for GlobalDescriptorRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Gdr)?;

        let rvdr_head = record::decode_link(decoder)?;
        let zvdr_head = record::decode_link(decoder)?;
        let adr_head = record::decode_link(decoder)?;
        let eof = crate::decode::decode_offset(decoder)?;

        let num_rvars = CdfInt4::decode_be(decoder)?;
        let num_attributes = CdfInt4::decode_be(decoder)?;
        let r_max_rec = CdfInt4::decode_be(decoder)?;
        let num_r_dims = CdfInt4::decode_be(decoder)?;
        let num_zvars = CdfInt4::decode_be(decoder)?;
        let uir_head = record::decode_link(decoder)?;

        record::expect_reserved(decoder, RecordKind::Gdr, 0)?;
        let leapsecond_updated = CdfInt4::decode_be(decoder)?;
        record::expect_reserved(decoder, RecordKind::Gdr, -1)?;

        let variant = decoder.context.variant;
        let expected = record::header_len(variant) as i64
            + 5 * record::offset_width(variant) as i64
            + 8 * 4
            + 4 * i64::from(*num_r_dims);
        record::expect_size(RecordKind::Gdr, record_size, expected)?;

        let r_dim_sizes: Vec<i32> = CdfInt4::decode_vec_be(decoder, usize::try_from(*num_r_dims)?)?
            .into_iter()
            .map(i32::from)
            .collect();
        decoder.context.r_dim_sizes = Some(r_dim_sizes.clone());

        Ok(Self {
            rvdr_head,
            zvdr_head,
            adr_head,
            eof,
            num_rvars,
            num_attributes,
            r_max_rec,
            num_zvars,
            uir_head,
            leapsecond_updated,
            r_dim_sizes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CdfError;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    fn sample() -> GlobalDescriptorRecord {
        GlobalDescriptorRecord {
            rvdr_head: Some(CdfInt8::from(4405)),
            zvdr_head: None,
            adr_head: Some(CdfInt8::from(404)),
            eof: CdfInt8::from(117_050),
            num_rvars: CdfInt4::from(2),
            num_attributes: CdfInt4::from(11),
            r_max_rec: CdfInt4::from(999),
            num_zvars: CdfInt4::from(0),
            uir_head: None,
            leapsecond_updated: CdfInt4::from(20_170_101),
            r_dim_sizes: vec![3],
        }
    }

    #[test]
    fn gdr_round_trip() -> Result<()> {
        let mut encoder = Encoder::new(Endian::Big);
        sample().emit(&mut encoder)?;
        assert_eq!(encoder.sink.len() as i64, sample().encoded_size());

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let gdr = GlobalDescriptorRecord::parse(&mut decoder)?;
        assert_eq!(gdr.rvdr_head, Some(CdfInt8::from(4405)));
        assert_eq!(gdr.zvdr_head, None);
        assert_eq!(gdr.adr_head, Some(CdfInt8::from(404)));
        assert_eq!(*gdr.eof, 117_050);
        assert_eq!(*gdr.num_attributes, 11);
        assert_eq!(*gdr.leapsecond_updated, 20_170_101);
        assert_eq!(gdr.r_dim_sizes, vec![3]);
        assert_eq!(decoder.context.r_dim_sizes()?, &[3]);
        Ok(())
    }

    #[test]
    fn declared_size_must_cover_dimensions() -> Result<()> {
        let mut encoder = Encoder::new(Endian::Big);
        sample().emit(&mut encoder)?;
        // Claim one more dimension than the record has room for.
        let mut bytes = encoder.sink;
        bytes[12 + 4 * 8 + 3 * 4 + 3] = 2;
        let mut decoder = Decoder::new(Cursor::new(bytes));
        assert!(matches!(
            GlobalDescriptorRecord::parse(&mut decoder),
            Err(CdfError::Malformed(_))
        ));
        Ok(())
    }
}
