#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    attribute::AttrScope,
    decode::{Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::Result,
    record::{self, collection::RecordList, RecordKind},
    types::{CdfInt4, CdfInt8, CdfString},
};
use std::io;

/// Byte length of the attribute name field.
pub const NAME_LEN: usize = 256;

/// The Attribute Descriptor Record holds one attribute's identity and anchors
/// its two entry chains: g/rEntries and zEntries.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct AttributeDescriptorRecord {
    /// The file offset of the next ADR.
    pub adr_next: Option<CdfInt8>,
    /// The file offset of the first g/rEntry of this attribute.
    pub agredr_head: Option<CdfInt8>,
    /// The file offset of the first zEntry of this attribute.
    pub azedr_head: Option<CdfInt8>,
    /// Scope of this attribute.
    pub scope: AttrScope,
    /// The numeric identifier for this attribute, dense within the file.
    pub num: CdfInt4,
    /// The number of g/rEntries on this attribute.
    pub num_gr_entries: CdfInt4,
    /// The maximum g/rEntry number, -1 when none.
    pub max_gr_entry: CdfInt4,
    /// The number of zEntries on this attribute.
    pub num_z_entries: CdfInt4,
    /// The maximum zEntry number, -1 when none.
    pub max_z_entry: CdfInt4,
    /// Name of this attribute.
    pub name: CdfString,
}

impl AttributeDescriptorRecord {
    /// Encoded size in the large-file variant.
    pub const fn encoded_size() -> i64 {
        12 + 3 * 8 + 8 * 4 + NAME_LEN as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> Result<u64> {
        let offset = encoder.offset();
        record::emit_header(encoder, Self::encoded_size(), RecordKind::Adr);
        record::emit_link(encoder, self.adr_next);
        record::emit_link(encoder, self.agredr_head);
        CdfInt4::from(self.scope as i32).encode_be(encoder);
        self.num.encode_be(encoder);
        self.num_gr_entries.encode_be(encoder);
        self.max_gr_entry.encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        record::emit_link(encoder, self.azedr_head);
        self.num_z_entries.encode_be(encoder);
        self.max_z_entry.encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        self.name.encode_fixed(encoder, NAME_LEN)?;
        Ok(offset)
    }
}

impl record::ParseRecord for AttributeDescriptorRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Adr)?;
        let variant = decoder.context.variant;
        let expected = record::header_len(variant) as i64
            + 3 * record::offset_width(variant) as i64
            + 8 * 4
            + NAME_LEN as i64;
        record::expect_size(RecordKind::Adr, record_size, expected)?;

        let adr_next = record::decode_link(decoder)?;
        let agredr_head = record::decode_link(decoder)?;

        let scope = AttrScope::try_from(i32::from(CdfInt4::decode_be(decoder)?))?;
        let num = CdfInt4::decode_be(decoder)?;
        let num_gr_entries = CdfInt4::decode_be(decoder)?;
        let max_gr_entry = CdfInt4::decode_be(decoder)?;
        record::expect_reserved(decoder, RecordKind::Adr, 0)?;

        let azedr_head = record::decode_link(decoder)?;
        let num_z_entries = CdfInt4::decode_be(decoder)?;
        let max_z_entry = CdfInt4::decode_be(decoder)?;
        record::expect_reserved(decoder, RecordKind::Adr, -1)?;

        let name = CdfString::decode_fixed(decoder, NAME_LEN)?;

        Ok(AttributeDescriptorRecord {
            adr_next,
            agredr_head,
            azedr_head,
            scope,
            num,
            num_gr_entries,
            max_gr_entry,
            num_z_entries,
            max_z_entry,
            name,
        })
    }
}

impl RecordList for AttributeDescriptorRecord {
    fn next_record(&self) -> Option<CdfInt8> {
        self.adr_next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    #[test]
    fn adr_round_trip() -> Result<()> {
        let adr = AttributeDescriptorRecord {
            adr_next: None,
            agredr_head: Some(CdfInt8::from(1024)),
            azedr_head: None,
            scope: AttrScope::Global,
            num: CdfInt4::from(0),
            num_gr_entries: CdfInt4::from(3),
            max_gr_entry: CdfInt4::from(2),
            num_z_entries: CdfInt4::from(0),
            max_z_entry: CdfInt4::from(-1),
            name: CdfString::from("Project"),
        };
        let mut encoder = Encoder::new(Endian::Big);
        adr.emit(&mut encoder)?;
        assert_eq!(encoder.sink.len() as i64, AttributeDescriptorRecord::encoded_size());

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = AttributeDescriptorRecord::parse(&mut decoder)?;
        assert_eq!(back.scope, AttrScope::Global);
        assert_eq!(back.agredr_head, Some(CdfInt8::from(1024)));
        assert_eq!(*back.num_gr_entries, 3);
        assert_eq!(back.name.as_ref(), "Project");
        assert!(back.next_record().is_none());
        Ok(())
    }
}
