#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::{CdfError, Result},
    record::{self, collection::RecordList, RecordKind},
    types::{CdfDataType, CdfInt4, CdfInt8},
};
use std::io;

/// Which entry chain of the owning attribute an entry lives on. The two
/// record kinds share one layout; they differ only in the record type code
/// and in what the entry number identifies.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EntryKind {
    /// A gEntry of a global attribute, or an rEntry describing an rVariable.
    GrEntry,
    /// A zEntry describing a zVariable.
    ZEntry,
}

impl EntryKind {
    /// The record type code this entry kind is stored under.
    pub fn record_kind(self) -> RecordKind {
        match self {
            EntryKind::GrEntry => RecordKind::AgrEdr,
            EntryKind::ZEntry => RecordKind::AzEdr,
        }
    }
}

/// An Attribute Entry Descriptor Record holds one value of an attribute:
/// a global value keyed by entry number, or a per-variable value keyed by
/// variable number. The value bytes stay file-encoded until a caller asks
/// for them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct AttributeEntryDescriptorRecord {
    /// Which entry chain this record belongs to.
    pub kind: EntryKind,
    /// The file offset of the next entry on the same chain.
    pub aedr_next: Option<CdfInt8>,
    /// The number of the attribute this entry belongs to.
    pub attr_num: CdfInt4,
    /// The data type of the value stored in this entry.
    pub data_type: CdfDataType,
    /// The entry number: a dense index for global attributes, the variable
    /// number for variable-scope attributes.
    pub num: CdfInt4,
    /// Element count: character length for string entries, value count
    /// otherwise.
    pub num_elements: CdfInt4,
    /// String count for multi-string character entries; 0 or 1 otherwise.
    pub num_strings: CdfInt4,
    /// The value, file-encoded.
    pub value: Vec<u8>,
}

impl AttributeEntryDescriptorRecord {
    const FIXED_FIELDS: i64 = 9 * 4;

    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 8 + Self::FIXED_FIELDS + self.value.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> Result<u64> {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), self.kind.record_kind());
        record::emit_link(encoder, self.aedr_next);
        self.attr_num.encode_be(encoder);
        CdfInt4::from(self.data_type as i32).encode_be(encoder);
        self.num.encode_be(encoder);
        self.num_elements.encode_be(encoder);
        self.num_strings.encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        encoder.put_bytes(&self.value);
        Ok(offset)
    }
}

impl record::ParseRecord for AttributeEntryDescriptorRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let (record_size, record_kind) = record::read_header(decoder)?;
        let kind = match record_kind {
            RecordKind::AgrEdr => EntryKind::GrEntry,
            RecordKind::AzEdr => EntryKind::ZEntry,
            other => {
                return Err(CdfError::Malformed(format!(
                    "expected an attribute entry record, found {other:?}"
                )))
            }
        };

        let aedr_next = record::decode_link(decoder)?;
        let attr_num = CdfInt4::decode_be(decoder)?;
        let data_type = CdfDataType::try_from(i32::from(CdfInt4::decode_be(decoder)?))?;
        let num = CdfInt4::decode_be(decoder)?;
        let num_elements = CdfInt4::decode_be(decoder)?;
        let num_strings = CdfInt4::decode_be(decoder)?;
        record::expect_reserved(decoder, record_kind, 0)?;
        record::expect_reserved(decoder, record_kind, 0)?;
        record::expect_reserved(decoder, record_kind, -1)?;
        record::expect_reserved(decoder, record_kind, -1)?;

        let variant = decoder.context.variant;
        let value_len = usize::try_from(*num_elements)? * data_type.element_size();
        let fixed = record::header_len(variant) as i64
            + record::offset_width(variant) as i64
            + Self::FIXED_FIELDS;
        if record_size < fixed + value_len as i64 {
            return Err(CdfError::Malformed(format!(
                "{record_kind:?} record declares {record_size} bytes but its value needs {value_len}"
            )));
        }
        let value = decoder.read_bytes(value_len)?;

        Ok(AttributeEntryDescriptorRecord {
            kind,
            aedr_next,
            attr_num,
            data_type,
            num,
            num_elements,
            num_strings,
            value,
        })
    }
}

impl RecordList for AttributeEntryDescriptorRecord {
    fn next_record(&self) -> Option<CdfInt8> {
        self.aedr_next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    #[test]
    fn entry_round_trip_both_kinds() -> Result<()> {
        for kind in [EntryKind::GrEntry, EntryKind::ZEntry] {
            let entry = AttributeEntryDescriptorRecord {
                kind,
                aedr_next: Some(CdfInt8::from(2048)),
                attr_num: CdfInt4::from(4),
                data_type: CdfDataType::Int4,
                num: CdfInt4::from(1),
                num_elements: CdfInt4::from(2),
                num_strings: CdfInt4::from(0),
                value: vec![0, 0, 0, 1, 0, 0, 0, 2],
            };
            let mut encoder = Encoder::new(Endian::Big);
            entry.emit(&mut encoder)?;
            let mut decoder = Decoder::new(Cursor::new(encoder.sink));
            let back = AttributeEntryDescriptorRecord::parse(&mut decoder)?;
            assert_eq!(back.kind, kind);
            assert_eq!(back.data_type, CdfDataType::Int4);
            assert_eq!(*back.num_elements, 2);
            assert_eq!(back.value, entry.value);
            assert_eq!(back.next_record(), Some(CdfInt8::from(2048)));
        }
        Ok(())
    }

    #[test]
    fn undersized_value_is_rejected() -> Result<()> {
        let entry = AttributeEntryDescriptorRecord {
            kind: EntryKind::GrEntry,
            aedr_next: None,
            attr_num: CdfInt4::from(0),
            data_type: CdfDataType::Real8,
            num: CdfInt4::from(0),
            num_elements: CdfInt4::from(1),
            num_strings: CdfInt4::from(0),
            value: vec![0; 8],
        };
        let mut encoder = Encoder::new(Endian::Big);
        entry.emit(&mut encoder)?;
        let mut bytes = encoder.sink;
        // Shrink the declared size below what the value needs.
        bytes[7] = 60;
        bytes.truncate(60);
        let mut decoder = Decoder::new(Cursor::new(bytes));
        assert!(matches!(
            AttributeEntryDescriptorRecord::parse(&mut decoder),
            Err(CdfError::Malformed(_))
        ));
        Ok(())
    }
}
