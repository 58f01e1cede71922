#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{decode_offset, Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::{CdfError, Result},
    record::{self, collection::RecordList, RecordKind},
    types::{CdfInt4, CdfInt8},
};
use std::io;

/// Entry fan-out this library writes for leaf VXRs, the documented default.
/// Any fan-out is accepted on read.
pub const VXR_ENTRIES: usize = 7;

/// Entry fan-out this library writes for second-level VXRs, whose entries
/// point at leaf VXRs instead of data segments.
pub const VXR_LEVEL_ENTRIES: usize = 3;

/// One used index entry: the record range `[first, last]` lives at `offset`,
/// which targets a VVR, a CVVR, or a lower-level VXR.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VxrEntry {
    /// First record number covered by the target.
    pub first: i64,
    /// Last record number covered by the target.
    pub last: i64,
    /// File offset of the target record.
    pub offset: i64,
}

/// A Variable Index Record maps record-number ranges to the data segments
/// holding them. Large variables chain VXRs and layer them into a tree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct VariableIndexRecord {
    /// File offset of the next VXR on the chain.
    pub vxr_next: Option<CdfInt8>,
    /// Total entry slots in this record, used or not.
    pub n_entries: CdfInt4,
    /// The used entries, in record order.
    pub entries: Vec<VxrEntry>,
}

impl VariableIndexRecord {
    /// A leaf VXR holding `entries`, padded out to the default fan-out.
    pub fn leaf(entries: Vec<VxrEntry>, vxr_next: Option<CdfInt8>) -> Self {
        let slots = entries.len().max(VXR_ENTRIES);
        VariableIndexRecord {
            vxr_next,
            n_entries: CdfInt4::from(slots as i32),
            entries,
        }
    }

    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 8 + 2 * 4 + 16 * i64::from(*self.n_entries)
    }

    /// Emit this record, returning its offset. Unused entry slots are filled
    /// with the all-ones sentinel.
    pub fn emit(&self, encoder: &mut Encoder) -> Result<u64> {
        let slots = usize::try_from(*self.n_entries)?;
        if self.entries.len() > slots {
            return Err(CdfError::OutOfRange(format!(
                "{} index entries exceed the record's {slots} slots",
                self.entries.len()
            )));
        }
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Vxr);
        record::emit_link(encoder, self.vxr_next);
        self.n_entries.encode_be(encoder);
        CdfInt4::from(self.entries.len() as i32).encode_be(encoder);
        for slot in 0..slots {
            let first = self.entries.get(slot).map_or(-1, |e| e.first);
            CdfInt4::from(first as i32).encode_be(encoder);
        }
        for slot in 0..slots {
            let last = self.entries.get(slot).map_or(-1, |e| e.last);
            CdfInt4::from(last as i32).encode_be(encoder);
        }
        for slot in 0..slots {
            encoder.put_offset(self.entries.get(slot).map_or(-1, |e| e.offset));
        }
        Ok(offset)
    }
}

impl record::ParseRecord for VariableIndexRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Vxr)?;
        let vxr_next = record::decode_link(decoder)?;

        let n_entries = CdfInt4::decode_be(decoder)?;
        let n_used = CdfInt4::decode_be(decoder)?;
        let slots = usize::try_from(*n_entries)?;
        let used = usize::try_from(*n_used)?;
        if used > slots {
            return Err(CdfError::Malformed(format!(
                "VXR record uses {used} of {slots} entries"
            )));
        }

        let variant = decoder.context.variant;
        let expected = record::header_len(variant) as i64
            + record::offset_width(variant) as i64
            + 2 * 4
            + (8 + record::offset_width(variant)) as i64 * slots as i64;
        record::expect_size(RecordKind::Vxr, record_size, expected)?;

        let firsts = CdfInt4::decode_vec_be(decoder, slots)?;
        let lasts = CdfInt4::decode_vec_be(decoder, slots)?;
        let mut offsets = Vec::with_capacity(slots);
        for _ in 0..slots {
            offsets.push(decode_offset(decoder)?);
        }

        let mut entries = Vec::with_capacity(used);
        for slot in 0..used {
            let first = i64::from(i32::from(firsts[slot]));
            let last = i64::from(i32::from(lasts[slot]));
            let offset = i64::from(offsets[slot]);
            if first < 0 || last < first || offset <= 0 {
                return Err(CdfError::Malformed(format!(
                    "VXR entry {slot} holds an unusable range [{first}, {last}] at {offset:#x}"
                )));
            }
            entries.push(VxrEntry {
                first,
                last,
                offset,
            });
        }

        Ok(VariableIndexRecord {
            vxr_next,
            n_entries,
            entries,
        })
    }
}

impl RecordList for VariableIndexRecord {
    fn next_record(&self) -> Option<CdfInt8> {
        self.vxr_next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    #[test]
    fn vxr_round_trip_with_unused_slots() -> Result<()> {
        let vxr = VariableIndexRecord::leaf(
            vec![
                VxrEntry {
                    first: 0,
                    last: 99,
                    offset: 4096,
                },
                VxrEntry {
                    first: 100,
                    last: 149,
                    offset: 8192,
                },
            ],
            None,
        );
        let mut encoder = Encoder::new(Endian::Big);
        vxr.emit(&mut encoder)?;
        assert_eq!(encoder.sink.len() as i64, 28 + 16 * VXR_ENTRIES as i64);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = VariableIndexRecord::parse(&mut decoder)?;
        assert_eq!(*back.n_entries as usize, VXR_ENTRIES);
        assert_eq!(back.entries, vxr.entries);
        assert!(back.next_record().is_none());
        Ok(())
    }

    #[test]
    fn nonstandard_fanout_is_accepted() -> Result<()> {
        let vxr = VariableIndexRecord {
            vxr_next: Some(CdfInt8::from(12_345)),
            n_entries: CdfInt4::from(2),
            entries: vec![VxrEntry {
                first: 0,
                last: 9,
                offset: 2048,
            }],
        };
        let mut encoder = Encoder::new(Endian::Big);
        vxr.emit(&mut encoder)?;
        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = VariableIndexRecord::parse(&mut decoder)?;
        assert_eq!(*back.n_entries, 2);
        assert_eq!(back.entries.len(), 1);
        assert_eq!(back.next_record(), Some(CdfInt8::from(12_345)));
        Ok(())
    }

    #[test]
    fn inverted_range_is_rejected() -> Result<()> {
        let vxr = VariableIndexRecord {
            vxr_next: None,
            n_entries: CdfInt4::from(1),
            entries: vec![VxrEntry {
                first: 10,
                last: 5,
                offset: 2048,
            }],
        };
        let mut encoder = Encoder::new(Endian::Big);
        vxr.emit(&mut encoder)?;
        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        assert!(matches!(
            VariableIndexRecord::parse(&mut decoder),
            Err(CdfError::Malformed(_))
        ));
        Ok(())
    }
}
