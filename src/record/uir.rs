#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::Decoder,
    error::Result,
    record::{self, RecordKind},
    types::CdfInt8,
};
use std::io;

/// An Unused Internal Record marks a region abandoned when another tool
/// rewrote a record elsewhere in the file. Readers skip it; the region past
/// the two links is garbage.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct UnusedInternalRecord {
    /// Declared size of the unused region.
    pub record_size: CdfInt8,
    /// File offset of the next UIR.
    pub next_uir: Option<CdfInt8>,
    /// File offset of the previous UIR.
    pub prev_uir: Option<CdfInt8>,
}

impl record::ParseRecord for UnusedInternalRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let start = decoder.position()?;
        let record_size = record::expect_header(decoder, RecordKind::Uir)?;

        // A UIR can be as small as its own header; the links exist only when
        // the region has room for them.
        let variant = decoder.context.variant;
        let with_links =
            record::header_len(variant) as i64 + 2 * record::offset_width(variant) as i64;
        let (next_uir, prev_uir) = if record_size >= with_links {
            (record::decode_link(decoder)?, record::decode_link(decoder)?)
        } else {
            (None, None)
        };
        decoder.seek_to(start + u64::try_from(record_size)?)?;

        Ok(UnusedInternalRecord {
            record_size: CdfInt8::from(record_size),
            next_uir,
            prev_uir,
        })
    }
}

impl record::collection::RecordList for UnusedInternalRecord {
    fn next_record(&self) -> Option<CdfInt8> {
        self.next_uir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Encoder;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    #[test]
    fn uir_skips_its_region() -> Result<()> {
        let mut encoder = Encoder::new(Endian::Big);
        record::emit_header(&mut encoder, 40, RecordKind::Uir);
        encoder.put_offset(0);
        encoder.put_offset(0);
        encoder.put_bytes(&[0xAA; 12]);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let uir = UnusedInternalRecord::parse(&mut decoder)?;
        assert_eq!(*uir.record_size, 40);
        assert_eq!(uir.next_uir, None);
        assert_eq!(decoder.position()?, 40);
        Ok(())
    }
}
