#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::Decoder,
    encode::Encoder,
    error::Result,
    record::{self, RecordKind},
};
use std::io;

/// A Variable Values Record holds the raw bytes of a contiguous run of
/// records for the range advertised by its parent VXR entry. The payload
/// length is whatever the declared record size leaves after the header.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct VariableValuesRecord {
    /// Record bytes, file-encoded, in the file's majority.
    pub data: Vec<u8>,
}

impl VariableValuesRecord {
    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + self.data.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> u64 {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Vvr);
        encoder.put_bytes(&self.data);
        offset
    }
}

impl record::ParseRecord for VariableValuesRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Vvr)?;
        let payload = record_size - record::header_len(decoder.context.variant) as i64;
        let data = decoder.read_bytes(usize::try_from(payload)?)?;
        Ok(Self { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    #[test]
    fn vvr_round_trip() -> Result<()> {
        let vvr = VariableValuesRecord {
            data: (0u8..48).collect(),
        };
        let mut encoder = Encoder::new(Endian::Big);
        vvr.emit(&mut encoder);
        assert_eq!(encoder.sink.len(), 60);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = VariableValuesRecord::parse(&mut decoder)?;
        assert_eq!(back.data, vvr.data);
        Ok(())
    }
}
