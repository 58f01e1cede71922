#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{decode_offset, Decoder},
    encode::Encoder,
    error::{CdfError, Result},
    record::{self, RecordKind},
};
use std::io;

/// A Compressed Variable Values Record wraps one VVR payload after GZIP.
/// The parent VXR entry advertises the record range; the uncompressed length
/// follows from that range and the variable's record size.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct CompressedVariableValuesRecord {
    /// Compressed record bytes.
    pub data: Vec<u8>,
}

impl CompressedVariableValuesRecord {
    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 4 + 8 + self.data.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> u64 {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Cvvr);
        encoder.put_bytes(&0i32.to_be_bytes());
        encoder.put_offset(self.data.len() as i64);
        encoder.put_bytes(&self.data);
        offset
    }
}

impl record::ParseRecord for CompressedVariableValuesRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Cvvr)?;
        record::expect_reserved(decoder, RecordKind::Cvvr, 0)?;
        let compressed_size = i64::from(decode_offset(decoder)?);

        let variant = decoder.context.variant;
        let fixed = record::header_len(variant) as i64 + 4 + record::offset_width(variant) as i64;
        if compressed_size < 0 || fixed + compressed_size > record_size {
            return Err(CdfError::Malformed(format!(
                "CVVR record declares {record_size} bytes but its payload claims {compressed_size}"
            )));
        }

        let data = decoder.read_bytes(usize::try_from(compressed_size)?)?;
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
    fn cvvr_round_trip() -> Result<()> {
        let cvvr = CompressedVariableValuesRecord {
            data: vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0],
        };
        let mut encoder = Encoder::new(Endian::Big);
        cvvr.emit(&mut encoder);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = CompressedVariableValuesRecord::parse(&mut decoder)?;
        assert_eq!(back.data, cvvr.data);
        Ok(())
    }

    #[test]
    fn oversized_payload_claim_is_rejected() -> Result<()> {
        let cvvr = CompressedVariableValuesRecord {
            data: vec![1, 2, 3, 4],
        };
        let mut encoder = Encoder::new(Endian::Big);
        cvvr.emit(&mut encoder);
        let mut bytes = encoder.sink;
        // Inflate the compressed-size field past the record end.
        bytes[23] = 200;
        let mut decoder = Decoder::new(Cursor::new(bytes));
        assert!(matches!(
            CompressedVariableValuesRecord::parse(&mut decoder),
            Err(CdfError::Malformed(_))
        ));
        Ok(())
    }
}
