#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{decode_offset, Decoder},
    encode::Encoder,
    error::{CdfError, Result},
    record::{self, RecordKind},
    types::CdfInt8,
};
use std::io;

/// The Compressed CDF Record wraps the whole logical file image after the
/// CDR when file-level compression is on: its payload, once inflated, is the
/// GDR and everything that follows it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct CompressedCdfRecord {
    /// File offset of the compression parameters record.
    pub cpr_offset: CdfInt8,
    /// Size in bytes of the wrapped image once inflated.
    pub uncompressed_size: CdfInt8,
    /// The compressed image.
    pub data: Vec<u8>,
}

impl CompressedCdfRecord {
    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 2 * 8 + 4 + self.data.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> u64 {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Ccr);
        encoder.put_offset(*self.cpr_offset);
        encoder.put_offset(*self.uncompressed_size);
        encoder.put_bytes(&0i32.to_be_bytes());
        encoder.put_bytes(&self.data);
        offset
    }
}

impl record::ParseRecord for CompressedCdfRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Ccr)?;
        let cpr_offset = decode_offset(decoder)?;
        let uncompressed_size = decode_offset(decoder)?;
        record::expect_reserved(decoder, RecordKind::Ccr, 0)?;

        let variant = decoder.context.variant;
        let fixed =
            record::header_len(variant) as i64 + 2 * record::offset_width(variant) as i64 + 4;
        let payload = record_size - fixed;
        if payload < 0 || *uncompressed_size < 0 {
            return Err(CdfError::Malformed(format!(
                "CCR record declares {record_size} bytes against a {fixed}-byte header"
            )));
        }
        let data = decoder.read_bytes(usize::try_from(payload)?)?;

        Ok(Self {
            cpr_offset,
            uncompressed_size,
            data,
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
    fn ccr_round_trip() -> Result<()> {
        let ccr = CompressedCdfRecord {
            cpr_offset: CdfInt8::from(4096),
            uncompressed_size: CdfInt8::from(100_000),
            data: vec![9; 64],
        };
        let mut encoder = Encoder::new(Endian::Big);
        ccr.emit(&mut encoder);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = CompressedCdfRecord::parse(&mut decoder)?;
        assert_eq!(*back.cpr_offset, 4096);
        assert_eq!(*back.uncompressed_size, 100_000);
        assert_eq!(back.data, ccr.data);
        Ok(())
    }
}
