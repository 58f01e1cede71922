#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::Result,
    record::{self, RecordKind},
    types::CdfInt4,
};
use std::io;

/// A Sparseness Parameters Record carries the sparse-arrays method and its
/// parameters, pointed to by a VDR. Sparse arrays were never deployed in the
/// wild; the record is parsed and preserved but its parameters are not acted
/// on.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct SparsenessParametersRecord {
    /// Sparse-arrays method code.
    pub s_arrays_kind: CdfInt4,
    /// Method parameters.
    pub parameters: Vec<i32>,
}

impl SparsenessParametersRecord {
    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        12 + 3 * 4 + 4 * self.parameters.len() as i64
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> u64 {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), RecordKind::Spr);
        self.s_arrays_kind.encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(self.parameters.len() as i32).encode_be(encoder);
        for parameter in &self.parameters {
            CdfInt4::from(*parameter).encode_be(encoder);
        }
        offset
    }
}

impl record::ParseRecord for SparsenessParametersRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let record_size = record::expect_header(decoder, RecordKind::Spr)?;
        let s_arrays_kind = CdfInt4::decode_be(decoder)?;
        record::expect_reserved(decoder, RecordKind::Spr, 0)?;
        let count = usize::try_from(*CdfInt4::decode_be(decoder)?)?;

        let variant = decoder.context.variant;
        let expected = record::header_len(variant) as i64 + 3 * 4 + 4 * count as i64;
        record::expect_size(RecordKind::Spr, record_size, expected)?;

        let parameters = CdfInt4::decode_vec_be(decoder, count)?
            .into_iter()
            .map(i32::from)
            .collect();

        Ok(Self {
            s_arrays_kind,
            parameters,
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
    fn spr_round_trip() -> Result<()> {
        let spr = SparsenessParametersRecord {
            s_arrays_kind: CdfInt4::from(1),
            parameters: vec![2, 4],
        };
        let mut encoder = Encoder::new(Endian::Big);
        spr.emit(&mut encoder);

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = SparsenessParametersRecord::parse(&mut decoder)?;
        assert_eq!(*back.s_arrays_kind, 1);
        assert_eq!(back.parameters, vec![2, 4]);
        Ok(())
    }
}
