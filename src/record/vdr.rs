#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    decode::{Decodable, Decoder},
    encode::{Encodable, Encoder},
    error::{CdfError, Result},
    record::{self, collection::RecordList, RecordKind},
    repr::Sparseness,
    types::{CdfDataType, CdfInt4, CdfInt8, CdfString},
};
use std::io;

/// Byte length of the variable name field.
pub const NAME_LEN: usize = 256;

const REC_VARIANCE_BIT: i32 = 0x1;
const PAD_BIT: i32 = 0x2;
const COMPRESSED_BIT: i32 = 0x4;

/// Whether a variable carries its own shape or inherits the file-wide
/// rVariable shape. The two descriptor kinds differ only in how
/// dimensionality is expressed; everything downstream of the descriptor is
/// shared.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VariableKind {
    /// Inherits the GDR's dimension sizes, masked by the dimension variances.
    R,
    /// Carries its own dimension sizes.
    Z,
}

impl VariableKind {
    /// The record type code this variable kind is stored under.
    pub fn record_kind(self) -> RecordKind {
        match self {
            VariableKind::R => RecordKind::RVdr,
            VariableKind::Z => RecordKind::ZVdr,
        }
    }
}

/// Per-variable option flags.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VdrFlags {
    /// Whether records differ from one another. A non-varying variable
    /// stores a single physical record.
    pub rec_variance: bool,
    /// Whether this variable carries an explicit pad value.
    pub has_pad: bool,
    /// Whether this variable's data segments are compressed.
    pub compressed: bool,
}

impl VdrFlags {
    fn from_bits(bits: i32) -> Self {
        VdrFlags {
            rec_variance: bits & REC_VARIANCE_BIT != 0,
            has_pad: bits & PAD_BIT != 0,
            compressed: bits & COMPRESSED_BIT != 0,
        }
    }

    fn to_bits(self) -> i32 {
        let mut bits = 0;
        if self.rec_variance {
            bits |= REC_VARIANCE_BIT;
        }
        if self.has_pad {
            bits |= PAD_BIT;
        }
        if self.compressed {
            bits |= COMPRESSED_BIT;
        }
        bits
    }
}

/// Describes one variable stored in the CDF file, either kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct VariableDescriptorRecord {
    /// Whether this is an rVariable or a zVariable.
    pub kind: VariableKind,
    /// File offset of the next VDR of the same kind.
    pub vdr_next: Option<CdfInt8>,
    /// Type of data stored in this variable.
    pub data_type: CdfDataType,
    /// Last written record number, -1 when no records are written.
    pub max_rec: CdfInt4,
    /// File offset of the first Variable Index Record.
    pub vxr_head: Option<CdfInt8>,
    /// File offset of the last Variable Index Record.
    pub vxr_tail: Option<CdfInt8>,
    /// Option flags.
    pub flags: VdrFlags,
    /// Sparse-record policy.
    pub sparseness: Sparseness,
    /// Number of elements of the data type in each value: the character
    /// length for string variables, 1 otherwise.
    pub num_elements: CdfInt4,
    /// Number (identifier) of this variable, dense within its kind.
    pub num: CdfInt4,
    /// Offset of the compression or sparseness parameters record.
    pub cpr_spr_offset: Option<CdfInt8>,
    /// Records per data segment.
    pub blocking_factor: CdfInt4,
    /// Name of this variable.
    pub name: CdfString,
    /// Dimension sizes: the variable's own for zVariables, a copy of the
    /// file-wide sizes for rVariables.
    pub dim_sizes: Vec<i32>,
    /// Per-dimension variance.
    pub dim_varys: Vec<bool>,
    /// Pad value bytes, file-encoded, one value's worth.
    pub pad_value: Option<Vec<u8>>,
}

impl VariableDescriptorRecord {
    /// The shape of one record: the sizes of the dimensions that vary.
    pub fn record_shape(&self) -> Vec<i32> {
        self.dim_sizes
            .iter()
            .zip(&self.dim_varys)
            .filter(|(_, vary)| **vary)
            .map(|(size, _)| *size)
            .collect()
    }

    /// Number of values in one record.
    pub fn values_per_record(&self) -> usize {
        self.record_shape()
            .iter()
            .map(|s| *s as usize)
            .product::<usize>()
            .max(1)
    }

    /// Number of bytes in one record as stored in a data segment.
    pub fn record_byte_len(&self) -> usize {
        self.values_per_record()
            * usize::try_from(*self.num_elements).unwrap_or(1).max(1)
            * self.data_type.element_size()
    }

    /// Bytes of one pad value, file-encoded.
    pub fn pad_byte_len(&self) -> usize {
        usize::try_from(*self.num_elements).unwrap_or(1).max(1) * self.data_type.element_size()
    }

    /// Encoded size in the large-file variant.
    pub fn encoded_size(&self) -> i64 {
        let dims = match self.kind {
            VariableKind::Z => 4 + 8 * self.dim_sizes.len() as i64,
            VariableKind::R => 4 * self.dim_varys.len() as i64,
        };
        let pad = self.pad_value.as_ref().map_or(0, |p| p.len() as i64);
        12 + 3 * 8 + 10 * 4 + 8 + NAME_LEN as i64 + dims + pad
    }

    /// Emit this record, returning its offset.
    pub fn emit(&self, encoder: &mut Encoder) -> Result<u64> {
        let offset = encoder.offset();
        record::emit_header(encoder, self.encoded_size(), self.kind.record_kind());
        record::emit_link(encoder, self.vdr_next);
        CdfInt4::from(self.data_type as i32).encode_be(encoder);
        self.max_rec.encode_be(encoder);
        record::emit_link(encoder, self.vxr_head);
        record::emit_link(encoder, self.vxr_tail);
        CdfInt4::from(self.flags.to_bits()).encode_be(encoder);
        CdfInt4::from(self.sparseness as i32).encode_be(encoder);
        CdfInt4::from(0).encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        CdfInt4::from(-1).encode_be(encoder);
        self.num_elements.encode_be(encoder);
        self.num.encode_be(encoder);
        encoder.put_offset(self.cpr_spr_offset.map_or(-1, i64::from));
        self.blocking_factor.encode_be(encoder);
        self.name.encode_fixed(encoder, NAME_LEN)?;
        if self.kind == VariableKind::Z {
            CdfInt4::from(self.dim_sizes.len() as i32).encode_be(encoder);
            for size in &self.dim_sizes {
                CdfInt4::from(*size).encode_be(encoder);
            }
        }
        for vary in &self.dim_varys {
            CdfInt4::from(if *vary { -1 } else { 0 }).encode_be(encoder);
        }
        if let Some(pad) = &self.pad_value {
            encoder.put_bytes(pad);
        }
        Ok(offset)
    }
}

impl record::ParseRecord for VariableDescriptorRecord {
    fn parse<R>(decoder: &mut Decoder<R>) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let (record_size, record_kind) = record::read_header(decoder)?;
        let kind = match record_kind {
            RecordKind::RVdr => VariableKind::R,
            RecordKind::ZVdr => VariableKind::Z,
            other => {
                return Err(CdfError::Malformed(format!(
                    "expected a variable descriptor record, found {other:?}"
                )))
            }
        };

        let vdr_next = record::decode_link(decoder)?;
        let data_type = CdfDataType::try_from(i32::from(CdfInt4::decode_be(decoder)?))?;
        let max_rec = CdfInt4::decode_be(decoder)?;
        let vxr_head = record::decode_link(decoder)?;
        let vxr_tail = record::decode_link(decoder)?;
        let flags = VdrFlags::from_bits(i32::from(CdfInt4::decode_be(decoder)?));
        let sparseness = Sparseness::try_from(i32::from(CdfInt4::decode_be(decoder)?))?;
        record::expect_reserved(decoder, record_kind, 0)?;
        record::expect_reserved(decoder, record_kind, -1)?;
        record::expect_reserved(decoder, record_kind, -1)?;
        let num_elements = CdfInt4::decode_be(decoder)?;
        let num = CdfInt4::decode_be(decoder)?;

        // The no-parameters sentinel is all one bits, not zero like chain
        // links.
        let cpr_spr_offset =
            crate::decode::decode_offset(decoder).map(|v| (*v != -1).then_some(v))?;

        let blocking_factor = CdfInt4::decode_be(decoder)?;
        let name = CdfString::decode_fixed(decoder, NAME_LEN)?;

        let (dim_sizes, num_dims) = match kind {
            VariableKind::Z => {
                let num_dims = usize::try_from(*CdfInt4::decode_be(decoder)?)?;
                let sizes: Vec<i32> = CdfInt4::decode_vec_be(decoder, num_dims)?
                    .into_iter()
                    .map(i32::from)
                    .collect();
                (sizes, num_dims)
            }
            VariableKind::R => {
                let sizes = decoder.context.r_dim_sizes()?.to_vec();
                let num_dims = sizes.len();
                (sizes, num_dims)
            }
        };

        let mut dim_varys = vec![false; num_dims];
        for vary in dim_varys.iter_mut() {
            *vary = *CdfInt4::decode_be(decoder)? == -1;
        }

        let mut vdr = VariableDescriptorRecord {
            kind,
            vdr_next,
            data_type,
            max_rec,
            vxr_head,
            vxr_tail,
            flags,
            sparseness,
            num_elements,
            num,
            cpr_spr_offset,
            blocking_factor,
            name,
            dim_sizes,
            dim_varys,
            pad_value: None,
        };

        let variant = decoder.context.variant;
        let dims_bytes = match kind {
            VariableKind::Z => 4 + 8 * num_dims as i64,
            VariableKind::R => 4 * num_dims as i64,
        };
        let fixed = record::header_len(variant) as i64
            + 4 * record::offset_width(variant) as i64
            + 10 * 4
            + NAME_LEN as i64
            + dims_bytes;
        if flags.has_pad {
            let pad_len = vdr.pad_byte_len();
            if record_size < fixed + pad_len as i64 {
                return Err(CdfError::Malformed(format!(
                    "{record_kind:?} record declares {record_size} bytes but its pad value needs {pad_len}"
                )));
            }
            vdr.pad_value = Some(decoder.read_bytes(pad_len)?);
        } else if record_size < fixed {
            return Err(CdfError::Malformed(format!(
                "{record_kind:?} record declares {record_size} bytes, layout requires {fixed}"
            )));
        }

        Ok(vdr)
    }
}

impl RecordList for VariableDescriptorRecord {
    fn next_record(&self) -> Option<CdfInt8> {
        self.vdr_next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseRecord;
    use crate::repr::Endian;
    use std::io::Cursor;

    fn sample_z() -> VariableDescriptorRecord {
        VariableDescriptorRecord {
            kind: VariableKind::Z,
            vdr_next: None,
            data_type: CdfDataType::Real8,
            max_rec: CdfInt4::from(999),
            vxr_head: Some(CdfInt8::from(4096)),
            vxr_tail: Some(CdfInt8::from(4096)),
            flags: VdrFlags {
                rec_variance: true,
                has_pad: true,
                compressed: false,
            },
            sparseness: Sparseness::None,
            num_elements: CdfInt4::from(1),
            num: CdfInt4::from(0),
            cpr_spr_offset: None,
            blocking_factor: CdfInt4::from(0),
            name: CdfString::from("B_gse"),
            dim_sizes: vec![3],
            dim_varys: vec![true],
            pad_value: Some((-1.0e30f64).to_le_bytes().to_vec()),
        }
    }

    #[test]
    fn zvdr_round_trip() -> Result<()> {
        let vdr = sample_z();
        let mut encoder = Encoder::new(Endian::Little);
        vdr.emit(&mut encoder)?;
        assert_eq!(encoder.sink.len() as i64, vdr.encoded_size());

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        let back = VariableDescriptorRecord::parse(&mut decoder)?;
        assert_eq!(back.kind, VariableKind::Z);
        assert_eq!(back.data_type, CdfDataType::Real8);
        assert_eq!(*back.max_rec, 999);
        assert_eq!(back.dim_sizes, vec![3]);
        assert_eq!(back.dim_varys, vec![true]);
        assert_eq!(back.name.as_ref(), "B_gse");
        assert_eq!(back.pad_value, vdr.pad_value);
        assert_eq!(back.record_byte_len(), 24);
        assert_eq!(back.cpr_spr_offset, None);
        Ok(())
    }

    #[test]
    fn rvdr_inherits_file_dimensions() -> Result<()> {
        let vdr = VariableDescriptorRecord {
            kind: VariableKind::R,
            dim_sizes: vec![3, 2],
            dim_varys: vec![true, false],
            pad_value: None,
            flags: VdrFlags {
                rec_variance: true,
                has_pad: false,
                compressed: false,
            },
            ..sample_z()
        };
        let mut encoder = Encoder::new(Endian::Little);
        vdr.emit(&mut encoder)?;

        let mut decoder = Decoder::new(Cursor::new(encoder.sink));
        decoder.context.r_dim_sizes = Some(vec![3, 2]);
        let back = VariableDescriptorRecord::parse(&mut decoder)?;
        assert_eq!(back.kind, VariableKind::R);
        assert_eq!(back.dim_sizes, vec![3, 2]);
        assert_eq!(back.dim_varys, vec![true, false]);
        // Only the varying dimension contributes to the record.
        assert_eq!(back.record_shape(), vec![3]);
        assert_eq!(back.record_byte_len(), 24);
        Ok(())
    }

    #[test]
    fn string_record_length_counts_elements() {
        let vdr = VariableDescriptorRecord {
            data_type: CdfDataType::Char,
            num_elements: CdfInt4::from(10),
            dim_sizes: vec![],
            dim_varys: vec![],
            pad_value: None,
            flags: VdrFlags {
                rec_variance: true,
                has_pad: false,
                compressed: false,
            },
            ..sample_z()
        };
        assert_eq!(vdr.record_byte_len(), 10);
    }
}
