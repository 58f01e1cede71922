/// The CDF format supports different data types like ints and floats of
/// different sizes. This module defines the data-type codes, the bulk value
/// codec used for variable records and attribute entries, and the scalar
/// newtypes used by record control fields.
use crate::decode::{Decodable, Decoder};
use crate::encode::{Encodable, Encoder};
use crate::error::{CdfError, Result};
use crate::repr::Endian;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::fmt::{self, Debug, Display, Formatter};
use std::io;
use std::mem;
use std::ops::Deref;

macro_rules! impl_cdf_scalar {
    ($cdf_type:ident, $rust_type:ty) => {
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(PartialEq, Clone, Copy)]
        #[doc = concat!("CDF-consistent record field that wraps [`", stringify!($rust_type), "`].")]
        pub struct $cdf_type($rust_type);

        impl $cdf_type {
            /// Size of this type in bytes.
            pub const fn size() -> usize {
                mem::size_of::<$rust_type>()
            }

            /// Create an instance from a byte array using big-endian order.
            pub fn from_be_bytes(bytes: [u8; Self::size()]) -> Self {
                Self(<$rust_type>::from_be_bytes(bytes))
            }
            /// Create an instance from a byte array using little-endian order.
            pub fn from_le_bytes(bytes: [u8; Self::size()]) -> Self {
                Self(<$rust_type>::from_le_bytes(bytes))
            }
            /// Convert this type to a byte array using big-endian order.
            pub fn to_be_bytes(self) -> [u8; Self::size()] {
                <$rust_type>::to_be_bytes(self.0)
            }
            /// Convert this type to a byte array using little-endian order.
            pub fn to_le_bytes(self) -> [u8; Self::size()] {
                <$rust_type>::to_le_bytes(self.0)
            }
        }

        impl From<$rust_type> for $cdf_type {
            fn from(value: $rust_type) -> Self {
                $cdf_type(value)
            }
        }

        impl From<$cdf_type> for $rust_type {
            fn from(value: $cdf_type) -> $rust_type {
                value.0
            }
        }

        impl AsRef<$rust_type> for $cdf_type {
            fn as_ref(&self) -> &$rust_type {
                &self.0
            }
        }

        impl Deref for $cdf_type {
            type Target = $rust_type;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Display for $cdf_type {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl Debug for $cdf_type {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Decodable for $cdf_type {
            fn decode_be<R>(decoder: &mut Decoder<R>) -> Result<Self>
            where
                R: io::Read + io::Seek,
            {
                let mut buffer = [0u8; <$cdf_type>::size()];
                decoder.reader.read_exact(&mut buffer[..])?;
                Ok($cdf_type::from_be_bytes(buffer))
            }

            fn decode_le<R>(decoder: &mut Decoder<R>) -> Result<Self>
            where
                R: io::Read + io::Seek,
            {
                let mut buffer = [0u8; <$cdf_type>::size()];
                decoder.reader.read_exact(&mut buffer[..])?;
                Ok($cdf_type::from_le_bytes(buffer))
            }
        }

        impl Encodable for $cdf_type {
            fn encode_be(&self, encoder: &mut Encoder) {
                encoder.put_bytes(&self.to_be_bytes());
            }
            fn encode_le(&self, encoder: &mut Encoder) {
                encoder.put_bytes(&self.to_le_bytes());
            }
        }
    };
}

impl_cdf_scalar!(CdfInt4, i32);
impl_cdf_scalar!(CdfInt8, i64);
impl_cdf_scalar!(CdfUint4, u32);

/// CDF-consistent wrapper around [`String`] for the fixed-width,
/// NUL-padded name and copyright fields of internal records.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq)]
pub struct CdfString(String);

impl CdfString {
    /// Decode a fixed-width field of `num_bytes`, trimming trailing NULs.
    pub fn decode_fixed<R>(decoder: &mut Decoder<R>, num_bytes: usize) -> Result<Self>
    where
        R: io::Read + io::Seek,
    {
        let buffer = decoder.read_bytes(num_bytes)?;
        let text = String::from_utf8(buffer.into_iter().take_while(|c| *c != 0).collect())
            .map_err(|e| CdfError::Malformed(format!("non-UTF-8 text field: {e}")))?;
        Ok(text.into())
    }

    /// Emit this string into a fixed-width field of `num_bytes`, padding with
    /// NULs.
    /// # Errors
    /// Raises [`CdfError::OutOfRange`] if the string does not fit; nothing is
    /// truncated silently.
    pub fn encode_fixed(&self, encoder: &mut Encoder, num_bytes: usize) -> Result<()> {
        let bytes = self.0.as_bytes();
        if bytes.len() > num_bytes {
            return Err(CdfError::OutOfRange(format!(
                "string {:?} exceeds its {num_bytes}-byte field",
                self.0
            )));
        }
        encoder.put_bytes(bytes);
        encoder.put_bytes(&vec![0u8; num_bytes - bytes.len()]);
        Ok(())
    }
}

impl From<String> for CdfString {
    fn from(value: String) -> Self {
        CdfString(value)
    }
}

impl From<&str> for CdfString {
    fn from(value: &str) -> Self {
        CdfString(value.to_string())
    }
}

impl From<CdfString> for String {
    fn from(value: CdfString) -> String {
        value.0
    }
}

impl AsRef<str> for CdfString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for CdfString {
    type Target = String;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for CdfString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Debug for CdfString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// The data types a CDF variable or attribute entry may carry, with the
/// canonical on-disk codes of the CDF specification.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum CdfDataType {
    /// 1-byte signed integer.
    Int1 = 1,
    /// 2-byte signed integer.
    Int2 = 2,
    /// 4-byte signed integer.
    Int4 = 4,
    /// 8-byte signed integer.
    Int8 = 8,
    /// 1-byte unsigned integer.
    Uint1 = 11,
    /// 2-byte unsigned integer.
    Uint2 = 12,
    /// 4-byte unsigned integer.
    Uint4 = 14,
    /// 4-byte IEEE float.
    Real4 = 21,
    /// 8-byte IEEE float.
    Real8 = 22,
    /// Milliseconds since 0000-01-01, as an 8-byte float.
    Epoch = 31,
    /// Picosecond-resolution epoch, as a pair of 8-byte floats.
    Epoch16 = 32,
    /// Nanoseconds since J2000 on the TT timescale, as an 8-byte integer.
    TimeTt2000 = 33,
    /// 1-byte signed integer, equivalent to [`CdfDataType::Int1`].
    Byte = 41,
    /// 4-byte IEEE float, equivalent to [`CdfDataType::Real4`].
    Float = 44,
    /// 8-byte IEEE float, equivalent to [`CdfDataType::Real8`].
    Double = 45,
    /// Fixed-length text, `num_elements` bytes per value.
    Char = 51,
    /// Fixed-length text, equivalent to [`CdfDataType::Char`].
    Uchar = 52,
}

impl CdfDataType {
    /// On-disk size of one element of this type in bytes. String types count
    /// one byte per element.
    pub const fn element_size(self) -> usize {
        match self {
            CdfDataType::Int1 | CdfDataType::Uint1 | CdfDataType::Byte => 1,
            CdfDataType::Int2 | CdfDataType::Uint2 => 2,
            CdfDataType::Int4 | CdfDataType::Uint4 => 4,
            CdfDataType::Int8 | CdfDataType::TimeTt2000 => 8,
            CdfDataType::Real4 | CdfDataType::Float => 4,
            CdfDataType::Real8 | CdfDataType::Double | CdfDataType::Epoch => 8,
            CdfDataType::Epoch16 => 16,
            CdfDataType::Char | CdfDataType::Uchar => 1,
        }
    }

    /// Whether values of this type are fixed-length text.
    pub const fn is_string(self) -> bool {
        matches!(self, CdfDataType::Char | CdfDataType::Uchar)
    }

    /// Whether this is one of the three epoch types.
    pub const fn is_epoch(self) -> bool {
        matches!(
            self,
            CdfDataType::Epoch | CdfDataType::Epoch16 | CdfDataType::TimeTt2000
        )
    }

    /// The default pad value written for variables that specify none, per
    /// the CDF library conventions.
    pub fn default_pad(self, num_elements: usize) -> CdfValues {
        match self {
            CdfDataType::Int1 | CdfDataType::Byte => CdfValues::Int1(vec![-127]),
            CdfDataType::Int2 => CdfValues::Int2(vec![-32767]),
            CdfDataType::Int4 => CdfValues::Int4(vec![-2_147_483_647]),
            CdfDataType::Int8 => CdfValues::Int8(vec![-9_223_372_036_854_775_807]),
            CdfDataType::Uint1 => CdfValues::Uint1(vec![254]),
            CdfDataType::Uint2 => CdfValues::Uint2(vec![65_534]),
            CdfDataType::Uint4 => CdfValues::Uint4(vec![4_294_967_294]),
            CdfDataType::Real4 | CdfDataType::Float => CdfValues::Real4(vec![-1.0e30]),
            CdfDataType::Real8 | CdfDataType::Double => CdfValues::Real8(vec![-1.0e30]),
            CdfDataType::Epoch => CdfValues::Epoch(vec![0.0]),
            CdfDataType::Epoch16 => CdfValues::Epoch16(vec![(0.0, 0.0)]),
            CdfDataType::TimeTt2000 => {
                CdfValues::TimeTt2000(vec![-9_223_372_036_854_775_807])
            }
            CdfDataType::Char | CdfDataType::Uchar => {
                CdfValues::String(vec![" ".repeat(num_elements)])
            }
        }
    }
}

impl TryFrom<i32> for CdfDataType {
    type Error = CdfError;
    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(CdfDataType::Int1),
            2 => Ok(CdfDataType::Int2),
            4 => Ok(CdfDataType::Int4),
            8 => Ok(CdfDataType::Int8),
            11 => Ok(CdfDataType::Uint1),
            12 => Ok(CdfDataType::Uint2),
            14 => Ok(CdfDataType::Uint4),
            21 => Ok(CdfDataType::Real4),
            22 => Ok(CdfDataType::Real8),
            31 => Ok(CdfDataType::Epoch),
            32 => Ok(CdfDataType::Epoch16),
            33 => Ok(CdfDataType::TimeTt2000),
            41 => Ok(CdfDataType::Byte),
            44 => Ok(CdfDataType::Float),
            45 => Ok(CdfDataType::Double),
            51 => Ok(CdfDataType::Char),
            52 => Ok(CdfDataType::Uchar),
            v => Err(CdfError::Unsupported(format!("data type code {v}"))),
        }
    }
}

macro_rules! scalars_from_bytes {
    ($buf:expr, $endian:expr, $rust_type:ty) => {{
        const WIDTH: usize = mem::size_of::<$rust_type>();
        let mut values = Vec::with_capacity($buf.len() / WIDTH);
        for chunk in $buf.chunks_exact(WIDTH) {
            let bytes: [u8; WIDTH] = chunk.try_into().map_err(|_| {
                CdfError::Malformed("scalar chunk width mismatch".to_string())
            })?;
            values.push(match $endian {
                Endian::Big => <$rust_type>::from_be_bytes(bytes),
                Endian::Little => <$rust_type>::from_le_bytes(bytes),
            });
        }
        values
    }};
}

macro_rules! scalars_to_bytes {
    ($values:expr, $endian:expr, $sink:expr) => {
        for v in $values {
            match $endian {
                Endian::Big => $sink.extend_from_slice(&v.to_be_bytes()),
                Endian::Little => $sink.extend_from_slice(&v.to_le_bytes()),
            }
        }
    };
}

/// A homogeneous collection of decoded CDF values. This is the boundary
/// representation handed to and taken from callers; inside the record graph
/// values stay as raw file-encoded bytes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CdfValues {
    /// CDF_INT1 / CDF_BYTE values.
    Int1(Vec<i8>),
    /// CDF_INT2 values.
    Int2(Vec<i16>),
    /// CDF_INT4 values.
    Int4(Vec<i32>),
    /// CDF_INT8 values.
    Int8(Vec<i64>),
    /// CDF_UINT1 values.
    Uint1(Vec<u8>),
    /// CDF_UINT2 values.
    Uint2(Vec<u16>),
    /// CDF_UINT4 values.
    Uint4(Vec<u32>),
    /// CDF_REAL4 / CDF_FLOAT values.
    Real4(Vec<f32>),
    /// CDF_REAL8 / CDF_DOUBLE values.
    Real8(Vec<f64>),
    /// CDF_EPOCH values, milliseconds since year 0.
    Epoch(Vec<f64>),
    /// CDF_EPOCH16 values, `(seconds since year 0, picoseconds)` pairs.
    Epoch16(Vec<(f64, f64)>),
    /// CDF_TIME_TT2000 values, nanoseconds since J2000.
    TimeTt2000(Vec<i64>),
    /// CDF_CHAR / CDF_UCHAR values, one string per value.
    String(Vec<String>),
}

impl CdfValues {
    /// Number of values held. For strings this is the string count, not the
    /// byte count.
    pub fn len(&self) -> usize {
        match self {
            CdfValues::Int1(v) => v.len(),
            CdfValues::Int2(v) => v.len(),
            CdfValues::Int4(v) => v.len(),
            CdfValues::Int8(v) => v.len(),
            CdfValues::Uint1(v) => v.len(),
            CdfValues::Uint2(v) => v.len(),
            CdfValues::Uint4(v) => v.len(),
            CdfValues::Real4(v) => v.len(),
            CdfValues::Real8(v) => v.len(),
            CdfValues::Epoch(v) => v.len(),
            CdfValues::Epoch16(v) => v.len(),
            CdfValues::TimeTt2000(v) => v.len(),
            CdfValues::String(v) => v.len(),
        }
    }

    /// Whether this collection holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The canonical data type of this collection. Aliased codes (BYTE,
    /// FLOAT, DOUBLE, UCHAR) report their canonical partner.
    pub fn data_type(&self) -> CdfDataType {
        match self {
            CdfValues::Int1(_) => CdfDataType::Int1,
            CdfValues::Int2(_) => CdfDataType::Int2,
            CdfValues::Int4(_) => CdfDataType::Int4,
            CdfValues::Int8(_) => CdfDataType::Int8,
            CdfValues::Uint1(_) => CdfDataType::Uint1,
            CdfValues::Uint2(_) => CdfDataType::Uint2,
            CdfValues::Uint4(_) => CdfDataType::Uint4,
            CdfValues::Real4(_) => CdfDataType::Real4,
            CdfValues::Real8(_) => CdfDataType::Real8,
            CdfValues::Epoch(_) => CdfDataType::Epoch,
            CdfValues::Epoch16(_) => CdfDataType::Epoch16,
            CdfValues::TimeTt2000(_) => CdfDataType::TimeTt2000,
            CdfValues::String(_) => CdfDataType::Char,
        }
    }

    /// Whether values of this collection may be stored under `data_type`.
    pub fn matches(&self, data_type: CdfDataType) -> bool {
        match (self.data_type(), data_type) {
            (CdfDataType::Int1, CdfDataType::Int1 | CdfDataType::Byte) => true,
            (CdfDataType::Real4, CdfDataType::Real4 | CdfDataType::Float) => true,
            (CdfDataType::Real8, CdfDataType::Real8 | CdfDataType::Double) => true,
            (CdfDataType::Char, CdfDataType::Char | CdfDataType::Uchar) => true,
            (have, want) => have == want,
        }
    }

    /// Decode `num_values` values of `data_type` from a raw buffer.
    ///
    /// `num_elements` is the per-value element count: the character length
    /// for string types, 1 otherwise.
    /// # Errors
    /// Raises [`CdfError::Malformed`] if the buffer length does not match
    /// `num_values * num_elements * element_size` exactly; nothing is
    /// truncated silently.
    pub fn from_bytes(
        buf: &[u8],
        data_type: CdfDataType,
        num_values: usize,
        num_elements: usize,
        endianness: Endian,
    ) -> Result<CdfValues> {
        let expected = num_values * num_elements * data_type.element_size();
        if buf.len() != expected {
            return Err(CdfError::Malformed(format!(
                "value buffer holds {} bytes, {expected} needed for {num_values} values of {data_type:?}",
                buf.len()
            )));
        }
        Ok(match data_type {
            CdfDataType::Int1 | CdfDataType::Byte => {
                CdfValues::Int1(buf.iter().map(|b| *b as i8).collect())
            }
            CdfDataType::Int2 => CdfValues::Int2(scalars_from_bytes!(buf, endianness, i16)),
            CdfDataType::Int4 => CdfValues::Int4(scalars_from_bytes!(buf, endianness, i32)),
            CdfDataType::Int8 => CdfValues::Int8(scalars_from_bytes!(buf, endianness, i64)),
            CdfDataType::Uint1 => CdfValues::Uint1(buf.to_vec()),
            CdfDataType::Uint2 => CdfValues::Uint2(scalars_from_bytes!(buf, endianness, u16)),
            CdfDataType::Uint4 => CdfValues::Uint4(scalars_from_bytes!(buf, endianness, u32)),
            CdfDataType::Real4 | CdfDataType::Float => {
                CdfValues::Real4(scalars_from_bytes!(buf, endianness, f32))
            }
            CdfDataType::Real8 | CdfDataType::Double => {
                CdfValues::Real8(scalars_from_bytes!(buf, endianness, f64))
            }
            CdfDataType::Epoch => CdfValues::Epoch(scalars_from_bytes!(buf, endianness, f64)),
            CdfDataType::Epoch16 => {
                let halves = scalars_from_bytes!(buf, endianness, f64);
                CdfValues::Epoch16(
                    halves
                        .chunks_exact(2)
                        .map(|pair| (pair[0], pair[1]))
                        .collect(),
                )
            }
            CdfDataType::TimeTt2000 => {
                CdfValues::TimeTt2000(scalars_from_bytes!(buf, endianness, i64))
            }
            CdfDataType::Char | CdfDataType::Uchar => {
                let mut strings = Vec::with_capacity(num_values);
                for chunk in buf.chunks_exact(num_elements.max(1)) {
                    let trimmed: Vec<u8> = chunk
                        .iter()
                        .copied()
                        .take_while(|c| *c != 0)
                        .collect();
                    let text = String::from_utf8(trimmed).map_err(|e| {
                        CdfError::Malformed(format!("non-UTF-8 string value: {e}"))
                    })?;
                    strings.push(text.trim_end_matches(' ').to_string());
                }
                CdfValues::String(strings)
            }
        })
    }

    /// Encode this collection into raw bytes in the given byte order.
    ///
    /// Strings are padded with spaces out to `num_elements` bytes each.
    /// # Errors
    /// Raises [`CdfError::OutOfRange`] if a string exceeds `num_elements`
    /// bytes; nothing is truncated silently.
    pub fn to_bytes(&self, num_elements: usize, endianness: Endian) -> Result<Vec<u8>> {
        let mut sink: Vec<u8> = Vec::new();
        match self {
            CdfValues::Int1(v) => sink.extend(v.iter().map(|x| *x as u8)),
            CdfValues::Int2(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::Int4(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::Int8(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::Uint1(v) => sink.extend_from_slice(v),
            CdfValues::Uint2(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::Uint4(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::Real4(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::Real8(v) | CdfValues::Epoch(v) => {
                scalars_to_bytes!(v, endianness, sink)
            }
            CdfValues::Epoch16(v) => {
                for (seconds, picoseconds) in v {
                    scalars_to_bytes!([*seconds, *picoseconds], endianness, sink);
                }
            }
            CdfValues::TimeTt2000(v) => scalars_to_bytes!(v, endianness, sink),
            CdfValues::String(v) => {
                for s in v {
                    let bytes = s.as_bytes();
                    if bytes.len() > num_elements {
                        return Err(CdfError::OutOfRange(format!(
                            "string {s:?} exceeds the variable's {num_elements}-character length"
                        )));
                    }
                    sink.extend_from_slice(bytes);
                    sink.extend(std::iter::repeat(b' ').take(num_elements - bytes.len()));
                }
            }
        }
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paste::paste;
    use std::io::Cursor;

    macro_rules! test_scalar {
        ($t1:ty, $t2:ty, $val:literal) => {
            paste! {
                #[test]
                fn [< convert_ $t1:lower _ $t2 >]() {
                    let x: $t2 = $val;
                    let y: $t1 = x.into();
                    assert_eq!(x, y.into());
                }

                #[test]
                fn [< decode_ $t1:lower _ $t2 >]() -> Result<()> {
                    let x: $t2 = $val;
                    let y = x.to_be_bytes();
                    let mut decoder = Decoder::new(Cursor::new(y.as_slice()));
                    assert_eq!($t1::from(x), $t1::decode_be(&mut decoder)?);
                    Ok(())
                }
            }
        };
    }

    test_scalar!(CdfInt4, i32, -7);
    test_scalar!(CdfInt8, i64, -7);
    test_scalar!(CdfUint4, u32, 7);

    #[test]
    fn fixed_string_round_trip() -> Result<()> {
        let mut encoder = Encoder::new(Endian::Big);
        CdfString::from("Bz_gse").encode_fixed(&mut encoder, 16)?;
        assert_eq!(encoder.sink.len(), 16);
        let mut decoder = Decoder::new(Cursor::new(encoder.sink.as_slice()));
        let back = CdfString::decode_fixed(&mut decoder, 16)?;
        assert_eq!(back.as_ref(), "Bz_gse");
        Ok(())
    }

    #[test]
    fn fixed_string_rejects_overflow() {
        let mut encoder = Encoder::new(Endian::Big);
        let result = CdfString::from("too long for field").encode_fixed(&mut encoder, 4);
        assert!(matches!(result, Err(CdfError::OutOfRange(_))));
    }

    #[test]
    fn data_type_codes() {
        assert_eq!(CdfDataType::try_from(33).unwrap(), CdfDataType::TimeTt2000);
        assert_eq!(CdfDataType::try_from(45).unwrap(), CdfDataType::Double);
        assert!(matches!(
            CdfDataType::try_from(99),
            Err(CdfError::Unsupported(_))
        ));
        assert_eq!(CdfDataType::Epoch16.element_size(), 16);
        assert!(CdfDataType::Uchar.is_string());
    }

    #[test]
    fn values_round_trip_both_endians() -> Result<()> {
        let values = CdfValues::Int4(vec![1, -2, 2_000_000]);
        for endianness in [Endian::Big, Endian::Little] {
            let bytes = values.to_bytes(1, endianness)?;
            let back = CdfValues::from_bytes(&bytes, CdfDataType::Int4, 3, 1, endianness)?;
            assert_eq!(values, back);
        }
        Ok(())
    }

    #[test]
    fn epoch16_pairs_round_trip() -> Result<()> {
        let values = CdfValues::Epoch16(vec![(63_113_904_000.0, 5.0e11), (0.0, 0.0)]);
        let bytes = values.to_bytes(1, Endian::Little)?;
        assert_eq!(bytes.len(), 32);
        let back = CdfValues::from_bytes(&bytes, CdfDataType::Epoch16, 2, 1, Endian::Little)?;
        assert_eq!(values, back);
        Ok(())
    }

    #[test]
    fn strings_pad_and_trim() -> Result<()> {
        let values = CdfValues::String(vec!["proton".to_string(), "e-".to_string()]);
        let bytes = values.to_bytes(8, Endian::Big)?;
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], b"proton  ");
        let back = CdfValues::from_bytes(&bytes, CdfDataType::Char, 2, 8, Endian::Big)?;
        assert_eq!(values, back);
        Ok(())
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = CdfValues::from_bytes(&[0u8; 7], CdfDataType::Real8, 1, 1, Endian::Big);
        assert!(matches!(err, Err(CdfError::Malformed(_))));
    }

    #[test]
    fn aliased_types_match() {
        let v = CdfValues::Real8(vec![1.0]);
        assert!(v.matches(CdfDataType::Double));
        assert!(v.matches(CdfDataType::Real8));
        assert!(!v.matches(CdfDataType::Real4));
    }
}
